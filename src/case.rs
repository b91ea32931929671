//! Case request and artifact types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::template::PromptSection;
use crate::voice::Voice;

/// Optional structured fields that can be surfaced in the prompt.
///
/// Declaration order is the canonical prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseField {
    Age,
    Gender,
    Occupation,
    Diagnosis,
    MedicalHistory,
    Lifestyle,
}

impl CaseField {
    /// All fields in canonical order
    pub const ALL: &'static [CaseField] = &[
        CaseField::Age,
        CaseField::Gender,
        CaseField::Occupation,
        CaseField::Diagnosis,
        CaseField::MedicalHistory,
        CaseField::Lifestyle,
    ];

    /// Name used when the field is rendered into the prompt
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Age => "Age",
            Self::Gender => "Gender",
            Self::Occupation => "Occupation",
            Self::Diagnosis => "Diagnosis",
            Self::MedicalHistory => "Medical History",
            Self::Lifestyle => "Lifestyle",
        }
    }

    /// Key used in config files and on the command line
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Occupation => "occupation",
            Self::Diagnosis => "diagnosis",
            Self::MedicalHistory => "medical_history",
            Self::Lifestyle => "lifestyle",
        }
    }
}

impl FromStr for CaseField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .find(|f| f.key() == normalized)
            .copied()
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(CaseField::key).collect();
                format!("Unknown field '{s}'. Known fields: {}", known.join(", "))
            })
    }
}

impl fmt::Display for CaseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One request for a generated case, as supplied by the front end
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRequest {
    /// Condition or scenario the case is about, e.g. "frozen shoulder"
    pub subject: String,
    /// Structured field values
    #[serde(default)]
    pub fields: BTreeMap<CaseField, String>,
    /// Fields to surface in the prompt
    #[serde(default)]
    pub include: BTreeSet<CaseField>,
    /// Raw narration voice selector
    #[serde(default)]
    pub voice: Option<String>,
    /// Whether to enrich the prompt with retrieved literature
    #[serde(default)]
    pub evidence_enabled: bool,
}

impl CaseRequest {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Set a structured field value without surfacing it
    #[must_use]
    pub fn with_field(mut self, field: CaseField, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Set a structured field value and add it to the inclusion mask
    #[must_use]
    pub fn with_included_field(mut self, field: CaseField, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self.include.insert(field);
        self
    }

    #[must_use]
    pub fn with_evidence(mut self, enabled: bool) -> Self {
        self.evidence_enabled = enabled;
        self
    }

    /// Fields that are both selected and populated, in canonical order
    pub fn populated_selection(&self) -> impl Iterator<Item = (CaseField, &str)> {
        self.include.iter().filter_map(|field| {
            self.fields
                .get(field)
                .map(String::as_str)
                .filter(|value| !value.trim().is_empty())
                .map(|value| (*field, value))
        })
    }

    /// Check the request invariants and resolve the voice selector
    pub fn validate(self) -> Result<ValidatedRequest, ValidationError> {
        if self.subject.trim().is_empty() {
            return Err(ValidationError::EmptySubject);
        }

        let voice = match self.voice.as_deref().map(str::trim) {
            None | Some("") => return Err(ValidationError::MissingVoice),
            Some(raw) => raw.parse::<Voice>()?,
        };

        if let Some(field) = self.include.iter().find(|field| {
            self.fields
                .get(field)
                .is_none_or(|value| value.trim().is_empty())
        }) {
            return Err(ValidationError::UnpopulatedField(*field));
        }

        Ok(ValidatedRequest {
            request: self,
            voice,
        })
    }
}

/// A request that passed validation, with its voice resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    request: CaseRequest,
    voice: Voice,
}

impl ValidatedRequest {
    pub fn request(&self) -> &CaseRequest {
        &self.request
    }

    pub fn voice(&self) -> Voice {
        self.voice
    }

    pub fn subject(&self) -> &str {
        self.request.subject.trim()
    }
}

/// Auxiliary artifact slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Audio,
    Images,
    Document,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Audio => "audio",
            Self::Images => "images",
            Self::Document => "document",
        };
        write!(f, "{name}")
    }
}

/// What happened to one artifact slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum RenderStatus {
    Produced,
    /// Renderer not configured for this pipeline
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutcome {
    pub kind: ArtifactKind,
    pub status: RenderStatus,
}

/// Bundle returned for one successful run
#[derive(Debug, Clone)]
pub struct CaseArtifact {
    pub run_id: Uuid,
    /// Generated case text
    pub text: String,
    pub audio: Option<Vec<u8>>,
    pub images: Vec<Vec<u8>>,
    pub document: Option<Vec<u8>>,
    /// Prompt sections that went into the generation call
    pub sections: BTreeSet<PromptSection>,
    /// Per-slot render results, in `Audio, Images, Document` order
    pub outcomes: Vec<RenderOutcome>,
}

impl CaseArtifact {
    /// True when text was produced but at least one renderer failed
    pub fn is_partial(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| matches!(outcome.status, RenderStatus::Failed(_)))
    }

    pub fn outcome(&self, kind: ArtifactKind) -> Option<&RenderStatus> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.kind == kind)
            .map(|outcome| &outcome.status)
    }

    /// Failed slots with their reasons
    pub fn failures(&self) -> Vec<(ArtifactKind, &str)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.status {
                RenderStatus::Failed(reason) => Some((outcome.kind, reason.as_str())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_field_from_str() {
        assert_eq!("Age".parse::<CaseField>().ok(), Some(CaseField::Age));
        assert_eq!(
            "medical-history".parse::<CaseField>().ok(),
            Some(CaseField::MedicalHistory)
        );
        assert_eq!(
            "Medical History".parse::<CaseField>().ok(),
            Some(CaseField::MedicalHistory)
        );
        assert!("shoe size".parse::<CaseField>().is_err());
    }

    #[test]
    fn test_case_field_order_is_canonical() {
        let mut shuffled = vec![CaseField::Diagnosis, CaseField::Age, CaseField::Gender];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![CaseField::Age, CaseField::Gender, CaseField::Diagnosis]
        );
    }

    #[test]
    fn test_validate_rejects_blank_subject() {
        let request = CaseRequest::new("   ").with_voice("Bella");
        assert_eq!(request.validate(), Err(ValidationError::EmptySubject));
    }

    #[test]
    fn test_validate_requires_voice() {
        assert_eq!(
            CaseRequest::new("low back pain").validate(),
            Err(ValidationError::MissingVoice)
        );
        assert_eq!(
            CaseRequest::new("low back pain").with_voice(" ").validate(),
            Err(ValidationError::MissingVoice)
        );
    }

    #[test]
    fn test_validate_rejects_mask_outside_fields() {
        let mut request = CaseRequest::new("ankle sprain").with_voice("Josh");
        request.include.insert(CaseField::Occupation);

        assert_eq!(
            request.validate(),
            Err(ValidationError::UnpopulatedField(CaseField::Occupation))
        );
    }

    #[test]
    fn test_validate_resolves_voice() {
        let validated = CaseRequest::new(" frozen shoulder ")
            .with_voice("bella")
            .with_included_field(CaseField::Age, "54")
            .validate()
            .expect("request should validate");

        assert_eq!(validated.voice(), Voice::Bella);
        assert_eq!(validated.subject(), "frozen shoulder");
    }

    #[test]
    fn test_populated_selection_skips_unselected() {
        let request = CaseRequest::new("tennis elbow")
            .with_field(CaseField::Gender, "male")
            .with_included_field(CaseField::Occupation, "carpenter")
            .with_included_field(CaseField::Age, "41");

        let selection: Vec<_> = request.populated_selection().collect();
        assert_eq!(
            selection,
            vec![(CaseField::Age, "41"), (CaseField::Occupation, "carpenter")]
        );
    }
}
