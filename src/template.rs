//! Prompt assembly.
//!
//! Builds the final instructional text from the HOAC case skeleton, the
//! request subject, the selected structured fields and retrieved evidence.
//! Assembly is pure: identical inputs always produce identical prompts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::case::{CaseField, CaseRequest};
use crate::error::AssemblyError;
use crate::evidence::EvidenceItem;

/// Built-in HOAC case skeleton
pub const DEFAULT_SKELETON: &str = include_str!("../assets/hoac_case.txt");

/// Bumped whenever the wording of [`DEFAULT_SKELETON`] changes
pub const SKELETON_VERSION: u32 = 2;

/// Placeholder replaced with the request subject
pub const SUBJECT_PLACEHOLDER: &str = "{subject}";

pub const VARIABLES_HEADING: &str = "Variables:";
pub const LITERATURE_HEADING: &str = "Relevant literature: ";

/// Named part of an assembled prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "section", content = "field")]
pub enum PromptSection {
    Skeleton,
    Variable(CaseField),
    Literature,
}

/// Final prompt handed to the text generation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    text: String,
    sections: BTreeSet<PromptSection>,
}

impl AssembledPrompt {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sections(&self) -> &BTreeSet<PromptSection> {
        &self.sections
    }

    pub fn includes(&self, section: PromptSection) -> bool {
        self.sections.contains(&section)
    }

    pub fn into_parts(self) -> (String, BTreeSet<PromptSection>) {
        (self.text, self.sections)
    }
}

/// Assembles prompts from a skeleton and a field order
#[derive(Debug, Clone)]
pub struct TemplateAssembler {
    skeleton: String,
    field_order: Vec<CaseField>,
}

impl Default for TemplateAssembler {
    fn default() -> Self {
        Self {
            skeleton: DEFAULT_SKELETON.trim_end().to_string(),
            field_order: CaseField::ALL.to_vec(),
        }
    }
}

impl TemplateAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom skeleton; it must reference the subject at least once
    pub fn with_skeleton(mut self, skeleton: impl Into<String>) -> Result<Self, AssemblyError> {
        let skeleton = skeleton.into();
        if !skeleton.contains(SUBJECT_PLACEHOLDER) {
            return Err(AssemblyError::SkeletonWithoutSubject);
        }
        self.skeleton = skeleton.trim_end().to_string();
        Ok(self)
    }

    /// Override the order in which variables are rendered.
    ///
    /// Fields missing from `order` keep their canonical position after the
    /// listed ones; duplicates are ignored.
    #[must_use]
    pub fn with_field_order(mut self, order: &[CaseField]) -> Self {
        let mut resolved: Vec<CaseField> = Vec::with_capacity(CaseField::ALL.len());
        for field in order.iter().chain(CaseField::ALL) {
            if !resolved.contains(field) {
                resolved.push(*field);
            }
        }
        self.field_order = resolved;
        self
    }

    pub fn field_order(&self) -> &[CaseField] {
        &self.field_order
    }

    /// Build the prompt for `request`, optionally enriched with `evidence`
    pub fn assemble(
        &self,
        request: &CaseRequest,
        evidence: &[EvidenceItem],
    ) -> Result<AssembledPrompt, AssemblyError> {
        let subject = request.subject.trim();
        if subject.is_empty() {
            return Err(AssemblyError::MissingSubject);
        }

        let mut sections = BTreeSet::from([PromptSection::Skeleton]);
        let mut text = self.skeleton.replace(SUBJECT_PLACEHOLDER, subject);

        let variables: Vec<(CaseField, &str)> = self
            .field_order
            .iter()
            .filter(|field| request.include.contains(field))
            .filter_map(|field| {
                request
                    .fields
                    .get(field)
                    .map(|value| value.trim())
                    .filter(|value| !value.is_empty())
                    .map(|value| (*field, value))
            })
            .collect();

        if !variables.is_empty() {
            text.push_str("\n\n");
            text.push_str(VARIABLES_HEADING);
            for (field, value) in variables {
                write!(text, "\n{}: {}", field.display_name(), value)
                    .expect("writing to string cannot fail");
                sections.insert(PromptSection::Variable(field));
            }
        }

        if request.evidence_enabled {
            let titles: Vec<&str> = evidence
                .iter()
                .map(|item| item.title.trim())
                .filter(|title| !title.is_empty())
                .collect();

            if !titles.is_empty() {
                text.push_str("\n\n");
                text.push_str(LITERATURE_HEADING);
                text.push_str(&titles.join(", "));
                sections.insert(PromptSection::Literature);
            }
        }

        crate::log_debug!(
            "Assembled prompt v{} with {} sections ({} chars)",
            SKELETON_VERSION,
            sections.len(),
            text.len()
        );

        Ok(AssembledPrompt { text, sections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(titles: &[&str]) -> Vec<EvidenceItem> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| EvidenceItem::new(format!("{}", 1000 + i), *title))
            .collect()
    }

    #[test]
    fn test_subject_replaced_everywhere() {
        let prompt = TemplateAssembler::new()
            .assemble(&CaseRequest::new("frozen shoulder"), &[])
            .expect("assembly should succeed");

        assert!(!prompt.text().contains(SUBJECT_PLACEHOLDER));
        let occurrences = DEFAULT_SKELETON.matches(SUBJECT_PLACEHOLDER).count();
        assert!(occurrences > 1);
        assert_eq!(prompt.text().matches("frozen shoulder").count(), occurrences);
        assert_eq!(
            prompt.sections(),
            &BTreeSet::from([PromptSection::Skeleton])
        );
    }

    #[test]
    fn test_missing_subject_is_precondition_error() {
        let result = TemplateAssembler::new().assemble(&CaseRequest::new(" "), &[]);
        assert_eq!(result, Err(AssemblyError::MissingSubject));
    }

    #[test]
    fn test_variables_follow_canonical_order() {
        let request = CaseRequest::new("patellofemoral pain")
            .with_included_field(CaseField::Diagnosis, "PFPS")
            .with_included_field(CaseField::Age, "23")
            .with_field(CaseField::Occupation, "runner");

        let prompt = TemplateAssembler::new()
            .assemble(&request, &[])
            .expect("assembly should succeed");

        assert!(
            prompt
                .text()
                .ends_with("\n\nVariables:\nAge: 23\nDiagnosis: PFPS")
        );
        assert!(!prompt.text().contains("runner"));
        assert!(prompt.includes(PromptSection::Variable(CaseField::Age)));
        assert!(!prompt.includes(PromptSection::Variable(CaseField::Occupation)));
    }

    #[test]
    fn test_no_variables_section_for_empty_mask() {
        let request = CaseRequest::new("whiplash").with_field(CaseField::Age, "37");
        let prompt = TemplateAssembler::new()
            .assemble(&request, &[])
            .expect("assembly should succeed");

        assert!(!prompt.text().contains(VARIABLES_HEADING));
    }

    #[test]
    fn test_configured_field_order() {
        let assembler =
            TemplateAssembler::new().with_field_order(&[CaseField::Diagnosis, CaseField::Diagnosis]);
        assert_eq!(assembler.field_order().first(), Some(&CaseField::Diagnosis));
        assert_eq!(assembler.field_order().len(), CaseField::ALL.len());

        let request = CaseRequest::new("sciatica")
            .with_included_field(CaseField::Age, "60")
            .with_included_field(CaseField::Diagnosis, "L5 radiculopathy");
        let prompt = assembler
            .assemble(&request, &[])
            .expect("assembly should succeed");

        assert!(
            prompt
                .text()
                .ends_with("Variables:\nDiagnosis: L5 radiculopathy\nAge: 60")
        );
    }

    #[test]
    fn test_literature_joined_in_retrieval_order() {
        let request = CaseRequest::new("plantar fasciitis").with_evidence(true);
        let items = evidence(&["Shockwave therapy review", "Orthoses meta-analysis"]);

        let prompt = TemplateAssembler::new()
            .assemble(&request, &items)
            .expect("assembly should succeed");

        assert!(prompt.text().ends_with(
            "\n\nRelevant literature: Shockwave therapy review, Orthoses meta-analysis"
        ));
        assert!(prompt.includes(PromptSection::Literature));
    }

    #[test]
    fn test_untitled_records_are_skipped_between_titles() {
        let request = CaseRequest::new("plantar fasciitis").with_evidence(true);
        let items = evidence(&["Shockwave therapy review", "", "Taping trial"]);

        let prompt = TemplateAssembler::new()
            .assemble(&request, &items)
            .expect("assembly should succeed");

        assert!(
            prompt
                .text()
                .ends_with("\n\nRelevant literature: Shockwave therapy review, Taping trial")
        );
        assert!(!prompt.text().contains(", ,"));
    }

    #[test]
    fn test_literature_omitted_without_evidence() {
        let request = CaseRequest::new("plantar fasciitis").with_evidence(true);
        let prompt = TemplateAssembler::new()
            .assemble(&request, &[])
            .expect("assembly should succeed");
        assert!(!prompt.text().contains(LITERATURE_HEADING));

        let untitled = evidence(&["", "  "]);
        let prompt = TemplateAssembler::new()
            .assemble(&request, &untitled)
            .expect("assembly should succeed");
        assert!(!prompt.includes(PromptSection::Literature));
    }

    #[test]
    fn test_literature_ignored_when_disabled() {
        let request = CaseRequest::new("plantar fasciitis");
        let prompt = TemplateAssembler::new()
            .assemble(&request, &evidence(&["Ignored title"]))
            .expect("assembly should succeed");
        assert!(!prompt.text().contains("Ignored title"));
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let assembler = TemplateAssembler::new();
        let request = CaseRequest::new("rotator cuff tear")
            .with_included_field(CaseField::Gender, "female")
            .with_evidence(true);
        let items = evidence(&["Exercise versus surgery"]);

        let first = assembler.assemble(&request, &items);
        let second = assembler.assemble(&request, &items);
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_skeleton_requires_subject() {
        assert!(matches!(
            TemplateAssembler::new().with_skeleton("No placeholder here"),
            Err(AssemblyError::SkeletonWithoutSubject)
        ));

        let assembler = TemplateAssembler::new()
            .with_skeleton("Case on {subject}. Discuss {subject}.\n")
            .expect("skeleton should be accepted");
        let prompt = assembler
            .assemble(&CaseRequest::new("hamstring strain"), &[])
            .expect("assembly should succeed");
        assert_eq!(
            prompt.text(),
            "Case on hamstring strain. Discuss hamstring strain."
        );
    }
}
