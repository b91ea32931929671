//! Error taxonomy for the case pipeline.
//!
//! Only [`PipelineError`] ever reaches the caller of
//! [`GenerationOrchestrator::run`](crate::pipeline::GenerationOrchestrator::run).
//! Evidence and rendering failures are absorbed into the returned artifact.

use std::time::Duration;

use crate::case::CaseField;

/// Boxed error used to carry the root cause of an external call failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Request rejected before any external call was made
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("subject must not be empty")]
    EmptySubject,
    #[error("a narration voice must be selected")]
    MissingVoice,
    #[error("unknown voice '{0}'. Supported: {supported}", supported = crate::voice::Voice::all_names().join(", "))]
    UnknownVoice(String),
    #[error("field '{0}' is selected for the prompt but has no value")]
    UnpopulatedField(CaseField),
}

/// Prompt assembly precondition failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    #[error("cannot assemble a prompt without a subject")]
    MissingSubject,
    #[error("prompt skeleton has no {{subject}} placeholder")]
    SkeletonWithoutSubject,
}

/// Literature retrieval failures; always degraded to "no evidence"
#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("literature request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed literature response: {0}")]
    Parse(String),
    #[error("invalid literature endpoint: {0}")]
    Url(#[from] url::ParseError),
}

/// Failure of the single text generation call
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("text generation provider error: {0}")]
    Provider(#[source] BoxError),
    #[error("text generation returned an empty response")]
    EmptyResponse,
}

/// Failure of one artifact renderer
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("renderer service error: {0}")]
    Service(String),
    #[error("renderer timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("text cannot be encoded for the document: {0:?} is not representable")]
    Encoding(char),
    #[error("document layout failed: {0}")]
    Layout(String),
}

/// Fatal pipeline errors: nothing was produced
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid case request: {0}")]
    Validation(#[from] ValidationError),
    #[error("prompt precondition violated: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("case generation failed")]
    Generation(#[source] GenerationError),
}

impl From<GenerationError> for PipelineError {
    fn from(error: GenerationError) -> Self {
        Self::Generation(error)
    }
}
