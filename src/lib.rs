//! physiocase - evidence-augmented physiotherapy case generation
//!
//! A validated case request is turned into a prompt (optionally enriched with
//! systematic-review titles), sent once to a text generation service, and the
//! resulting case text is rendered into narrated audio, illustrations and a
//! PDF handout. Only validation and text generation can fail a run; every
//! other external call degrades to a missing artifact.

#![allow(clippy::uninlined_format_args)] // Style preference
#![allow(clippy::future_not_send)] // From Rig framework internals, can't fix
#![allow(clippy::return_self_not_must_use)] // Builder pattern is clear enough
#![allow(clippy::items_after_statements)] // Locally-scoped use statements are fine

pub mod case;
pub mod cli;
pub mod config;
pub mod error;
pub mod evidence;
pub mod generation;
pub mod logger;
pub mod pipeline;
pub mod renderers;
pub mod setup;
pub mod template;
pub mod ui;
pub mod voice;

// Re-export important structs and functions for easier testing
pub use case::{
    ArtifactKind, CaseArtifact, CaseField, CaseRequest, RenderOutcome, RenderStatus,
    ValidatedRequest,
};
pub use config::Config;
pub use error::{GenerationError, PipelineError, RenderError, ValidationError};
pub use evidence::{EvidenceItem, EvidenceRetriever, LiteratureSource, PubMedClient};
pub use generation::{RigTextGenerator, TextGenerator};
pub use pipeline::{GenerationOrchestrator, PipelineStage};
pub use template::{AssembledPrompt, PromptSection, TemplateAssembler};
pub use voice::Voice;
