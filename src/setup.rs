//! Pipeline setup service
//!
//! Turns a loaded [`Config`] into a ready [`GenerationOrchestrator`] backed by
//! the production service clients.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::evidence::EvidenceRetriever;
use crate::generation::RigTextGenerator;
use crate::pipeline::{GenerationOrchestrator, OrchestratorBuilder};
use crate::renderers::{ElevenLabsClient, PdfRenderer, ReplicateImageClient};
use crate::{log_debug, log_warn};

/// Per-invocation switches layered over the configured renderer flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ArtifactToggles {
    pub audio: bool,
    pub images: bool,
    pub document: bool,
    pub evidence: bool,
}

impl Default for ArtifactToggles {
    fn default() -> Self {
        Self {
            audio: true,
            images: true,
            document: true,
            evidence: true,
        }
    }
}

/// Service for wiring the orchestrator from configuration
pub struct PipelineSetupService {
    config: Config,
    toggles: ArtifactToggles,
    warnings: Vec<String>,
}

impl PipelineSetupService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            toggles: ArtifactToggles::default(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_toggles(mut self, toggles: ArtifactToggles) -> Self {
        self.toggles = toggles;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Renderers that were enabled but could not be created, one line each
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Build the orchestrator with every configured client attached
    pub fn create_orchestrator(&mut self) -> Result<GenerationOrchestrator> {
        Ok(self.create_builder()?.build())
    }

    /// Orchestrator builder with every configured client attached.
    ///
    /// Fails only when the text generator or the prompt template cannot be
    /// set up; an unusable renderer or literature client is left out and
    /// reported through [`warnings`](Self::warnings).
    pub fn create_builder(&mut self) -> Result<OrchestratorBuilder> {
        let generator = RigTextGenerator::from_config(&self.config.generation)
            .context("Text generation is not configured")?;
        log_debug!(
            "Text generator ready: model={} temperature={}",
            generator.model(),
            generator.temperature()
        );

        let mut builder = GenerationOrchestrator::builder(Arc::new(generator))
            .assembler(self.config.template_assembler()?)
            .render_timeout(Duration::from_secs(
                self.config.performance.render_timeout_secs,
            ));

        if self.toggles.evidence {
            match EvidenceRetriever::from_config(&self.config.evidence) {
                Ok(retriever) => {
                    builder = builder.retriever(retriever, self.config.evidence.max_results);
                }
                Err(e) => self.skip("Literature retrieval", &e),
            }
        }

        if self.toggles.audio && self.config.speech.enabled {
            match ElevenLabsClient::from_config(&self.config.speech) {
                Ok(client) => builder = builder.speech(Arc::new(client)),
                Err(e) => self.skip("Audio narration", &e),
            }
        }

        if self.toggles.images && self.config.images.enabled {
            match ReplicateImageClient::from_config(&self.config.images) {
                Ok(client) => builder = builder.images(Arc::new(client)),
                Err(e) => self.skip("Illustrations", &e),
            }
        }

        if self.toggles.document && self.config.document.enabled {
            builder = builder.document(Arc::new(PdfRenderer::from_config(&self.config.document)));
        }

        Ok(builder)
    }

    fn skip(&mut self, what: &str, error: &dyn std::fmt::Display) {
        log_warn!("{} disabled: {}", what, error);
        self.warnings.push(format!("{what} disabled: {error}"));
    }
}
