//! Case generation pipeline.
//!
//! `Validating -> AssemblingPrompt -> Generating -> RenderingArtifacts -> Done`,
//! with `Aborted` reachable only from `Validating`. Text generation is the
//! single fatal external call; evidence and renderer failures only thin out
//! the returned [`CaseArtifact`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::case::{
    ArtifactKind, CaseArtifact, CaseRequest, RenderOutcome, RenderStatus, ValidatedRequest,
};
use crate::error::{GenerationError, PipelineError, RenderError};
use crate::evidence::{EvidenceItem, EvidenceRetriever};
use crate::generation::TextGenerator;
use crate::renderers::{DocumentRenderer, ImageSynthesizer, SpeechSynthesizer};
use crate::template::TemplateAssembler;
use crate::voice::Voice;
use crate::{log_debug, log_error, log_info, log_warn};

/// Default number of evidence records pulled into a prompt
pub const DEFAULT_EVIDENCE_CAP: usize = 5;

/// Default per-call timeout for each renderer
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Stages of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Validating,
    AssemblingPrompt,
    Generating,
    RenderingArtifacts,
    Done,
    Aborted,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validating => "validating request",
            Self::AssemblingPrompt => "assembling prompt",
            Self::Generating => "generating case text",
            Self::RenderingArtifacts => "rendering artifacts",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        write!(f, "{label}")
    }
}

/// Callback notified on every stage transition
pub type StageListener = Arc<dyn Fn(PipelineStage) + Send + Sync>;

/// Runs case requests against injected service clients.
///
/// Holds no per-request state, so one orchestrator can serve concurrent runs.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    assembler: TemplateAssembler,
    generator: Arc<dyn TextGenerator>,
    retriever: Option<EvidenceRetriever>,
    evidence_cap: usize,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    images: Option<Arc<dyn ImageSynthesizer>>,
    document: Option<Arc<dyn DocumentRenderer>>,
    render_timeout: Duration,
    listener: Option<StageListener>,
}

/// Builder for [`GenerationOrchestrator`]
pub struct OrchestratorBuilder {
    inner: GenerationOrchestrator,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn assembler(mut self, assembler: TemplateAssembler) -> Self {
        self.inner.assembler = assembler;
        self
    }

    /// Enable literature retrieval, capped at `max_results` records
    #[must_use]
    pub fn retriever(mut self, retriever: EvidenceRetriever, max_results: usize) -> Self {
        self.inner.retriever = Some(retriever);
        self.inner.evidence_cap = max_results;
        self
    }

    #[must_use]
    pub fn speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.inner.speech = Some(speech);
        self
    }

    #[must_use]
    pub fn images(mut self, images: Arc<dyn ImageSynthesizer>) -> Self {
        self.inner.images = Some(images);
        self
    }

    #[must_use]
    pub fn document(mut self, document: Arc<dyn DocumentRenderer>) -> Self {
        self.inner.document = Some(document);
        self
    }

    #[must_use]
    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.inner.render_timeout = timeout;
        self
    }

    #[must_use]
    pub fn on_stage(mut self, listener: StageListener) -> Self {
        self.inner.listener = Some(listener);
        self
    }

    pub fn build(self) -> GenerationOrchestrator {
        self.inner
    }
}

impl GenerationOrchestrator {
    /// Start building an orchestrator around the mandatory text generator
    pub fn builder(generator: Arc<dyn TextGenerator>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            inner: Self {
                assembler: TemplateAssembler::default(),
                generator,
                retriever: None,
                evidence_cap: DEFAULT_EVIDENCE_CAP,
                speech: None,
                images: None,
                document: None,
                render_timeout: DEFAULT_RENDER_TIMEOUT,
                listener: None,
            },
        }
    }

    /// Process one request into a case artifact.
    ///
    /// Returns an error only when nothing was produced: the request was
    /// invalid or text generation failed.
    pub async fn run(&self, request: CaseRequest) -> Result<CaseArtifact, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("case_run", %run_id);
        self.run_inner(run_id, request).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        request: CaseRequest,
    ) -> Result<CaseArtifact, PipelineError> {
        self.enter(run_id, PipelineStage::Validating);
        let validated = match request.validate() {
            Ok(validated) => validated,
            Err(e) => {
                log_warn!("[{}] Rejected case request: {}", run_id, e);
                self.enter(run_id, PipelineStage::Aborted);
                return Err(e.into());
            }
        };

        self.enter(run_id, PipelineStage::AssemblingPrompt);
        let evidence = self.gather_evidence(&validated).await;
        let prompt = self
            .assembler
            .assemble(validated.request(), &evidence)
            .map_err(|e| {
                log_error!("[{}] Prompt assembly failed: {}", run_id, e);
                PipelineError::from(e)
            })?;
        let sections = prompt.sections().clone();

        self.enter(run_id, PipelineStage::Generating);
        let text = match self.generator.generate(prompt).await {
            Ok(text) if text.trim().is_empty() => {
                return Err(GenerationError::EmptyResponse.into());
            }
            Ok(text) => text,
            Err(e) => {
                log_warn!("[{}] Case generation failed: {}", run_id, e);
                return Err(e.into());
            }
        };

        self.enter(run_id, PipelineStage::RenderingArtifacts);
        let title = format!("Physiotherapy case study: {}", validated.subject());
        let (audio, images, document) = tokio::join!(
            self.render_audio(&text, validated.voice()),
            self.render_images(&text),
            self.render_document(&title, &text),
        );

        let outcomes = vec![
            outcome(ArtifactKind::Audio, &audio),
            outcome(ArtifactKind::Images, &images),
            outcome(ArtifactKind::Document, &document),
        ];
        for failure in outcomes.iter().filter_map(|o| match &o.status {
            RenderStatus::Failed(reason) => Some((o.kind, reason)),
            _ => None,
        }) {
            log_warn!("[{}] {} not produced: {}", run_id, failure.0, failure.1);
        }

        self.enter(run_id, PipelineStage::Done);
        Ok(CaseArtifact {
            run_id,
            text,
            audio: audio.ok().flatten(),
            images: images.ok().flatten().unwrap_or_default(),
            document: document.ok().flatten(),
            sections,
            outcomes,
        })
    }

    fn enter(&self, run_id: Uuid, stage: PipelineStage) {
        log_debug!("[{}] Stage: {}", run_id, stage);
        if let Some(listener) = &self.listener {
            listener(stage);
        }
    }

    async fn gather_evidence(&self, validated: &ValidatedRequest) -> Vec<EvidenceItem> {
        if !validated.request().evidence_enabled {
            return Vec::new();
        }
        let Some(retriever) = &self.retriever else {
            log_info!("Evidence requested but no literature source is configured");
            return Vec::new();
        };
        retriever
            .retrieve(validated.subject(), self.evidence_cap)
            .await
    }

    async fn with_timeout<T, F>(&self, call: F) -> Result<T, RenderError>
    where
        F: Future<Output = Result<T, RenderError>>,
    {
        tokio::time::timeout(self.render_timeout, call)
            .await
            .unwrap_or(Err(RenderError::Timeout(self.render_timeout)))
    }

    async fn render_audio(&self, text: &str, voice: Voice) -> Result<Option<Vec<u8>>, RenderError> {
        let Some(speech) = &self.speech else {
            return Ok(None);
        };
        self.with_timeout(speech.synthesize(text, voice))
            .await
            .map(Some)
    }

    async fn render_images(&self, text: &str) -> Result<Option<Vec<Vec<u8>>>, RenderError> {
        let Some(images) = &self.images else {
            return Ok(None);
        };
        self.with_timeout(images.synthesize(text)).await.map(Some)
    }

    async fn render_document(
        &self,
        title: &str,
        text: &str,
    ) -> Result<Option<Vec<u8>>, RenderError> {
        let Some(document) = &self.document else {
            return Ok(None);
        };
        document.render(title, text).map(Some)
    }
}

/// `Ok(None)` means the renderer was not configured
fn outcome<T>(kind: ArtifactKind, result: &Result<Option<T>, RenderError>) -> RenderOutcome {
    let status = match result {
        Ok(Some(_)) => RenderStatus::Produced,
        Ok(None) => RenderStatus::Skipped,
        Err(e) => RenderStatus::Failed(e.to_string()),
    };
    RenderOutcome { kind, status }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        let produced: Result<Option<u8>, RenderError> = Ok(Some(1));
        let skipped: Result<Option<u8>, RenderError> = Ok(None);
        let failed: Result<Option<u8>, RenderError> =
            Err(RenderError::Timeout(Duration::from_secs(3)));

        assert_eq!(
            outcome(ArtifactKind::Audio, &produced).status,
            RenderStatus::Produced
        );
        assert_eq!(
            outcome(ArtifactKind::Audio, &skipped).status,
            RenderStatus::Skipped
        );
        assert_eq!(
            outcome(ArtifactKind::Audio, &failed).status,
            RenderStatus::Failed("renderer timed out after 3s".to_string())
        );
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(PipelineStage::Generating.to_string(), "generating case text");
        assert_eq!(PipelineStage::Aborted.to_string(), "aborted");
    }
}
