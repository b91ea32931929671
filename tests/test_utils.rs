//! Mock service clients shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use physiocase::error::{EvidenceError, GenerationError, RenderError};
use physiocase::evidence::{EvidenceItem, LiteratureSource};
use physiocase::generation::TextGenerator;
use physiocase::pipeline::{GenerationOrchestrator, OrchestratorBuilder, PipelineStage, StageListener};
use physiocase::renderers::{DocumentRenderer, ImageSynthesizer, SpeechSynthesizer};
use physiocase::template::AssembledPrompt;
use physiocase::voice::Voice;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const CASE_TEXT: &str = "Step 1: Brief Introduction\n\
    A 45-year-old office worker presents with a six month history of shoulder stiffness.\n\n\
    Step 2: Interview\nPain 6/10 at night.";

/// Text generator returning a scripted response
pub struct MockGenerator {
    calls: AtomicUsize,
    response: Result<String, String>,
    prompts: Mutex<Vec<AssembledPrompt>>,
}

impl MockGenerator {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<AssembledPrompt> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: AssembledPrompt) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt);
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(reason) => Err(GenerationError::Provider(reason.clone().into())),
        }
    }
}

/// Speech synthesizer returning fixed bytes, optionally failing or stalling
pub struct MockSpeech {
    calls: AtomicUsize,
    fail: bool,
    delay: Option<Duration>,
    voices: Mutex<Vec<Voice>>,
}

impl MockSpeech {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: None,
            voices: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
            delay: None,
            voices: Mutex::new(Vec::new()),
        })
    }

    pub fn stalling(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: Some(delay),
            voices: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn voices(&self) -> Vec<Voice> {
        self.voices.lock().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeech {
    async fn synthesize(&self, _text: &str, voice: Voice) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.voices.lock().push(voice);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RenderError::Service("503 Service Unavailable".to_string()));
        }
        Ok(b"ID3-mock-audio".to_vec())
    }
}

/// Image synthesizer producing `count` images, or failing
pub struct MockImages {
    calls: AtomicUsize,
    count: usize,
    fail: bool,
}

impl MockImages {
    pub fn producing(count: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            count,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            count: 0,
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSynthesizer for MockImages {
    async fn synthesize(&self, _prompt: &str) -> Result<Vec<Vec<u8>>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RenderError::Service("prediction failed".to_string()));
        }
        Ok((0..self.count).map(|i| vec![0x89, b'P', b'N', b'G', i as u8]).collect())
    }
}

/// Document renderer returning a fake PDF header, or failing
pub struct MockDocument {
    calls: AtomicUsize,
    fail: bool,
    titles: Mutex<Vec<String>>,
}

impl MockDocument {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
            titles: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
            titles: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().clone()
    }
}

impl DocumentRenderer for MockDocument {
    fn render(&self, title: &str, _text: &str) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.titles.lock().push(title.to_string());
        if self.fail {
            return Err(RenderError::Encoding('\u{1F600}'));
        }
        Ok(b"%PDF-1.3 mock".to_vec())
    }
}

/// Literature source returning scripted records
pub struct MockLiterature {
    search_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    items: Vec<EvidenceItem>,
    terms: Mutex<Vec<String>>,
}

impl MockLiterature {
    pub fn with_titles(titles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            search_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            items: titles
                .iter()
                .enumerate()
                .map(|(i, title)| EvidenceItem::new(format!("{}", 1000 + i), *title))
                .collect(),
            terms: Mutex::new(Vec::new()),
        })
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn terms(&self) -> Vec<String> {
        self.terms.lock().clone()
    }
}

#[async_trait]
impl LiteratureSource for MockLiterature {
    async fn search(&self, term: &str, max_results: usize) -> Result<Vec<String>, EvidenceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.terms.lock().push(term.to_string());
        Ok(self
            .items
            .iter()
            .take(max_results)
            .map(|item| item.id.clone())
            .collect())
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<EvidenceItem>, EvidenceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect())
    }
}

/// Listener that records every stage the orchestrator enters
pub fn stage_recorder() -> (StageListener, Arc<Mutex<Vec<PipelineStage>>>) {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let listener: StageListener = Arc::new(move |stage| sink.lock().push(stage));
    (listener, stages)
}

/// Orchestrator with all three renderers attached
pub fn full_pipeline(
    generator: Arc<MockGenerator>,
    speech: Arc<MockSpeech>,
    images: Arc<MockImages>,
    document: Arc<MockDocument>,
) -> OrchestratorBuilder {
    GenerationOrchestrator::builder(generator)
        .speech(speech)
        .images(images)
        .document(document)
}
