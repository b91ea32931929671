//! Text generation service.
//!
//! The orchestrator only sees [`TextGenerator`]; the production
//! implementation talks to OpenAI through Rig.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::template::AssembledPrompt;
use crate::{log_debug, log_warn};

/// System preamble sent alongside every assembled prompt
const PREAMBLE: &str = "You are a senior physiotherapy educator. \
    Write realistic, structured clinical case studies for teaching purposes. \
    Follow the requested steps in order and use plain text headings.";

/// Seam to the external text generation service
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate the case text; the prompt is consumed by the call
    async fn generate(&self, prompt: AssembledPrompt) -> Result<String, GenerationError>;
}

/// OpenAI-backed generator with a fixed per-process temperature
#[derive(Clone)]
pub struct RigTextGenerator {
    client: openai::Client,
    model: String,
    temperature: f64,
    max_tokens: u64,
    timeout: Duration,
}

impl RigTextGenerator {
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        if config.api_key.is_empty() {
            return Err(GenerationError::Provider(
                format!(
                    "No API key found for text generation. Please set {} or configure generation.api_key.",
                    crate::config::OPENAI_API_KEY_ENV
                )
                .into(),
            ));
        }

        Ok(Self {
            client: openai::Client::new(&config.api_key),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

#[async_trait]
impl TextGenerator for RigTextGenerator {
    async fn generate(&self, prompt: AssembledPrompt) -> Result<String, GenerationError> {
        let (prompt_text, _) = prompt.into_parts();
        log_debug!(
            "Generating case text with model={} temperature={} max_tokens={}",
            self.model,
            self.temperature,
            self.max_tokens
        );

        let agent = self
            .client
            .agent(&self.model)
            .preamble(PREAMBLE)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build();

        match tokio::time::timeout(self.timeout, agent.prompt(prompt_text.as_str())).await {
            Ok(Ok(response)) => {
                let text = response.trim().to_string();
                if text.is_empty() {
                    return Err(GenerationError::EmptyResponse);
                }
                log_debug!("Received {} chars of case text", text.len());
                Ok(text)
            }
            Ok(Err(e)) => {
                log_warn!("Text generation provider error: {}", e);
                Err(GenerationError::Provider(Box::new(e)))
            }
            Err(_) => {
                log_warn!("Text generation timed out after {:?}", self.timeout);
                Err(GenerationError::Timeout(self.timeout))
            }
        }
    }
}
