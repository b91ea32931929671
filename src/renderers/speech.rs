use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use super::{SpeechSynthesizer, service_error};
use crate::config::SpeechConfig;
use crate::error::RenderError;
use crate::log_debug;
use crate::voice::Voice;

pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_SPEECH_MODEL: &str = "eleven_multilingual_v2";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// ElevenLabs text-to-speech client
#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    model_id: String,
}

impl ElevenLabsClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Result<Self, RenderError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RenderError::Service(format!("invalid speech endpoint: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
            model_id: model_id.into(),
        })
    }

    pub fn from_config(config: &SpeechConfig) -> Result<Self, RenderError> {
        if config.api_key.is_empty() {
            return Err(RenderError::Service(format!(
                "No API key found for speech synthesis. Please set {}.",
                crate::config::ELEVEN_API_KEY_ENV
            )));
        }
        Self::new(&config.base_url, &config.api_key, &config.model_id)
    }

    fn endpoint(&self, voice: Voice) -> Result<Url, RenderError> {
        self.base_url
            .join(&format!("/v1/text-to-speech/{}", voice.vendor_id()))
            .map_err(|e| RenderError::Service(format!("invalid speech endpoint: {e}")))
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, RenderError> {
        log_debug!("Synthesizing {} chars of speech with voice {}", text.len(), voice);

        let response = self
            .http
            .post(self.endpoint(voice)?)
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(RenderError::Service(
                "speech service returned no audio".to_string(),
            ));
        }
        Ok(audio.to_vec())
    }
}
