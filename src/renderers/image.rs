use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

use super::{ImageSynthesizer, service_error};
use crate::config::ImageConfig;
use crate::error::RenderError;
use crate::log_debug;

pub const REPLICATE_BASE_URL: &str = "https://api.replicate.com";

/// stability-ai/stable-diffusion
pub const DEFAULT_IMAGE_MODEL_VERSION: &str =
    "db21e45d3f7023abc2a46ee38a23973f6dce16bb082a930b0c49861f96d1e5bf";

const POLL_INTERVAL: Duration = Duration::from_millis(1000);
const MAX_POLLS: usize = 180;

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    /// Output URLs in the order the model produced them
    fn output_urls(&self) -> Vec<String> {
        match &self.output {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect(),
            Some(Value::String(url)) => vec![url.clone()],
            _ => Vec::new(),
        }
    }
}

/// Replicate prediction client
#[derive(Debug, Clone)]
pub struct ReplicateImageClient {
    http: reqwest::Client,
    base_url: Url,
    api_token: String,
    model_version: String,
    max_prompt_chars: usize,
    poll_interval: Duration,
    max_polls: usize,
}

impl ReplicateImageClient {
    pub fn new(
        base_url: &str,
        api_token: impl Into<String>,
        model_version: impl Into<String>,
    ) -> Result<Self, RenderError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RenderError::Service(format!("invalid image endpoint: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_token: api_token.into(),
            model_version: model_version.into(),
            max_prompt_chars: ImageConfig::default().max_prompt_chars,
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
        })
    }

    /// Poll every `interval`, giving up after `max_polls` status checks
    #[must_use]
    pub fn with_polling(mut self, interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    #[must_use]
    pub fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    pub fn from_config(config: &ImageConfig) -> Result<Self, RenderError> {
        if config.api_token.is_empty() {
            return Err(RenderError::Service(format!(
                "No API token found for image synthesis. Please set {}.",
                crate::config::REPLICATE_API_TOKEN_ENV
            )));
        }
        Ok(
            Self::new(&config.base_url, &config.api_token, &config.model_version)?
                .with_max_prompt_chars(config.max_prompt_chars),
        )
    }

    fn url(&self, path: &str) -> Result<Url, RenderError> {
        self.base_url
            .join(path)
            .map_err(|e| RenderError::Service(format!("invalid image endpoint: {e}")))
    }

    async fn read_prediction(response: reqwest::Response) -> Result<Prediction, RenderError> {
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(response.json::<Prediction>().await?)
    }

    async fn create_prediction(&self, prompt: &str) -> Result<Prediction, RenderError> {
        let response = self
            .http
            .post(self.url("/v1/predictions")?)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&json!({
                "version": self.model_version,
                "input": { "prompt": prompt },
            }))
            .send()
            .await?;
        Self::read_prediction(response).await
    }

    async fn wait_for(&self, mut prediction: Prediction) -> Result<Prediction, RenderError> {
        let mut polls = 0;
        while !prediction.is_terminal() {
            if polls == self.max_polls {
                return Err(RenderError::Service(format!(
                    "image prediction {} still {} after {polls} status checks",
                    prediction.id, prediction.status
                )));
            }
            polls += 1;
            log_debug!("Prediction {} is {}, polling", prediction.id, prediction.status);
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .http
                .get(self.url(&format!("/v1/predictions/{}", prediction.id))?)
                .bearer_auth(&self.api_token)
                .send()
                .await?;
            prediction = Self::read_prediction(response).await?;
        }
        Ok(prediction)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, RenderError> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary
pub fn truncate_prompt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[async_trait]
impl ImageSynthesizer for ReplicateImageClient {
    async fn synthesize(&self, prompt: &str) -> Result<Vec<Vec<u8>>, RenderError> {
        let prompt = truncate_prompt(prompt, self.max_prompt_chars);
        let prediction = self.create_prediction(prompt).await?;
        let prediction = self.wait_for(prediction).await?;

        if prediction.status != "succeeded" {
            let reason = prediction
                .error
                .as_ref()
                .map_or_else(|| prediction.status.clone(), ToString::to_string);
            return Err(RenderError::Service(format!(
                "image prediction {} did not succeed: {reason}",
                prediction.id
            )));
        }

        let urls = prediction.output_urls();
        log_debug!("Prediction {} produced {} images", prediction.id, urls.len());
        try_join_all(urls.iter().map(|url| self.download(url))).await
    }
}
