//! Artifact renderers.
//!
//! Each renderer turns the finalized case text into one auxiliary artifact
//! and fails independently of the others:
//! - `speech` - narrated audio through a text-to-speech API
//! - `image` - illustrations through an image synthesis API
//! - `document` - a paginated PDF rendered locally

use async_trait::async_trait;

use crate::error::RenderError;
use crate::voice::Voice;

pub mod document;
pub mod image;
pub mod speech;

pub use document::PdfRenderer;
pub use image::ReplicateImageClient;
pub use speech::ElevenLabsClient;

/// Produces a narrated audio payload (MP3) for the case text
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, RenderError>;
}

/// Produces zero or more images from a text prompt, in service order
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Result<Vec<Vec<u8>>, RenderError>;
}

/// Lays the case text out as a downloadable document
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, title: &str, text: &str) -> Result<Vec<u8>, RenderError>;
}

/// Read a failed response body into a service error
pub(crate) async fn service_error(response: reqwest::Response) -> RenderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = body.trim();
    if detail.is_empty() {
        RenderError::Service(status.to_string())
    } else {
        RenderError::Service(format!("{status}: {detail}"))
    }
}
