//! Vision-language backends.
//!
//! `VisionModel` is the seam between the analysis orchestrator and whatever
//! answers `(prompt, image) -> text`. Implementations:
//! - `OllamaVisionClient`: local Ollama `/api/chat` with base64 images
//! - `OpenAiVisionClient`: OpenAI-compatible `/chat/completions` with data URLs
//! - `MockVisionModel`: deterministic, call-counting fake for tests

pub mod mock;
pub mod ollama;
pub mod ollama_types;
pub mod openai;
pub mod turn_markers;

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use image::{DynamicImage, ImageOutputFormat};
use serde::Serialize;
use thiserror::Error;

use crate::config::{AnalyzerConfig, BackendKind};

pub use mock::MockVisionModel;
pub use ollama::OllamaVisionClient;
pub use openai::OpenAiVisionClient;
pub use turn_markers::TurnMarkerFormat;

/// Maximum base64 payload accepted for one image (20 MB).
pub const MAX_IMAGE_BASE64_BYTES: usize = 20 * 1024 * 1024;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("Vision backend is not reachable at {0}")]
    NotReachable(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Vision backend returned an error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model '{0}' is not installed")]
    ModelNotFound(String),

    #[error("Invalid model name: '{0}'")]
    InvalidModelName(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Image encoding failed: {0}")]
    ImageEncoding(String),

    #[error("Image too large ({0} bytes base64), maximum is 20 MB")]
    ImageTooLarge(usize),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Inference cancelled")]
    Cancelled,
}

// ──────────────────────────────────────────────
// Request
// ──────────────────────────────────────────────

/// Sampling parameters. Defaults are near-greedy so the same image and
/// prompt give the same completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecodingOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub seed: u64,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_k: 1,
            seed: 42,
        }
    }
}

/// One `(prompt, image)` inference call.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub system: Option<&'a str>,
    pub prompt: &'a str,
    pub image: &'a DynamicImage,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    pub decoding: DecodingOptions,
}

/// A vision-language model that turns an image plus prompt into text.
pub trait VisionModel: Send + Sync {
    fn model_name(&self) -> &str;

    fn complete(&self, request: &VisionRequest<'_>) -> Result<String, InferenceError>;

    /// Release backend resources (e.g. unload the model). No-op by default.
    fn shutdown(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// PNG-encode an image and base64 it for transport.
pub fn encode_png_base64(image: &DynamicImage) -> Result<String, InferenceError> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| InferenceError::ImageEncoding(e.to_string()))?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(cursor.into_inner());
    if encoded.len() > MAX_IMAGE_BASE64_BYTES {
        return Err(InferenceError::ImageTooLarge(encoded.len()));
    }
    Ok(encoded)
}

/// Map a reqwest transport error onto the inference taxonomy.
pub(crate) fn map_transport_error(
    err: reqwest::Error,
    base_url: &str,
    timeout_secs: u64,
) -> InferenceError {
    if err.is_timeout() {
        InferenceError::Timeout(timeout_secs)
    } else if err.is_connect() {
        InferenceError::NotReachable(base_url.to_string())
    } else {
        InferenceError::HttpClient(err.to_string())
    }
}

/// Build the configured backend.
///
/// For Ollama this is the explicit init step: endpoint validation, installed
/// model check and warm-up all happen here.
pub fn connect_from_config(config: &AnalyzerConfig) -> Result<Arc<dyn VisionModel>, InferenceError> {
    let base_url = config.effective_base_url();
    let model = config.effective_model();

    match config.backend {
        BackendKind::Ollama => {
            let client = OllamaVisionClient::connect(
                &base_url,
                &model,
                config.timeout_secs,
                &config.keep_alive,
            )?;
            Ok(Arc::new(client))
        }
        BackendKind::OpenAi => {
            let client = OpenAiVisionClient::from_env(
                &base_url,
                &model,
                &config.api_key_env,
                config.timeout_secs,
            )?;
            Ok(Arc::new(client))
        }
    }
}
