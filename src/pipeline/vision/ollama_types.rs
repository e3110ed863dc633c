//! Ollama HTTP API types and endpoint/model validators.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::InferenceError;

// ──────────────────────────────────────────────
// Request types
// ──────────────────────────────────────────────

/// Chat-based vision request for `/api/chat`.
///
/// LLaVA-family models expect the messages format; images ride on the user
/// message as base64 strings.
#[derive(Debug, Clone, Serialize)]
pub struct VisionChatRequest {
    pub model: String,
    pub messages: Vec<VisionChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<VisionGenerationOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

/// A single message in a vision chat request.
#[derive(Debug, Clone, Serialize)]
pub struct VisionChatMessage {
    pub role: String,
    pub content: String,
    /// Base64-encoded images (only for user messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl VisionChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
            images: None,
        }
    }

    pub fn user_with_image(content: &str, image_base64: String) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
            images: Some(vec![image_base64]),
        }
    }
}

/// Generation options for deterministic dimension extraction.
#[derive(Debug, Clone, Serialize)]
pub struct VisionGenerationOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub seed: u64,
    /// Maximum tokens to generate.
    pub num_predict: i32,
}

// ──────────────────────────────────────────────
// Response types
// ──────────────────────────────────────────────

/// Non-streaming response from `/api/chat`.
#[derive(Debug, Deserialize)]
pub(crate) struct VisionChatResponse {
    #[serde(default)]
    pub message: Option<ChatResponseMessage>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseMessage {
    #[serde(default)]
    pub content: String,
}

/// Raw response from GET `/api/tags`.
#[derive(Debug, Deserialize)]
pub(crate) struct OllamaTagsResponse {
    #[serde(default)]
    pub models: Vec<OllamaTagModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaTagModel {
    pub name: String,
}

// ──────────────────────────────────────────────
// Model names
// ──────────────────────────────────────────────

/// Known vision-capable model name prefixes.
pub const VISION_MODEL_PREFIXES: &[&str] = &[
    "llava",
    "bakllava",
    "moondream",
    "minicpm-v",
    "llama3.2-vision",
    "qwen2.5vl",
    "gemma3",
];

/// Name-prefix heuristic. No network call.
pub fn is_vision_model(model_name: &str) -> bool {
    let component = extract_model_component(model_name);
    VISION_MODEL_PREFIXES
        .iter()
        .any(|prefix| component.starts_with(prefix))
}

/// Strip namespace and tag: `"someone/llava-phi3:latest"` → `"llava-phi3"`.
pub fn extract_model_component(full_name: &str) -> String {
    let without_tag = full_name.split(':').next().unwrap_or(full_name);
    let model_part = without_tag.rsplit('/').next().unwrap_or(without_tag);
    model_part.to_lowercase()
}

/// Whether `model` appears in an `/api/tags` listing.
///
/// An untagged name matches any tag of that model (`llava` matches
/// `llava:7b` and `llava:latest`).
pub fn model_is_listed(available: &[String], model: &str) -> bool {
    available.iter().any(|name| {
        if name == model {
            return true;
        }
        if model.contains(':') {
            return false;
        }
        name.strip_prefix(model)
            .is_some_and(|rest| rest.starts_with(':'))
    })
}

// ──────────────────────────────────────────────
// Validators
// ──────────────────────────────────────────────

/// Validate that a base URL points to localhost only.
///
/// Accepts: localhost, 127.0.0.1, [::1]. Rejects any other host and
/// malformed URLs.
pub fn validate_base_url(url: &str) -> Result<(), InferenceError> {
    let after_scheme = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| InferenceError::InvalidEndpoint(format!("{url} is not an http(s) URL")))?;

    let host = if after_scheme.starts_with('[') {
        after_scheme
            .split(']')
            .next()
            .unwrap_or("")
            .trim_start_matches('[')
    } else {
        after_scheme
            .split(':')
            .next()
            .unwrap_or("")
            .split('/')
            .next()
            .unwrap_or("")
    };

    match host {
        "localhost" | "127.0.0.1" | "::1" => Ok(()),
        _ => Err(InferenceError::InvalidEndpoint(format!(
            "{url}: only localhost connections are allowed"
        ))),
    }
}

static MODEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*(/[a-zA-Z0-9][a-zA-Z0-9._-]*)?(:[a-zA-Z0-9._-]+)?$")
        .expect("static regex")
});

/// Validate a model name against the Ollama `[namespace/]model[:tag]` form.
pub fn validate_model_name(name: &str) -> Result<(), InferenceError> {
    if MODEL_NAME.is_match(name) {
        Ok(())
    } else {
        Err(InferenceError::InvalidModelName(name.to_string()))
    }
}
