//! OpenAI-compatible chat completions backend.
//!
//! Images travel inline as `data:image/png;base64,...` URLs inside a
//! multi-part user message.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{encode_png_base64, map_transport_error, InferenceError, VisionModel, VisionRequest};

pub struct OpenAiVisionClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiVisionClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, InferenceError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(InferenceError::InvalidEndpoint(format!(
                "{base_url} is not an http(s) URL"
            )));
        }
        if model.trim().is_empty() {
            return Err(InferenceError::InvalidModelName(model.to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url,
            model: model.to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }

    /// Read the API key from `api_key_env`.
    pub fn from_env(
        base_url: &str,
        model: &str,
        api_key_env: &str,
        timeout_secs: u64,
    ) -> Result<Self, InferenceError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| InferenceError::MissingApiKey(api_key_env.to_string()))?;
        Self::new(base_url, model, &api_key, timeout_secs)
    }
}

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub seed: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub(crate) fn build_completion_request(
    model: &str,
    request: &VisionRequest<'_>,
    image_base64: &str,
) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system {
        messages.push(ChatMessage {
            role: "system",
            content: MessageContent::Text(system.to_string()),
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: MessageContent::Parts(vec![
            ContentPart::Text {
                text: request.prompt.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/png;base64,{image_base64}"),
                },
            },
        ]),
    });

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.decoding.temperature,
        seed: request.decoding.seed,
    }
}

impl VisionModel for OpenAiVisionClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete(&self, request: &VisionRequest<'_>) -> Result<String, InferenceError> {
        let image_base64 = encode_png_base64(request.image)?;
        let body = build_completion_request(&self.model, request, &image_base64);

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| map_transport_error(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| InferenceError::MalformedResponse("no choices in response".into()))?;

        tracing::debug!(model = %self.model, text_len = content.len(), "Chat completion received");
        Ok(content)
    }
}
