use std::time::Duration;

use super::ollama_types::{
    is_vision_model, model_is_listed, validate_base_url, validate_model_name,
    OllamaTagsResponse, VisionChatMessage, VisionChatRequest, VisionChatResponse,
    VisionGenerationOptions,
};
use super::{encode_png_base64, map_transport_error, InferenceError, VisionModel, VisionRequest};

/// `keep_alive` value that unloads the model immediately.
const UNLOAD_KEEP_ALIVE: &str = "0";

/// Blocking Ollama client bound to one vision model.
pub struct OllamaVisionClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    keep_alive: String,
}

impl OllamaVisionClient {
    /// Build a client without touching the network.
    ///
    /// The endpoint must be local and the model name well-formed.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;
        validate_model_name(model)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url,
            model: model.to_string(),
            client,
            timeout_secs,
            keep_alive: "30m".to_string(),
        })
    }

    pub fn with_keep_alive(mut self, keep_alive: &str) -> Self {
        self.keep_alive = keep_alive.to_string();
        self
    }

    /// Build, check the model is installed and load it into memory.
    pub fn connect(
        base_url: &str,
        model: &str,
        timeout_secs: u64,
        keep_alive: &str,
    ) -> Result<Self, InferenceError> {
        let client = Self::new(base_url, model, timeout_secs)?.with_keep_alive(keep_alive);

        let available = client.list_models()?;
        if !model_is_listed(&available, model) {
            return Err(InferenceError::ModelNotFound(model.to_string()));
        }
        if !is_vision_model(model) {
            tracing::warn!(model, "Model name does not look vision-capable");
        }

        let start = std::time::Instant::now();
        client.load(&client.keep_alive)?;
        tracing::info!(
            model,
            base_url = %client.base_url,
            elapsed_ms = %start.elapsed().as_millis(),
            "Vision model loaded"
        );
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Model names from `/api/tags`.
    pub fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
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

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    /// Empty chat request: Ollama loads (or unloads) the model and returns.
    fn load(&self, keep_alive: &str) -> Result<(), InferenceError> {
        let body = VisionChatRequest {
            model: self.model.clone(),
            messages: Vec::new(),
            stream: false,
            options: None,
            keep_alive: Some(keep_alive.to_string()),
        };
        self.post_chat(&body).map(|_| ())
    }

    fn post_chat(&self, body: &VisionChatRequest) -> Result<VisionChatResponse, InferenceError> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| map_transport_error(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(InferenceError::ModelNotFound(self.model.clone()));
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))
    }
}

/// Assemble the `/api/chat` body for one request.
pub(crate) fn build_chat_request(
    model: &str,
    request: &VisionRequest<'_>,
    image_base64: String,
    keep_alive: &str,
) -> VisionChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system {
        messages.push(VisionChatMessage::system(system));
    }
    messages.push(VisionChatMessage::user_with_image(request.prompt, image_base64));

    VisionChatRequest {
        model: model.to_string(),
        messages,
        stream: false,
        options: Some(VisionGenerationOptions {
            temperature: request.decoding.temperature,
            top_k: request.decoding.top_k,
            seed: request.decoding.seed,
            num_predict: i32::try_from(request.max_tokens).unwrap_or(i32::MAX),
        }),
        keep_alive: Some(keep_alive.to_string()),
    }
}

impl VisionModel for OllamaVisionClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete(&self, request: &VisionRequest<'_>) -> Result<String, InferenceError> {
        let image_base64 = encode_png_base64(request.image)?;
        let body = build_chat_request(&self.model, request, image_base64, &self.keep_alive);

        let parsed = self.post_chat(&body)?;
        let content = parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| InferenceError::MalformedResponse("response has no message".into()))?;

        tracing::debug!(
            model = %self.model,
            text_len = content.len(),
            done = parsed.done,
            "Ollama chat completion received"
        );
        Ok(content)
    }

    /// Unload the model from Ollama memory.
    fn shutdown(&self) -> Result<(), InferenceError> {
        self.load(UNLOAD_KEEP_ALIVE)?;
        tracing::info!(model = %self.model, "Vision model unloaded");
        Ok(())
    }
}
