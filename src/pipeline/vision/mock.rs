use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::GenericImageView;

use super::{InferenceError, VisionModel, VisionRequest};

/// Deterministic vision model for tests.
///
/// Returns a fixed completion (or a fixed error), counts calls and records
/// the last request it saw.
pub struct MockVisionModel {
    response: String,
    model_name: String,
    failure: Option<InferenceError>,
    calls: AtomicUsize,
    last_call: Mutex<Option<RecordedCall>>,
}

/// What the mock saw on its most recent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub image_dimensions: (u32, u32),
}

impl MockVisionModel {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            model_name: "mock-vision".to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
            last_call: Mutex::new(None),
        }
    }

    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model_name = name.to_string();
        self
    }

    /// Every call fails with `error`.
    pub fn failing(error: InferenceError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new("")
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.last_call.lock().ok().and_then(|guard| guard.clone())
    }
}

impl VisionModel for MockVisionModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn complete(&self, request: &VisionRequest<'_>) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_call.lock() {
            *guard = Some(RecordedCall {
                system: request.system.map(str::to_string),
                prompt: request.prompt.to_string(),
                max_tokens: request.max_tokens,
                image_dimensions: request.image.dimensions(),
            });
        }

        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.response.clone()),
        }
    }
}
