use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use image::GenericImageView;

use super::image_source::ImageSource;
use super::types::{warnings_for, AnalysisResult};
use super::{AnalysisError, CancelToken};
use crate::pipeline::dimensions::{extract_metadata, ConfidenceBoost, DimensionExtractor};
use crate::pipeline::prompt_templates::PromptSelection;
use crate::pipeline::vision::{
    DecodingOptions, InferenceError, TurnMarkerFormat, VisionModel, VisionRequest,
};

/// Runs one drawing through load → inference → cleanup → extraction.
///
/// Collaborators are injected as trait objects so the same analyzer can be
/// shared across batch workers.
pub struct DrawingAnalyzer {
    images: Arc<dyn ImageSource>,
    model: Arc<dyn VisionModel>,
    extractor: DimensionExtractor,
    turn_markers: TurnMarkerFormat,
    decoding: DecodingOptions,
    cancel: CancelToken,
}

impl DrawingAnalyzer {
    pub fn new(images: Arc<dyn ImageSource>, model: Arc<dyn VisionModel>) -> Self {
        Self {
            images,
            model,
            extractor: DimensionExtractor::default(),
            turn_markers: TurnMarkerFormat::default(),
            decoding: DecodingOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_boost(mut self, boost: ConfidenceBoost) -> Self {
        self.extractor = DimensionExtractor::new(boost);
        self
    }

    pub fn with_turn_markers(mut self, format: TurnMarkerFormat) -> Self {
        self.turn_markers = format;
        self
    }

    pub fn with_decoding(mut self, decoding: DecodingOptions) -> Self {
        self.decoding = decoding;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Analyze one drawing.
    ///
    /// A load failure returns before the model is touched.
    pub fn analyze(
        &self,
        path: &Path,
        selection: &PromptSelection,
    ) -> Result<AnalysisResult, AnalysisError> {
        let source = path.display().to_string();

        let image = self.images.load(path)?;
        let image_dimensions = image.dimensions();

        let prompt = selection.resolve();

        if self.cancel.is_cancelled() {
            return Err(InferenceError::Cancelled.into());
        }

        let request = VisionRequest {
            system: prompt.system,
            prompt: &prompt.user,
            image: &image,
            max_tokens: prompt.max_tokens,
            decoding: self.decoding,
        };

        let (raw, inference_duration) = {
            let _span = tracing::info_span!(
                "vision_inference",
                source = %source,
                model = %self.model.model_name(),
                max_tokens = prompt.max_tokens,
            )
            .entered();
            let start = Instant::now();
            let raw = self.model.complete(&request)?;
            let elapsed = start.elapsed();
            tracing::info!(
                elapsed_ms = %elapsed.as_millis(),
                text_len = raw.len(),
                "Vision inference complete"
            );
            (raw, elapsed.as_secs_f64())
        };

        let generated_text = self.turn_markers.clean(&raw);
        Ok(self.build_result(source, generated_text, inference_duration, image_dimensions))
    }

    /// Run extraction over text that is already available (OCR output or a
    /// stored completion). No inference happens, so the duration is zero.
    pub fn analyze_text(&self, source: &str, text: &str) -> AnalysisResult {
        self.build_result(source.to_string(), text.to_string(), 0.0, (0, 0))
    }

    fn build_result(
        &self,
        source_identifier: String,
        generated_text: String,
        inference_duration: f64,
        image_dimensions: (u32, u32),
    ) -> AnalysisResult {
        let dimensions = self.extractor.extract(&generated_text);
        let metadata = extract_metadata(&generated_text);
        let warnings = warnings_for(&dimensions, &metadata);

        tracing::info!(
            source = %source_identifier,
            dimensions = dimensions.len(),
            metadata_fields = metadata.len(),
            warnings = warnings.len(),
            "Drawing analysis complete"
        );

        AnalysisResult {
            source_identifier,
            generated_text,
            dimensions,
            metadata,
            inference_duration,
            image_dimensions,
            model_used: self.model.model_name().to_string(),
            analyzed_at: Utc::now(),
            warnings,
        }
    }
}
