use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::dimensions::{DimensionRecord, DimensionSummary, DrawingMetadata};

/// Non-fatal observations attached to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionWarning {
    NoDimensionsFound,
    NoMetadataFound,
}

/// Outcome of analyzing one drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub source_identifier: String,
    pub generated_text: String,
    pub dimensions: Vec<DimensionRecord>,
    pub metadata: DrawingMetadata,
    /// Seconds spent inside the vision model call only.
    pub inference_duration: f64,
    /// (width, height) of the raster sent to the model.
    pub image_dimensions: (u32, u32),
    pub model_used: String,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default)]
    pub warnings: Vec<ExtractionWarning>,
}

/// Flat summary written alongside each report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_dimensions_found: usize,
    pub high_confidence_dims: usize,
    pub inference_time_seconds: f64,
    pub image_dimensions: (u32, u32),
}

impl AnalysisResult {
    pub fn summary(&self) -> DimensionSummary {
        DimensionSummary::from_records(&self.dimensions)
    }

    pub fn performance(&self) -> PerformanceMetrics {
        let summary = self.summary();
        PerformanceMetrics {
            total_dimensions_found: summary.total,
            high_confidence_dims: summary.high_confidence,
            inference_time_seconds: self.inference_duration,
            image_dimensions: self.image_dimensions,
        }
    }
}

/// Warnings implied by what extraction found.
pub fn warnings_for(dimensions: &[DimensionRecord], metadata: &DrawingMetadata) -> Vec<ExtractionWarning> {
    let mut warnings = Vec::new();
    if dimensions.is_empty() {
        warnings.push(ExtractionWarning::NoDimensionsFound);
    }
    if metadata.is_empty() {
        warnings.push(ExtractionWarning::NoMetadataFound);
    }
    warnings
}
