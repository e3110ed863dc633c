//! Dimension and title-block extraction from mechanical drawings.
//!
//! A vision-language model reads the drawing; regex rules turn its answer
//! into typed, confidence-scored dimension records and header metadata.

pub mod config;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use pipeline::analysis::{AnalysisError, AnalysisResult, DrawingAnalyzer, LoadError};
pub use pipeline::dimensions::{
    extract_dimensions, extract_metadata, DimensionKind, DimensionRecord, DrawingMetadata,
};
pub use pipeline::prompt_templates::{build_prompt, PromptSelection, PromptTemplate};
pub use pipeline::vision::{InferenceError, VisionModel};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config::default_log_filter()`.
/// Logs go to stderr so stdout stays clean for JSON output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
