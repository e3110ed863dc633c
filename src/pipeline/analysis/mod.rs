//! Drawing analysis: load an image, ask a vision model about it, and run
//! the regex extractors over the answer.

pub mod format;
pub mod image_source;
pub mod orchestrator;
pub mod pdfium;
pub mod types;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::pipeline::vision::InferenceError;

pub use format::{detect_format, DrawingFormat};
pub use image_source::{FileImageSource, ImageSource};
pub use orchestrator::DrawingAnalyzer;
pub use pdfium::{MockPdfRasterizer, PdfRasterizer, PdfiumRasterizer};
pub use types::{AnalysisResult, ExtractionWarning, PerformanceMetrics};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Image not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("File too large: {path} ({size} bytes)")]
    TooLarge { path: PathBuf, size: u64 },

    #[error("Cannot decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("PDF rendering failed for {path}: {reason}")]
    PdfRendering { path: PathBuf, reason: String },
}

impl LoadError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::UnsupportedFormat { path }
            | Self::TooLarge { path, .. }
            | Self::Decode { path, .. }
            | Self::PdfRendering { path, .. } => path,
        }
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Shared stop flag. Once set, no new inference is started.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
