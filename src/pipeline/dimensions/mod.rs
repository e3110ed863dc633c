//! Regex-based dimension and title-block recognition.
//!
//! Operates on free text: a vision-model completion or raw OCR output.
//! Pure functions, no I/O.

pub mod extractor;
pub mod metadata;
pub mod patterns;
pub mod types;

pub use extractor::{extract_dimensions, DimensionExtractor};
pub use metadata::{extract_metadata, DrawingMetadata, MetadataField};
pub use patterns::{pattern_for, patterns, DimensionPattern};
pub use types::*;
