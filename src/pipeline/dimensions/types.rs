use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Records strictly above this confidence count as high-confidence.
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.8;

/// Domain category a dimension pattern recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    /// Nominal value with a ± tolerance.
    ToleranceDim,
    /// Value preceded by a diameter glyph.
    DiameterSymbol,
    Radius,
    /// Size, thread count, series and class (e.g. `1/4-20 UNC-2A`).
    ThreadSpec,
    Chamfer,
    /// Bare decimal with 2–3 fractional digits.
    DecimalDim,
    /// Whole number followed by a fraction (`1 1/4`).
    FractionalDim,
    /// Asterisk-flagged dimension subject to mandatory inspection.
    InspectionFeature,
}

impl DimensionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToleranceDim => "tolerance_dim",
            Self::DiameterSymbol => "diameter_symbol",
            Self::Radius => "radius",
            Self::ThreadSpec => "thread_spec",
            Self::Chamfer => "chamfer",
            Self::DecimalDim => "decimal_dim",
            Self::FractionalDim => "fractional_dim",
            Self::InspectionFeature => "inspection_feature",
        }
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One regex match, typed and scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRecord {
    pub kind: DimensionKind,
    /// First capture group, or the whole match for group-less patterns.
    pub primary_value: String,
    /// Second capture group when it participated in the match.
    pub tolerance_value: Option<String>,
    pub raw_match: String,
    /// 1-based.
    pub line_number: usize,
    pub line_text: String,
    /// Always within [0, 1].
    pub confidence: f32,
    /// Every participating capture group, in pattern order.
    #[serde(default)]
    pub captures: Vec<String>,
}

impl DimensionRecord {
    pub fn is_high_confidence(&self) -> bool {
        self.confidence > HIGH_CONFIDENCE_THRESHOLD
    }
}

/// Substring allow-list that raises confidence for characteristic values.
///
/// Matching is case-insensitive against the raw match text. An empty list
/// disables boosting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceBoost {
    pub substrings: Vec<String>,
    pub amount: f32,
}

impl Default for ConfidenceBoost {
    fn default() -> Self {
        Self {
            substrings: Vec::new(),
            amount: 0.1,
        }
    }
}

impl ConfidenceBoost {
    pub fn new(substrings: impl IntoIterator<Item = impl Into<String>>, amount: f32) -> Self {
        Self {
            substrings: substrings.into_iter().map(Into::into).collect(),
            amount,
        }
    }
}

/// Aggregate counts over an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionSummary {
    pub total: usize,
    pub high_confidence: usize,
    pub by_kind: BTreeMap<DimensionKind, usize>,
}

impl DimensionSummary {
    pub fn from_records(records: &[DimensionRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            *summary.by_kind.entry(record.kind).or_insert(0) += 1;
            if record.is_high_confidence() {
                summary.high_confidence += 1;
            }
        }
        summary
    }
}

/// Keep only records at or above `min_confidence`, preserving order.
pub fn filter_min_confidence(records: &[DimensionRecord], min_confidence: f32) -> Vec<DimensionRecord> {
    records
        .iter()
        .filter(|r| r.confidence >= min_confidence)
        .cloned()
        .collect()
}
