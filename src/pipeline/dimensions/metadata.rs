//! Title-block metadata extraction.
//!
//! Fixed rule set applied to the whole text. First match per field wins;
//! fields whose rule never matches are absent from the result.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Header fields recognized on a drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    PartNumber,
    Material,
    Scale,
    Weight,
    Revision,
}

impl MetadataField {
    pub const ALL: [MetadataField; 5] = [
        Self::PartNumber,
        Self::Material,
        Self::Scale,
        Self::Weight,
        Self::Revision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PartNumber => "part_number",
            Self::Material => "material",
            Self::Scale => "scale",
            Self::Weight => "weight",
            Self::Revision => "revision",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extracted header values, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawingMetadata {
    fields: BTreeMap<MetadataField, String>,
}

impl DrawingMetadata {
    pub fn get(&self, field: MetadataField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn insert(&mut self, field: MetadataField, value: String) {
        self.fields.insert(field, value);
    }
}

// Label/value separator: blanks, colon, asterisk, hash or dash. Never a newline.
// Material needs an explicit separator unless the value starts with a digit,
// so prose like "material specifications" is not read as a value.
static METADATA_RULES: LazyLock<Vec<(MetadataField, Regex)>> = LazyLock::new(|| {
    let rule = |field, pattern: &str| (field, Regex::new(pattern).expect("valid regex"));
    vec![
        rule(
            MetadataField::PartNumber,
            r"(?i)\b(?:part|drawing|dwg)(?:[ \t]*(?:no\.?|number|#))?[ \t:*#\-]*([A-Z0-9.\-]*\d[A-Z0-9.\-]*)",
        ),
        rule(
            MetadataField::Material,
            r"(?i)\b(?:material|mat'l)(?:[ \t*]*[:=#\-][ \t:*#\-]*([A-Z0-9][A-Z0-9 \t./\-]*)|[ \t*]+(\d[A-Z0-9 \t./\-]*))",
        ),
        rule(MetadataField::Scale, r"(?i)\bscale[ \t:*#\-]*(\d[\d.:/]*)"),
        rule(
            MetadataField::Weight,
            r"(?i)\bweight[ \t:*#\-]*(\d[\d.]*[ \t]*[A-Z]+)",
        ),
        rule(
            MetadataField::Revision,
            r"(?i)\b(?:revision|rev)\b\.?[ \t:*#\-]*([A-Z0-9]{1,4})\b",
        ),
    ]
});

/// Pull drawing header fields out of free text.
pub fn extract_metadata(text: &str) -> DrawingMetadata {
    let mut metadata = DrawingMetadata::default();

    for (field, regex) in METADATA_RULES.iter() {
        let value = regex
            .captures(text)
            .and_then(|caps| caps.iter().skip(1).flatten().next())
            .map(|m| m.as_str().trim())
            .filter(|v| !v.is_empty());
        if let Some(value) = value {
            metadata.insert(*field, value.to_string());
        }
    }

    tracing::debug!(fields = metadata.len(), "Metadata extraction complete");
    metadata
}
