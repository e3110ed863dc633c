//! Line-by-line dimension recognition over free text.
//!
//! Every pattern is run against every line; overlapping kinds are all kept.
//! Within a line, records are ordered by match start offset, then by the
//! pattern's position in the library.

use super::patterns::{patterns, DimensionPattern};
use super::types::{ConfidenceBoost, DimensionRecord};

/// Regex-based recognizer with a configurable confidence boost.
#[derive(Debug, Clone, Default)]
pub struct DimensionExtractor {
    boost: ConfidenceBoost,
    /// Lowercased copy of `boost.substrings`.
    boost_needles: Vec<String>,
}

impl DimensionExtractor {
    pub fn new(boost: ConfidenceBoost) -> Self {
        let boost_needles = boost
            .substrings
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
            .collect();
        Self {
            boost,
            boost_needles,
        }
    }

    pub fn boost(&self) -> &ConfidenceBoost {
        &self.boost
    }

    /// Extract every dimension mention from `text`.
    ///
    /// Never fails: text without matches yields an empty vec.
    pub fn extract(&self, text: &str) -> Vec<DimensionRecord> {
        let mut records = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_number = idx + 1;
            let line_text = line.trim();

            // (start offset, pattern index, record)
            let mut found: Vec<(usize, usize, DimensionRecord)> = Vec::new();
            for (pattern_idx, pattern) in patterns().iter().enumerate() {
                for caps in pattern.regex.captures_iter(line) {
                    let Some(whole) = caps.get(0) else { continue };
                    if !pattern.accepts_at(line, whole.start()) {
                        continue;
                    }
                    let record = self.build_record(pattern, &caps, line_number, line_text);
                    found.push((whole.start(), pattern_idx, record));
                }
            }
            found.sort_by_key(|(start, pattern_idx, _)| (*start, *pattern_idx));
            records.extend(found.into_iter().map(|(_, _, record)| record));
        }

        tracing::debug!(
            text_len = text.len(),
            dimensions = records.len(),
            "Dimension extraction complete"
        );
        records
    }

    fn build_record(
        &self,
        pattern: &DimensionPattern,
        caps: &regex::Captures<'_>,
        line_number: usize,
        line_text: &str,
    ) -> DimensionRecord {
        let raw_match = caps.get(0).map(|m| m.as_str()).unwrap_or_default().to_string();
        let captures: Vec<String> = caps
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().to_string())
            .collect();

        let primary_value = if pattern.has_groups() {
            caps.get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| raw_match.clone())
        } else {
            raw_match.clone()
        };
        let tolerance_value = caps.get(2).map(|m| m.as_str().to_string());

        let confidence = self.score(pattern.base_confidence, &raw_match);

        DimensionRecord {
            kind: pattern.kind,
            primary_value,
            tolerance_value,
            raw_match,
            line_number,
            line_text: line_text.to_string(),
            confidence,
            captures,
        }
    }

    fn score(&self, base: f32, raw_match: &str) -> f32 {
        let mut confidence = base;
        if !self.boost_needles.is_empty() {
            let lowered = raw_match.to_lowercase();
            if self.boost_needles.iter().any(|n| lowered.contains(n.as_str())) {
                confidence += self.boost.amount.max(0.0);
            }
        }
        confidence.clamp(0.0, 1.0)
    }
}

/// Extract with the default (boost-free) configuration.
pub fn extract_dimensions(text: &str) -> Vec<DimensionRecord> {
    DimensionExtractor::default().extract(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dimensions::types::DimensionKind;

    fn kinds(records: &[DimensionRecord]) -> Vec<DimensionKind> {
        records.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(extract_dimensions("").is_empty());
        assert!(extract_dimensions("\n\n   \n").is_empty());
        assert!(extract_dimensions("no numbers on this drawing").is_empty());
    }

    #[test]
    fn tolerance_dimension_detected() {
        let records = extract_dimensions("2.490 ±0.002");
        let tol = records
            .iter()
            .find(|r| r.kind == DimensionKind::ToleranceDim)
            .expect("tolerance_dim record");
        assert_eq!(tol.primary_value, "2.490");
        assert_eq!(tol.tolerance_value.as_deref(), Some("0.002"));
        assert!(tol.confidence >= 0.9);
        assert_eq!(tol.line_number, 1);
    }

    #[test]
    fn diameter_detected() {
        let records = extract_dimensions("⌀1.250");
        let dia = records
            .iter()
            .find(|r| r.kind == DimensionKind::DiameterSymbol)
            .expect("diameter record");
        assert_eq!(dia.primary_value, "1.250");
        assert!(dia.confidence >= 0.95);
    }

    #[test]
    fn thread_spec_exposes_all_fields() {
        let records = extract_dimensions("1/4-20 UNC-2A");
        let thread = records
            .iter()
            .find(|r| r.kind == DimensionKind::ThreadSpec)
            .expect("thread record");
        assert_eq!(thread.primary_value, "1/4");
        assert_eq!(thread.tolerance_value.as_deref(), Some("20"));
        assert_eq!(thread.captures, vec!["1/4", "20", "UNC", "2A"]);
        assert!(thread.confidence >= 0.98);
    }

    #[test]
    fn overlapping_kinds_all_reported_in_offset_order() {
        let records = extract_dimensions("*2.490 ±0.002");
        // inspection_feature starts at the asterisk, before the number.
        assert_eq!(
            kinds(&records),
            vec![
                DimensionKind::InspectionFeature,
                DimensionKind::ToleranceDim,
                DimensionKind::DecimalDim,
                DimensionKind::DecimalDim,
            ]
        );
        assert_eq!(records[0].tolerance_value.as_deref(), Some("0.002"));
        assert_eq!(records[2].primary_value, "2.490");
        assert_eq!(records[3].primary_value, "0.002");
    }

    #[test]
    fn same_offset_ties_follow_library_order() {
        let records = extract_dimensions("1.250 ± 0.005");
        assert_eq!(records[0].kind, DimensionKind::ToleranceDim);
        assert_eq!(records[1].kind, DimensionKind::DecimalDim);
        assert_eq!(records[0].raw_match, "1.250 ± 0.005");
    }

    #[test]
    fn line_numbers_are_one_based_and_text_trimmed() {
        let text = "TITLE\n\n   R0.125 TYP   \n";
        let records = extract_dimensions(text);
        let radius = records
            .iter()
            .find(|r| r.kind == DimensionKind::Radius)
            .unwrap();
        assert_eq!(radius.line_number, 3);
        assert_eq!(radius.line_text, "R0.125 TYP");
        assert_eq!(radius.primary_value, "0.125");
    }

    #[test]
    fn optional_group_absent_gives_no_tolerance() {
        let records = extract_dimensions("*1.000 critical");
        let insp = records
            .iter()
            .find(|r| r.kind == DimensionKind::InspectionFeature)
            .unwrap();
        assert_eq!(insp.primary_value, "1.000");
        assert_eq!(insp.tolerance_value, None);
        assert_eq!(insp.captures, vec!["1.000"]);
    }

    #[test]
    fn leading_dot_inch_values_are_recognized() {
        let records = extract_dimensions(".500 ±.005");
        let tol = records
            .iter()
            .find(|r| r.kind == DimensionKind::ToleranceDim)
            .expect("tolerance_dim record");
        assert_eq!(tol.primary_value, ".500");
        assert_eq!(tol.tolerance_value.as_deref(), Some(".005"));

        let records = extract_dimensions("2.490 ±.002");
        assert_eq!(records[0].kind, DimensionKind::ToleranceDim);
        assert_eq!(records[0].tolerance_value.as_deref(), Some(".002"));

        let records = extract_dimensions("⌀.750");
        assert_eq!(kinds(&records), vec![DimensionKind::DiameterSymbol]);
        assert_eq!(records[0].primary_value, ".750");
    }

    #[test]
    fn bold_markdown_is_not_an_inspection_flag() {
        let records = extract_dimensions("- **Bore**: **2.490 ±0.002**");
        assert!(!kinds(&records).contains(&DimensionKind::InspectionFeature));
        assert!(kinds(&records).contains(&DimensionKind::ToleranceDim));

        let records = extract_dimensions("*2.490 ±0.002");
        assert_eq!(records[0].kind, DimensionKind::InspectionFeature);
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "⌀1.250 ±0.001\n1/4-20 UNC-2A\n0.03 x 45° CHAMFER\nR.50\n1 1/4 stock";
        let a = extract_dimensions(text);
        let b = extract_dimensions(text);
        assert_eq!(a, b);
        assert!(a
            .iter()
            .any(|r| r.kind == DimensionKind::Radius && r.primary_value == ".50"));
    }

    #[test]
    fn confidence_always_in_unit_interval() {
        let extractor = DimensionExtractor::new(ConfidenceBoost::new(["2.49", "1.00"], 0.5));
        let records = extractor.extract("*2.490 ±0.002\n1/4-20 UNC-2A 1.000\n⌀1.000");
        assert!(!records.is_empty());
        for r in &records {
            assert!((0.0..=1.0).contains(&r.confidence), "{r:?}");
        }
    }

    #[test]
    fn boost_raises_matching_records_only() {
        let plain = extract_dimensions("2.490 and 3.125");
        let boosted = DimensionExtractor::new(ConfidenceBoost::new(["2.49"], 0.1))
            .extract("2.490 and 3.125");

        assert_eq!(plain.len(), boosted.len());
        let plain_first = plain[0].confidence;
        let boosted_first = boosted[0].confidence;
        assert!((boosted_first - (plain_first + 0.1)).abs() < 1e-6);
        assert!((boosted[1].confidence - plain[1].confidence).abs() < f32::EPSILON);
    }

    #[test]
    fn boost_is_case_insensitive() {
        let extractor = DimensionExtractor::new(ConfidenceBoost::new(["unc"], 0.01));
        let records = extractor.extract("1/4-20 UNC-2A");
        let thread = records
            .iter()
            .find(|r| r.kind == DimensionKind::ThreadSpec)
            .unwrap();
        assert!((thread.confidence - 0.99).abs() < 1e-6);
    }

    #[test]
    fn boost_clamps_at_one() {
        let extractor = DimensionExtractor::new(ConfidenceBoost::new(["1.250"], 1.0));
        let records = extractor.extract("⌀1.250");
        assert!(records.iter().all(|r| r.confidence <= 1.0));
        assert!(records
            .iter()
            .any(|r| (r.confidence - 1.0).abs() < f32::EPSILON));
    }

    #[test]
    fn empty_boost_substrings_are_ignored() {
        let extractor = DimensionExtractor::new(ConfidenceBoost::new([""], 0.2));
        let records = extractor.extract("3.125");
        assert!((records[0].confidence - 0.70).abs() < 1e-6);
    }
}
