//! Dimension pattern library.
//!
//! Ordered table of `(kind, regex, base_confidence)`. The order is part of the
//! contract: when two patterns match at the same offset of a line, the one
//! listed first is reported first.
//!
//! Base confidence tracks pattern specificity. Patterns with more required
//! literal tokens (thread series, diameter glyph, ±) produce fewer false
//! positives than a bare decimal, so they start higher.

use std::sync::LazyLock;

use regex::Regex;

use super::types::DimensionKind;

/// A compiled dimension rule.
#[derive(Debug)]
pub struct DimensionPattern {
    pub kind: DimensionKind,
    pub regex: Regex,
    pub base_confidence: f32,
}

impl DimensionPattern {
    fn new(kind: DimensionKind, pattern: &str, base_confidence: f32) -> Self {
        Self {
            kind,
            regex: Regex::new(pattern).expect("static dimension pattern"),
            base_confidence,
        }
    }

    /// Whether the rule defines at least one capture group.
    pub fn has_groups(&self) -> bool {
        self.regex.captures_len() > 1
    }

    /// Whether a match starting at byte `start` of `line` stands on its own.
    ///
    /// An inspection asterisk that is part of a `**` run is markdown
    /// emphasis, not a flag. `regex` has no lookbehind, so the preceding
    /// character is checked here.
    pub fn accepts_at(&self, line: &str, start: usize) -> bool {
        match self.kind {
            DimensionKind::InspectionFeature => !line[..start].ends_with('*'),
            _ => true,
        }
    }
}

/// A measured value: `2.490`, `12`, or the leading-dot inch form `.500`.
const VALUE: &str = r"(\d+(?:\.\d*)?|\.\d+)";

static PATTERNS: LazyLock<Vec<DimensionPattern>> = LazyLock::new(|| {
    vec![
        // 2.490 ±0.002, 2.490 +/- .002
        DimensionPattern::new(
            DimensionKind::ToleranceDim,
            &format!(r"(?i){VALUE}\s*(?:±|\+/-)\s*{VALUE}"),
            0.90,
        ),
        // ⌀1.250, Ø 12, ∅0.75
        DimensionPattern::new(
            DimensionKind::DiameterSymbol,
            &format!(r"(?i)[⌀Ø∅]\s*{VALUE}"),
            0.95,
        ),
        // R0.125, R 5, R.50
        DimensionPattern::new(DimensionKind::Radius, &format!(r"(?i)R\s*{VALUE}"), 0.85),
        // 1/4-20 UNC-2A, 0.375-24 UNF-3B
        DimensionPattern::new(
            DimensionKind::ThreadSpec,
            r"(?i)(\d+(?:\.\d+)?(?:\s*/\s*\d+)?)\s*[-‑]\s*(\d+)\s*(UNC|UNF|UNEF)\s*[-‑]\s*(\d[AB])",
            0.98,
        ),
        // 0.03 x 45° CHAMFER
        DimensionPattern::new(
            DimensionKind::Chamfer,
            &format!(r"(?i){VALUE}\s*[x×]\s*(\d+\.?\d*)°?\s*chamfer"),
            0.85,
        ),
        DimensionPattern::new(DimensionKind::DecimalDim, r"(?i)\b(\d+\.\d{2,3})\b", 0.70),
        // 1 1/4
        DimensionPattern::new(
            DimensionKind::FractionalDim,
            r"(?i)\b(\d+)\s+(\d+/\d+)\b",
            0.60,
        ),
        // *2.490 ±0.002, *.375
        DimensionPattern::new(
            DimensionKind::InspectionFeature,
            &format!(r"(?i)\*\s*{VALUE}(?:\s*(?:±|\+/-)\s*{VALUE})?"),
            0.95,
        ),
    ]
});

/// The full library, in iteration order.
pub fn patterns() -> &'static [DimensionPattern] {
    &PATTERNS
}

/// Look up the rule for a kind.
pub fn pattern_for(kind: DimensionKind) -> Option<&'static DimensionPattern> {
    patterns().iter().find(|p| p.kind == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures(kind: DimensionKind, text: &str) -> Option<Vec<Option<String>>> {
        let pattern = pattern_for(kind).unwrap();
        pattern.regex.captures(text).map(|caps| {
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect()
        })
    }

    #[test]
    fn library_order_is_fixed() {
        let kinds: Vec<DimensionKind> = patterns().iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DimensionKind::ToleranceDim,
                DimensionKind::DiameterSymbol,
                DimensionKind::Radius,
                DimensionKind::ThreadSpec,
                DimensionKind::Chamfer,
                DimensionKind::DecimalDim,
                DimensionKind::FractionalDim,
                DimensionKind::InspectionFeature,
            ]
        );
    }

    #[test]
    fn base_confidences_within_unit_interval() {
        for p in patterns() {
            assert!((0.0..=1.0).contains(&p.base_confidence), "{:?}", p.kind);
            assert!(p.has_groups(), "{:?} should capture", p.kind);
        }
    }

    #[test]
    fn thread_spec_is_most_specific_and_fractional_least() {
        let thread = pattern_for(DimensionKind::ThreadSpec).unwrap().base_confidence;
        let fractional = pattern_for(DimensionKind::FractionalDim).unwrap().base_confidence;
        for p in patterns() {
            assert!(p.base_confidence <= thread);
            assert!(p.base_confidence >= fractional);
        }
    }

    #[test]
    fn tolerance_captures_value_and_tolerance() {
        let caps = captures(DimensionKind::ToleranceDim, "OD 2.490 ±0.002").unwrap();
        assert_eq!(caps[0].as_deref(), Some("2.490"));
        assert_eq!(caps[1].as_deref(), Some("0.002"));
    }

    #[test]
    fn tolerance_accepts_ascii_plus_minus() {
        let caps = captures(DimensionKind::ToleranceDim, "1.000 +/- 0.005").unwrap();
        assert_eq!(caps[1].as_deref(), Some("0.005"));
    }

    #[test]
    fn diameter_accepts_all_glyphs() {
        for text in ["⌀1.250", "Ø1.250", "∅ 1.250", "ø1.250"] {
            let caps = captures(DimensionKind::DiameterSymbol, text)
                .unwrap_or_else(|| panic!("no match for {text}"));
            assert_eq!(caps[0].as_deref(), Some("1.250"));
        }
    }

    #[test]
    fn radius_is_case_insensitive() {
        let caps = captures(DimensionKind::Radius, "r0.125 typ").unwrap();
        assert_eq!(caps[0].as_deref(), Some("0.125"));
    }

    #[test]
    fn thread_spec_fractional_size() {
        let caps = captures(DimensionKind::ThreadSpec, "1/4-20 UNC-2A").unwrap();
        assert_eq!(
            caps,
            vec![
                Some("1/4".to_string()),
                Some("20".to_string()),
                Some("UNC".to_string()),
                Some("2A".to_string()),
            ]
        );
    }

    #[test]
    fn thread_spec_decimal_size_and_unef() {
        let caps = captures(DimensionKind::ThreadSpec, "0.750-20 unef-3b").unwrap();
        assert_eq!(caps[0].as_deref(), Some("0.750"));
        assert_eq!(caps[2].as_deref(), Some("unef"));
        assert_eq!(caps[3].as_deref(), Some("3b"));
    }

    #[test]
    fn thread_spec_accepts_non_breaking_hyphen() {
        assert!(captures(DimensionKind::ThreadSpec, "3/8‑24 UNF‑2B").is_some());
    }

    #[test]
    fn chamfer_with_degree_symbol() {
        let caps = captures(DimensionKind::Chamfer, "0.03 X 45° Chamfer").unwrap();
        assert_eq!(caps[0].as_deref(), Some("0.03"));
        assert_eq!(caps[1].as_deref(), Some("45"));
    }

    #[test]
    fn chamfer_requires_keyword() {
        assert!(captures(DimensionKind::Chamfer, "0.03 x 45°").is_none());
    }

    #[test]
    fn decimal_needs_two_or_three_places() {
        assert!(captures(DimensionKind::DecimalDim, "2.5").is_none());
        assert!(captures(DimensionKind::DecimalDim, "2.5000").is_none());
        let caps = captures(DimensionKind::DecimalDim, "length 2.50 in").unwrap();
        assert_eq!(caps[0].as_deref(), Some("2.50"));
    }

    #[test]
    fn fractional_needs_whole_part() {
        let caps = captures(DimensionKind::FractionalDim, "stock 1 1/4 bar").unwrap();
        assert_eq!(caps[0].as_deref(), Some("1"));
        assert_eq!(caps[1].as_deref(), Some("1/4"));
        assert!(captures(DimensionKind::FractionalDim, "1/4-20 UNC-2A").is_none());
    }

    #[test]
    fn leading_dot_values_are_captured() {
        let caps = captures(DimensionKind::ToleranceDim, ".500 ±.005").unwrap();
        assert_eq!(caps[0].as_deref(), Some(".500"));
        assert_eq!(caps[1].as_deref(), Some(".005"));

        let caps = captures(DimensionKind::DiameterSymbol, "⌀.750").unwrap();
        assert_eq!(caps[0].as_deref(), Some(".750"));
        let caps = captures(DimensionKind::Radius, "R.50 TYP").unwrap();
        assert_eq!(caps[0].as_deref(), Some(".50"));
        let caps = captures(DimensionKind::InspectionFeature, "*.375").unwrap();
        assert_eq!(caps[0].as_deref(), Some(".375"));
        let caps = captures(DimensionKind::Chamfer, ".03 x 45° CHAMFER").unwrap();
        assert_eq!(caps[0].as_deref(), Some(".03"));
    }

    #[test]
    fn inspection_rejects_markdown_emphasis() {
        let pattern = pattern_for(DimensionKind::InspectionFeature).unwrap();
        let line = "**2.490**";
        let m = pattern.regex.find(line).unwrap();
        assert!(!pattern.accepts_at(line, m.start()));

        let line = "*2.490";
        let m = pattern.regex.find(line).unwrap();
        assert!(pattern.accepts_at(line, m.start()));
    }

    #[test]
    fn inspection_tolerance_is_optional() {
        let caps = captures(DimensionKind::InspectionFeature, "*1.000").unwrap();
        assert_eq!(caps[0].as_deref(), Some("1.000"));
        assert_eq!(caps[1], None);

        let caps = captures(DimensionKind::InspectionFeature, "* 2.490 ± 0.002").unwrap();
        assert_eq!(caps[0].as_deref(), Some("2.490"));
        assert_eq!(caps[1].as_deref(), Some("0.002"));
    }
}
