//! Range matching between live band powers and configured rules.
//!
//! A rule does not name its band explicitly; the band is inferred from the
//! rule name by case-insensitive substring search over an ordered pattern
//! table, first match wins. This is best-effort: "Beta-Wave" and "Metabeta"
//! both resolve to beta, and "alphabeta" resolves to alpha because alpha is
//! checked first.

use crate::{Band, FeatureSample, RangeRule};

/// Default pattern table, evaluated top to bottom.
pub const BAND_PATTERNS: [(&str, Band); 5] = [
    ("alpha", Band::Alpha),
    ("beta", Band::Beta),
    ("theta", Band::Theta),
    ("delta", Band::Delta),
    ("gamma", Band::Gamma),
];

/// Computes the active rule set from scratch for every sample.
#[derive(Debug, Clone)]
pub struct RangeMatcher {
    patterns: Vec<(String, Band)>,
}

impl Default for RangeMatcher {
    fn default() -> Self {
        Self::with_patterns(
            BAND_PATTERNS
                .iter()
                .map(|(pattern, band)| (pattern.to_string(), *band)),
        )
    }
}

impl RangeMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom ordered `(substring, band)` table. Patterns are matched
    /// in lower case.
    pub fn with_patterns(patterns: impl IntoIterator<Item = (String, Band)>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(|(pattern, band)| (pattern.to_lowercase(), band))
                .collect(),
        }
    }

    /// Band monitored by a rule, or `None` if its name matches no pattern.
    pub fn resolve_band(&self, rule_name: &str) -> Option<Band> {
        let lowered = rule_name.to_lowercase();
        self.patterns
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
            .map(|(_, band)| *band)
    }

    /// Rules whose band value lies in `[lower, upper]`, in input order.
    ///
    /// Returns nothing while playback is paused or before the first sample.
    pub fn compute_active<'a>(
        &self,
        sample: Option<&FeatureSample>,
        rules: &'a [RangeRule],
        is_playing: bool,
    ) -> Vec<&'a RangeRule> {
        let sample = match sample {
            Some(sample) if is_playing => sample,
            _ => return Vec::new(),
        };

        rules
            .iter()
            .filter(|rule| {
                self.resolve_band(&rule.name)
                    .map(|band| rule.contains(sample.value(band)))
                    .unwrap_or(false)
            })
            .collect()
    }
}
