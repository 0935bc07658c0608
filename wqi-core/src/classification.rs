//! Classification bands and the first-match classifier.
//!
//! Ranges are evaluated in declaration order and the first range whose
//! bounds contain the value wins. Both bounds are inclusive, so a value equal
//! to one range's `max` and the next range's `min` belongs to the earlier
//! range.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Label used in histograms for a computed index that matched no band.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One labelled numeric interval. At least one bound must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub label: String,
    /// Lower is cleaner water.
    pub severity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ClassificationRange {
    pub fn new(min: Option<f64>, max: Option<f64>, label: &str, severity: i32) -> Self {
        Self {
            min,
            max,
            label: label.to_string(),
            severity,
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn contains(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    fn lower(&self) -> f64 {
        self.min.unwrap_or(f64::NEG_INFINITY)
    }

    fn upper(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }
}

/// The band a value fell into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub severity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Ordered list of classification bands for one index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub ranges: Vec<ClassificationRange>,
}

/// Map `value` to the first matching band, or `None` when no band matches.
pub fn classify(value: f64, config: &ClassificationConfig) -> Option<Classification> {
    config
        .ranges
        .iter()
        .find(|r| r.contains(value))
        .map(|r| Classification {
            label: r.label.clone(),
            severity: r.severity,
            description: r.description.clone(),
        })
}

fn fmt_bound(v: f64) -> String {
    if v.is_infinite() {
        if v > 0.0 { "+inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{}", v)
    }
}

impl ClassificationConfig {
    pub fn new(ranges: Vec<ClassificationRange>) -> Self {
        Self { ranges }
    }

    pub fn classify(&self, value: f64) -> Option<Classification> {
        classify(value, self)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Check the structural invariants of the bands.
    ///
    /// Errors: no ranges, a range without bounds, non-finite bounds,
    /// `min > max`, an empty label, or two ranges sharing more than a
    /// single boundary point. Misordered ranges and uncovered gaps are
    /// returned as warnings.
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.ranges.is_empty() {
            return Err(EngineError::Validation(
                "classification must define at least one range".to_string(),
            ));
        }
        for (i, r) in self.ranges.iter().enumerate() {
            if r.label.trim().is_empty() {
                return Err(EngineError::Validation(format!(
                    "classification range {} has an empty label",
                    i
                )));
            }
            if r.min.is_none() && r.max.is_none() {
                return Err(EngineError::Validation(format!(
                    "classification range '{}' needs a min or a max",
                    r.label
                )));
            }
            if r.min.map_or(false, |v| !v.is_finite()) || r.max.map_or(false, |v| !v.is_finite()) {
                return Err(EngineError::Validation(format!(
                    "classification range '{}' has a non-finite bound",
                    r.label
                )));
            }
            if let (Some(min), Some(max)) = (r.min, r.max) {
                if min > max {
                    return Err(EngineError::Validation(format!(
                        "classification range '{}' has min {} above max {}",
                        r.label, min, max
                    )));
                }
            }
        }
        for (i, a) in self.ranges.iter().enumerate() {
            for b in &self.ranges[i + 1..] {
                let lo = a.lower().max(b.lower());
                let hi = a.upper().min(b.upper());
                if lo < hi {
                    return Err(EngineError::Validation(format!(
                        "classification ranges '{}' and '{}' overlap on [{}, {}]",
                        a.label,
                        b.label,
                        fmt_bound(lo),
                        fmt_bound(hi)
                    )));
                }
            }
        }

        let mut warnings = Vec::new();
        let ascending = self
            .ranges
            .windows(2)
            .all(|w| w[0].lower() <= w[1].lower());
        if !ascending {
            warnings.push(
                "classification ranges are not in ascending order; the first matching range in declaration order wins at shared boundaries"
                    .to_string(),
            );
        }

        let mut sorted: Vec<&ClassificationRange> = self.ranges.iter().collect();
        sorted.sort_by(|a, b| a.lower().total_cmp(&b.lower()));
        if let Some(first) = sorted.first() {
            if first.lower().is_finite() {
                warnings.push(format!(
                    "values below {} are uncategorized",
                    fmt_bound(first.lower())
                ));
            }
        }
        for w in sorted.windows(2) {
            if w[0].upper() < w[1].lower() {
                warnings.push(format!(
                    "values between {} and {} are uncategorized",
                    fmt_bound(w[0].upper()),
                    fmt_bound(w[1].lower())
                ));
            }
        }
        if let Some(last) = sorted.last() {
            if last.upper().is_finite() {
                warnings.push(format!(
                    "values above {} are uncategorized",
                    fmt_bound(last.upper())
                ));
            }
        }
        Ok(warnings)
    }

    // ───────────────────── Standard bands ─────────────────────

    pub fn hpi_default() -> Self {
        Self::new(vec![
            ClassificationRange::new(None, Some(100.0), "Low pollution", 1)
                .with_description("Heavy metal load below the critical index of 100"),
            ClassificationRange::new(Some(100.0), Some(200.0), "Medium pollution", 2),
            ClassificationRange::new(Some(200.0), None, "High pollution", 3)
                .with_description("Unsuitable for drinking without treatment"),
        ])
    }

    pub fn mi_default() -> Self {
        Self::new(vec![
            ClassificationRange::new(None, Some(0.3), "Very Pure", 1),
            ClassificationRange::new(Some(0.3), Some(1.0), "Pure", 2),
            ClassificationRange::new(Some(1.0), Some(2.0), "Slightly Affected", 3),
            ClassificationRange::new(Some(2.0), Some(4.0), "Moderately Affected", 4),
            ClassificationRange::new(Some(4.0), Some(6.0), "Strongly Affected", 5),
            ClassificationRange::new(Some(6.0), None, "Seriously Affected", 6),
        ])
    }

    /// MI ordinal classes on the same thresholds as [`Self::mi_default`].
    pub fn mi_class_default() -> Self {
        Self::new(vec![
            ClassificationRange::new(None, Some(0.3), "Class I", 1),
            ClassificationRange::new(Some(0.3), Some(1.0), "Class II", 2),
            ClassificationRange::new(Some(1.0), Some(2.0), "Class III", 3),
            ClassificationRange::new(Some(2.0), Some(4.0), "Class IV", 4),
            ClassificationRange::new(Some(4.0), Some(6.0), "Class V", 5),
            ClassificationRange::new(Some(6.0), None, "Class VI", 6),
        ])
    }

    pub fn wqi_default() -> Self {
        Self::new(vec![
            ClassificationRange::new(None, Some(50.0), "Excellent", 1),
            ClassificationRange::new(Some(50.0), Some(100.0), "Good", 2),
            ClassificationRange::new(Some(100.0), Some(200.0), "Poor", 3),
            ClassificationRange::new(Some(200.0), Some(300.0), "Very Poor", 4),
            ClassificationRange::new(Some(300.0), None, "Unsuitable for Drinking", 5),
        ])
    }

    pub fn hei_default() -> Self {
        Self::new(vec![
            ClassificationRange::new(None, Some(10.0), "Low contamination", 1),
            ClassificationRange::new(Some(10.0), Some(20.0), "Medium contamination", 2),
            ClassificationRange::new(Some(20.0), None, "High contamination", 3),
        ])
    }

    pub fn cdeg_default() -> Self {
        Self::new(vec![
            ClassificationRange::new(None, Some(1.0), "Low contamination", 1),
            ClassificationRange::new(Some(1.0), Some(3.0), "Medium contamination", 2),
            ClassificationRange::new(Some(3.0), None, "High contamination", 3),
        ])
    }

    pub fn pig_default() -> Self {
        Self::new(vec![
            ClassificationRange::new(None, Some(1.0), "Low pollution", 1),
            ClassificationRange::new(Some(1.0), Some(2.0), "Moderate pollution", 2),
            ClassificationRange::new(Some(2.0), Some(5.0), "High pollution", 3),
            ClassificationRange::new(Some(5.0), None, "Very high pollution", 4),
        ])
    }
}
