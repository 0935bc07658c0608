use serde::{Deserialize, Serialize};

use crate::formula::FormulaKind;

/// Computed indices for one station.
///
/// An absent index means "not computed", never zero. Values are rounded to
/// two decimals; the classification was chosen from the unrounded value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub station_id: String,
    /// Source data row (1-based).
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpi_classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mi_classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mi_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wqi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wqi_classification: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hei: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hei_classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdeg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdeg_classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pig: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pig_classification: Option<String>,

    /// Symbols used by HPI and MI, sorted and deduplicated.
    #[serde(default)]
    pub metals_analyzed: Vec<String>,
    #[serde(default)]
    pub wqi_params_analyzed: Vec<String>,
}

impl CalculationResult {
    pub fn new(station_id: &str, row: usize) -> Self {
        Self {
            station_id: station_id.to_string(),
            row,
            ..Default::default()
        }
    }

    pub fn index(&self, kind: FormulaKind) -> Option<f64> {
        match kind {
            FormulaKind::Hpi => self.hpi,
            FormulaKind::Mi => self.mi,
            FormulaKind::Wqi => self.wqi,
        }
    }

    pub fn classification(&self, kind: FormulaKind) -> Option<&str> {
        match kind {
            FormulaKind::Hpi => self.hpi_classification.as_deref(),
            FormulaKind::Mi => self.mi_classification.as_deref(),
            FormulaKind::Wqi => self.wqi_classification.as_deref(),
        }
    }

    pub fn has_any_index(&self) -> bool {
        self.hpi.is_some() || self.mi.is_some() || self.wqi.is_some()
    }
}

/// Why a whole row produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFailureReason {
    NoUsableParameters,
    MalformedNumericValue,
    DuplicateStationId,
}

impl RowFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowFailureReason::NoUsableParameters => "no_usable_parameters",
            RowFailureReason::MalformedNumericValue => "malformed_numeric_value",
            RowFailureReason::DuplicateStationId => "duplicate_station_id",
        }
    }
}

/// A row that failed, reported next to the successful ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    pub reason: RowFailureReason,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_indices_are_not_serialized() {
        let mut result = CalculationResult::new("S1", 1);
        result.hpi = Some(6.05);
        result.hpi_classification = Some("Low pollution".to_string());
        result.metals_analyzed = vec!["Fe".to_string()];
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["hpi"], 6.05);
        assert!(json.get("mi").is_none());
        assert!(json.get("wqi").is_none());
        assert_eq!(json["wqi_params_analyzed"], serde_json::json!([]));
        let back: CalculationResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_index_accessors() {
        let mut result = CalculationResult::new("S1", 1);
        assert!(!result.has_any_index());
        result.wqi = Some(42.0);
        assert_eq!(result.index(FormulaKind::Wqi), Some(42.0));
        assert_eq!(result.index(FormulaKind::Hpi), None);
        assert!(result.has_any_index());
    }

    #[test]
    fn test_row_failure_reason_serializes_snake_case() {
        let err = RowError {
            row: 4,
            station_id: Some("S4".to_string()),
            reason: RowFailureReason::DuplicateStationId,
            detail: "station 'S4' already appeared on row 2".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains(r#""reason":"duplicate_station_id""#));
        assert_eq!(RowFailureReason::NoUsableParameters.as_str(), "no_usable_parameters");
    }
}
