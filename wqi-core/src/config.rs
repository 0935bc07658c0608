use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::formula::FormulaKind;

/// Minimum number of usable parameters before an index is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimumParameters {
    pub hpi: usize,
    pub mi: usize,
    pub wqi: usize,
}

impl Default for MinimumParameters {
    fn default() -> Self {
        Self {
            hpi: 3,
            mi: 3,
            wqi: 3,
        }
    }
}

impl MinimumParameters {
    pub fn get(&self, kind: FormulaKind) -> usize {
        match kind {
            FormulaKind::Hpi => self.hpi,
            FormulaKind::Mi => self.mi,
            FormulaKind::Wqi => self.wqi,
        }
    }
}

/// Tunables for detection, processing and reporting.
///
/// Every field has a default, so a partial JSON file is enough:
///
/// ```json
/// { "min_required": { "wqi": 5 }, "top_polluted_limit": 20 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_required: MinimumParameters,
    pub top_polluted_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_required: MinimumParameters::default(),
            top_polluted_limit: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<EngineConfig> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Input(format!("cannot read config {}: {}", path.display(), e))
        })?;
        log::info!("[WQI] config: loaded {}", path.display());
        EngineConfig::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        for kind in FormulaKind::ALL {
            if self.min_required.get(kind) == 0 {
                return Err(EngineError::Validation(format!(
                    "min_required.{} must be at least 1",
                    kind
                )));
            }
        }
        if self.top_polluted_limit == 0 {
            return Err(EngineError::Validation(
                "top_polluted_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.min_required.get(FormulaKind::Hpi), 3);
        assert_eq!(config.min_required.get(FormulaKind::Wqi), 3);
        assert_eq!(config.top_polluted_limit, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{"min_required":{"wqi":5}}"#).unwrap();
        assert_eq!(config.min_required.wqi, 5);
        assert_eq!(config.min_required.hpi, 3);
        assert_eq!(config.top_polluted_limit, 10);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err = EngineConfig::from_json_str(r#"{"min_required":{"mi":0}}"#).unwrap_err();
        assert!(err.to_string().contains("min_required.mi"));
    }
}
