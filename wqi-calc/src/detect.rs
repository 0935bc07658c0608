//! Column detection and the dataset feasibility preview.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wqi_core::config::EngineConfig;
use wqi_core::error::{EngineError, Result};
use wqi_core::formula::{FormulaKind, FormulaSet};
use wqi_core::parameter::ParameterCatalog;
use wqi_core::station::{Dataset, LocationField};
use wqi_utils::headers::normalize_key;
use wqi_utils::numeric::Measurement;

/// Which header feeds which symbol, per formula type, plus location columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    /// symbol -> header, per type
    pub parameters: BTreeMap<FormulaKind, BTreeMap<String, String>>,
    pub location: BTreeMap<LocationField, String>,
    pub warnings: Vec<String>,
}

impl ColumnMapping {
    pub fn columns_for(&self, kind: FormulaKind) -> Option<&BTreeMap<String, String>> {
        self.parameters.get(&kind)
    }

    /// Every header claimed by some parameter, deduplicated.
    pub fn parameter_headers(&self) -> Vec<&str> {
        let mut headers: Vec<&str> = self
            .parameters
            .values()
            .flat_map(|m| m.values().map(String::as_str))
            .collect();
        headers.sort_unstable();
        headers.dedup();
        headers
    }
}

/// Coverage of one formula type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableCalculation {
    pub available: bool,
    pub detected_count: usize,
    pub min_required: usize,
    pub parameters_detected: Vec<String>,
    pub parameters_missing: Vec<String>,
}

/// What can be calculated from a table, before committing to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetPreview {
    pub total_rows: usize,
    pub valid_rows: usize,
    /// header -> symbol
    pub detected_columns: BTreeMap<String, String>,
    /// field -> header
    pub location_fields: BTreeMap<LocationField, String>,
    pub available_calculations: BTreeMap<FormulaKind, AvailableCalculation>,
    pub validation_warnings: Vec<String>,
    pub can_proceed: bool,
}

/// Match headers to the symbols of every formula in `formulas`.
///
/// Matching compares normalized keys (see [`normalize_key`]) of the header
/// against the symbol, its display name and its aliases. Within one type a
/// header feeds at most one symbol. Location fields are only looked for
/// among headers no parameter claimed.
pub fn map_columns(
    headers: &[String],
    formulas: &FormulaSet,
    catalog: &ParameterCatalog,
) -> Result<ColumnMapping> {
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(EngineError::Input("dataset has no columns".to_string()));
    }
    let mut mapping = ColumnMapping::default();

    let mut keyed: Vec<(String, &String)> = Vec::new();
    for header in headers {
        let key = normalize_key(header);
        if key.is_empty() {
            continue;
        }
        if let Some((_, first)) = keyed.iter().find(|(k, _)| *k == key) {
            mapping.warnings.push(format!(
                "columns '{}' and '{}' refer to the same field; only '{}' is used",
                first, header, first
            ));
            continue;
        }
        keyed.push((key, header));
    }

    for formula in formulas.iter() {
        let kind = formula.kind();
        let mut matched: BTreeMap<String, String> = BTreeMap::new();
        for symbol in formula.symbols() {
            let candidates: Vec<String> = catalog
                .header_candidates(symbol)
                .into_iter()
                .map(normalize_key)
                .collect();
            let found = candidates.iter().find_map(|candidate| {
                keyed
                    .iter()
                    .find(|(k, h)| k == candidate && !matched.values().any(|m| m == *h))
                    .map(|(_, h)| (*h).clone())
            });
            if let Some(header) = found {
                matched.insert(symbol.to_string(), header);
            }
        }
        mapping.parameters.insert(kind, matched);
    }

    let claimed: Vec<String> = mapping
        .parameter_headers()
        .into_iter()
        .map(String::from)
        .collect();
    for field in LocationField::ALL {
        let found = field.aliases().iter().find_map(|alias| {
            keyed
                .iter()
                .find(|(k, h)| {
                    k == alias
                        && !claimed.iter().any(|c| c == *h)
                        && !mapping.location.values().any(|l| l == *h)
                })
                .map(|(_, h)| (*h).clone())
        });
        if let Some(header) = found {
            mapping.location.insert(field, header);
        }
    }
    Ok(mapping)
}

/// Feasibility report from the header row alone.
pub fn detect(
    headers: &[String],
    formulas: &FormulaSet,
    config: &EngineConfig,
) -> Result<DatasetPreview> {
    let mapping = map_columns(headers, formulas, ParameterCatalog::builtin())?;
    Ok(build_preview(&mapping, formulas, config))
}

/// Feasibility report for a whole table, including row counts.
pub fn preview(
    dataset: &Dataset,
    formulas: &FormulaSet,
    config: &EngineConfig,
) -> Result<DatasetPreview> {
    let mapping = map_columns(&dataset.headers, formulas, ParameterCatalog::builtin())?;
    let mut preview = build_preview(&mapping, formulas, config);
    let columns = mapping.parameter_headers();

    let mut empty_rows = Vec::new();
    for record in &dataset.rows {
        let has_value = columns
            .iter()
            .any(|c| matches!(record.measurement(c), Measurement::Value(_)));
        if has_value {
            preview.valid_rows += 1;
        } else {
            empty_rows.push(record.row.to_string());
        }
    }
    preview.total_rows = dataset.rows.len();
    if !empty_rows.is_empty() && !columns.is_empty() {
        preview.validation_warnings.push(format!(
            "{} row(s) have no numeric parameter values: {}",
            empty_rows.len(),
            empty_rows.join(", ")
        ));
    }
    log::info!(
        "[WQI] detect: {} of {} rows usable, can_proceed = {}",
        preview.valid_rows,
        preview.total_rows,
        preview.can_proceed
    );
    Ok(preview)
}

fn build_preview(
    mapping: &ColumnMapping,
    formulas: &FormulaSet,
    config: &EngineConfig,
) -> DatasetPreview {
    let mut warnings = mapping.warnings.clone();
    let mut detected_columns = BTreeMap::new();
    let mut available_calculations = BTreeMap::new();

    for kind in FormulaKind::ALL {
        let min_required = config.min_required.get(kind);
        let Some(formula) = formulas.get(kind) else {
            warnings.push(format!(
                "no active {} formula; {} will not be calculated",
                kind,
                kind.as_str().to_uppercase()
            ));
            available_calculations.insert(
                kind,
                AvailableCalculation {
                    available: false,
                    detected_count: 0,
                    min_required,
                    parameters_detected: Vec::new(),
                    parameters_missing: Vec::new(),
                },
            );
            continue;
        };
        let matched = mapping.columns_for(kind).cloned().unwrap_or_default();
        let mut parameters_detected = Vec::new();
        let mut parameters_missing = Vec::new();
        for symbol in formula.symbols() {
            match matched.get(symbol) {
                Some(header) => {
                    let first = detected_columns
                        .entry(header.clone())
                        .or_insert_with(|| symbol.to_string());
                    if first.as_str() != symbol {
                        let warning = format!(
                            "column '{}' matches both '{}' and '{}'; detected columns list '{}'",
                            header, first, symbol, first
                        );
                        if !warnings.contains(&warning) {
                            warnings.push(warning);
                        }
                    }
                    parameters_detected.push(symbol.to_string());
                }
                None => parameters_missing.push(symbol.to_string()),
            }
        }
        let detected_count = parameters_detected.len();
        let available = detected_count >= min_required;
        if !available {
            warnings.push(format!(
                "{} needs at least {} parameters, found {}",
                kind.as_str().to_uppercase(),
                min_required,
                detected_count
            ));
        }
        available_calculations.insert(
            kind,
            AvailableCalculation {
                available,
                detected_count,
                min_required,
                parameters_detected,
                parameters_missing,
            },
        );
    }

    if !mapping.location.contains_key(&LocationField::StationId) {
        warnings.push(
            "no station identifier column found; stations will be named by row".to_string(),
        );
    }

    let can_proceed = available_calculations.values().any(|a| a.available);
    DatasetPreview {
        total_rows: 0,
        valid_rows: 0,
        detected_columns,
        location_fields: mapping.location.clone(),
        available_calculations,
        validation_warnings: warnings,
        can_proceed,
    }
}
