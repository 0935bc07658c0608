//! Runs detection, calculation and classification over every row of a
//! dataset.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use wqi_core::classification::ClassificationConfig;
use wqi_core::config::EngineConfig;
use wqi_core::error::{EngineError, Result};
use wqi_core::formula::{Formula, FormulaDefinition, FormulaKind, FormulaSet};
use wqi_core::parameter::ParameterCatalog;
use wqi_core::result::{CalculationResult, RowError, RowFailureReason};
use wqi_core::station::{Dataset, LocationField, StationRecord};
use wqi_utils::numeric::{round2, Measurement};

use crate::detect::{map_columns, ColumnMapping};
use crate::index::{self, IndexValue, StationValues};

/// Results of one processing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub calculations: Vec<CalculationResult>,
    pub errors: Vec<RowError>,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Values gathered for one formula type from one row.
struct Gathered {
    values: StationValues,
    malformed: Vec<String>,
}

fn gather(record: &StationRecord, columns: Option<&BTreeMap<String, String>>) -> Gathered {
    let mut gathered = Gathered {
        values: StationValues::new(),
        malformed: Vec::new(),
    };
    for (symbol, header) in columns.into_iter().flatten() {
        match record.measurement(header) {
            Measurement::Value(v) => {
                gathered.values.insert(symbol.clone(), v);
            }
            Measurement::Malformed => gathered.malformed.push(header.clone()),
            Measurement::Empty => {}
        }
    }
    gathered
}

fn label(value: f64, config: &ClassificationConfig) -> Option<String> {
    config.classify(value).map(|c| c.label)
}

fn location_text(record: &StationRecord, mapping: &ColumnMapping, field: LocationField) -> Option<String> {
    mapping.location.get(&field).and_then(|h| record.text(h))
}

fn location_number(record: &StationRecord, mapping: &ColumnMapping, field: LocationField) -> Option<f64> {
    mapping
        .location
        .get(&field)
        .and_then(|h| record.measurement(h).value())
}

/// Compute every index the formula set allows for one row.
///
/// Returns the result (which may carry no index at all), a note for each
/// index that was left out, and the columns holding non-numeric text.
fn process_row(
    record: &StationRecord,
    station_id: String,
    mapping: &ColumnMapping,
    formulas: &FormulaSet,
    config: &EngineConfig,
) -> (CalculationResult, Vec<String>, Vec<String>) {
    let mut result = CalculationResult::new(&station_id, record.row);
    result.latitude = location_number(record, mapping, LocationField::Latitude);
    result.longitude = location_number(record, mapping, LocationField::Longitude);
    result.state = location_text(record, mapping, LocationField::State);
    result.city = location_text(record, mapping, LocationField::City);

    let mut skipped = Vec::new();
    let mut malformed = Vec::new();
    let mut metals: BTreeSet<String> = BTreeSet::new();

    for formula in formulas.iter() {
        let kind = formula.kind();
        let gathered = gather(record, mapping.columns_for(kind));
        malformed.extend(gathered.malformed.iter().cloned());
        let min_required = config.min_required.get(kind);
        let computed = match index::calculate(formula, &gathered.values) {
            Ok(v) if v.used.len() >= min_required => v,
            Ok(v) => {
                skipped.push(format!("{}: {} of {} parameters", kind, v.used.len(), min_required));
                continue;
            }
            Err(e) => {
                skipped.push(format!("{}: {}", kind, e));
                continue;
            }
        };
        apply(&mut result, formula, &computed, &gathered.values);
        match kind {
            FormulaKind::Hpi | FormulaKind::Mi => metals.extend(computed.used.iter().cloned()),
            FormulaKind::Wqi => result.wqi_params_analyzed = computed.used.clone(),
        }
    }
    result.metals_analyzed = metals.into_iter().collect();
    malformed.sort();
    malformed.dedup();
    (result, skipped, malformed)
}

fn apply(result: &mut CalculationResult, formula: &Formula, computed: &IndexValue, values: &StationValues) {
    let value = computed.value;
    let classification = label(value, &formula.classification);
    match &formula.definition {
        FormulaDefinition::Hpi { parameters } => {
            result.hpi = Some(round2(value));
            result.hpi_classification = classification;
            if let Some(extra) = index::supplementary(parameters, values, computed) {
                result.hei = Some(round2(extra.hei));
                result.hei_classification = label(extra.hei, &ClassificationConfig::hei_default());
                result.cdeg = Some(round2(extra.cdeg));
                result.cdeg_classification = label(extra.cdeg, &ClassificationConfig::cdeg_default());
                result.pig = Some(round2(extra.pig));
                result.pig_classification = label(extra.pig, &ClassificationConfig::pig_default());
            }
        }
        FormulaDefinition::Mi { class_bands, .. } => {
            result.mi = Some(round2(value));
            result.mi_classification = classification;
            result.mi_class = label(value, class_bands);
        }
        FormulaDefinition::Wqi { .. } => {
            result.wqi = Some(round2(value));
            result.wqi_classification = classification;
        }
    }
}

/// Process every row of `dataset` against one snapshot of formulas.
///
/// Rows never abort the run: a row without any computable index, or whose
/// station id already produced a result, is reported in `errors`. Results
/// keep the input row order.
pub fn process(
    dataset: &Dataset,
    formulas: &FormulaSet,
    config: &EngineConfig,
) -> Result<ProcessingOutcome> {
    if formulas.is_empty() {
        return Err(EngineError::Validation(
            "no active formulas to calculate with".to_string(),
        ));
    }
    if dataset.rows.is_empty() {
        return Err(EngineError::Input(
            "dataset has a header row but no data rows".to_string(),
        ));
    }
    let mapping = map_columns(&dataset.headers, formulas, ParameterCatalog::builtin())?;

    let mut outcome = ProcessingOutcome {
        total: dataset.rows.len(),
        ..Default::default()
    };
    let mut seen: HashMap<String, usize> = HashMap::new();

    for record in &dataset.rows {
        let station_id = location_text(record, &mapping, LocationField::StationId)
            .unwrap_or_else(|| format!("Station-{}", record.row));

        if let Some(first_row) = seen.get(&station_id) {
            outcome.errors.push(RowError {
                row: record.row,
                station_id: Some(station_id.clone()),
                reason: RowFailureReason::DuplicateStationId,
                detail: format!(
                    "station '{}' already has a result from row {}",
                    station_id, first_row
                ),
            });
            continue;
        }

        let (result, skipped, malformed) =
            process_row(record, station_id.clone(), &mapping, formulas, config);
        if result.has_any_index() {
            if !malformed.is_empty() {
                log::warn!(
                    "[WQI] processor: row {} ignored non-numeric values in {}",
                    record.row,
                    malformed.join(", ")
                );
            }
            seen.insert(station_id, record.row);
            outcome.calculations.push(result);
            continue;
        }

        let (reason, detail) = if malformed.is_empty() {
            (
                RowFailureReason::NoUsableParameters,
                format!("no index could be calculated ({})", skipped.join("; ")),
            )
        } else {
            (
                RowFailureReason::MalformedNumericValue,
                format!("non-numeric value in {}", malformed.join(", ")),
            )
        };
        log::debug!("[WQI] processor: row {} failed: {}", record.row, detail);
        outcome.errors.push(RowError {
            row: record.row,
            station_id: Some(station_id),
            reason,
            detail,
        });
    }

    outcome.processed = outcome.calculations.len();
    outcome.failed = outcome.errors.len();
    log::info!(
        "[WQI] processor: {} rows, {} processed, {} failed",
        outcome.total,
        outcome.processed,
        outcome.failed
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> FormulaSet {
        FormulaSet::seeded(ParameterCatalog::builtin()).unwrap()
    }

    fn run(csv: &str) -> ProcessingOutcome {
        let dataset = Dataset::from_csv_str(csv).unwrap();
        process(&dataset, &seeded(), &EngineConfig::default()).unwrap()
    }

    const SAMPLE: &str = "\
station_id,State,City,Latitude,Longitude,As,Cd,Cr,Cu,Fe,Pb,Zn,pH,TDS,TH
S1,Punjab,Ludhiana,30.9,75.85,12,1.2,20,300,500,4,6000,7.5,250,150
S2,Punjab,Amritsar,31.63,74.87,60,4,70,1800,1500,80,16000,8.9,800,420
S3,Haryana,Karnal,29.69,76.99,5,,10,100,400,2,5500,,,
";

    #[test]
    fn test_full_processing_workflow() {
        let outcome = run(SAMPLE);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.failed, 0);

        let s1 = &outcome.calculations[0];
        assert_eq!(s1.station_id, "S1");
        assert_eq!(s1.state.as_deref(), Some("Punjab"));
        assert_eq!(s1.latitude, Some(30.9));
        assert!(s1.hpi.is_some() && s1.mi.is_some() && s1.wqi.is_some());
        assert!(s1.hei.is_some() && s1.cdeg.is_some() && s1.pig.is_some());
        assert_eq!(s1.wqi, Some(34.06));
        assert_eq!(s1.wqi_classification.as_deref(), Some("Excellent"));
        assert_eq!(s1.wqi_params_analyzed, vec!["TDS", "TH", "pH"]);
        assert_eq!(s1.metals_analyzed, vec!["As", "Cd", "Cr", "Cu", "Fe", "Pb", "Zn"]);
        assert!(s1.mi_class.as_deref().unwrap_or("").starts_with("Class"));

        let s2 = &outcome.calculations[1];
        assert_eq!(s2.hpi_classification.as_deref(), Some("High pollution"));
        assert_eq!(s2.mi_classification.as_deref(), Some("Seriously Affected"));
        assert_eq!(s2.mi_class.as_deref(), Some("Class VI"));
    }

    #[test]
    fn test_station_missing_one_metal_still_gets_hpi() {
        let outcome = run(SAMPLE);
        let s3 = &outcome.calculations[2];
        assert!(s3.hpi.is_some());
        assert_eq!(s3.metals_analyzed.len(), 6);
        assert!(!s3.metals_analyzed.contains(&"Cd".to_string()));
        // WQI columns are empty for S3: omitted, not zero.
        assert_eq!(s3.wqi, None);
        assert!(s3.wqi_params_analyzed.is_empty());
    }

    #[test]
    fn test_index_absent_below_threshold() {
        let outcome = run("station_id,Fe,Pb,pH,TDS,TH\nS1,500,4,7.5,250,150\n");
        let s1 = &outcome.calculations[0];
        assert_eq!(s1.hpi, None);
        assert_eq!(s1.mi, None);
        assert_eq!(s1.hei, None);
        assert!(s1.wqi.is_some());
        assert!(s1.metals_analyzed.is_empty());
    }

    #[test]
    fn test_row_without_values_fails() {
        let outcome = run("station_id,Fe,Pb,Cd\nS1,500,4,1\nS2,,,\n");
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.failed, 1);
        let err = &outcome.errors[0];
        assert_eq!(err.row, 2);
        assert_eq!(err.station_id.as_deref(), Some("S2"));
        assert_eq!(err.reason, RowFailureReason::NoUsableParameters);
    }

    #[test]
    fn test_malformed_values_reason() {
        let outcome = run("station_id,Fe,Pb,Cd\nS1,abc,<0.5,1\n");
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors[0].reason, RowFailureReason::MalformedNumericValue);
        assert!(outcome.errors[0].detail.contains("Fe"));
    }

    #[test]
    fn test_duplicate_station_rejected() {
        let outcome = run("station_id,Fe,Pb,Cd\nS1,500,4,1\nS1,600,5,2\n");
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.errors[0].reason, RowFailureReason::DuplicateStationId);
        assert_eq!(outcome.errors[0].row, 2);
        assert_eq!(outcome.calculations[0].row, 1);
    }

    #[test]
    fn test_missing_station_id_falls_back_to_row() {
        let outcome = run("Fe,Pb,Cd\n500,4,1\n600,5,2\n");
        assert_eq!(outcome.calculations[0].station_id, "Station-1");
        assert_eq!(outcome.calculations[1].station_id, "Station-2");
    }

    #[test]
    fn test_row_order_invariance() {
        let forward = run(SAMPLE);
        let mut lines: Vec<&str> = SAMPLE.lines().collect();
        lines[1..].reverse();
        let reversed = run(&(lines.join("\n") + "\n"));
        let mut back = reversed.calculations.clone();
        back.reverse();
        assert_eq!(back.len(), forward.calculations.len());
        for (a, b) in forward.calculations.iter().zip(back.iter()) {
            assert_eq!(a.station_id, b.station_id);
            assert_eq!(a.hpi, b.hpi);
            assert_eq!(a.mi, b.mi);
            assert_eq!(a.wqi, b.wqi);
            assert_eq!(a.metals_analyzed, b.metals_analyzed);
        }
    }

    #[test]
    fn test_empty_formula_set_is_validation_error() {
        let dataset = Dataset::from_csv_str("Fe\n1\n").unwrap();
        let err = process(&dataset, &FormulaSet::default(), &EngineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), wqi_core::error::ErrorKind::Validation);
    }

    #[test]
    fn test_empty_rows_is_input_error() {
        let dataset = Dataset {
            headers: vec!["Fe".to_string()],
            rows: Vec::new(),
        };
        let err = process(&dataset, &seeded(), &EngineConfig::default()).unwrap_err();
        assert_eq!(err.kind(), wqi_core::error::ErrorKind::Input);
    }
}
