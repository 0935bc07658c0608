//! Per-type index formulas.
//!
//! Every function here is pure and works on the numeric values already
//! extracted for one station. Parameters missing from `values` are skipped,
//! never read as zero, and `used` lists exactly the symbols that entered the
//! sums.

use std::collections::BTreeMap;
use thiserror::Error;
use wqi_core::formula::{
    Formula, FormulaDefinition, HpiConstants, MiConstants, WqiConstants,
};

/// Station values keyed by formula symbol.
pub type StationValues = BTreeMap<String, f64>;

/// An unrounded index value plus the symbols it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexValue {
    pub value: f64,
    pub used: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalculationSkipped {
    #[error("no usable parameters for this index")]
    NoUsableParameters,
}

pub type IndexResult = std::result::Result<IndexValue, CalculationSkipped>;

/// Compute the index a formula defines.
pub fn calculate(formula: &Formula, values: &StationValues) -> IndexResult {
    match &formula.definition {
        FormulaDefinition::Hpi { parameters } => hpi(parameters, values),
        FormulaDefinition::Mi { parameters, .. } => mi(parameters, values),
        FormulaDefinition::Wqi { parameters } => wqi(parameters, values),
    }
}

/// Weighted mean of sub-indices, shared by HPI and WQI.
///
/// Each item is `(symbol, measured, standard, ideal)`; weight is `1/standard`
/// and the sub-index `(measured - ideal) / (standard - ideal) * 100`.
fn weighted_sub_index<'a, I>(items: I) -> IndexResult
where
    I: Iterator<Item = (&'a String, f64, f64, f64)>,
{
    let mut weighted = 0.0;
    let mut weights = 0.0;
    let mut used = Vec::new();
    for (symbol, measured, standard, ideal) in items {
        if standard <= 0.0 || standard == ideal {
            log::debug!("[WQI] index: skipping degenerate parameter {}", symbol);
            continue;
        }
        let w = 1.0 / standard;
        let q = (measured - ideal) / (standard - ideal) * 100.0;
        weighted += w * q;
        weights += w;
        used.push(symbol.clone());
    }
    if used.is_empty() || weights == 0.0 {
        return Err(CalculationSkipped::NoUsableParameters);
    }
    Ok(IndexValue {
        value: weighted / weights,
        used,
    })
}

/// Heavy-metal Pollution Index: `Σ(Wi·Qi) / Σ(Wi)` with `Wi = 1/Si` and
/// `Qi = (Mi − Ii)/(Si − Ii) × 100`.
pub fn hpi(parameters: &BTreeMap<String, HpiConstants>, values: &StationValues) -> IndexResult {
    weighted_sub_index(
        parameters
            .iter()
            .filter_map(|(s, c)| values.get(s).map(|v| (s, *v, c.si, c.ii))),
    )
}

/// Metal Index: `Σ(Ci / MACi)`, unweighted.
pub fn mi(parameters: &BTreeMap<String, MiConstants>, values: &StationValues) -> IndexResult {
    let mut sum = 0.0;
    let mut used = Vec::new();
    for (symbol, c) in parameters {
        let Some(value) = values.get(symbol) else {
            continue;
        };
        if c.mac <= 0.0 {
            continue;
        }
        sum += value / c.mac;
        used.push(symbol.clone());
    }
    if used.is_empty() {
        return Err(CalculationSkipped::NoUsableParameters);
    }
    Ok(IndexValue { value: sum, used })
}

/// Water Quality Index: `Σ(wi·qi) / Σ(wi)` with `wi = k/Sn`, `k = 1` and
/// `qi = 100 × (Vi − Vo)/(Sn − Vo)`.
///
/// Any constant `k` cancels in the ratio, so this equals the variant that
/// normalizes the weights to sum to one.
pub fn wqi(parameters: &BTreeMap<String, WqiConstants>, values: &StationValues) -> IndexResult {
    weighted_sub_index(
        parameters
            .iter()
            .filter_map(|(s, c)| values.get(s).map(|v| (s, *v, c.sn, c.vo))),
    )
}

/// Metal indices derived from the HPI inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupplementaryIndices {
    /// Heavy-metal Evaluation Index, `Σ(Vi/Si)`.
    pub hei: f64,
    /// Degree of contamination, `Σ(Vi/Si − 1)`.
    pub cdeg: f64,
    /// Pollution Index of Groundwater, `√((HPI/100)² + HEI²) / √2`.
    pub pig: f64,
}

/// HEI, Cdeg and PIG over the metals HPI actually used.
pub fn supplementary(
    parameters: &BTreeMap<String, HpiConstants>,
    values: &StationValues,
    hpi: &IndexValue,
) -> Option<SupplementaryIndices> {
    let mut hei = 0.0;
    let mut cdeg = 0.0;
    let mut count = 0;
    for symbol in &hpi.used {
        let (Some(c), Some(v)) = (parameters.get(symbol), values.get(symbol)) else {
            continue;
        };
        let ratio = v / c.si;
        hei += ratio;
        cdeg += ratio - 1.0;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let pig = ((hpi.value / 100.0).powi(2) + hei.powi(2)).sqrt() / std::f64::consts::SQRT_2;
    Some(SupplementaryIndices { hei, cdeg, pig })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wqi_core::classification::ClassificationConfig;
    use wqi_core::formula::{FormulaKind, FormulaSet};
    use wqi_core::parameter::ParameterCatalog;

    fn values(pairs: &[(&str, f64)]) -> StationValues {
        pairs.iter().map(|(s, v)| (s.to_string(), *v)).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_hpi_single_iron_parameter() {
        let mut parameters = BTreeMap::new();
        parameters.insert("Fe".to_string(), HpiConstants { si: 1000.0, ii: 300.0 });
        let result = hpi(&parameters, &values(&[("Fe", 342.33)])).unwrap();
        assert!(close(result.value, (342.33 - 300.0) / 700.0 * 100.0));
        assert_eq!(wqi_utils::numeric::round2(result.value), 6.05);
        assert_eq!(result.used, vec!["Fe"]);
    }

    #[test]
    fn test_mi_sum_of_ratios() {
        let mut parameters = BTreeMap::new();
        parameters.insert("As".to_string(), MiConstants { mac: 50.0 });
        parameters.insert("Pb".to_string(), MiConstants { mac: 10.0 });
        let result = mi(&parameters, &values(&[("As", 10.0), ("Pb", 5.0)])).unwrap();
        assert!(close(result.value, 0.7));
        assert_eq!(result.used, vec!["As", "Pb"]);
    }

    #[test]
    fn test_wqi_pinned_value() {
        let formula = Formula::seed(FormulaKind::Wqi, ParameterCatalog::builtin()).unwrap();
        let station = values(&[("pH", 7.5), ("TDS", 250.0), ("TH", 150.0)]);
        let result = calculate(&formula, &station).unwrap();
        // Σwq = 1068/255, Σw = 784/6375
        assert!(close(result.value, 26700.0 / 784.0), "{}", result.value);
        assert_eq!(wqi_utils::numeric::round2(result.value), 34.06);
        assert_eq!(result.used, vec!["TDS", "TH", "pH"]);
    }

    #[test]
    fn test_wqi_matches_normalized_weights() {
        let formula = Formula::seed(FormulaKind::Wqi, ParameterCatalog::builtin()).unwrap();
        let station = values(&[("pH", 7.9), ("TDS", 420.0), ("Cl", 80.0), ("F", 1.4)]);
        let result = calculate(&formula, &station).unwrap();
        let FormulaDefinition::Wqi { parameters } = &formula.definition else {
            panic!("seeded WQI formula has the wrong shape");
        };
        let k = 1.0 / result.used.iter().map(|s| 1.0 / parameters[s].sn).sum::<f64>();
        let normalized: f64 = result
            .used
            .iter()
            .map(|s| {
                let c = parameters[s];
                (k / c.sn) * 100.0 * (station[s] - c.vo) / (c.sn - c.vo)
            })
            .sum();
        assert!((result.value - normalized).abs() < 1e-9);
    }

    #[test]
    fn test_missing_parameter_is_excluded_not_zero() {
        let formula = Formula::seed(FormulaKind::Hpi, ParameterCatalog::builtin()).unwrap();
        let six = values(&[
            ("As", 12.0),
            ("Cr", 20.0),
            ("Cu", 300.0),
            ("Fe", 500.0),
            ("Pb", 4.0),
            ("Zn", 6000.0),
        ]);
        let without_cd = calculate(&formula, &six).unwrap();
        assert_eq!(without_cd.used.len(), 6);
        assert!(!without_cd.used.contains(&"Cd".to_string()));

        let mut with_zero_cd = six.clone();
        with_zero_cd.insert("Cd".to_string(), 0.0);
        let zero = calculate(&formula, &with_zero_cd).unwrap();
        assert_eq!(zero.used.len(), 7);
        assert!(!close(zero.value, without_cd.value));
    }

    #[test]
    fn test_degenerate_constants_are_excluded() {
        let mut parameters = BTreeMap::new();
        parameters.insert("Fe".to_string(), HpiConstants { si: 300.0, ii: 300.0 });
        parameters.insert("Pb".to_string(), HpiConstants { si: 10.0, ii: 0.0 });
        let result = hpi(&parameters, &values(&[("Fe", 500.0), ("Pb", 5.0)])).unwrap();
        assert_eq!(result.used, vec!["Pb"]);
        assert!(close(result.value, 50.0));
        assert!(result.value.is_finite());

        let only_degenerate = hpi(&parameters, &values(&[("Fe", 500.0)]));
        assert_eq!(only_degenerate, Err(CalculationSkipped::NoUsableParameters));
    }

    #[test]
    fn test_no_values_skips() {
        let set = FormulaSet::seeded(ParameterCatalog::builtin()).unwrap();
        for formula in set.iter() {
            assert_eq!(
                calculate(formula, &StationValues::new()),
                Err(CalculationSkipped::NoUsableParameters)
            );
        }
    }

    #[test]
    fn test_supplementary_indices() {
        let mut parameters = BTreeMap::new();
        parameters.insert("Pb".to_string(), HpiConstants { si: 10.0, ii: 0.0 });
        parameters.insert("Cd".to_string(), HpiConstants { si: 3.0, ii: 0.0 });
        let station = values(&[("Pb", 20.0), ("Cd", 1.5)]);
        let base = hpi(&parameters, &station).unwrap();
        let extra = supplementary(&parameters, &station, &base).unwrap();
        assert!(close(extra.hei, 2.5));
        assert!(close(extra.cdeg, 0.5));
        let expected_pig = ((base.value / 100.0).powi(2) + 2.5f64.powi(2)).sqrt() / 2f64.sqrt();
        assert!(close(extra.pig, expected_pig));
        assert_eq!(
            ClassificationConfig::hei_default().classify(extra.hei).unwrap().label,
            "Low contamination"
        );
    }
}
