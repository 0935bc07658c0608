//! Summary statistics over persisted calculation results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wqi_core::classification::UNCATEGORIZED;
use wqi_core::error::{EngineError, Result};
use wqi_core::formula::FormulaKind;
use wqi_core::result::CalculationResult;
use wqi_utils::numeric::mean;

/// Restricts which results enter the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFilter {
    /// Case-insensitive match on the station's state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ReportFilter {
    pub fn state(state: &str) -> Self {
        Self {
            state: Some(state.to_string()),
        }
    }

    fn matches(&self, result: &CalculationResult) -> bool {
        match &self.state {
            Some(wanted) => result
                .state
                .as_deref()
                .map_or(false, |s| s.trim().eq_ignore_ascii_case(wanted.trim())),
            None => true,
        }
    }
}

/// Mean of each index over the stations that have it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexAverages {
    pub hpi: Option<f64>,
    pub mi: Option<f64>,
    pub wqi: Option<f64>,
    pub hei: Option<f64>,
    pub cdeg: Option<f64>,
    pub pig: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutedStation {
    pub station_id: String,
    pub hpi: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpi_classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// label -> station count
pub type Histogram = BTreeMap<String, usize>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub total_stations: usize,
    pub averages: IndexAverages,
    pub hpi_distribution: Histogram,
    pub mi_distribution: Histogram,
    pub mi_class_distribution: Histogram,
    pub wqi_distribution: Histogram,
    pub hei_distribution: Histogram,
    pub cdeg_distribution: Histogram,
    pub pig_distribution: Histogram,
    pub by_state: Histogram,
    pub by_city: Histogram,
    pub top_polluted: Vec<PollutedStation>,
}

/// Count the label of every computed value; a value without a band is
/// counted as [`UNCATEGORIZED`].
fn histogram<'a, I>(items: I) -> Histogram
where
    I: Iterator<Item = (Option<f64>, Option<&'a str>)>,
{
    let mut counts = Histogram::new();
    for (value, label) in items {
        if value.is_none() {
            continue;
        }
        *counts
            .entry(label.unwrap_or(UNCATEGORIZED).to_string())
            .or_insert(0) += 1;
    }
    counts
}

fn rollup<'a, I>(keys: I) -> Histogram
where
    I: Iterator<Item = Option<&'a str>>,
{
    let mut counts = Histogram::new();
    for key in keys.flatten() {
        let key = key.trim();
        if !key.is_empty() {
            *counts.entry(key.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Aggregate `results` (already filtered by upload) into a report.
///
/// Fails with `NotFound` when nothing is left to aggregate.
pub fn aggregate(
    results: &[CalculationResult],
    filter: &ReportFilter,
    top_limit: usize,
) -> Result<ReportData> {
    if results.is_empty() {
        return Err(EngineError::NotFound(
            "No calculations found for this upload".to_string(),
        ));
    }
    let selected: Vec<&CalculationResult> = results.iter().filter(|r| filter.matches(r)).collect();
    if selected.is_empty() {
        return Err(EngineError::NotFound(format!(
            "No calculations found for state '{}'",
            filter.state.as_deref().unwrap_or_default()
        )));
    }

    let averages = IndexAverages {
        hpi: mean(selected.iter().filter_map(|r| r.index(FormulaKind::Hpi))),
        mi: mean(selected.iter().filter_map(|r| r.index(FormulaKind::Mi))),
        wqi: mean(selected.iter().filter_map(|r| r.index(FormulaKind::Wqi))),
        hei: mean(selected.iter().filter_map(|r| r.hei)),
        cdeg: mean(selected.iter().filter_map(|r| r.cdeg)),
        pig: mean(selected.iter().filter_map(|r| r.pig)),
    };

    // Stable sort keeps insertion order for equal HPI values.
    let mut polluted: Vec<&CalculationResult> =
        selected.iter().copied().filter(|r| r.hpi.is_some()).collect();
    polluted.sort_by(|a, b| {
        let (a, b) = (a.hpi.unwrap_or_default(), b.hpi.unwrap_or_default());
        b.total_cmp(&a)
    });
    let top_polluted = polluted
        .into_iter()
        .take(top_limit)
        .map(|r| PollutedStation {
            station_id: r.station_id.clone(),
            hpi: r.hpi.unwrap_or_default(),
            hpi_classification: r.hpi_classification.clone(),
            state: r.state.clone(),
            city: r.city.clone(),
        })
        .collect();

    let by_kind = |kind: FormulaKind| {
        histogram(selected.iter().map(|r| (r.index(kind), r.classification(kind))))
    };
    let report = ReportData {
        total_stations: selected.len(),
        averages,
        hpi_distribution: by_kind(FormulaKind::Hpi),
        mi_distribution: by_kind(FormulaKind::Mi),
        mi_class_distribution: histogram(selected.iter().map(|r| (r.mi, r.mi_class.as_deref()))),
        wqi_distribution: by_kind(FormulaKind::Wqi),
        hei_distribution: histogram(selected.iter().map(|r| (r.hei, r.hei_classification.as_deref()))),
        cdeg_distribution: histogram(selected.iter().map(|r| (r.cdeg, r.cdeg_classification.as_deref()))),
        pig_distribution: histogram(selected.iter().map(|r| (r.pig, r.pig_classification.as_deref()))),
        by_state: rollup(selected.iter().map(|r| r.state.as_deref())),
        by_city: rollup(selected.iter().map(|r| r.city.as_deref())),
        top_polluted,
    };
    log::info!(
        "[WQI] report: aggregated {} of {} results",
        report.total_stations,
        results.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str, hpi: Option<f64>, wqi: Option<f64>, state: Option<&str>) -> CalculationResult {
        let mut r = CalculationResult::new(id, 1);
        r.hpi = hpi;
        r.hpi_classification = hpi.map(|v| {
            let label = if v <= 100.0 { "Low pollution" } else { "High pollution" };
            label.to_string()
        });
        r.wqi = wqi;
        r.wqi_classification = wqi.map(|_| "Good".to_string());
        r.state = state.map(String::from);
        r
    }

    #[test]
    fn test_averages_ignore_missing_indices() {
        let results = vec![
            station("A", Some(50.0), None, None),
            station("B", Some(150.0), Some(80.0), None),
            station("C", None, Some(60.0), None),
        ];
        let report = aggregate(&results, &ReportFilter::default(), 10).unwrap();
        assert_eq!(report.total_stations, 3);
        assert_eq!(report.averages.hpi, Some(100.0));
        assert_eq!(report.averages.wqi, Some(70.0));
        assert_eq!(report.averages.mi, None);
    }

    #[test]
    fn test_histograms_and_uncategorized() {
        let mut unbanded = station("D", Some(500.0), None, None);
        unbanded.hpi_classification = None;
        let results = vec![
            station("A", Some(50.0), None, None),
            station("B", Some(150.0), None, None),
            station("C", Some(90.0), None, None),
            unbanded,
        ];
        let report = aggregate(&results, &ReportFilter::default(), 10).unwrap();
        assert_eq!(report.hpi_distribution["Low pollution"], 2);
        assert_eq!(report.hpi_distribution["High pollution"], 1);
        assert_eq!(report.hpi_distribution[UNCATEGORIZED], 1);
        assert!(report.wqi_distribution.is_empty());
    }

    #[test]
    fn test_geographic_rollups() {
        let mut a = station("A", Some(1.0), None, Some("Punjab"));
        a.city = Some("Ludhiana".to_string());
        let results = vec![
            a,
            station("B", Some(2.0), None, Some("Punjab")),
            station("C", Some(3.0), None, Some("Haryana")),
            station("D", Some(4.0), None, None),
        ];
        let report = aggregate(&results, &ReportFilter::default(), 10).unwrap();
        assert_eq!(report.by_state["Punjab"], 2);
        assert_eq!(report.by_state["Haryana"], 1);
        assert_eq!(report.by_state.len(), 2);
        assert_eq!(report.by_city.len(), 1);
    }

    #[test]
    fn test_top_polluted_order_ties_and_cap() {
        let results = vec![
            station("A", Some(10.0), None, None),
            station("B", Some(300.0), None, None),
            station("C", Some(120.0), None, None),
            station("D", Some(300.0), None, None),
            station("E", None, Some(10.0), None),
        ];
        let report = aggregate(&results, &ReportFilter::default(), 3).unwrap();
        let ids: Vec<&str> = report.top_polluted.iter().map(|s| s.station_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "D", "C"]);
    }

    #[test]
    fn test_state_filter_is_case_insensitive() {
        let results = vec![
            station("A", Some(50.0), None, Some("Punjab")),
            station("B", Some(150.0), None, Some("Haryana")),
        ];
        let report = aggregate(&results, &ReportFilter::state("punjab"), 10).unwrap();
        assert_eq!(report.total_stations, 1);
        assert_eq!(report.averages.hpi, Some(50.0));

        let err = aggregate(&results, &ReportFilter::state("Goa"), 10).unwrap_err();
        assert_eq!(err.kind(), wqi_core::error::ErrorKind::NotFound);
    }

    #[test]
    fn test_empty_results_not_found() {
        let err = aggregate(&[], &ReportFilter::default(), 10).unwrap_err();
        assert_eq!(err.to_string(), "No calculations found for this upload");
    }
}
