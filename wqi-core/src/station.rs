use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use wqi_utils::numeric::{parse_measurement, Measurement};

use crate::error::{EngineError, Result};

/// One raw spreadsheet cell as the host handed it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Empty,
}

impl RawValue {
    pub fn measurement(&self) -> Measurement {
        match self {
            RawValue::Number(v) if v.is_finite() => Measurement::Value(*v),
            RawValue::Number(_) => Measurement::Malformed,
            RawValue::Text(s) => parse_measurement(s),
            RawValue::Empty => Measurement::Empty,
        }
    }

    /// Trimmed text form, `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Number(v) => Some(v.to_string()),
            RawValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            RawValue::Empty => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

/// One data row: column name to raw cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// 1-based data row number (the header row is not counted).
    pub row: usize,
    pub values: BTreeMap<String, RawValue>,
}

impl StationRecord {
    pub fn new(row: usize) -> Self {
        Self {
            row,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value<V: Into<RawValue>>(mut self, column: &str, value: V) -> Self {
        self.values.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.values.get(column)
    }

    pub fn measurement(&self, column: &str) -> Measurement {
        self.get(column)
            .map(RawValue::measurement)
            .unwrap_or(Measurement::Empty)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(RawValue::as_text)
    }
}

/// An uploaded table: ordered headers plus the data rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<StationRecord>,
}

impl Dataset {
    /// Rejects tables without columns or without data rows.
    pub fn new(headers: Vec<String>, rows: Vec<StationRecord>) -> Result<Dataset> {
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(EngineError::Input("dataset has no columns".to_string()));
        }
        if rows.is_empty() {
            return Err(EngineError::Input(
                "dataset has a header row but no data rows".to_string(),
            ));
        }
        Ok(Dataset { headers, rows })
    }

    pub fn from_csv_str(csv_object: &str) -> Result<Dataset> {
        Dataset::from_csv_reader(csv_object.as_bytes())
    }

    /// Read a CSV table with a header row.
    ///
    /// Rows where every cell is blank are skipped; the remaining rows keep
    /// their position among data rows as `row`. Repeated header names keep
    /// the first column's value.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Dataset> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let mut rows = Vec::new();
        for (idx, row) in rdr.records().enumerate() {
            let record = row?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let mut station = StationRecord::new(idx + 1);
            for (header, cell) in headers.iter().zip(record.iter()) {
                if header.is_empty() {
                    continue;
                }
                station
                    .values
                    .entry(header.clone())
                    .or_insert_with(|| RawValue::from(cell));
            }
            rows.push(station);
        }
        log::debug!(
            "[WQI] station: read {} columns and {} rows",
            headers.len(),
            rows.len()
        );
        Dataset::new(headers, rows)
    }
}

/// Optional location columns, detected independently of parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationField {
    StationId,
    Latitude,
    Longitude,
    State,
    City,
}

impl LocationField {
    pub const ALL: [LocationField; 5] = [
        LocationField::StationId,
        LocationField::Latitude,
        LocationField::Longitude,
        LocationField::State,
        LocationField::City,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocationField::StationId => "station_id",
            LocationField::Latitude => "latitude",
            LocationField::Longitude => "longitude",
            LocationField::State => "state",
            LocationField::City => "city",
        }
    }

    /// Normalized header keys recognized for this field, most specific first.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            LocationField::StationId => &[
                "stationid",
                "station",
                "stationcode",
                "stationname",
                "siteid",
                "site",
                "sampleid",
                "locationid",
                "wellid",
                "id",
                "sno",
            ],
            LocationField::Latitude => &["latitude", "lat"],
            LocationField::Longitude => &["longitude", "long", "lng", "lon"],
            LocationField::State => &["state", "province", "region"],
            LocationField::City => &["city", "district", "town", "village", "location"],
        }
    }
}
