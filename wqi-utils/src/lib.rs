//! Shared utility functions for WQI crates.

/// Numeric coercion and rounding helpers
pub mod numeric {
    /// Result of coercing one raw spreadsheet cell into a measurement.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum Measurement {
        /// Blank cell or a conventional "no data" marker.
        Empty,
        /// A finite numeric value.
        Value(f64),
        /// Something was written in the cell but it is not a finite number.
        Malformed,
    }

    impl Measurement {
        pub fn value(&self) -> Option<f64> {
            match self {
                Measurement::Value(v) => Some(*v),
                _ => None,
            }
        }
    }

    /// Markers that laboratories commonly write instead of leaving a cell blank.
    const NO_DATA_MARKERS: [&str; 8] = ["na", "n/a", "nd", "null", "none", "nan", "-", "--"];

    /// Coerce a raw cell into a [`Measurement`].
    ///
    /// Leading/trailing whitespace is ignored. Infinite or NaN parses are
    /// treated as malformed rather than passed through.
    pub fn parse_measurement(raw: &str) -> Measurement {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Measurement::Empty;
        }
        let lowered = trimmed.to_lowercase();
        if NO_DATA_MARKERS.contains(&lowered.as_str()) {
            return Measurement::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Measurement::Value(v),
            _ => Measurement::Malformed,
        }
    }

    /// Round `value` to `places` decimal places (half away from zero).
    pub fn round_to(value: f64, places: u32) -> f64 {
        let factor = 10f64.powi(places as i32);
        (value * factor).round() / factor
    }

    /// Round to the two decimal places used for persisted index values.
    pub fn round2(value: f64) -> f64 {
        round_to(value, 2)
    }

    /// Arithmetic mean, `None` for an empty input.
    pub fn mean<I>(values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sum = 0.0;
        let mut count = 0usize;
        for v in values {
            sum += v;
            count += 1;
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_measurement_values() {
            assert_eq!(parse_measurement("342.33"), Measurement::Value(342.33));
            assert_eq!(parse_measurement("  7 "), Measurement::Value(7.0));
            assert_eq!(parse_measurement("-0.5"), Measurement::Value(-0.5));
            assert_eq!(parse_measurement("1e-3"), Measurement::Value(0.001));
        }

        #[test]
        fn test_parse_measurement_empty_markers() {
            for raw in ["", "   ", "NA", "n/a", "ND", "null", "-", "--"] {
                assert_eq!(parse_measurement(raw), Measurement::Empty, "raw = {:?}", raw);
            }
        }

        #[test]
        fn test_parse_measurement_malformed() {
            assert_eq!(parse_measurement("<0.01"), Measurement::Malformed);
            assert_eq!(parse_measurement("abc"), Measurement::Malformed);
            assert_eq!(parse_measurement("inf"), Measurement::Malformed);
            assert_eq!(parse_measurement("12 mg/L"), Measurement::Malformed);
        }

        #[test]
        fn test_round2() {
            assert_eq!(round2(6.047142857), 6.05);
            assert_eq!(round2(0.7), 0.7);
            assert_eq!(round2(-1.005), -1.0);
            assert_eq!(round_to(3.14159, 3), 3.142);
        }

        #[test]
        fn test_mean() {
            assert_eq!(mean(Vec::<f64>::new()), None);
            assert_eq!(mean(vec![1.0, 2.0, 3.0]), Some(2.0));
        }
    }
}

/// Column header normalization
pub mod headers {
    /// Normalize a column header (or alias) into a comparison key.
    ///
    /// The key is lowercase, has every non-alphanumeric character removed,
    /// and drops a trailing unit annotation written in parentheses or
    /// brackets, so `"Fe (ppb)"`, `" fe "` and `"FE"` all become `"fe"`.
    pub fn normalize_key(header: &str) -> String {
        let without_unit = match header.find(|c| c == '(' || c == '[') {
            Some(idx) if idx > 0 => &header[..idx],
            _ => header,
        };
        without_unit
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect()
    }

}

/// Timestamp helpers
pub mod dates {
    use chrono::{DateTime, SecondsFormat, Utc};

    /// Format a UTC timestamp as RFC 3339 with second precision.
    pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Current UTC time formatted with [`format_timestamp`].
    pub fn timestamp_now() -> String {
        format_timestamp(&Utc::now())
    }

}
