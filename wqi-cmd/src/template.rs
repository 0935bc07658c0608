//! CSV input template generation.
//!
//! The header lists the location columns followed by every catalog symbol,
//! grouped by family, so a filled-in template is detected without any
//! aliasing.

use csv::Writer;
use wqi_core::parameter::{ParameterCatalog, ParameterFamily};

const LOCATION_COLUMNS: [&str; 5] = ["station_id", "State", "City", "Latitude", "Longitude"];

const EXAMPLE_LOCATION: [&str; 5] = ["Sample Site 1", "Tamil Nadu", "Chennai", "13.0827", "80.2707"];

/// Typical readings for the example row; symbols not listed stay empty.
const EXAMPLE_VALUES: [(&str, &str); 14] = [
    ("Hg", "0.5"),
    ("Cd", "1.0"),
    ("As", "5.0"),
    ("Pb", "3.0"),
    ("Ni", "5.0"),
    ("Cr", "10.0"),
    ("Fe", "200"),
    ("Cu", "50"),
    ("Zn", "1000"),
    ("pH", "7.4"),
    ("F", "1.0"),
    ("Cl", "100"),
    ("NO3", "20"),
    ("SO4", "150"),
];

/// Render the input template as CSV text.
pub fn template_csv(catalog: &ParameterCatalog, with_example_row: bool) -> anyhow::Result<String> {
    let symbols: Vec<&str> = ParameterFamily::ALL
        .iter()
        .flat_map(|family| catalog.symbols_in_family(*family))
        .collect();
    let mut wtr = Writer::from_writer(Vec::new());
    let mut header: Vec<&str> = LOCATION_COLUMNS.to_vec();
    header.extend(symbols.iter().copied());
    wtr.write_record(&header)?;

    if with_example_row {
        let mut row: Vec<&str> = EXAMPLE_LOCATION.to_vec();
        for symbol in &symbols {
            let value = EXAMPLE_VALUES
                .iter()
                .find(|(s, _)| s == symbol)
                .map(|(_, v)| *v)
                .unwrap_or("");
            row.push(value);
        }
        wtr.write_record(&row)?;
    }

    let bytes = wtr.into_inner()?;
    log::debug!(
        "[WQI] template: {} columns, example row: {}",
        header.len(),
        with_example_row
    );
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wqi_core::config::EngineConfig;
    use wqi_core::formula::{FormulaKind, FormulaSet};
    use wqi_core::station::{Dataset, LocationField};

    #[test]
    fn test_header_lists_location_then_every_symbol() {
        let catalog = ParameterCatalog::builtin();
        let text = template_csv(catalog, false).unwrap();
        let mut lines = text.lines();
        let header: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(&header[..5], &LOCATION_COLUMNS);
        assert_eq!(header.len(), 5 + catalog.len());
        assert!(header.contains(&"TDS"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_symbols_are_grouped_by_family() {
        let header = "symbol,display_name,unit,family,si,ii,mac,sn,vo,aliases\n";
        let csv = format!(
            "{}pH,pH,,physicochemical,,,,8.5,7,\nMn,Manganese,ppb,metal,,,100,,,\nPb,Lead,ppb,heavy_metal,10,0,10,,,\n",
            header
        );
        let catalog = ParameterCatalog::from_csv(&csv).unwrap();
        let text = template_csv(&catalog, true).unwrap();
        let mut lines = text.lines();
        let columns: Vec<&str> = lines.next().unwrap().split(',').skip(5).collect();
        assert_eq!(columns, vec!["Pb", "Mn", "pH"]);
        let values: Vec<&str> = lines.next().unwrap().split(',').skip(5).collect();
        assert_eq!(values, vec!["3.0", "", "7.4"]);
    }

    #[test]
    fn test_example_row_is_detected_and_processable() {
        let catalog = ParameterCatalog::builtin();
        let text = template_csv(catalog, true).unwrap();
        let dataset = Dataset::from_csv_str(&text).unwrap();
        assert_eq!(dataset.rows.len(), 1);

        let formulas = FormulaSet::seeded(catalog).unwrap();
        let preview =
            wqi_calc::detect::preview(&dataset, &formulas, &EngineConfig::default()).unwrap();
        assert!(preview.can_proceed);
        assert_eq!(
            preview.location_fields.get(&LocationField::StationId).map(String::as_str),
            Some("station_id")
        );
        for kind in FormulaKind::ALL {
            assert!(preview.available_calculations[&kind].available, "{}", kind);
        }
        assert_eq!(preview.valid_rows, 1);
    }
}
