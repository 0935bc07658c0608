use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{EngineError, Result};

/// Embedded CSV data for the built-in parameter catalog (BIS 10500 limits).
pub static CSV_OBJECT: &str = include_str!("../../fixtures/parameters.csv");

/// Broad grouping of a parameter, used for template layout and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterFamily {
    HeavyMetal,
    Metal,
    Physicochemical,
}

impl ParameterFamily {
    pub const ALL: [ParameterFamily; 3] = [
        ParameterFamily::HeavyMetal,
        ParameterFamily::Metal,
        ParameterFamily::Physicochemical,
    ];

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "heavy_metal" => Some(ParameterFamily::HeavyMetal),
            "metal" => Some(ParameterFamily::Metal),
            "physicochemical" => Some(ParameterFamily::Physicochemical),
            _ => None,
        }
    }
}

/// Numeric constants a formula may need for one parameter.
///
/// Metal indices use `Si` (standard permissible limit), `Ii` (ideal value)
/// and `MAC` (maximum allowable concentration); WQI-style indices use `Sn`
/// (standard limit) and `Vo` (ideal value).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterConstants {
    #[serde(rename = "Si", default, skip_serializing_if = "Option::is_none")]
    pub si: Option<f64>,
    #[serde(rename = "Ii", default, skip_serializing_if = "Option::is_none")]
    pub ii: Option<f64>,
    #[serde(rename = "MAC", default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<f64>,
    #[serde(rename = "Sn", default, skip_serializing_if = "Option::is_none")]
    pub sn: Option<f64>,
    #[serde(rename = "Vo", default, skip_serializing_if = "Option::is_none")]
    pub vo: Option<f64>,
}

impl ParameterConstants {
    pub fn has_metal_constants(&self) -> bool {
        self.si.is_some() || self.ii.is_some() || self.mac.is_some()
    }

    pub fn has_wqi_constants(&self) -> bool {
        self.sn.is_some() || self.vo.is_some()
    }
}

/// A chemical or physical parameter as an administrator defines it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub symbol: String,
    pub display_name: String,
    pub constants: ParameterConstants,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// One catalog row: the definition plus how it shows up in spreadsheets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub definition: ParameterDefinition,
    pub family: ParameterFamily,
    /// Extra column-header spellings recognized for this symbol.
    pub aliases: Vec<String>,
}

impl CatalogEntry {
    pub fn symbol(&self) -> &str {
        &self.definition.symbol
    }
}

/// Lookup table from chemical symbol to header aliases and formula constants.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterCatalog {
    entries: Vec<CatalogEntry>,
}

static BUILTIN: OnceLock<ParameterCatalog> = OnceLock::new();

fn parse_constant(raw: Option<&str>, symbol: &str, column: &str) -> Result<Option<f64>> {
    let trimmed = raw.unwrap_or("").trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(EngineError::Input(format!(
            "catalog entry '{}' has a non-numeric {} value '{}'",
            symbol, column, trimmed
        ))),
    }
}

impl ParameterCatalog {
    /// The catalog shipped with the engine.
    ///
    /// Panics if the embedded fixture is malformed; the fixture is covered
    /// by tests.
    pub fn builtin() -> &'static ParameterCatalog {
        BUILTIN.get_or_init(|| {
            ParameterCatalog::from_csv(CSV_OBJECT).expect("builtin parameter catalog")
        })
    }

    /// Parse a catalog from CSV.
    ///
    /// Expected CSV columns (with headers):
    /// `symbol,display_name,unit,family,si,ii,mac,sn,vo,aliases` where
    /// `aliases` is a `|`-separated list.
    pub fn from_csv(csv_object: &str) -> Result<ParameterCatalog> {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut rdr = ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_object.as_bytes());
        for row in rdr.records() {
            let record = row?;
            let symbol = record.get(0).unwrap_or("").trim().to_string();
            if symbol.is_empty() {
                return Err(EngineError::Input(
                    "catalog row without a symbol".to_string(),
                ));
            }
            if entries.iter().any(|e| e.symbol() == symbol) {
                return Err(EngineError::Input(format!(
                    "duplicate catalog symbol '{}'",
                    symbol
                )));
            }
            let display_name = match record.get(1).map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => symbol.clone(),
            };
            let unit = record
                .get(2)
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from);
            let family_raw = record.get(3).unwrap_or("");
            let family = ParameterFamily::parse(family_raw).ok_or_else(|| {
                EngineError::Input(format!(
                    "catalog entry '{}' has unknown family '{}'",
                    symbol, family_raw
                ))
            })?;
            let constants = ParameterConstants {
                si: parse_constant(record.get(4), &symbol, "Si")?,
                ii: parse_constant(record.get(5), &symbol, "Ii")?,
                mac: parse_constant(record.get(6), &symbol, "MAC")?,
                sn: parse_constant(record.get(7), &symbol, "Sn")?,
                vo: parse_constant(record.get(8), &symbol, "Vo")?,
            };
            let mismatched = match family {
                ParameterFamily::HeavyMetal | ParameterFamily::Metal => {
                    constants.has_wqi_constants()
                }
                ParameterFamily::Physicochemical => constants.has_metal_constants(),
            };
            if mismatched {
                return Err(EngineError::Input(format!(
                    "catalog entry '{}' carries constants that do not fit family '{}'",
                    symbol,
                    family_raw.trim()
                )));
            }
            let aliases = record
                .get(9)
                .unwrap_or("")
                .split('|')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
            entries.push(CatalogEntry {
                definition: ParameterDefinition {
                    symbol,
                    display_name,
                    constants,
                    unit,
                },
                family,
                aliases,
            });
        }
        log::debug!("[WQI] catalog: parsed {} parameters", entries.len());
        Ok(ParameterCatalog { entries })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by symbol: exact match first, then case-insensitive.
    ///
    /// The exact pass matters for pairs that only differ in case.
    pub fn find(&self, symbol: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.symbol() == symbol)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.symbol().eq_ignore_ascii_case(symbol))
            })
    }

    /// Every spelling a column header may use for `symbol`: the symbol
    /// itself, then (for catalog symbols) the display name and aliases.
    pub fn header_candidates<'a>(&'a self, symbol: &'a str) -> Vec<&'a str> {
        let mut candidates = vec![symbol];
        if let Some(entry) = self.find(symbol) {
            candidates.push(entry.definition.display_name.as_str());
            candidates.extend(entry.aliases.iter().map(String::as_str));
        }
        candidates
    }

    pub fn symbols_in_family(&self, family: ParameterFamily) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.family == family)
            .map(CatalogEntry::symbol)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = ParameterCatalog::builtin();
        assert_eq!(catalog.len(), 20);
        let fe = catalog.find("Fe").expect("iron should be in the catalog");
        assert_eq!(fe.definition.display_name, "Iron");
        assert_eq!(fe.definition.constants.si, Some(1000.0));
        assert_eq!(fe.definition.constants.ii, Some(300.0));
        assert_eq!(fe.family, ParameterFamily::HeavyMetal);
    }

    #[test]
    fn test_builtin_catalog_symbols_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in ParameterCatalog::builtin().entries() {
            assert!(
                seen.insert(entry.symbol().to_lowercase()),
                "duplicate symbol '{}' in catalog",
                entry.symbol()
            );
        }
    }

    #[test]
    fn test_builtin_constants_are_consistent_with_family() {
        for entry in ParameterCatalog::builtin().entries() {
            let c = &entry.definition.constants;
            match entry.family {
                ParameterFamily::HeavyMetal | ParameterFamily::Metal => {
                    assert!(c.mac.is_some(), "metal '{}' needs MAC", entry.symbol());
                    assert!(!c.has_wqi_constants(), "metal '{}' has WQI constants", entry.symbol());
                }
                ParameterFamily::Physicochemical => {
                    assert!(c.sn.is_some() && c.vo.is_some(), "'{}' needs Sn and Vo", entry.symbol());
                    assert!(!c.has_metal_constants(), "'{}' has metal constants", entry.symbol());
                }
            }
        }
    }

    #[test]
    fn test_find_is_case_insensitive_fallback() {
        let catalog = ParameterCatalog::builtin();
        assert_eq!(catalog.find("ph").map(|e| e.symbol()), Some("pH"));
        assert_eq!(catalog.find("TDS").map(|e| e.symbol()), Some("TDS"));
        assert!(catalog.find("Xx").is_none());
    }

    #[test]
    fn test_header_candidates_include_aliases() {
        let catalog = ParameterCatalog::builtin();
        let candidates = catalog.header_candidates("SO4");
        assert!(candidates.contains(&"SO4"));
        assert!(candidates.contains(&"Sulphate"));
        assert!(candidates.contains(&"sulfate"));
        // Unknown symbols only match themselves.
        assert_eq!(catalog.header_candidates("Xyz"), vec!["Xyz"]);
    }

    #[test]
    fn test_symbols_in_family() {
        let catalog = ParameterCatalog::builtin();
        let heavy = catalog.symbols_in_family(ParameterFamily::HeavyMetal);
        assert_eq!(heavy.len(), 9);
        assert!(heavy.contains(&"Pb"));
        assert_eq!(catalog.symbols_in_family(ParameterFamily::Metal), vec!["Mn"]);
    }

    #[test]
    fn test_from_csv_rejects_bad_constant() {
        let csv = "symbol,display_name,unit,family,si,ii,mac,sn,vo,aliases\nFe,Iron,ppb,heavy_metal,abc,,,,,\n";
        let err = ParameterCatalog::from_csv(csv).unwrap_err();
        assert!(err.to_string().contains("non-numeric Si"));
    }

    #[test]
    fn test_from_csv_rejects_constants_of_the_other_family() {
        let header = "symbol,display_name,unit,family,si,ii,mac,sn,vo,aliases\n";
        let metal_with_sn = format!("{}Pb,Lead,ppb,heavy_metal,10,0,10,5,,\n", header);
        let err = ParameterCatalog::from_csv(&metal_with_sn).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Input);
        assert!(err.to_string().contains("'Pb'"), "{}", err);

        let ph_with_mac = format!("{}pH,pH,,physicochemical,,,1,8.5,7,\n", header);
        assert!(ParameterCatalog::from_csv(&ph_with_mac).is_err());

        let fine = format!("{}Mn,Manganese,ppb,metal,,,100,,,\n", header);
        assert_eq!(ParameterCatalog::from_csv(&fine).unwrap().len(), 1);
    }

    #[test]
    fn test_from_csv_rejects_unknown_family() {
        let csv = "symbol,display_name,unit,family,si,ii,mac,sn,vo,aliases\nFe,Iron,ppb,rock,1,,,,,\n";
        assert!(ParameterCatalog::from_csv(csv).is_err());
    }

    #[test]
    fn test_from_csv_defaults_display_name_to_symbol() {
        let csv = "symbol,display_name,unit,family,si,ii,mac,sn,vo,aliases\nBa,,ppb,metal,,,700,,,\n";
        let catalog = ParameterCatalog::from_csv(csv).unwrap();
        let ba = catalog.find("Ba").unwrap();
        assert_eq!(ba.definition.display_name, "Ba");
        assert!(ba.aliases.is_empty());
        assert_eq!(ba.definition.constants.mac, Some(700.0));
    }
}
