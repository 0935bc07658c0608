//! Versioned index formulas.
//!
//! A formula's parameter constants depend on its type, so the parameter set
//! is a tagged union ([`FormulaDefinition`]). Admin-authored documents
//! ([`FormulaDocument`]) carry loose per-parameter constants and are only
//! turned into a [`Formula`] through validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::classification::ClassificationConfig;
use crate::error::{EngineError, Result};
use crate::parameter::{ParameterCatalog, ParameterConstants};

/// The index families a formula can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormulaKind {
    Hpi,
    Mi,
    Wqi,
}

impl FormulaKind {
    pub const ALL: [FormulaKind; 3] = [FormulaKind::Hpi, FormulaKind::Mi, FormulaKind::Wqi];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaKind::Hpi => "hpi",
            FormulaKind::Mi => "mi",
            FormulaKind::Wqi => "wqi",
        }
    }
}

impl fmt::Display for FormulaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FormulaKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hpi" => Ok(FormulaKind::Hpi),
            "mi" => Ok(FormulaKind::Mi),
            "wqi" => Ok(FormulaKind::Wqi),
            other => Err(EngineError::Validation(format!(
                "unknown formula type '{}'",
                other
            ))),
        }
    }
}

/// HPI constants: standard permissible limit and ideal value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HpiConstants {
    #[serde(rename = "Si")]
    pub si: f64,
    #[serde(rename = "Ii")]
    pub ii: f64,
}

/// MI constant: maximum allowable concentration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MiConstants {
    #[serde(rename = "MAC")]
    pub mac: f64,
}

/// WQI constants: standard limit and ideal value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WqiConstants {
    #[serde(rename = "Sn")]
    pub sn: f64,
    #[serde(rename = "Vo")]
    pub vo: f64,
}

/// Strongly typed parameter set, selected by the formula type.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaDefinition {
    Hpi {
        parameters: BTreeMap<String, HpiConstants>,
    },
    Mi {
        parameters: BTreeMap<String, MiConstants>,
        /// Bands producing the ordinal `Class I`..`Class VI` label.
        class_bands: ClassificationConfig,
    },
    Wqi {
        parameters: BTreeMap<String, WqiConstants>,
    },
}

impl FormulaDefinition {
    pub fn kind(&self) -> FormulaKind {
        match self {
            FormulaDefinition::Hpi { .. } => FormulaKind::Hpi,
            FormulaDefinition::Mi { .. } => FormulaKind::Mi,
            FormulaDefinition::Wqi { .. } => FormulaKind::Wqi,
        }
    }

    /// Parameter symbols in their stored (sorted) order.
    pub fn symbols(&self) -> Vec<&str> {
        match self {
            FormulaDefinition::Hpi { parameters } => parameters.keys().map(String::as_str).collect(),
            FormulaDefinition::Mi { parameters, .. } => {
                parameters.keys().map(String::as_str).collect()
            }
            FormulaDefinition::Wqi { parameters } => parameters.keys().map(String::as_str).collect(),
        }
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            FormulaDefinition::Hpi { parameters } => parameters.len(),
            FormulaDefinition::Mi { parameters, .. } => parameters.len(),
            FormulaDefinition::Wqi { parameters } => parameters.len(),
        }
    }
}

/// A validated formula as the engine consumes it.
///
/// Serializes to, and deserializes through, [`FormulaDocument`], so a
/// `Formula` read from JSON has always passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FormulaDocument", into = "FormulaDocument")]
pub struct Formula {
    /// Repository id; `None` until persisted.
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub definition: FormulaDefinition,
    pub classification: ClassificationConfig,
    pub is_default: bool,
    pub is_active: bool,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_true() -> bool {
    true
}

/// Formula as authored in the admin editor and stored by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FormulaKind,
    #[serde(default = "default_version")]
    pub version: String,
    pub parameters: BTreeMap<String, ParameterConstants>,
    pub classification: ClassificationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_bands: Option<ClassificationConfig>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl FormulaDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn require(value: Option<f64>, symbol: &str, name: &str, kind: FormulaKind) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(EngineError::Validation(format!(
            "parameter '{}' has a non-finite {} constant",
            symbol, name
        ))),
        None => Err(EngineError::Validation(format!(
            "{} parameter '{}' is missing its {} constant",
            kind, symbol, name
        ))),
    }
}

fn reject(value: Option<f64>, symbol: &str, name: &str, kind: FormulaKind) -> Result<()> {
    if value.is_some() {
        return Err(EngineError::Validation(format!(
            "{} parameter '{}' carries a {} constant, which belongs to a different index type",
            kind, symbol, name
        )));
    }
    Ok(())
}

fn positive(value: f64, symbol: &str, name: &str) -> Result<f64> {
    if value <= 0.0 {
        return Err(EngineError::Validation(format!(
            "parameter '{}' needs a positive {} constant, got {}",
            symbol, name, value
        )));
    }
    Ok(value)
}

impl TryFrom<FormulaDocument> for Formula {
    type Error = EngineError;

    fn try_from(doc: FormulaDocument) -> Result<Self> {
        let kind = doc.kind;
        if doc.name.trim().is_empty() {
            return Err(EngineError::Validation("formula name is empty".to_string()));
        }
        if doc.parameters.is_empty() {
            return Err(EngineError::Validation(format!(
                "{} formula '{}' has no parameters",
                kind, doc.name
            )));
        }
        if let Some(symbol) = doc.parameters.keys().find(|s| s.trim().is_empty()) {
            return Err(EngineError::Validation(format!(
                "parameter symbol '{}' is blank",
                symbol
            )));
        }
        doc.classification.validate()?;

        let definition = match kind {
            FormulaKind::Hpi => {
                if doc.class_bands.is_some() {
                    return Err(EngineError::Validation(
                        "class_bands only apply to mi formulas".to_string(),
                    ));
                }
                let mut parameters = BTreeMap::new();
                for (symbol, c) in &doc.parameters {
                    reject(c.sn, symbol, "Sn", kind)?;
                    reject(c.vo, symbol, "Vo", kind)?;
                    let si = positive(require(c.si, symbol, "Si", kind)?, symbol, "Si")?;
                    let ii = require(c.ii, symbol, "Ii", kind)?;
                    parameters.insert(symbol.clone(), HpiConstants { si, ii });
                }
                FormulaDefinition::Hpi { parameters }
            }
            FormulaKind::Mi => {
                let mut parameters = BTreeMap::new();
                for (symbol, c) in &doc.parameters {
                    reject(c.sn, symbol, "Sn", kind)?;
                    reject(c.vo, symbol, "Vo", kind)?;
                    let mac = positive(require(c.mac, symbol, "MAC", kind)?, symbol, "MAC")?;
                    parameters.insert(symbol.clone(), MiConstants { mac });
                }
                let class_bands = doc
                    .class_bands
                    .clone()
                    .unwrap_or_else(ClassificationConfig::mi_class_default);
                class_bands.validate()?;
                FormulaDefinition::Mi {
                    parameters,
                    class_bands,
                }
            }
            FormulaKind::Wqi => {
                if doc.class_bands.is_some() {
                    return Err(EngineError::Validation(
                        "class_bands only apply to mi formulas".to_string(),
                    ));
                }
                let mut parameters = BTreeMap::new();
                for (symbol, c) in &doc.parameters {
                    reject(c.si, symbol, "Si", kind)?;
                    reject(c.ii, symbol, "Ii", kind)?;
                    reject(c.mac, symbol, "MAC", kind)?;
                    let sn = positive(require(c.sn, symbol, "Sn", kind)?, symbol, "Sn")?;
                    let vo = require(c.vo, symbol, "Vo", kind)?;
                    parameters.insert(symbol.clone(), WqiConstants { sn, vo });
                }
                FormulaDefinition::Wqi { parameters }
            }
        };

        Ok(Formula {
            id: doc.id,
            name: doc.name.trim().to_string(),
            version: doc.version,
            definition,
            classification: doc.classification,
            is_default: doc.is_default,
            is_active: doc.is_active,
        })
    }
}

impl From<Formula> for FormulaDocument {
    fn from(formula: Formula) -> Self {
        let kind = formula.kind();
        let mut class_bands = None;
        let parameters = match formula.definition {
            FormulaDefinition::Hpi { parameters } => parameters
                .into_iter()
                .map(|(s, c)| {
                    let constants = ParameterConstants {
                        si: Some(c.si),
                        ii: Some(c.ii),
                        ..Default::default()
                    };
                    (s, constants)
                })
                .collect(),
            FormulaDefinition::Mi {
                parameters,
                class_bands: bands,
            } => {
                class_bands = Some(bands);
                parameters
                    .into_iter()
                    .map(|(s, c)| {
                        let constants = ParameterConstants {
                            mac: Some(c.mac),
                            ..Default::default()
                        };
                        (s, constants)
                    })
                    .collect()
            }
            FormulaDefinition::Wqi { parameters } => parameters
                .into_iter()
                .map(|(s, c)| {
                    let constants = ParameterConstants {
                        sn: Some(c.sn),
                        vo: Some(c.vo),
                        ..Default::default()
                    };
                    (s, constants)
                })
                .collect(),
        };
        FormulaDocument {
            id: formula.id,
            name: formula.name,
            kind,
            version: formula.version,
            parameters,
            classification: formula.classification,
            class_bands,
            is_default: formula.is_default,
            is_active: formula.is_active,
        }
    }
}

impl Formula {
    pub fn from_json(json: &str) -> Result<Self> {
        Formula::try_from(FormulaDocument::from_json(json)?)
    }

    pub fn kind(&self) -> FormulaKind {
        self.definition.kind()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.definition.symbols()
    }

    pub fn to_document(&self) -> FormulaDocument {
        FormulaDocument::from(self.clone())
    }

    /// Non-fatal problems worth showing to the formula author.
    pub fn validation_warnings(&self) -> Vec<String> {
        let mut warnings = self.classification.validate().unwrap_or_default();
        match &self.definition {
            FormulaDefinition::Hpi { parameters } => {
                for (symbol, c) in parameters {
                    if c.si == c.ii {
                        warnings.push(format!(
                            "parameter '{}' has Si equal to Ii and will never contribute to HPI",
                            symbol
                        ));
                    }
                }
            }
            FormulaDefinition::Mi { class_bands, .. } => {
                warnings.extend(
                    class_bands
                        .validate()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|w| format!("class bands: {}", w)),
                );
            }
            FormulaDefinition::Wqi { parameters } => {
                for (symbol, c) in parameters {
                    if c.sn == c.vo {
                        warnings.push(format!(
                            "parameter '{}' has Sn equal to Vo and will never contribute to WQI",
                            symbol
                        ));
                    }
                }
            }
        }
        warnings
    }

    /// Standard formula of `kind` built from every catalog entry carrying
    /// the constants that kind needs.
    pub fn seed(kind: FormulaKind, catalog: &ParameterCatalog) -> Result<Formula> {
        let mut parameters = BTreeMap::new();
        for entry in catalog.entries() {
            let c = entry.definition.constants;
            let selected = match kind {
                FormulaKind::Hpi => c.si.is_some() && c.ii.is_some(),
                FormulaKind::Mi => c.mac.is_some(),
                FormulaKind::Wqi => c.sn.is_some() && c.vo.is_some(),
            };
            if !selected {
                continue;
            }
            let constants = match kind {
                FormulaKind::Hpi => ParameterConstants {
                    si: c.si,
                    ii: c.ii,
                    ..Default::default()
                },
                FormulaKind::Mi => ParameterConstants {
                    mac: c.mac,
                    ..Default::default()
                },
                FormulaKind::Wqi => ParameterConstants {
                    sn: c.sn,
                    vo: c.vo,
                    ..Default::default()
                },
            };
            parameters.insert(entry.symbol().to_string(), constants);
        }
        let (name, classification, class_bands) = match kind {
            FormulaKind::Hpi => ("Standard HPI", ClassificationConfig::hpi_default(), None),
            FormulaKind::Mi => (
                "Standard MI",
                ClassificationConfig::mi_default(),
                Some(ClassificationConfig::mi_class_default()),
            ),
            FormulaKind::Wqi => ("Standard WQI", ClassificationConfig::wqi_default(), None),
        };
        Formula::try_from(FormulaDocument {
            id: None,
            name: name.to_string(),
            kind,
            version: default_version(),
            parameters,
            classification,
            class_bands,
            is_default: true,
            is_active: true,
        })
    }
}

/// At most one formula per type, taken once per processing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormulaSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpi: Option<Formula>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mi: Option<Formula>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wqi: Option<Formula>,
}

impl FormulaSet {
    /// The three standard formulas built from `catalog`.
    pub fn seeded(catalog: &ParameterCatalog) -> Result<FormulaSet> {
        let mut set = FormulaSet::default();
        for kind in FormulaKind::ALL {
            set.insert(Formula::seed(kind, catalog)?);
        }
        Ok(set)
    }

    pub fn get(&self, kind: FormulaKind) -> Option<&Formula> {
        match kind {
            FormulaKind::Hpi => self.hpi.as_ref(),
            FormulaKind::Mi => self.mi.as_ref(),
            FormulaKind::Wqi => self.wqi.as_ref(),
        }
    }

    /// Place `formula` in the slot of its type, returning the previous one.
    pub fn insert(&mut self, formula: Formula) -> Option<Formula> {
        let slot = match formula.kind() {
            FormulaKind::Hpi => &mut self.hpi,
            FormulaKind::Mi => &mut self.mi,
            FormulaKind::Wqi => &mut self.wqi,
        };
        slot.replace(formula)
    }

    pub fn is_empty(&self) -> bool {
        self.hpi.is_none() && self.mi.is_none() && self.wqi.is_none()
    }

    /// Formulas present, in HPI, MI, WQI order.
    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        [self.hpi.as_ref(), self.mi.as_ref(), self.wqi.as_ref()]
            .into_iter()
            .flatten()
    }
}
