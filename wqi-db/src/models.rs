//! Row model structs for repository listings.
//!
//! All structs derive `Serialize` so the command layer can print them as
//! JSON.

use serde::Serialize;
use wqi_core::formula::FormulaKind;

/// Listing entry for a stored formula (documents are loaded separately).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FormulaRecord {
    pub id: i64,
    pub name: String,
    pub kind: FormulaKind,
    pub version: String,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored formula plus the non-fatal problems found while validating it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SavedFormula {
    pub id: i64,
    pub warnings: Vec<String>,
}

/// An uploaded dataset.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadInfo {
    pub id: i64,
    pub filename: String,
    pub total_rows: i64,
    pub created_at: String,
}

/// One processing of an upload.
///
/// Reprocessing adds a run; earlier runs and their results stay untouched.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalculationRun {
    pub id: i64,
    pub upload_id: i64,
    pub hpi_formula_id: Option<i64>,
    pub mi_formula_id: Option<i64>,
    pub wqi_formula_id: Option<i64>,
    pub created_at: String,
    /// Number of station results stored for this run.
    pub result_count: i64,
}
