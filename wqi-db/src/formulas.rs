//! Formula repository: versioned formula documents with a single default
//! per type.
//!
//! Writes validate the document by converting it into a
//! [`Formula`] before anything touches the table, so stored rows always
//! parse back. Deletion is soft; deleted formulas are invisible to every
//! read.

use rusqlite::{params, OptionalExtension, Row, Transaction};
use wqi_core::classification::ClassificationConfig;
use wqi_core::error::EngineError;
use wqi_core::formula::{Formula, FormulaDocument, FormulaKind, FormulaSet};
use wqi_core::parameter::ParameterConstants;
use wqi_core::source::FormulaSource;
use wqi_utils::dates::timestamp_now;
use std::collections::BTreeMap;

use crate::models::{FormulaRecord, SavedFormula};
use crate::Database;

const FORMULA_COLUMNS: &str = "id, name, kind, version, parameters, classification, class_bands, is_default, is_active";

/// A formula row before its JSON columns are decoded.
struct StoredFormula {
    id: i64,
    name: String,
    kind: String,
    version: String,
    parameters: String,
    classification: String,
    class_bands: Option<String>,
    is_default: bool,
    is_active: bool,
}

impl StoredFormula {
    fn from_row(row: &Row) -> rusqlite::Result<StoredFormula> {
        Ok(StoredFormula {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            version: row.get(3)?,
            parameters: row.get(4)?,
            classification: row.get(5)?,
            class_bands: row.get(6)?,
            is_default: row.get(7)?,
            is_active: row.get(8)?,
        })
    }

    fn into_formula(self) -> anyhow::Result<Formula> {
        let parameters: BTreeMap<String, ParameterConstants> = serde_json::from_str(&self.parameters)?;
        let classification: ClassificationConfig = serde_json::from_str(&self.classification)?;
        let class_bands = match self.class_bands {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };
        let doc = FormulaDocument {
            id: Some(self.id),
            name: self.name,
            kind: self.kind.parse()?,
            version: self.version,
            parameters,
            classification,
            class_bands,
            is_default: self.is_default,
            is_active: self.is_active,
        };
        Ok(Formula::try_from(doc)?)
    }
}

fn not_found(id: i64) -> anyhow::Error {
    EngineError::NotFound(format!("formula {} not found", id)).into()
}

/// Validate `doc` and insert it inside `tx`, returning the new id and the
/// document's validation warnings.
///
/// A document flagged `is_default` takes over the default slot of its type.
pub(crate) fn insert_formula(
    tx: &Transaction,
    doc: FormulaDocument,
) -> anyhow::Result<SavedFormula> {
    let formula = Formula::try_from(doc)?;
    let warnings = formula.validation_warnings();
    let doc = formula.to_document();
    if doc.is_default && !doc.is_active {
        return Err(EngineError::Validation(
            "an inactive formula cannot be the default".to_string(),
        )
        .into());
    }
    if doc.is_default {
        tx.execute(
            "UPDATE formulas SET is_default = 0 WHERE kind = ?1 AND is_default = 1",
            params![doc.kind.as_str()],
        )?;
    }
    tx.execute(
        "INSERT INTO formulas (name, kind, version, parameters, classification, class_bands,
                               is_default, is_active, is_deleted, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)",
        params![
            doc.name,
            doc.kind.as_str(),
            doc.version,
            serde_json::to_string(&doc.parameters)?,
            serde_json::to_string(&doc.classification)?,
            doc.class_bands.as_ref().map(serde_json::to_string).transpose()?,
            doc.is_default,
            doc.is_active,
            timestamp_now(),
        ],
    )?;
    let id = tx.last_insert_rowid();
    log::info!(
        "[WQI] formulas: created {} formula {} '{}' (default = {})",
        doc.kind,
        id,
        doc.name,
        doc.is_default
    );
    log_warnings(id, &warnings);
    Ok(SavedFormula { id, warnings })
}

fn log_warnings(id: i64, warnings: &[String]) {
    for warning in warnings {
        log::warn!("[WQI] formulas: formula {}: {}", id, warning);
    }
}

impl Database {
    /// Validate and store a new formula, returning its id.
    ///
    /// Validation warnings are logged; [`Database::import_formulas_json`]
    /// returns them to the caller.
    pub fn create_formula(&self, doc: FormulaDocument) -> anyhow::Result<i64> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        let saved = insert_formula(&tx, doc)?;
        tx.commit()?;
        Ok(saved.id)
    }

    /// Replace the content of formula `id`.
    ///
    /// The type cannot change. Setting `is_default` moves the default slot
    /// here; clearing `is_active` also clears `is_default`. Returns the
    /// document's validation warnings.
    pub fn update_formula(&self, id: i64, doc: FormulaDocument) -> anyhow::Result<Vec<String>> {
        let formula = Formula::try_from(doc)?;
        let warnings = formula.validation_warnings();
        let doc = formula.to_document();
        let now = timestamp_now();
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        let kind: Option<String> = tx
            .query_row(
                "SELECT kind FROM formulas WHERE id = ?1 AND is_deleted = 0",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(kind) = kind else {
            return Err(not_found(id));
        };
        if kind != doc.kind.as_str() {
            return Err(EngineError::Validation(format!(
                "formula {} is a {} formula and cannot become {}",
                id, kind, doc.kind
            ))
            .into());
        }
        let is_default = doc.is_default && doc.is_active;
        if is_default {
            tx.execute(
                "UPDATE formulas SET is_default = 0 WHERE kind = ?1 AND is_default = 1 AND id != ?2",
                params![kind, id],
            )?;
        }
        tx.execute(
            "UPDATE formulas
             SET name = ?1, version = ?2, parameters = ?3, classification = ?4, class_bands = ?5,
                 is_default = ?6, is_active = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                doc.name,
                doc.version,
                serde_json::to_string(&doc.parameters)?,
                serde_json::to_string(&doc.classification)?,
                doc.class_bands.as_ref().map(serde_json::to_string).transpose()?,
                is_default,
                doc.is_active,
                now,
                id,
            ],
        )?;
        tx.commit()?;
        log::info!("[WQI] formulas: updated formula {} to version {}", id, doc.version);
        log_warnings(id, &warnings);
        Ok(warnings)
    }

    /// Copy formula `id` under a new name. The copy is never the default.
    pub fn duplicate_formula(&self, id: i64, new_name: Option<&str>) -> anyhow::Result<i64> {
        let formula = self.formula_by_id(id)?.ok_or_else(|| not_found(id))?;
        let mut doc = formula.to_document();
        doc.id = None;
        doc.name = match new_name {
            Some(name) => name.to_string(),
            None => format!("{} (copy)", doc.name),
        };
        doc.is_default = false;
        doc.is_active = true;
        self.create_formula(doc)
    }

    /// Make formula `id` the default of its type, clearing the previous
    /// default in the same transaction.
    pub fn set_default(&self, id: i64) -> anyhow::Result<()> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        let row: Option<(String, bool)> = tx
            .query_row(
                "SELECT kind, is_active FROM formulas WHERE id = ?1 AND is_deleted = 0",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((kind, is_active)) = row else {
            return Err(not_found(id));
        };
        if !is_active {
            return Err(EngineError::Validation(format!(
                "formula {} is inactive and cannot be the default",
                id
            ))
            .into());
        }
        tx.execute(
            "UPDATE formulas SET is_default = 0 WHERE kind = ?1 AND is_default = 1",
            params![kind],
        )?;
        tx.execute(
            "UPDATE formulas SET is_default = 1, updated_at = ?1 WHERE id = ?2",
            params![timestamp_now(), id],
        )?;
        tx.commit()?;
        log::info!("[WQI] formulas: formula {} is now the default {} formula", id, kind);
        Ok(())
    }

    /// Stop offering formula `id`; it also loses the default flag.
    pub fn deactivate_formula(&self, id: i64) -> anyhow::Result<()> {
        let conn = self.conn.borrow();
        let changed = conn.execute(
            "UPDATE formulas SET is_active = 0, is_default = 0, updated_at = ?1
             WHERE id = ?2 AND is_deleted = 0",
            params![timestamp_now(), id],
        )?;
        if changed == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Soft-delete formula `id`. Calculation runs keep referring to it.
    pub fn delete_formula(&self, id: i64) -> anyhow::Result<()> {
        let conn = self.conn.borrow();
        let changed = conn.execute(
            "UPDATE formulas SET is_deleted = 1, is_active = 0, is_default = 0, updated_at = ?1
             WHERE id = ?2 AND is_deleted = 0",
            params![timestamp_now(), id],
        )?;
        if changed == 0 {
            return Err(not_found(id));
        }
        log::info!("[WQI] formulas: deleted formula {}", id);
        Ok(())
    }

    /// Non-deleted formulas, optionally of one type, ordered by type then id.
    pub fn list_formulas(&self, kind: Option<FormulaKind>) -> anyhow::Result<Vec<FormulaRecord>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT id, name, kind, version, is_default, is_active, created_at, updated_at
             FROM formulas
             WHERE is_deleted = 0 AND (?1 IS NULL OR kind = ?1)
             ORDER BY kind, id",
        )?;
        let raw = stmt
            .query_map(params![kind.map(|k| k.as_str())], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, bool>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut records = Vec::with_capacity(raw.len());
        for (id, name, kind, version, is_default, is_active, created_at, updated_at) in raw {
            records.push(FormulaRecord {
                id,
                name,
                kind: kind.parse()?,
                version,
                is_default,
                is_active,
                created_at,
                updated_at,
            });
        }
        log::info!(
            "[WQI] query: list_formulas returned {} records",
            records.len()
        );
        Ok(records)
    }

    /// Whether any non-deleted formula of `kind` exists.
    pub fn has_formula(&self, kind: FormulaKind) -> anyhow::Result<bool> {
        let conn = self.conn.borrow();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM formulas WHERE kind = ?1 AND is_deleted = 0",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn query_active_formula(conn: &rusqlite::Connection, kind: FormulaKind) -> anyhow::Result<Option<Formula>> {
        let sql = format!(
            "SELECT {} FROM formulas
             WHERE kind = ?1 AND is_active = 1 AND is_deleted = 0
             ORDER BY is_default DESC, updated_at DESC, id DESC
             LIMIT 1",
            FORMULA_COLUMNS
        );
        let stored = conn
            .query_row(&sql, params![kind.as_str()], StoredFormula::from_row)
            .optional()?;
        stored.map(StoredFormula::into_formula).transpose()
    }
}

impl FormulaSource for Database {
    /// The default formula of `kind`, or the most recently updated active
    /// one when no default is set.
    fn active_formula(&self, kind: FormulaKind) -> anyhow::Result<Option<Formula>> {
        let conn = self.conn.borrow();
        Database::query_active_formula(&conn, kind)
    }

    fn formula_by_id(&self, id: i64) -> anyhow::Result<Option<Formula>> {
        let conn = self.conn.borrow();
        let sql = format!(
            "SELECT {} FROM formulas WHERE id = ?1 AND is_deleted = 0",
            FORMULA_COLUMNS
        );
        let stored = conn
            .query_row(&sql, params![id], StoredFormula::from_row)
            .optional()?;
        stored.map(StoredFormula::into_formula).transpose()
    }

    /// All three types read inside one transaction.
    fn snapshot(&self) -> anyhow::Result<FormulaSet> {
        let conn = self.conn.borrow();
        let tx = conn.unchecked_transaction()?;
        let mut set = FormulaSet::default();
        for kind in FormulaKind::ALL {
            if let Some(formula) = Database::query_active_formula(&tx, kind)? {
                set.insert(formula);
            }
        }
        tx.commit()?;
        log::info!(
            "[WQI] formulas: snapshot with {} formulas",
            set.iter().count()
        );
        Ok(set)
    }
}
