//! Uploads, calculation runs and stored station results.
//!
//! Results are insert-once. Each save creates a new run, so reprocessing an
//! upload keeps every earlier run readable through
//! [`Database::load_run_results`].

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, Transaction};
use wqi_core::error::EngineError;
use wqi_core::formula::{FormulaKind, FormulaSet};
use wqi_core::result::CalculationResult;
use wqi_core::source::ResultStore;
use wqi_utils::dates::timestamp_now;

use crate::models::{CalculationRun, UploadInfo};
use crate::Database;

fn json_column(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn result_from_row(row: &Row) -> rusqlite::Result<CalculationResult> {
    Ok(CalculationResult {
        station_id: row.get(0)?,
        row: row.get::<_, i64>(1)? as usize,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        state: row.get(4)?,
        city: row.get(5)?,
        hpi: row.get(6)?,
        hpi_classification: row.get(7)?,
        mi: row.get(8)?,
        mi_classification: row.get(9)?,
        mi_class: row.get(10)?,
        wqi: row.get(11)?,
        wqi_classification: row.get(12)?,
        hei: row.get(13)?,
        hei_classification: row.get(14)?,
        cdeg: row.get(15)?,
        cdeg_classification: row.get(16)?,
        pig: row.get(17)?,
        pig_classification: row.get(18)?,
        metals_analyzed: json_column(row, 19)?,
        wqi_params_analyzed: json_column(row, 20)?,
    })
}

fn upload_not_found(upload_id: i64) -> anyhow::Error {
    EngineError::NotFound(format!("upload {} not found", upload_id)).into()
}

/// Insert a run of `upload_id` and its results inside `tx`, returning the
/// run id and the result ids in input order.
fn insert_run(
    tx: &Transaction,
    upload_id: i64,
    formulas: &FormulaSet,
    results: &[CalculationResult],
) -> anyhow::Result<(i64, Vec<i64>)> {
    let formula_id = |kind: FormulaKind| formulas.get(kind).and_then(|f| f.id);
    tx.execute(
        "INSERT INTO calculation_runs (upload_id, hpi_formula_id, mi_formula_id, wqi_formula_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            upload_id,
            formula_id(FormulaKind::Hpi),
            formula_id(FormulaKind::Mi),
            formula_id(FormulaKind::Wqi),
            timestamp_now(),
        ],
    )?;
    let run_id = tx.last_insert_rowid();
    let mut ids = Vec::with_capacity(results.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO calculations (
                run_id, position, station_id, row_number, latitude, longitude, state, city,
                hpi, hpi_classification, mi, mi_classification, mi_class,
                wqi, wqi_classification, hei, hei_classification,
                cdeg, cdeg_classification, pig, pig_classification,
                metals_analyzed, wqi_params_analyzed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
        )?;
        for (position, r) in results.iter().enumerate() {
            stmt.execute(params![
                run_id,
                position as i64,
                r.station_id,
                r.row as i64,
                r.latitude,
                r.longitude,
                r.state,
                r.city,
                r.hpi,
                r.hpi_classification,
                r.mi,
                r.mi_classification,
                r.mi_class,
                r.wqi,
                r.wqi_classification,
                r.hei,
                r.hei_classification,
                r.cdeg,
                r.cdeg_classification,
                r.pig,
                r.pig_classification,
                serde_json::to_string(&r.metals_analyzed)?,
                serde_json::to_string(&r.wqi_params_analyzed)?,
            ])?;
            ids.push(tx.last_insert_rowid());
        }
    }
    Ok((run_id, ids))
}

impl Database {
    /// Register an uploaded dataset, returning its id.
    pub fn create_upload(&self, filename: &str, total_rows: usize) -> anyhow::Result<i64> {
        let conn = self.conn.borrow();
        conn.execute(
            "INSERT INTO uploads (filename, total_rows, created_at) VALUES (?1, ?2, ?3)",
            params![filename, total_rows as i64, timestamp_now()],
        )?;
        let id = conn.last_insert_rowid();
        log::info!("[WQI] results: created upload {} for '{}'", id, filename);
        Ok(id)
    }

    /// Register an upload and store its first run in one transaction.
    ///
    /// Returns the upload id and the result ids. A failure leaves neither
    /// the upload nor the run behind.
    pub fn create_upload_with_results(
        &self,
        filename: &str,
        total_rows: usize,
        formulas: &FormulaSet,
        results: &[CalculationResult],
    ) -> anyhow::Result<(i64, Vec<i64>)> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO uploads (filename, total_rows, created_at) VALUES (?1, ?2, ?3)",
            params![filename, total_rows as i64, timestamp_now()],
        )?;
        let upload_id = tx.last_insert_rowid();
        let (run_id, ids) = insert_run(&tx, upload_id, formulas, results)?;
        tx.commit()?;
        log::info!(
            "[WQI] results: created upload {} for '{}' with {} results in run {}",
            upload_id,
            filename,
            ids.len(),
            run_id
        );
        Ok((upload_id, ids))
    }

    pub fn upload_exists(&self, upload_id: i64) -> anyhow::Result<bool> {
        Ok(self.get_upload(upload_id)?.is_some())
    }

    pub fn get_upload(&self, upload_id: i64) -> anyhow::Result<Option<UploadInfo>> {
        let conn = self.conn.borrow();
        let upload = conn
            .query_row(
                "SELECT id, filename, total_rows, created_at FROM uploads WHERE id = ?1",
                params![upload_id],
                |row| {
                    Ok(UploadInfo {
                        id: row.get(0)?,
                        filename: row.get(1)?,
                        total_rows: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(upload)
    }

    /// Runs of an upload, oldest first.
    pub fn list_runs(&self, upload_id: i64) -> anyhow::Result<Vec<CalculationRun>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.upload_id, r.hpi_formula_id, r.mi_formula_id, r.wqi_formula_id, r.created_at,
                    (SELECT COUNT(*) FROM calculations c WHERE c.run_id = r.id) AS result_count
             FROM calculation_runs r
             WHERE r.upload_id = ?1
             ORDER BY r.id",
        )?;
        let rows = stmt
            .query_map(params![upload_id], |row| {
                Ok(CalculationRun {
                    id: row.get(0)?,
                    upload_id: row.get(1)?,
                    hpi_formula_id: row.get(2)?,
                    mi_formula_id: row.get(3)?,
                    wqi_formula_id: row.get(4)?,
                    created_at: row.get(5)?,
                    result_count: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        log::info!(
            "[WQI] query: list_runs returned {} records",
            rows.len()
        );
        Ok(rows)
    }

    /// Results of one run, in insertion order.
    pub fn load_run_results(&self, run_id: i64) -> anyhow::Result<Vec<CalculationResult>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT station_id, row_number, latitude, longitude, state, city,
                    hpi, hpi_classification, mi, mi_classification, mi_class,
                    wqi, wqi_classification, hei, hei_classification,
                    cdeg, cdeg_classification, pig, pig_classification,
                    metals_analyzed, wqi_params_analyzed
             FROM calculations
             WHERE run_id = ?1
             ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![run_id], result_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        log::info!(
            "[WQI] query: load_run_results returned {} records",
            rows.len()
        );
        Ok(rows)
    }

    fn latest_run_id(&self, upload_id: i64) -> anyhow::Result<Option<i64>> {
        let conn = self.conn.borrow();
        let id = conn
            .query_row(
                "SELECT id FROM calculation_runs WHERE upload_id = ?1 ORDER BY id DESC LIMIT 1",
                params![upload_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

impl ResultStore for Database {
    /// Store `results` as a new run of `upload_id` in one transaction.
    fn save_results(
        &self,
        upload_id: i64,
        formulas: &FormulaSet,
        results: &[CalculationResult],
    ) -> anyhow::Result<Vec<i64>> {
        if !self.upload_exists(upload_id)? {
            return Err(upload_not_found(upload_id));
        }
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        let (run_id, ids) = insert_run(&tx, upload_id, formulas, results)?;
        tx.commit()?;
        log::info!(
            "[WQI] results: saved {} results as run {} of upload {}",
            ids.len(),
            run_id,
            upload_id
        );
        Ok(ids)
    }

    /// Results of the latest run; empty when the upload was never processed.
    fn load_results(&self, upload_id: i64) -> anyhow::Result<Vec<CalculationResult>> {
        if !self.upload_exists(upload_id)? {
            return Err(upload_not_found(upload_id));
        }
        match self.latest_run_id(upload_id)? {
            Some(run_id) => self.load_run_results(run_id),
            None => Ok(Vec::new()),
        }
    }
}
