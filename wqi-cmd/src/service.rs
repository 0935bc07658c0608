//! Host-facing operations: preview, calculate, reprocess and stats.
//!
//! Every function returns [`wqi_core::Result`] so a host can map
//! [`EngineError::kind`] to a response status. Storage failures arrive as
//! `anyhow::Error` and are recovered with [`EngineError::from_storage`].

use serde::{Deserialize, Serialize};
use wqi_calc::detect::{preview, DatasetPreview};
use wqi_calc::processor::{process, ProcessingOutcome};
use wqi_calc::report::{aggregate, ReportData, ReportFilter};
use wqi_core::config::EngineConfig;
use wqi_core::error::{EngineError, Result};
use wqi_core::formula::FormulaSet;
use wqi_core::result::{CalculationResult, RowError};
use wqi_core::source::{FormulaSource, ResultStore};
use wqi_core::station::Dataset;
use wqi_db::Database;

/// Outcome of calculating (or reprocessing) an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub upload_id: i64,
    pub total_stations: usize,
    pub processed_stations: usize,
    pub failed_stations: usize,
    pub calculations: Vec<CalculationResult>,
    pub errors: Vec<RowError>,
}

fn snapshot<S: FormulaSource + ?Sized>(source: &S) -> Result<FormulaSet> {
    source.snapshot().map_err(EngineError::from_storage)
}

/// Column detection and feasibility for `dataset` against the active
/// formulas of `source`.
pub fn preview_dataset<S: FormulaSource + ?Sized>(
    dataset: &Dataset,
    source: &S,
    config: &EngineConfig,
) -> Result<DatasetPreview> {
    let formulas = snapshot(source)?;
    preview(dataset, &formulas, config)
}

fn respond(upload_id: i64, outcome: ProcessingOutcome) -> CalculateResponse {
    log::info!(
        "[WQI] service: upload {} processed {}/{} stations",
        upload_id,
        outcome.processed,
        outcome.total
    );
    CalculateResponse {
        upload_id,
        total_stations: outcome.total,
        processed_stations: outcome.processed,
        failed_stations: outcome.failed,
        calculations: outcome.calculations,
        errors: outcome.errors,
    }
}

/// Register `dataset` as a new upload, process it and store the results as
/// its first run.
///
/// Processing happens before the upload is registered, so a dataset that
/// cannot be processed at all leaves no upload behind. The upload and its
/// run are written in one transaction.
pub fn calculate_upload(
    db: &Database,
    filename: &str,
    dataset: &Dataset,
    config: &EngineConfig,
) -> Result<CalculateResponse> {
    config.validate()?;
    let formulas = snapshot(db)?;
    let outcome = process(dataset, &formulas, config)?;
    let (upload_id, _) = db
        .create_upload_with_results(filename, dataset.rows.len(), &formulas, &outcome.calculations)
        .map_err(EngineError::from_storage)?;
    log::debug!("[WQI] service: registered '{}' as upload {}", filename, upload_id);
    Ok(respond(upload_id, outcome))
}

/// Process an existing upload again with the current formulas, adding a new
/// run. Earlier runs are kept.
pub fn reprocess_upload(
    db: &Database,
    upload_id: i64,
    dataset: &Dataset,
    config: &EngineConfig,
) -> Result<CalculateResponse> {
    config.validate()?;
    if !db.upload_exists(upload_id).map_err(EngineError::from_storage)? {
        return Err(EngineError::NotFound(format!(
            "Upload {} not found",
            upload_id
        )));
    }
    let formulas = snapshot(db)?;
    let outcome = process(dataset, &formulas, config)?;
    db.save_results(upload_id, &formulas, &outcome.calculations)
        .map_err(EngineError::from_storage)?;
    Ok(respond(upload_id, outcome))
}

/// Report over the latest run of an upload, optionally for one state.
pub fn upload_stats(
    db: &Database,
    upload_id: i64,
    state: Option<&str>,
    config: &EngineConfig,
) -> Result<ReportData> {
    let results = db
        .load_results(upload_id)
        .map_err(EngineError::from_storage)?;
    let filter = state.map(ReportFilter::state).unwrap_or_default();
    aggregate(&results, &filter, config.top_polluted_limit)
}
