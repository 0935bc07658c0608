//! SQLite persistence for the water quality index engine.
//!
//! This crate stores versioned formulas (the formula repository) and the
//! results of every calculation run, and implements the engine's
//! [`FormulaSource`](wqi_core::source::FormulaSource) and
//! [`ResultStore`](wqi_core::source::ResultStore) seams.
//!
//! # Architecture
//!
//! - `Rc<RefCell<Connection>>` wrapper for interior mutability; one
//!   `Database` per thread
//! - SQLite via `rusqlite` (bundled), in memory or backed by a file
//! - Multi-statement writes (default switching, result runs) run inside a
//!   single transaction
//!
//! # Usage
//!
//! ```rust
//! use wqi_core::formula::FormulaKind;
//! use wqi_core::parameter::ParameterCatalog;
//! use wqi_core::source::FormulaSource;
//! use wqi_db::Database;
//!
//! let db = Database::new().unwrap();
//! db.seed_defaults(ParameterCatalog::builtin()).unwrap();
//! let hpi = db.active_formula(FormulaKind::Hpi).unwrap();
//! assert!(hpi.is_some());
//! ```
//!
//! # Tables
//!
//! See [`schema::create_schema`] for the full SQL schema.

pub mod schema;
mod formulas;
mod loader;
mod results;
pub mod models;

use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// SQLite database holding formulas, uploads and calculation results.
///
/// This struct is cheaply cloneable (via `Rc`); clones share one
/// connection.
#[derive(Clone)]
pub struct Database {
    conn: Rc<RefCell<Connection>>,
}

impl Database {
    /// Create a new in-memory database with the full schema applied.
    pub fn new() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    /// Open (or create) a database file and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        log::info!("[WQI] db: opened {}", path.display());
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(schema::create_schema())?;
        Ok(Self {
            conn: Rc::new(RefCell::new(conn)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wqi_calc::report::{aggregate, ReportFilter};
    use wqi_calc::processor::process;
    use wqi_core::config::EngineConfig;
    use wqi_core::parameter::ParameterCatalog;
    use wqi_core::source::{FormulaSource, ResultStore};
    use wqi_core::station::Dataset;

    #[test]
    fn database_creates_successfully() {
        let db = Database::new();
        assert!(db.is_ok(), "Database should create without errors");
    }

    #[test]
    fn database_is_cloneable() {
        let db = Database::new().unwrap();
        let db2 = db.clone();
        // Both should reference the same underlying connection
        db.seed_defaults(ParameterCatalog::builtin()).unwrap();
        let formulas = db2.list_formulas(None).unwrap();
        assert_eq!(formulas.len(), 3, "Clone should see same data via shared Rc");
    }

    #[test]
    fn database_starts_empty() {
        let db = Database::new().unwrap();
        assert!(db.list_formulas(None).unwrap().is_empty());
        assert!(db.snapshot().unwrap().is_empty());
    }

    #[test]
    fn database_persists_to_file() {
        let path = std::env::temp_dir().join(format!("wqi-db-test-{}.sqlite", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let db = Database::open(&path).unwrap();
            db.seed_defaults(ParameterCatalog::builtin()).unwrap();
        }
        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.list_formulas(None).unwrap().len(), 3);
        drop(reopened);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn full_calculation_workflow() {
        let db = Database::new().unwrap();
        db.seed_defaults(ParameterCatalog::builtin()).unwrap();
        let csv = "\
station_id,State,City,As,Cd,Cr,Cu,Fe,Pb,Zn,pH,TDS,TH
S1,Punjab,Ludhiana,12,1.2,20,300,500,4,6000,7.5,250,150
S2,Punjab,Amritsar,60,4,70,1800,1500,80,16000,8.9,800,420
S3,Haryana,Karnal,5,,10,100,400,2,5500,,,
";
        let dataset = Dataset::from_csv_str(csv).unwrap();
        let config = EngineConfig::default();
        let formulas = db.snapshot().unwrap();
        let outcome = process(&dataset, &formulas, &config).unwrap();
        assert_eq!(outcome.processed, 3);

        let upload = db.create_upload("stations.csv", dataset.rows.len()).unwrap();
        db.save_results(upload, &formulas, &outcome.calculations).unwrap();
        let runs = db.list_runs(upload).unwrap();
        assert_eq!(runs[0].hpi_formula_id, formulas.hpi.as_ref().and_then(|f| f.id));

        let loaded = db.load_results(upload).unwrap();
        let direct = aggregate(&outcome.calculations, &ReportFilter::default(), 10).unwrap();
        let stored = aggregate(&loaded, &ReportFilter::default(), 10).unwrap();
        for (a, b) in [
            (direct.averages.hpi, stored.averages.hpi),
            (direct.averages.mi, stored.averages.mi),
            (direct.averages.wqi, stored.averages.wqi),
        ] {
            let (a, b) = (a.unwrap(), b.unwrap());
            assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
        }
        assert_eq!(direct.by_state, stored.by_state);
        assert_eq!(stored.top_polluted[0].station_id, "S2");
    }
}
