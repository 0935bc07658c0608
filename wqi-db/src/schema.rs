//! SQL schema definitions for the SQLite database.
//!
//! The schema is applied as a single batch when the database is opened.

/// Returns the full SQL schema as a single batch string.
///
/// This creates the following tables:
///
/// **Formula repository:**
/// - `formulas` - Versioned formula documents; `parameters`, `classification`
///   and `class_bands` hold JSON. Deletion is soft (`is_deleted`).
///
/// **Results:**
/// - `uploads` - One row per uploaded dataset
/// - `calculation_runs` - One row per processing of an upload, recording the
///   formula ids used
/// - `calculations` - One row per station result, owned by a run
///
/// The partial unique index `idx_formulas_single_default` backs the
/// one-default-per-type invariant.
pub fn create_schema() -> &'static str {
    r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS formulas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('hpi', 'mi', 'wqi')),
        version TEXT NOT NULL,
        parameters TEXT NOT NULL,
        classification TEXT NOT NULL,
        class_bands TEXT,
        is_default INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        is_deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_formulas_kind ON formulas(kind);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_formulas_single_default
        ON formulas(kind) WHERE is_default = 1 AND is_deleted = 0;

    CREATE TABLE IF NOT EXISTS uploads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT NOT NULL,
        total_rows INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS calculation_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        upload_id INTEGER NOT NULL REFERENCES uploads(id),
        hpi_formula_id INTEGER,
        mi_formula_id INTEGER,
        wqi_formula_id INTEGER,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_runs_upload ON calculation_runs(upload_id);

    CREATE TABLE IF NOT EXISTS calculations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL REFERENCES calculation_runs(id),
        position INTEGER NOT NULL,
        station_id TEXT NOT NULL,
        row_number INTEGER NOT NULL,
        latitude REAL,
        longitude REAL,
        state TEXT,
        city TEXT,
        hpi REAL,
        hpi_classification TEXT,
        mi REAL,
        mi_classification TEXT,
        mi_class TEXT,
        wqi REAL,
        wqi_classification TEXT,
        hei REAL,
        hei_classification TEXT,
        cdeg REAL,
        cdeg_classification TEXT,
        pig REAL,
        pig_classification TEXT,
        metals_analyzed TEXT NOT NULL,
        wqi_params_analyzed TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_calculations_run ON calculations(run_id);
    "#
}
