//! Command implementations for the WQI CLI.
//!
//! Provides subcommands for previewing and calculating station datasets,
//! reporting over stored uploads, and managing the formula repository.
//! Command output is JSON on stdout.

use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use wqi_core::config::EngineConfig;
use wqi_core::formula::FormulaKind;
use wqi_core::parameter::ParameterCatalog;
use wqi_core::source::FormulaSource;
use wqi_core::station::Dataset;
use wqi_db::Database;

pub mod service;
pub mod template;

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// SQLite database file (in-memory when omitted)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Engine configuration JSON file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Detect columns and report which indices a CSV file supports
    Preview {
        /// Station CSV file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Calculate indices for a CSV file and store them as a new upload
    Calculate {
        /// Station CSV file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Recalculate an existing upload with the current formulas
    Reprocess {
        /// Upload id returned by `calculate`
        #[arg(short, long)]
        upload: i64,

        /// Station CSV file of the upload
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Summary statistics for the latest run of an upload
    Report {
        #[arg(short, long)]
        upload: i64,

        /// Only include stations of this state (case-insensitive)
        #[arg(short, long)]
        state: Option<String>,
    },

    /// List the calculation runs of an upload
    Runs {
        #[arg(short, long)]
        upload: i64,
    },

    /// Manage stored formulas
    #[command(subcommand)]
    Formulas(FormulaCommand),

    /// Write a CSV input template
    Template {
        /// Output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Add one example row
        #[arg(long)]
        example: bool,
    },
}

#[derive(Subcommand)]
pub enum FormulaCommand {
    /// List formulas, optionally of one type
    List {
        #[arg(short, long)]
        kind: Option<FormulaKind>,
    },

    /// Print one formula document
    Show { id: i64 },

    /// Import formula documents (one object or an array) from a JSON file
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Insert the standard formula for every type that has none
    Seed,

    /// Make a formula the default of its type
    SetDefault { id: i64 },

    /// Copy a formula under a new name
    Duplicate {
        id: i64,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// Stop using a formula without deleting it
    Deactivate { id: i64 },

    /// Delete a formula
    Delete { id: i64 },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(global: &GlobalArgs) -> anyhow::Result<EngineConfig> {
    let config = match &global.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Open the database and seed the standard formulas into an empty one.
fn open_database(global: &GlobalArgs) -> anyhow::Result<Database> {
    let db = match &global.db {
        Some(path) => Database::open(path)?,
        None => Database::new()?,
    };
    if db.list_formulas(None)?.is_empty() {
        db.seed_defaults(ParameterCatalog::builtin())?;
    }
    Ok(db)
}

fn read_dataset(path: &Path) -> anyhow::Result<Dataset> {
    let file = std::fs::File::open(path)?;
    let dataset = Dataset::from_csv_reader(file)?;
    log::info!(
        "[WQI] cmd: read {} rows from {}",
        dataset.rows.len(),
        path.display()
    );
    Ok(dataset)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn run(command: Command, global: &GlobalArgs) -> anyhow::Result<()> {
    match command {
        Command::Template { output, example } => {
            let text = template::template_csv(ParameterCatalog::builtin(), example)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    log::info!("[WQI] cmd: template written to {}", path.display());
                }
                None => print!("{}", text),
            }
            Ok(())
        }
        Command::Preview { input } => {
            let config = load_config(global)?;
            let db = open_database(global)?;
            let dataset = read_dataset(&input)?;
            print_json(&service::preview_dataset(&dataset, &db, &config)?)
        }
        Command::Calculate { input } => {
            let config = load_config(global)?;
            let db = open_database(global)?;
            let dataset = read_dataset(&input)?;
            let response = service::calculate_upload(&db, &file_name(&input), &dataset, &config)?;
            print_json(&response)
        }
        Command::Reprocess { upload, input } => {
            let config = load_config(global)?;
            let db = open_database(global)?;
            let dataset = read_dataset(&input)?;
            print_json(&service::reprocess_upload(&db, upload, &dataset, &config)?)
        }
        Command::Report { upload, state } => {
            let config = load_config(global)?;
            let db = open_database(global)?;
            print_json(&service::upload_stats(&db, upload, state.as_deref(), &config)?)
        }
        Command::Runs { upload } => {
            let db = open_database(global)?;
            print_json(&db.list_runs(upload)?)
        }
        Command::Formulas(cmd) => run_formulas(cmd, global),
    }
}

fn run_formulas(command: FormulaCommand, global: &GlobalArgs) -> anyhow::Result<()> {
    let db = open_database(global)?;
    match command {
        FormulaCommand::List { kind } => print_json(&db.list_formulas(kind)?),
        FormulaCommand::Show { id } => match db.formula_by_id(id)? {
            Some(formula) => print_json(&formula),
            None => Err(wqi_core::EngineError::NotFound(format!("Formula {} not found", id)).into()),
        },
        FormulaCommand::Import { input } => {
            let json = std::fs::read_to_string(&input)?;
            print_json(&db.import_formulas_json(&json)?)
        }
        FormulaCommand::Seed => {
            let count = db.seed_defaults(ParameterCatalog::builtin())?;
            print_json(&serde_json::json!({ "seeded": count }))
        }
        FormulaCommand::SetDefault { id } => {
            db.set_default(id)?;
            log::info!("[WQI] cmd: formula {} is now the default", id);
            Ok(())
        }
        FormulaCommand::Duplicate { id, name } => {
            let new_id = db.duplicate_formula(id, name.as_deref())?;
            print_json(&serde_json::json!({ "id": new_id }))
        }
        FormulaCommand::Deactivate { id } => db.deactivate_formula(id),
        FormulaCommand::Delete { id } => db.delete_formula(id),
    }
}
