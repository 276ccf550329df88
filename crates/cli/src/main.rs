// shopflow - work-order ingestion and work-center reporting

mod exit_codes;
mod ingest;
mod report;
mod workflow;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use shopflow_ingest::{IngestError, ShopConfig, Store, StoreError};

use exit_codes::{
    ingest_exit_code, store_exit_code, EXIT_BACKEND, EXIT_ERROR, EXIT_INPUT, EXIT_SCHEMA,
    EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "shopflow")]
#[command(about = "Ingest work-order spreadsheets and report work-center load")]
#[command(version)]
struct Cli {
    /// SQLite database file (default: <data dir>/shopflow/shop.db)
    #[arg(long, global = true, env = "SHOPFLOW_DB")]
    db: Option<PathBuf>,

    /// Config file (default: <config dir>/shopflow/config.toml, if present)
    #[arg(long, global = true, env = "SHOPFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a work-order extract into the database
    #[command(after_help = "\
Examples:
  shopflow ingest SAPDATA.xlsx
  shopflow ingest export.xlsx --sheet SAPDATA --json
  shopflow ingest routing.csv --db ./shop.db")]
    Ingest {
        /// Spreadsheet (.xlsx/.xls/.xlsb/.ods) or delimited text (.csv/.tsv)
        file: PathBuf,

        /// Worksheet name for multi-sheet files
        #[arg(long)]
        sheet: Option<String>,

        /// Output the ingest report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Summarize an extract per work center without writing anything
    #[command(after_help = "\
Examples:
  shopflow analyze SAPDATA.xlsx
  shopflow analyze SAPDATA.xlsx --csv summary.csv")]
    Analyze {
        file: PathBuf,

        #[arg(long)]
        sheet: Option<String>,

        #[arg(long)]
        json: bool,

        /// Write the work-center summary to a CSV file
        #[arg(long, value_name = "OUT")]
        csv: Option<PathBuf>,
    },

    /// Work-center load over everything in the database
    Report {
        #[arg(long)]
        json: bool,

        #[arg(long, value_name = "OUT")]
        csv: Option<PathBuf>,
    },

    /// Projected hours to finish open operations, per work center
    Forecast {
        #[arg(long)]
        json: bool,

        #[arg(long, value_name = "OUT")]
        csv: Option<PathBuf>,
    },

    /// List jobs with their work orders and operations
    Jobs {
        #[arg(long)]
        json: bool,
    },

    /// Schedule an operation for a day, or list scheduled operations
    #[command(after_help = "\
Examples:
  shopflow schedule 42 2026-11-02
  shopflow schedule --list --json")]
    Schedule {
        /// Operation id
        #[arg(required_unless_present = "list")]
        id: Option<i64>,

        /// Day in YYYY-MM-DD
        #[arg(required_unless_present = "list")]
        date: Option<NaiveDate>,

        /// List scheduled operations instead
        #[arg(long, conflicts_with_all = ["id", "date"])]
        list: bool,

        #[arg(long)]
        json: bool,
    },

    /// Set an operation's status (not_started, ready, in_progress, completed)
    Status {
        id: i64,
        status: String,
    },

    /// Delete a job with all its work orders and operations
    DeleteJob {
        job: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = Context::load(cli.db, cli.config).and_then(|ctx| match cli.command {
        Commands::Ingest { file, sheet, json } => ingest::cmd_ingest(&ctx, &file, sheet, json),
        Commands::Analyze { file, sheet, json, csv } => {
            ingest::cmd_analyze(&ctx, &file, sheet, json, csv)
        }
        Commands::Report { json, csv } => report::cmd_report(&ctx, json, csv),
        Commands::Forecast { json, csv } => report::cmd_forecast(&ctx, json, csv),
        Commands::Jobs { json } => report::cmd_jobs(&ctx, json),
        Commands::Schedule { id, date, list, json } => {
            workflow::cmd_schedule(&ctx, id, date, list, json)
        }
        Commands::Status { id, status } => workflow::cmd_status(&ctx, id, &status),
        Commands::DeleteJob { job } => workflow::cmd_delete_job(&ctx, &job),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

// ============================================================================
// Context: config file + database location
// ============================================================================

pub struct Context {
    pub config: ShopConfig,
    db_flag: Option<PathBuf>,
    config_dir: Option<PathBuf>,
}

impl Context {
    fn load(db_flag: Option<PathBuf>, config_flag: Option<PathBuf>) -> Result<Self, CliError> {
        let config_path = match config_flag {
            Some(path) => Some(path),
            None => dirs::config_dir()
                .map(|d| d.join("shopflow").join("config.toml"))
                .filter(|p| p.is_file()),
        };

        let config = match config_path {
            Some(ref path) => {
                log::debug!("loading config from {}", path.display());
                ShopConfig::load(path).map_err(|e| {
                    CliError::ingest(e).with_hint(format!("config file: {}", path.display()))
                })?
            }
            None => ShopConfig::default(),
        };

        let config_dir = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);

        Ok(Self { config, db_flag, config_dir })
    }

    /// `--db`, then config `database` (relative to the config file), then
    /// the per-user data directory.
    pub fn db_path(&self) -> Result<PathBuf, CliError> {
        if let Some(ref path) = self.db_flag {
            return Ok(path.clone());
        }
        if let Some(ref path) = self.config.database {
            return Ok(match self.config_dir {
                Some(ref dir) if path.is_relative() => dir.join(path),
                _ => path.clone(),
            });
        }
        dirs::data_dir()
            .map(|d| d.join("shopflow").join("shop.db"))
            .ok_or_else(|| {
                CliError::args("cannot determine a data directory for the database")
                    .with_hint("pass --db <path>")
            })
    }

    pub fn open_store(&self) -> Result<Store, CliError> {
        let path = self.db_path()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CliError {
                code: EXIT_BACKEND,
                message: format!("cannot create {}: {e}", parent.display()),
                hint: None,
            })?;
        }
        log::debug!("opening database {}", path.display());
        Store::open(&path).map_err(|e| {
            CliError::store(e).with_hint(format!("database: {}", path.display()))
        })
    }

    /// `--sheet` wins over the config file's `sheet`.
    pub fn sheet<'a>(&'a self, flag: &'a Option<String>) -> Option<&'a str> {
        flag.as_deref().or(self.config.sheet.as_deref())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INPUT, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn ingest(err: IngestError) -> Self {
        let code = ingest_exit_code(&err);
        let hint = if code == EXIT_SCHEMA {
            Some("map the header under [columns] in the config file".to_string())
        } else {
            None
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn store(err: StoreError) -> Self {
        Self { code: store_exit_code(&err), message: err.to_string(), hint: None }
    }

    /// Prefix the message with the file it concerns, keeping any hint.
    pub fn for_file(mut self, path: &Path) -> Self {
        self.message = format!("{}: {}", path.display(), self.message);
        self
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
    println!("{json}");
    Ok(())
}
