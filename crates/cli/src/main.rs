mod commands;
mod config;
mod logging;

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use time::macros::format_description;
use time::Date;

use keystone_engine::{BaselineEngine, Outcome};
use keystone_sqlite::SqliteStore;
use keystone_storage::{ElementId, ProjectId, ProjectStatus};

use config::{Config, DEFAULT_CONFIG_FILE, ENV_DB, ENV_LOG_JSON};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Construction project baseline and earned-value engine.
#[derive(Parser)]
#[command(
    name = "keystone",
    version,
    about = "Construction project baseline and earned-value engine"
)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides KEYSTONE_DB and the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database or bring its schema up to date
    Init,

    /// Create, list and move projects through their lifecycle
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Ingest estimate lines
    Estimates {
        #[command(subcommand)]
        command: EstimateCommands,
    },

    /// Regenerate or inspect the derived baseline
    Baseline {
        #[command(subcommand)]
        command: BaselineCommands,
    },

    /// Record actual costs and progress
    Track {
        #[command(subcommand)]
        command: TrackCommands,
    },

    /// Earned-value analysis (read-only)
    Analyze {
        #[command(subcommand)]
        command: AnalyzeCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum ProjectCommands {
    /// Create a project
    Create {
        #[arg(long)]
        name: String,
        /// Start date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start: Option<Date>,
        /// End date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        end: Option<Date>,
    },
    /// Move a project to a new status
    Status {
        project: ProjectId,
        /// pending, planning, active, on_hold, completed, closed or cancelled
        status: ProjectStatus,
    },
    /// List all projects
    List,
}

#[derive(Subcommand)]
pub(crate) enum EstimateCommands {
    /// Import estimate lines from a JSON array
    Import {
        file: PathBuf,
        /// Link every imported line to this project
        #[arg(long)]
        project: Option<ProjectId>,
    },
}

#[derive(Subcommand)]
pub(crate) enum BaselineCommands {
    /// Breakdown, budget and resources in one transaction
    Regenerate { project: ProjectId },
    /// Rebuild breakdown elements from estimate lines
    Breakdown { project: ProjectId },
    /// Rebuild budget lines from breakdown elements
    Budget { project: ProjectId },
    /// Rebuild resource details from representative estimate lines
    Resources { project: ProjectId },
    /// Compare budget lines with the current breakdown
    Drift { project: ProjectId },
}

#[derive(Subcommand)]
pub(crate) enum TrackCommands {
    /// Record an incurred cost
    Actual {
        project: ProjectId,
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
        /// Transaction date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: Date,
        #[arg(long)]
        element: Option<ElementId>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Record completion progress for an element
    Progress {
        project: ProjectId,
        element: ElementId,
        #[arg(long, allow_negative_numbers = true)]
        percent: f64,
        /// Update date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: Date,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum AnalyzeCommands {
    /// Cost variance per element
    Cost { project: ProjectId },
    /// Schedule variance per element
    Schedule { project: ProjectId },
    /// Project totals, CPI, SPI and suggestions
    Summary { project: ProjectId },
}

fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

/// Shared state handed to every subcommand.
pub(crate) struct Context {
    pub engine: BaselineEngine<SqliteStore>,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Context {
    /// Print a successful outcome: JSON as-is, text through `render`.
    pub(crate) fn emit<T: Serialize>(&self, outcome: &Outcome<T>, render: impl FnOnce(&T)) {
        match self.output {
            OutputFormat::Json => match serde_json::to_string_pretty(outcome) {
                Ok(json) => println!("{json}"),
                Err(e) => fail(
                    format!("serialization error: {e}"),
                    "internal",
                    self.output,
                    self.quiet,
                ),
            },
            OutputFormat::Text => {
                render(&outcome.value);
                if !self.quiet {
                    println!("{}", outcome.message);
                }
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = match Config::load(&config_path, cli.config.is_some()) {
        Ok(c) => c,
        Err(e) => fail(e, "config", cli.output, cli.quiet),
    };

    logging::init_tracing(config.log_level(), config.log_json(std::env::var(ENV_LOG_JSON).ok()));

    let db_path = config.db_path(cli.db.as_deref(), std::env::var(ENV_DB).ok());
    let engine = match open_engine(&db_path) {
        Ok(engine) => engine,
        Err(msg) => fail(msg, "storage", cli.output, cli.quiet),
    };
    let ctx = Context {
        engine,
        output: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Init => commands::cmd_init(&ctx, &db_path),
        Commands::Project { command } => commands::project::run(&ctx, command),
        Commands::Estimates { command } => commands::estimates::run(&ctx, command),
        Commands::Baseline { command } => commands::baseline::run(&ctx, command),
        Commands::Track { command } => commands::track::run(&ctx, command),
        Commands::Analyze { command } => commands::analyze::run(&ctx, command),
    }
}

fn open_engine(db_path: &Path) -> Result<BaselineEngine<SqliteStore>, String> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create directory '{}': {e}", parent.display()))?;
    }
    let store = SqliteStore::open(db_path)
        .map_err(|e| format!("cannot open database '{}': {e}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database ready");
    Ok(BaselineEngine::new(store))
}

pub(crate) fn report_error(msg: &str, kind: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {msg}"),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg, "kind": kind }));
        }
    }
}

/// Report `err` and exit with status 1.
pub(crate) fn fail(err: impl Display, kind: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(&err.to_string(), kind, output, quiet);
    process::exit(1);
}
