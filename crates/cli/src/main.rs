mod commands;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Inspect and edit per-course module state.
#[derive(Parser)]
#[command(name = "coursestate", version, about = "Course module state storage tool")]
struct Cli {
    /// Path to the storage configuration TOML
    #[arg(long, global = true, default_value = "coursestate.toml")]
    config: PathBuf,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Identity of one record.
#[derive(clap::Args)]
pub(crate) struct KeyArgs {
    /// Course id, e.g. MITx/6.002x/2012_Fall
    pub course_id: String,
    /// Numeric user id
    pub user_id: i64,
    /// Module state key (usage id)
    pub module_state_key: String,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Read one record
    Get {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Read one record, creating it from defaults if absent
    GetOrCreate {
        #[command(flatten)]
        key: KeyArgs,
        /// Defaults as a JSON object (module_type, state, grade, max_grade, done)
        #[arg(long)]
        defaults: Option<String>,
    },

    /// Read every existing record among several keys
    Batch {
        course_id: String,
        user_id: i64,
        /// Module state keys
        #[arg(required = true)]
        module_state_keys: Vec<String>,
    },

    /// Create or overwrite a record
    Save {
        #[command(flatten)]
        key: KeyArgs,
        #[arg(long, default_value = "problem")]
        module_type: String,
        /// Opaque state payload
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        grade: Option<f64>,
        #[arg(long)]
        max_grade: Option<f64>,
        /// Completion status (na, f, i)
        #[arg(long)]
        done: Option<String>,
    },

    /// Delete a record
    Delete {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Show which backend serves a course
    Route { course_id: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(commands::run(&cli.config, cli.command, cli.output)) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
