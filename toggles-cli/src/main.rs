//! togglectl - operator CLI for the toggles service.
//!
//! # Commands
//!
//! - `togglectl migrate` - Create the feature tables
//! - `togglectl features list` - List live features
//! - `togglectl features get <id>` - Show a feature with its customers
//! - `togglectl features create` - Create a feature
//! - `togglectl features update <id> --last-updated-at <ts>` - Replace a feature
//! - `togglectl features archive <id>` - Archive a feature
//! - `togglectl features add-customers <id> <customer>...` - Entitle customers
//! - `togglectl evaluate --customer <id> <name>...` - Evaluate features for a customer
//!
//! Results are printed as JSON on stdout. Failures print
//! `{"error": ..., "kind": ...}` on stderr and exit with a code per error kind.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use toggles_log::{Level, LogConfig, debug};
use uuid::Uuid;

mod commands;
mod error;
mod settings;

use commands::features::DraftArgs;
use commands::{App, evaluate, features, migrate, parse_timestamp};
use error::{CliError, CliResult};
use settings::Settings;

/// togglectl - feature toggles and customer entitlements
#[derive(Parser, Debug)]
#[command(name = "togglectl")]
#[command(version)]
#[command(about = "Manage feature toggles and customer entitlements")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to an env file containing configuration
    #[arg(long, global = true, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Path to a TOML or JSON settings file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except results and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the feature tables if missing
    Migrate,

    /// Manage features
    #[command(alias = "f")]
    Features {
        #[command(subcommand)]
        command: FeaturesCommand,
    },

    /// Evaluate features for a customer
    #[command(alias = "eval")]
    Evaluate {
        /// Requesting customer
        #[arg(long, short)]
        customer: String,

        /// Technical names to evaluate
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum FeaturesCommand {
    /// List live features
    #[command(alias = "ls")]
    List,

    /// Show one feature with its customers
    Get { id: Uuid },

    /// Create a feature
    Create(DraftArgs),

    /// Replace a feature's state and customer list
    Update {
        id: Uuid,

        /// The `updatedAt` last seen, as Unix milliseconds or RFC 3339
        #[arg(long, value_parser = parse_timestamp)]
        last_updated_at: DateTime<Utc>,

        #[command(flatten)]
        draft: DraftArgs,
    },

    /// Move a feature to the archive
    Archive { id: Uuid },

    /// Entitle more customers to a feature
    AddCustomers {
        id: Uuid,

        #[arg(required = true, value_name = "CUSTOMER_ID")]
        customers: Vec<String>,
    },
}

fn init_logging(cli: &Cli) {
    let config = LogConfig::from_env();
    let config = if cli.verbose {
        config.with_level(Level::Debug)
    } else if cli.quiet {
        config.with_level(Level::Error)
    } else {
        config
    };
    toggles_log::init_with(config);
}

async fn run(cli: Cli) -> CliResult<serde_json::Value> {
    let settings = Settings::load(cli.config.as_deref(), cli.env_file.as_deref())?;
    debug!(
        max_connections = settings.max_connections,
        operation_timeout_secs = settings.operation_timeout_secs;
        "Loaded settings"
    );

    match cli.command {
        Commands::Migrate => migrate::run(&settings).await,
        Commands::Features { command } => {
            let app = App::connect(&settings).await?;
            match command {
                FeaturesCommand::List => features::list(&app).await,
                FeaturesCommand::Get { id } => features::get(&app, id).await,
                FeaturesCommand::Create(draft) => features::create(&app, draft.into_draft()?).await,
                FeaturesCommand::Update {
                    id,
                    last_updated_at,
                    draft,
                } => features::update(&app, id, last_updated_at, draft.into_draft()?).await,
                FeaturesCommand::Archive { id } => features::archive(&app, id).await,
                FeaturesCommand::AddCustomers { id, customers } => {
                    features::add_customers(&app, id, customers).await
                }
            }
        }
        Commands::Evaluate { customer, names } => {
            let app = App::connect(&settings).await?;
            evaluate::run(&app, &customer, &names).await
        }
    }
}

fn print_json(value: &serde_json::Value) -> CliResult<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).map_err(std::io::Error::from)?;
    writeln!(out)?;
    Ok(())
}

fn report(err: &CliError) -> i32 {
    eprintln!("{}", err.to_json());
    err.exit_code()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let code = match run(cli).await {
        Ok(output) => match print_json(&output) {
            Ok(()) => 0,
            Err(e) => report(&e),
        },
        Err(e) => report(&e),
    };

    std::process::exit(code);
}
