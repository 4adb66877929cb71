//! Deprekey CLI - re-key dependency records with content-derived identifiers

use clap::{Parser, Subcommand};
use deprekey::storage::SqliteStore;
use deprekey::ui::{self, Spinner};
use deprekey::{config, Migrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "deprekey")]
#[command(version)]
#[command(about = "Re-key dependency records with deterministic, content-derived identifiers")]
#[command(long_about = r#"
Deprekey replaces the random primary keys of dependency records with UUIDs
derived from each record's content, and rewrites every link that pointed at
the old keys. It runs once, is not reversible, and stops at the first error.

Example usage:
  deprekey --database sqlite://guac.db plan
  deprekey --database sqlite://guac.db run
  deprekey --database sqlite://guac.db verify
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Connection string of the store to migrate
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Path to the config file (defaults to deprekey.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration (default)
    Run,

    /// Preview the migration without writing anything
    Plan {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that every dependency is keyed by its content and no link is orphaned
    Verify,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            ui::error(&ui::abort_message(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let file_config = config::load_config(cli.config.as_deref())?;
    let database = config::resolve_database(cli.database, file_config.as_ref())?;
    let mut store = SqliteStore::open(&database)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            ui::header("Re-keying dependencies");
            ui::target(&database);

            let spinner = Spinner::new("Migrating dependencies");
            let report = match Migrator::new(&mut store).run() {
                Ok(report) => {
                    spinner.finish_with_message("Done");
                    report
                }
                Err(err) => {
                    spinner.abandon();
                    return Err(err.into());
                }
            };

            ui::print_table(&ui::report_table(&report));
            ui::success("Migration complete");
        }

        Commands::Plan { format } => {
            let plan = Migrator::new(&mut store).plan()?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                ui::header("Migration plan (no changes written)");
                ui::target(&database);
                ui::print_table(&ui::plan_table(&plan));
                if !plan.constraint_present {
                    ui::warn("Foreign key is missing; `run` will fail until it is restored");
                }
            }
        }

        Commands::Verify => {
            let verification = Migrator::new(&mut store).verify()?;

            ui::header("Verifying dependency keys");
            ui::target(&database);
            ui::print_table(&ui::verification_table(&verification));

            if !verification.is_clean() {
                ui::error("Verification failed");
                return Ok(ExitCode::FAILURE);
            }
            ui::success("All dependencies keyed by content");
        }
    }

    Ok(ExitCode::SUCCESS)
}
