//! db-maintenance - Main entry point.
//!
//! Runs one maintenance pass: backup, size report, transient cleanup, size
//! report, backup.

use clap::Parser;
use db_maintenance::config::Config;
use db_maintenance::db::DatabaseClient;
use db_maintenance::runner::MaintenanceRunner;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit code when settings are missing or invalid.
const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when the run finished but the database was never reachable.
const EXIT_DATABASE_UNREACHABLE: u8 = 2;

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // stdout carries the report, logs go to stderr
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    let settings = match config.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!(
                "Usage: db-maintenance --server <host> --database <name> --user <user> --password <password>"
            );
            eprintln!();
            eprintln!("Every option can also be set through its DBMAINT_* environment variable.");
            eprintln!("Run 'db-maintenance --help' for the full list of options and variables.");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    info!(
        server = %settings.server,
        port = settings.port,
        database = %settings.database,
        "Starting db-maintenance v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = DatabaseClient::new(&settings);
    let mut runner = MaintenanceRunner::new(&settings, client);
    let report = runner.run().await;

    if config.json_report {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!(error = %e, "Failed to serialize report"),
        }
    } else {
        println!("{}", report.render_text());
    }

    if report.database_reachable {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DATABASE_UNREACHABLE)
    }
}
