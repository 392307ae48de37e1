//! MySQL to S3 Backup Tool
//!
//! Dumps a MySQL database through gzip into a timestamped local artifact and
//! uploads it to an S3-compatible object store, with bounded retry on the
//! upload. Single zero-argument invocation, driven entirely by environment
//! variables; intended to be run from an external scheduler.

// mysql-s3-backup/src/main.rs
mod backup;
mod config;
mod errors;

use anyhow::{Context, Result};
use config::AppConfig;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => {
            println!("✅ Backup completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    // A .env file is a convenience for local runs; in production the
    // scheduler injects the environment directly.
    dotenv::dotenv().ok();

    let app_config = AppConfig::load_from_env()
        .context("Failed to load backup configuration from environment")?;

    println!("🚀 Starting backup of database {}...", app_config.connection.database);
    backup::run_backup_flow(&app_config)
        .await
        .context("Backup process failed")?;
    Ok(())
}
