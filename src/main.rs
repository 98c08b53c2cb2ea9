//! DocVault bootstrap.
//!
//! Loads configuration, installs logging, opens the database, and applies
//! the embedded schema migrations.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt};

use docvault_core::config::{AppConfig, DatabaseConfig};
use docvault_core::error::AppError;
use docvault_database::DatabasePool;
use docvault_database::migration::run_migrations;

#[tokio::main]
async fn main() {
    let env = std::env::var("DOCVAULT_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, &env).await {
        tracing::error!(error = %e, "Bootstrap failed");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig, env: &str) -> Result<(), AppError> {
    tracing::info!(env = %env, "Starting DocVault v{}", env!("CARGO_PKG_VERSION"));

    create_database_directory(&config.database).await?;

    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;

    run_migrations(db.pool()).await?;

    if !db.health_check().await? {
        return Err(AppError::database("Database health check failed"));
    }
    tracing::info!("Database ready");

    db.close().await;
    Ok(())
}

/// Create the directory holding a file-backed SQLite database.
async fn create_database_directory(config: &DatabaseConfig) -> Result<(), AppError> {
    if config.is_in_memory() {
        return Ok(());
    }

    let file = config
        .url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let file = file.split('?').next().unwrap_or(file);

    if let Some(dir) = Path::new(file).parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            AppError::internal(format!("Failed to create dir '{}': {e}", dir.display()))
        })?;
    }

    Ok(())
}
