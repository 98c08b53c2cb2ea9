//! Application configuration schemas.
//!
//! Configuration is deserialized via the `config` crate from an optional
//! `config/default` file, an optional `config/<env>` overlay, and
//! `DOCVAULT__`-prefixed environment variables, in that order.

pub mod database;
pub mod logging;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration for the named environment (e.g. `"development"`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        debug!(env = %env, "Loading configuration");

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DOCVAULT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_without_files_uses_defaults() {
        let config = AppConfig::load("does-not-exist").expect("defaults should load");
        assert_eq!(config.logging.level, "info");
        assert!(config.database.max_connections >= config.database.min_connections);
    }
}
