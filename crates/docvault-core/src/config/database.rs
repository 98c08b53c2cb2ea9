//! Database configuration.

use serde::{Deserialize, Serialize};

/// SQLite connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL, e.g. `sqlite://data/docvault.db` or `sqlite::memory:`.
    #[serde(default = "default_url")]
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection acquire timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Idle connection timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// How long a writer waits on a locked database, in seconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Self::default()
        }
    }

    /// Whether the URL points at an in-memory database.
    ///
    /// Each in-memory connection owns a separate database, so the pool must
    /// keep exactly one connection alive for its whole lifetime.
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            busy_timeout_seconds: default_busy_timeout(),
        }
    }
}

fn default_url() -> String {
    "sqlite://data/docvault.db".to_string()
}

fn default_max_connections() -> u32 {
    8
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_busy_timeout() -> u64 {
    5
}
