use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::aggregate::DashboardOptions;
use crate::error::{DashboardError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DB_PATH_ENV: &str = "TICKET_DASH_DB_PATH";
const PORT_ENV: &str = "TICKET_DASH_PORT";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub dashboard: DashboardOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/tickets.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Where the rolling JSON log goes and the default filter when `RUST_LOG` is unset
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            filter: "ticket_dash=info".to_string(),
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults when the file does not exist,
    /// then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                DashboardError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str(&content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Config::default()
        };

        config.apply_overrides(
            std::env::var(DB_PATH_ENV).ok(),
            std::env::var(PORT_ENV).ok(),
        )?;
        Ok(config)
    }

    fn apply_overrides(&mut self, db_path: Option<String>, port: Option<String>) -> Result<()> {
        if let Some(db_path) = db_path.filter(|p| !p.trim().is_empty()) {
            self.database.path = db_path;
        }
        if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
            self.server.port = port.trim().parse().map_err(|_| {
                DashboardError::Config(format!("{} must be a port number, got '{}'", PORT_ENV, port))
            })?;
        }
        Ok(())
    }
}
