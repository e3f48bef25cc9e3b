//! CLI subcommands

pub mod completions;
pub mod config;
pub mod cursor;
pub mod history;
pub mod route;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use chatrelay_cache::DatabasePool;
use chatrelay_core::config::Config;
use chatrelay_core::domain::FeedId;

use crate::output::OutputFormat;

/// Settings shared by every command
pub struct CliContext {
    pub format: OutputFormat,
    pub config_path: PathBuf,
}

impl CliContext {
    /// Loads the configuration file, falling back to defaults when absent
    pub fn load_config(&self) -> Result<Config> {
        if self.config_path.exists() {
            let config = Config::load(&self.config_path)
                .with_context(|| format!("Failed to load {}", self.config_path.display()))?;
            info!(config_path = %self.config_path.display(), "Loaded configuration");
            Ok(config)
        } else {
            debug!(config_path = %self.config_path.display(), "No configuration file, using defaults");
            Ok(Config::default())
        }
    }

    pub async fn open_database(&self, config: &Config) -> Result<DatabasePool> {
        DatabasePool::new(&config.database.path)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.path.display()))
    }
}

/// Parses a `--feed` argument
pub fn parse_feed(name: &str) -> Result<FeedId> {
    FeedId::new(name.to_string()).with_context(|| format!("Invalid feed name '{}'", name))
}
