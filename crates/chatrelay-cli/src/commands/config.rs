//! Config command - view, change and validate ChatRelay configuration
//!
//! `show` masks inline tokens. `set` edits one scalar key using dot notation
//! and refuses to save a configuration that no longer validates.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::info;

use chatrelay_core::config::Config;

use super::CliContext;
use crate::output::get_formatter;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration (tokens masked)
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g. "sync.notify_on_bootstrap")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value),
            ConfigCommand::Validate => self.execute_validate(ctx),
        }
    }

    fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?.redacted();

        if ctx.format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");
            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    fn execute_set(&self, ctx: &CliContext, key: &str, value: &str) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let mut config = ctx.load_config()?;

        apply_config_value(&mut config, key, value)?;

        let errors: Vec<String> = config
            .validate()
            .iter()
            .filter(|e| e.field == key || e.field.starts_with(&format!("{}[", key)))
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": errors,
                }));
                return Ok(());
            }
            bail!("Invalid value for '{}': {}", key, errors.join("; "));
        }

        if let Some(parent) = ctx.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        std::fs::write(&ctx.config_path, yaml)
            .with_context(|| format!("Failed to write {}", ctx.config_path.display()))?;

        info!(key, value, "Configuration value set");
        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let path = &ctx.config_path;

        if !path.exists() {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": path.display().to_string(),
                    "errors": ["Configuration file not found"],
                }));
            } else {
                formatter.error(&format!("Configuration file not found at {}", path.display()));
            }
            bail!("Configuration file not found");
        }

        let config = match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {}", e)],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {}", e));
                }
                bail!("Configuration could not be parsed");
            }
        };

        let errors = config.validate();
        if ctx.format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", path.display()));
            formatter.info(&format!(
                "Feeds: {}",
                config
                    .enabled_feeds()
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", path.display()));
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!("Configuration is invalid")
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("Expected true or false for {}", key),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow::anyhow!("Expected a non-negative integer for {}", key))
}

/// Applies a dot-notation key/value pair
///
/// Only scalar settings are supported; tokens and routing rules are edited
/// in the file.
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- storage ---
        "storage.enabled" => config.storage.enabled = parse_bool(key, value)?,
        "storage.base_url" => config.storage.base_url = value.to_string(),
        "storage.root_path" => config.storage.root_path = value.to_string(),
        "storage.page_size" => config.storage.page_size = parse_num(key, value)?,

        // --- tasks ---
        "tasks.enabled" => config.tasks.enabled = parse_bool(key, value)?,
        "tasks.base_url" => config.tasks.base_url = value.to_string(),
        "tasks.team_id" => config.tasks.team_id = Some(value.to_string()),
        "tasks.page_size" => config.tasks.page_size = parse_num(key, value)?,

        // --- messaging / routing ---
        "messaging.base_url" => config.messaging.base_url = value.to_string(),
        "routing.default_channel" => config.routing.default_channel = value.to_string(),

        // --- sync ---
        "sync.fetch_timeout_secs" => config.sync.fetch_timeout_secs = parse_num(key, value)?,
        "sync.dispatch_timeout_secs" => config.sync.dispatch_timeout_secs = parse_num(key, value)?,
        "sync.dispatch_concurrency" => config.sync.dispatch_concurrency = parse_num(key, value)?,
        "sync.notify_on_bootstrap" => config.sync.notify_on_bootstrap = parse_bool(key, value)?,
        "sync.enrich_candidates" => config.sync.enrich_candidates = parse_bool(key, value)?,

        // --- trigger ---
        "trigger.webhooks_enabled" => config.trigger.webhooks_enabled = parse_bool(key, value)?,
        "trigger.listen_addr" => config.trigger.listen_addr = value.to_string(),
        "trigger.poll_interval_secs" => config.trigger.poll_interval_secs = parse_num(key, value)?,

        // --- database / logging ---
        "database.path" => config.database.path = PathBuf::from(value),
        "logging.level" => config.logging.level = value.to_string(),
        "logging.format" => config.logging.format = value.to_string(),

        _ => bail!("Unknown or unsupported configuration key: {}", key),
    }
    Ok(())
}
