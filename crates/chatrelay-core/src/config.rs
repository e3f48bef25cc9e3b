//! Configuration module for ChatRelay.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{
    errors::DomainError,
    newtypes::{ChannelName, FeedId},
    route::{RouteRule, RouteTable},
};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for ChatRelay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub tasks: TasksConfig,
    pub messaging: MessagingConfig,
    pub routing: RoutingConfig,
    pub sync: SyncConfig,
    pub trigger: TriggerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// API credential, given inline or as the name of an environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Inline bearer token. Prefer `token_env` outside of local testing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Name of an environment variable holding the bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

/// File-storage change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    pub base_url: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Folder whose subtree is listed; empty string is the account root.
    pub root_path: String,
    /// Entries requested per page.
    pub page_size: u32,
    /// Case-insensitive path prefixes to notify about; empty means all.
    pub watched_folders: Vec<String>,
}

/// Task-tracker change feed and directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub enabled: bool,
    pub base_url: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Team (workspace) whose activity is followed.
    pub team_id: Option<String>,
    pub page_size: u32,
    /// Case-insensitive space prefixes to notify about; empty means all.
    pub watched_spaces: Vec<String>,
}

/// Outbound chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub base_url: String,
    #[serde(flatten)]
    pub credentials: Credentials,
}

/// A single `prefix -> channel` rule as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRuleConfig {
    pub prefix: String,
    pub channel: String,
}

/// Channel routing. Rule order matters for equally long prefixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub default_channel: String,
    pub rules: Vec<RouteRuleConfig>,
}

/// Sync loop behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound for a single page fetch, in seconds.
    pub fetch_timeout_secs: u64,
    /// Upper bound for a single message send, in seconds.
    pub dispatch_timeout_secs: u64,
    /// Maximum sends in flight per page.
    pub dispatch_concurrency: usize,
    /// Dispatch candidates found while bootstrapping a feed.
    pub notify_on_bootstrap: bool,
    /// Fetch entity details for completed tasks before dispatch.
    pub enrich_candidates: bool,
}

/// Inbound triggers for the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Accept `POST /hooks/{feed}` pings.
    pub webhooks_enabled: bool,
    /// Address the webhook listener binds to.
    pub listen_addr: String,
    /// Seconds between timer-driven runs; 0 disables the timer.
    pub poll_interval_secs: u64,
}

/// Local SQLite database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/chatrelay/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("chatrelay")
            .join("config.yaml")
    }

    /// Feeds that are switched on, in a stable order.
    pub fn enabled_feeds(&self) -> Vec<FeedId> {
        let mut feeds = Vec::new();
        if self.storage.enabled {
            feeds.push(FeedId::storage());
        }
        if self.tasks.enabled {
            feeds.push(FeedId::tasks());
        }
        feeds
    }

    /// Allow-list prefixes for `feed`.
    pub fn allow_list(&self, feed: &FeedId) -> &[String] {
        if *feed == FeedId::storage() {
            &self.storage.watched_folders
        } else if *feed == FeedId::tasks() {
            &self.tasks.watched_spaces
        } else {
            &[]
        }
    }

    /// Builds the route table from the `routing` section.
    pub fn route_table(&self) -> Result<RouteTable, DomainError> {
        let default_channel = ChannelName::new(self.routing.default_channel.clone())?;
        let rules = self
            .routing
            .rules
            .iter()
            .map(|r| RouteRule::new(r.prefix.clone(), ChannelName::new(r.channel.clone())?))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RouteTable::new(rules, default_channel))
    }

    /// Copy of the configuration with inline tokens masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for creds in [
            &mut copy.storage.credentials,
            &mut copy.tasks.credentials,
            &mut copy.messaging.credentials,
        ] {
            if creds.token.is_some() {
                creds.token = Some(REDACTED.to_string());
            }
        }
        copy
    }
}

const REDACTED: &str = "********";

impl Credentials {
    /// Returns true if either an inline token or an env var name is set.
    pub fn is_configured(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
            || self.token_env.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Resolves the token: inline value first, then the environment.
    pub fn resolve(&self) -> Option<String> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Some(token.to_string());
        }
        self.token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|t| !t.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.dropboxapi.com/2".to_string(),
            credentials: Credentials::default(),
            root_path: String::new(),
            page_size: 500,
            watched_folders: Vec::new(),
        }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.clickup.com/api/v2".to_string(),
            credentials: Credentials::default(),
            team_id: None,
            page_size: 100,
            watched_spaces: Vec::new(),
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://slack.com/api".to_string(),
            credentials: Credentials::default(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_channel: "general".to_string(),
            rules: Vec::new(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            dispatch_timeout_secs: 10,
            dispatch_concurrency: 4,
            notify_on_bootstrap: false,
            enrich_candidates: false,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            webhooks_enabled: true,
            listen_addr: "127.0.0.1:8787".to_string(),
            poll_interval_secs: 0,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("chatrelay")
                .join("chatrelay.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.fetch_timeout_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn check_base_url(errors: &mut Vec<ValidationError>, field: &str, url: &str) {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(ValidationError::new(
            field,
            format!("must be an http(s) URL, got '{url}'"),
        ));
    }
}

fn check_credentials(errors: &mut Vec<ValidationError>, section: &str, creds: &Credentials) {
    if !creds.is_configured() {
        errors.push(ValidationError::new(
            format!("{section}.token"),
            "either token or token_env must be set",
        ));
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.enabled_feeds().is_empty() {
            errors.push(ValidationError::new(
                "storage.enabled",
                "at least one of storage or tasks must be enabled",
            ));
        }

        // --- storage ---
        if self.storage.enabled {
            check_base_url(&mut errors, "storage.base_url", &self.storage.base_url);
            check_credentials(&mut errors, "storage", &self.storage.credentials);
            if self.storage.page_size == 0 {
                errors.push(ValidationError::new(
                    "storage.page_size",
                    "must be greater than 0",
                ));
            }
        }

        // --- tasks ---
        if self.tasks.enabled {
            check_base_url(&mut errors, "tasks.base_url", &self.tasks.base_url);
            check_credentials(&mut errors, "tasks", &self.tasks.credentials);
            if self.tasks.team_id.as_deref().map_or(true, str::is_empty) {
                errors.push(ValidationError::new(
                    "tasks.team_id",
                    "required when tasks is enabled",
                ));
            }
            if self.tasks.page_size == 0 {
                errors.push(ValidationError::new(
                    "tasks.page_size",
                    "must be greater than 0",
                ));
            }
        }

        // --- messaging ---
        check_base_url(&mut errors, "messaging.base_url", &self.messaging.base_url);
        check_credentials(&mut errors, "messaging", &self.messaging.credentials);

        // --- routing ---
        if let Err(e) = ChannelName::new(self.routing.default_channel.clone()) {
            errors.push(ValidationError::new(
                "routing.default_channel",
                e.to_string(),
            ));
        }
        for (idx, rule) in self.routing.rules.iter().enumerate() {
            if rule.prefix.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("routing.rules[{idx}].prefix"),
                    "must not be empty",
                ));
            }
            if let Err(e) = ChannelName::new(rule.channel.clone()) {
                errors.push(ValidationError::new(
                    format!("routing.rules[{idx}].channel"),
                    e.to_string(),
                ));
            }
        }

        // --- sync ---
        if self.sync.fetch_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "sync.fetch_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.sync.dispatch_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "sync.dispatch_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.sync.dispatch_concurrency == 0 || self.sync.dispatch_concurrency > 32 {
            errors.push(ValidationError::new(
                "sync.dispatch_concurrency",
                "must be in range 1..=32",
            ));
        }

        // --- trigger ---
        if self.trigger.webhooks_enabled && self.trigger.listen_addr.parse::<SocketAddr>().is_err()
        {
            errors.push(ValidationError::new(
                "trigger.listen_addr",
                format!("not a socket address: '{}'", self.trigger.listen_addr),
            ));
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError::new(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use chatrelay_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .storage_token_env("STORAGE_TOKEN")
///     .messaging_token_env("CHAT_TOKEN")
///     .default_channel("all-media")
///     .route("/Clients/Acme", "acme-chan")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- storage ---

    pub fn storage_enabled(mut self, enabled: bool) -> Self {
        self.config.storage.enabled = enabled;
        self
    }

    pub fn storage_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.storage.base_url = url.into();
        self
    }

    pub fn storage_token(mut self, token: impl Into<String>) -> Self {
        self.config.storage.credentials.token = Some(token.into());
        self
    }

    pub fn storage_token_env(mut self, var: impl Into<String>) -> Self {
        self.config.storage.credentials.token_env = Some(var.into());
        self
    }

    pub fn watched_folder(mut self, prefix: impl Into<String>) -> Self {
        self.config.storage.watched_folders.push(prefix.into());
        self
    }

    // --- tasks ---

    pub fn tasks_enabled(mut self, enabled: bool) -> Self {
        self.config.tasks.enabled = enabled;
        self
    }

    pub fn tasks_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.tasks.base_url = url.into();
        self
    }

    pub fn tasks_token(mut self, token: impl Into<String>) -> Self {
        self.config.tasks.credentials.token = Some(token.into());
        self
    }

    pub fn tasks_team_id(mut self, team_id: impl Into<String>) -> Self {
        self.config.tasks.team_id = Some(team_id.into());
        self
    }

    // --- messaging ---

    pub fn messaging_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.messaging.base_url = url.into();
        self
    }

    pub fn messaging_token(mut self, token: impl Into<String>) -> Self {
        self.config.messaging.credentials.token = Some(token.into());
        self
    }

    pub fn messaging_token_env(mut self, var: impl Into<String>) -> Self {
        self.config.messaging.credentials.token_env = Some(var.into());
        self
    }

    // --- routing ---

    pub fn default_channel(mut self, channel: impl Into<String>) -> Self {
        self.config.routing.default_channel = channel.into();
        self
    }

    pub fn route(mut self, prefix: impl Into<String>, channel: impl Into<String>) -> Self {
        self.config.routing.rules.push(RouteRuleConfig {
            prefix: prefix.into(),
            channel: channel.into(),
        });
        self
    }

    // --- sync ---

    pub fn notify_on_bootstrap(mut self, notify: bool) -> Self {
        self.config.sync.notify_on_bootstrap = notify;
        self
    }

    pub fn enrich_candidates(mut self, enrich: bool) -> Self {
        self.config.sync.enrich_candidates = enrich;
        self
    }

    pub fn dispatch_concurrency(mut self, n: usize) -> Self {
        self.config.sync.dispatch_concurrency = n;
        self
    }

    // --- trigger ---

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.trigger.listen_addr = addr.into();
        self
    }

    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.trigger.poll_interval_secs = secs;
        self
    }

    // --- database / logging ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
