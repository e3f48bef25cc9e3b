//! ProviderSet - wires the concrete adapters from configuration

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use chatrelay_core::config::{Config, Credentials};
use chatrelay_core::domain::FeedId;
use chatrelay_core::ports::{IChangeFeed, IMessageRenderer, IMessagingSink, ITaskDirectory};

use crate::chat::ChatSink;
use crate::client::ApiClient;
use crate::render::TextRenderer;
use crate::storage::StorageChangeFeed;
use crate::tasks::TaskChangeFeed;

/// All adapters a process needs, built once from [`Config`]
///
/// Enabled feeds must have credentials; a missing messaging token or task
/// team only surfaces when the sink or directory is actually requested, so
/// read-only commands work with a partial configuration.
pub struct ProviderSet {
    feeds: Vec<Arc<dyn IChangeFeed>>,
    sink: Option<Arc<dyn IMessagingSink>>,
    directory: Option<Arc<dyn ITaskDirectory>>,
    renderer: Arc<dyn IMessageRenderer>,
}

fn token(section: &str, credentials: &Credentials) -> Result<String> {
    credentials.resolve().ok_or_else(|| match &credentials.token_env {
        Some(var) => anyhow!("{section}.token_env names '{var}', which is unset or empty"),
        None => anyhow!("{section}.token is not configured"),
    })
}

impl ProviderSet {
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut feeds: Vec<Arc<dyn IChangeFeed>> = Vec::new();

        if config.storage.enabled {
            let client = ApiClient::new(
                token("storage", &config.storage.credentials)?,
                &config.storage.base_url,
            );
            feeds.push(Arc::new(StorageChangeFeed::new(
                client,
                &config.storage.root_path,
                config.storage.page_size,
            )));
        }

        let tasks = match (&config.tasks.team_id, config.tasks.credentials.resolve()) {
            (Some(team), Some(tok)) => Some(Arc::new(TaskChangeFeed::new(
                ApiClient::new(tok, &config.tasks.base_url),
                team,
                config.tasks.page_size,
            ))),
            _ => None,
        };
        if config.tasks.enabled {
            let feed = match &tasks {
                Some(feed) => feed.clone(),
                None => {
                    token("tasks", &config.tasks.credentials)?;
                    return Err(anyhow!("tasks.team_id is required when the tasks feed is enabled"));
                }
            };
            feeds.push(feed);
        }

        let sink = config.messaging.credentials.resolve().map(|tok| {
            Arc::new(ChatSink::new(ApiClient::new(tok, &config.messaging.base_url)))
                as Arc<dyn IMessagingSink>
        });

        info!(
            feeds = feeds.len(),
            messaging = sink.is_some(),
            directory = tasks.is_some(),
            "Providers configured"
        );

        Ok(Self {
            feeds,
            sink,
            directory: tasks.map(|t| t as Arc<dyn ITaskDirectory>),
            renderer: Arc::new(TextRenderer),
        })
    }

    /// Enabled feeds, storage first
    pub fn feeds(&self) -> &[Arc<dyn IChangeFeed>] {
        &self.feeds
    }

    pub fn feed(&self, id: &FeedId) -> Option<Arc<dyn IChangeFeed>> {
        self.feeds.iter().find(|f| f.feed_id() == id).cloned()
    }

    pub fn sink(&self) -> Result<Arc<dyn IMessagingSink>> {
        self.sink
            .clone()
            .ok_or_else(|| anyhow!("messaging.token is not configured"))
    }

    pub fn directory(&self) -> Result<Arc<dyn ITaskDirectory>> {
        self.directory
            .clone()
            .context("task directory needs tasks.team_id and a tasks token")
    }

    pub fn renderer(&self) -> Arc<dyn IMessageRenderer> {
        self.renderer.clone()
    }
}
