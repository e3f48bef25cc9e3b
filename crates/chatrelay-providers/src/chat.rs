//! Chat messaging sink
//!
//! Posts one message per call to `POST /chat.postMessage`. The chat API
//! answers `200 OK` even for rejected messages; the JSON body's `ok` flag
//! decides success.

use anyhow::{bail, Context};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use chatrelay_core::domain::ChannelName;
use chatrelay_core::ports::{IMessagingSink, RenderedMessage};

use crate::client::ApiClient;

const POST_MESSAGE_PATH: &str = "/chat.postMessage";

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
}

/// [`IMessagingSink`] for the chat platform
pub struct ChatSink {
    client: ApiClient,
}

impl ChatSink {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IMessagingSink for ChatSink {
    async fn send(&self, channel: &ChannelName, message: &RenderedMessage) -> anyhow::Result<()> {
        let request = self
            .client
            .request(Method::POST, POST_MESSAGE_PATH)
            .json(&json!({
                "channel": channel.as_str(),
                "text": message.text,
            }));

        let response: PostMessageResponse = self
            .client
            .send_json(request)
            .await
            .with_context(|| format!("Failed to post message to #{}", channel))?;

        if !response.ok {
            bail!(
                "chat API rejected message for #{}: {}",
                channel,
                response.error.as_deref().unwrap_or("unknown_error")
            );
        }

        debug!(%channel, ts = ?response.ts, "Message posted");
        Ok(())
    }
}
