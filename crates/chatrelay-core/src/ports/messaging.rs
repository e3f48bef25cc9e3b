//! Messaging ports (driven/secondary ports)
//!
//! Rendering and delivery are separate collaborators: the renderer turns a
//! candidate into text, the sink delivers text to a channel.

use serde::{Deserialize, Serialize};

use crate::domain::{candidate::NotificationCandidate, newtypes::ChannelName};

/// A message ready to be posted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub text: String,
}

impl RenderedMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Port trait for turning candidates into messages
pub trait IMessageRenderer: Send + Sync {
    fn render(&self, candidate: &NotificationCandidate) -> RenderedMessage;
}

/// Port trait for posting messages to a chat platform
#[async_trait::async_trait]
pub trait IMessagingSink: Send + Sync {
    /// Posts exactly one message to `channel`
    async fn send(&self, channel: &ChannelName, message: &RenderedMessage) -> anyhow::Result<()>;
}
