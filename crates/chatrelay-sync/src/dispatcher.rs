//! Notification dispatcher
//!
//! Renders each candidate and posts exactly one message for it. A failed or
//! timed-out send is reported as [`DispatchResult::Failed`] and never stops
//! the remaining sends.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tracing::debug;

use chatrelay_core::domain::{ChannelName, DispatchResult, NotificationCandidate};
use chatrelay_core::ports::{IMessageRenderer, IMessagingSink};

/// A candidate paired with its resolved channel and delivery result
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub candidate: NotificationCandidate,
    pub channel: ChannelName,
    pub result: DispatchResult,
}

/// Sends rendered notifications through the messaging sink
#[derive(Clone)]
pub struct NotificationDispatcher {
    renderer: Arc<dyn IMessageRenderer>,
    sink: Arc<dyn IMessagingSink>,
    timeout: Duration,
    concurrency: usize,
}

impl NotificationDispatcher {
    pub fn new(
        renderer: Arc<dyn IMessageRenderer>,
        sink: Arc<dyn IMessagingSink>,
        timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            renderer,
            sink,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Sends one candidate to `channel`
    pub async fn dispatch(
        &self,
        candidate: &NotificationCandidate,
        channel: &ChannelName,
    ) -> DispatchResult {
        let message = self.renderer.render(candidate);
        match tokio::time::timeout(self.timeout, self.sink.send(channel, &message)).await {
            Ok(Ok(())) => {
                debug!(subject = %candidate.subject_id, %channel, "Notification delivered");
                DispatchResult::Delivered
            }
            Ok(Err(e)) => DispatchResult::Failed(format!("{e:#}")),
            Err(_) => DispatchResult::Failed(format!("send timed out after {:?}", self.timeout)),
        }
    }

    /// Sends every routed candidate with bounded concurrency
    ///
    /// All results are returned; their order is unspecified.
    pub async fn dispatch_all(
        &self,
        routed: Vec<(NotificationCandidate, ChannelName)>,
    ) -> Vec<Dispatched> {
        stream::iter(routed)
            .map(|(candidate, channel)| async move {
                let result = self.dispatch(&candidate, &channel).await;
                Dispatched {
                    candidate,
                    channel,
                    result,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}
