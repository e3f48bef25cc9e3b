//! Webhook listener
//!
//! Upstream services ping `POST /hooks/{feed}` when something changed; the
//! body is ignored and the ping only requests a sync run for that feed.
//!
//! | Request              | Response                                  |
//! |----------------------|-------------------------------------------|
//! | `POST /hooks/{feed}` | 202 run queued, 200 coalesced, 404 unknown feed, 503 worker stopped |
//! | `GET /health`        | 200 with per-feed last-run state          |
//! | anything else        | 404 / 405                                 |

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chatrelay_core::domain::FeedId;
use chatrelay_sync::{SyncHandle, TriggerOutcome};

/// Trigger handles of every running sync worker
pub type FeedRegistry = Arc<DashMap<FeedId, SyncHandle>>;

/// HTTP listener translating webhook pings into sync triggers
pub struct WebhookListener {
    listener: TcpListener,
    registry: FeedRegistry,
}

impl WebhookListener {
    /// Binds `addr` (e.g. `"127.0.0.1:8787"`, port 0 picks a free port)
    pub async fn bind(addr: &str, registry: FeedRegistry) -> anyhow::Result<Self> {
        let addr: SocketAddr = addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(addr = %self.local_addr()?, "Webhook listener started");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = result?;
                    let io = TokioIo::new(stream);
                    let registry = Arc::clone(&self.registry);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let registry = Arc::clone(&registry);
                            async move { Ok::<_, hyper::Error>(handle_request(&req, &registry)) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(%peer, error = %e, "Webhook connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Webhook listener shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn respond(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Routes one request
pub fn handle_request<B>(req: &Request<B>, registry: &DashMap<FeedId, SyncHandle>) -> Response<Full<Bytes>> {
    let path = req.uri().path();

    if path == "/health" {
        if req.method() != Method::GET {
            return respond(StatusCode::METHOD_NOT_ALLOWED, json!({"error": "method not allowed"}));
        }
        return respond(StatusCode::OK, health(registry));
    }

    let Some(name) = path.strip_prefix("/hooks/") else {
        return respond(StatusCode::NOT_FOUND, json!({"error": "not found"}));
    };
    if req.method() != Method::POST {
        return respond(StatusCode::METHOD_NOT_ALLOWED, json!({"error": "method not allowed"}));
    }

    let handle = FeedId::new(name.trim_end_matches('/').to_string())
        .ok()
        .and_then(|feed| registry.get(&feed).map(|h| h.value().clone()));
    let Some(handle) = handle else {
        debug!(feed = name, "Webhook for unknown feed");
        return respond(StatusCode::NOT_FOUND, json!({"error": format!("unknown feed '{}'", name)}));
    };

    match handle.trigger() {
        Ok(TriggerOutcome::Queued) => {
            info!(feed = %handle.feed(), "Webhook queued sync run");
            respond(StatusCode::ACCEPTED, json!({"feed": handle.feed().as_str(), "status": "queued"}))
        }
        Ok(TriggerOutcome::Coalesced) => respond(
            StatusCode::OK,
            json!({"feed": handle.feed().as_str(), "status": "coalesced"}),
        ),
        Err(e) => {
            warn!(error = %e, "Webhook for stopped worker");
            respond(StatusCode::SERVICE_UNAVAILABLE, json!({"error": e.to_string()}))
        }
    }
}

fn health(registry: &DashMap<FeedId, SyncHandle>) -> serde_json::Value {
    let mut feeds: Vec<serde_json::Value> = registry
        .iter()
        .map(|entry| {
            let last_run = match entry.value().last_run() {
                None => json!(null),
                Some(Ok(summary)) => json!({
                    "ok": true,
                    "run_id": summary.run_id.to_string(),
                    "dispatched": summary.dispatched,
                    "failed": summary.failed,
                }),
                Some(Err(e)) => json!({"ok": false, "kind": e.kind(), "error": e.to_string()}),
            };
            json!({"feed": entry.key().as_str(), "last_run": last_run})
        })
        .collect();
    feeds.sort_by(|a, b| a["feed"].as_str().cmp(&b["feed"].as_str()));
    json!({"status": "ok", "feeds": feeds})
}
