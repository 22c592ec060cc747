//! Webhook receiver.
//!
//! A minimal axum server with a single `POST /crowdin-webhook` route. Every
//! request is authenticated by recomputing the HMAC-SHA256 of the raw body
//! and comparing it to the signature header in constant time; only then is
//! the JSON inspected. Dispatch never blocks the response: downloads run on
//! spawned tasks, and a busy engine is acknowledged without work.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::SyncTrigger;

const WEBHOOK_PATH: &str = "/crowdin-webhook";
const SIGNATURE_HEADER: &str = "x-crowdin-webhook-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("failed to bind webhook port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
}

/// Counters exposed for admin inspection.
#[derive(Debug, Default)]
pub struct WebhookStats {
    requests: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
}

impl WebhookStats {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Shared handler context.
pub struct WebhookContext {
    secret: String,
    trigger: Arc<dyn SyncTrigger>,
    stats: Arc<WebhookStats>,
    /// Namespaces eligible for targeted downloads; an inferred namespace
    /// outside this list falls back to a full sync.
    known_namespaces: Vec<String>,
    /// With hot reload disabled, events are logged but trigger nothing.
    hot_reload: bool,
}

impl WebhookContext {
    pub fn new(
        secret: impl Into<String>,
        trigger: Arc<dyn SyncTrigger>,
        known_namespaces: Vec<String>,
        hot_reload: bool,
    ) -> Self {
        Self {
            secret: secret.into(),
            trigger,
            stats: Arc::new(WebhookStats::default()),
            known_namespaces,
            hot_reload,
        }
    }

    pub fn stats(&self) -> Arc<WebhookStats> {
        Arc::clone(&self.stats)
    }
}

/// The webhook route tree; split out so tests can drive it in-process.
pub fn router(context: Arc<WebhookContext>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(handle))
        .with_state(context)
}

/// A running webhook server with a graceful-stop handle.
pub struct WebhookServer {
    port: u16,
    stats: Arc<WebhookStats>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl WebhookServer {
    /// Bind and serve on the configured port.
    pub async fn start(
        port: u16,
        context: Arc<WebhookContext>,
    ) -> Result<WebhookServer, WebhookError> {
        let stats = context.stats();
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|source| WebhookError::Bind { port, source })?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = router(context);
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                warn!(error = %e, "webhook server stopped with error");
            }
        });
        info!(port, path = WEBHOOK_PATH, "webhook server listening");
        Ok(WebhookServer {
            port,
            stats,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn stats(&self) -> &WebhookStats {
        &self.stats
    }

    /// Stop accepting requests and wait for in-flight ones.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = self.handle.await;
        info!("webhook server stopped");
    }
}

async fn handle(
    State(context): State<Arc<WebhookContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    context.stats.requests.fetch_add(1, Ordering::Relaxed);

    if !signature_valid(&context.secret, &headers, &body) {
        context.stats.errors.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "malformed webhook body");
            context.stats.errors.fetch_add(1, Ordering::Relaxed);
            return (StatusCode::BAD_REQUEST, "malformed body");
        }
    };
    let Some(event) = payload.get("event").and_then(|v| v.as_str()) else {
        context.stats.errors.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::BAD_REQUEST, "missing event");
    };

    if !context.hot_reload {
        debug!(event, "hot reload disabled, webhook event logged only");
        context.stats.successes.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::OK, "accepted");
    }

    match event {
        "file.approved" | "file.translated" => {
            if context.trigger.is_busy() {
                context.stats.successes.fetch_add(1, Ordering::Relaxed);
                return (StatusCode::ACCEPTED, "sync in progress");
            }
            let namespace = infer_namespace(&context, &payload);
            info!(event, namespace = ?namespace, "webhook download triggered");
            let trigger = Arc::clone(&context.trigger);
            tokio::spawn(async move {
                trigger.trigger_download(namespace.as_deref()).await;
            });
        }
        "project.approved" | "project.translated" => {
            if context.trigger.is_busy() {
                context.stats.successes.fetch_add(1, Ordering::Relaxed);
                return (StatusCode::ACCEPTED, "sync in progress");
            }
            info!(event, "webhook full sync triggered");
            let trigger = Arc::clone(&context.trigger);
            tokio::spawn(async move {
                trigger.trigger_full_sync().await;
            });
        }
        "translation.updated" => {
            // Fires per string; syncing here would flood the remote.
            debug!(event, "translation update noted");
        }
        other => {
            debug!(event = other, "unhandled webhook event");
        }
    }

    context.stats.successes.fetch_add(1, Ordering::Relaxed);
    (StatusCode::OK, "ok")
}

/// Constant-time signature verification via `Mac::verify_slice`.
fn signature_valid(secret: &str, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(header) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Ok(expected) = hex::decode(header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Map the event's file identity onto a namespace.
///
/// The remote file is always `<ns>.yml`; an unknown or unconfigured
/// namespace yields `None`, which escalates to a full sync.
fn infer_namespace(context: &WebhookContext, payload: &serde_json::Value) -> Option<String> {
    let file_name = payload
        .get("file")
        .and_then(|file| file.get("name"))
        .and_then(|name| name.as_str())?;
    let namespace = file_name.strip_suffix(".yml")?;
    if context.known_namespaces.is_empty()
        || context.known_namespaces.iter().any(|ns| ns == namespace)
    {
        Some(namespace.to_string())
    } else {
        None
    }
}

/// Compute the signature header value for a body; used by tests and by
/// operators verifying their remote configuration.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
