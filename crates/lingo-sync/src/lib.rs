//! Bidirectional reconciliation between a `lingo` engine and Crowdin.
//!
//! The pipeline has four moving parts:
//! - [`client::CrowdinClient`] — typed v2 API client (storages, files,
//!   directories, translation uploads, builds).
//! - [`engine::SyncEngine`] — upload with md5 change detection, download
//!   with build polling, archive unpacking, conflict-aware merge and
//!   rollback, all behind a single compare-and-swap busy flag.
//! - [`webhook::WebhookServer`] — HMAC-authenticated `POST
//!   /crowdin-webhook` endpoint triggering targeted downloads.
//! - [`scheduler::AutoSyncScheduler`] — periodic full sync with
//!   skip-if-running.
//!
//! Nothing here is known to the core crate; the engine consumes `lingo`'s
//! registry and dynamic store through their public surface.

pub mod backup;
pub mod client;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod state;
pub mod webhook;

pub use client::{ClientError, CrowdinApi, CrowdinClient};
pub use config::{ConflictResolution, CrowdinConfig, SyncConfigError};
pub use engine::{
    MergeAction, SyncEngine, SyncError, SyncOperation, SyncResult, SyncRunStatus, SyncTrigger,
};
pub use scheduler::AutoSyncScheduler;
pub use webhook::{WebhookContext, WebhookServer, WebhookStats};
