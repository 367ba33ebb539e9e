//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers. The service owns the repository and export cache; the raw
//! database handle is kept for the status probe.

use lingo_store::{Database, TranslationService};

use crate::WebConfig;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Translation reads, writes and cached exports.
    pub service: TranslationService,

    /// Database handle for health checks.
    pub db: Database,

    /// Web server configuration.
    pub config: WebConfig,
}
