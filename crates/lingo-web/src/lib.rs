//! HTTP API for Lingo.
//!
//! This crate exposes the translation service over a JSON API served by
//! axum. It includes:
//!
//! - CRUD endpoints for translations under `/api/translations`.
//! - A cached slice export at `/api/translations/export`.
//! - Tag listing and a status probe with cache statistics.

pub mod api;
pub mod server;
pub mod state;

pub use server::WebServer;
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8080,
        }
    }
}
