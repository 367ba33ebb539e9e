//! Main web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and serves
//! them until the shutdown future resolves (Ctrl-C for [`WebServer::start`]).

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use lingo_store::{Database, TranslationService};

use crate::WebConfig;
use crate::api;
use crate::state::AppState;

/// The Lingo HTTP server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: WebConfig, service: TranslationService, db: Database) -> Self {
        let state = Arc::new(AppState {
            service,
            db,
            config: config.clone(),
        });
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers(Any);

        Router::new()
            .route(
                "/api/translations",
                get(api::list_translations).post(api::create_translation),
            )
            // Static segment wins over `{id}`.
            .route("/api/translations/export", get(api::export_translations))
            .route(
                "/api/translations/{id}",
                get(api::show_translation)
                    .put(api::update_translation)
                    .delete(api::delete_translation),
            )
            .route("/api/tags", get(api::list_tags))
            .route("/api/status", get(api::status))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %addr, "starting web server");
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("web server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to listen for ctrl-c, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
