//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router forwarding every request to the engine
//! - Wire up middleware (request ID, tracing, timeout, authentication)
//! - Bind server to listener with graceful shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::http::request::{InboundRequest, UuidRequestId};
use crate::security::{bearer_authn, TokenTable};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub max_body_bytes: usize,
}

/// HTTP front end for an [`Engine`].
pub struct HttpServer {
    router: Router,
    config: EngineConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: EngineConfig, engine: Arc<Engine>) -> Self {
        let state = AppState {
            engine,
            max_body_bytes: config.dispatch.max_body_bytes,
        };
        let tokens = Arc::new(TokenTable::from_config(&config.auth));
        let router = Self::build_router(&config, state, tokens);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &EngineConfig, state: AppState, tokens: Arc<TokenTable>) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(middleware::from_fn_with_state(tokens, bearer_authn))
            .layer(DefaultBodyLimit::max(config.dispatch.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The fully layered router, for in-process serving and tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match InboundRequest::from_http(request, state.max_body_bytes).await {
        Ok(inbound) => state.engine.dispatch(inbound).await,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected request before dispatch");
            e.into_response()
        }
    }
}

/// Resolves on Ctrl+C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
