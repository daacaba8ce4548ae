//! Dispatch engine.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → routing::Router::resolve (verb, path, supplied parameter names)
//!     → security::authorize (protected prefix, required roles)
//!     → binding::bind_arguments           ┐
//!     → Handler::call (retry policy)      │ handler routes
//!     → render::Renderer::render          ┘
//!     → rpc::dispatch_call                  RPC routes
//!     → rpc::render_scheme                  scheme routes
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Built once by [`EngineBuilder`]; read-only afterwards, shared via `Arc`
//! - Every failure ends in a well-formed response
//! - Role checks run before arguments are bound

pub mod builder;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::binding::bind_arguments;
use crate::convert::ConverterRegistry;
use crate::error::DispatchError;
use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::render::Renderer;
use crate::resilience::{run_with_retry, RetryPolicy};
use crate::routing::{RouteDescriptor, RouteTarget, Router};
use crate::rpc::{dispatch_call, render_scheme};
use crate::security::authorize;

pub use builder::{EngineBuilder, EngineError, Module};

/// Immutable dispatch tables plus the renderer.
#[derive(Debug)]
pub struct Engine {
    router: Router,
    converters: Arc<ConverterRegistry>,
    renderer: Renderer,
    default_retry: RetryPolicy,
    modules: Vec<String>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Run one request through resolution, authorization, binding,
    /// invocation and rendering.
    pub async fn dispatch(&self, request: InboundRequest) -> Response {
        let start = Instant::now();
        let verb = request.method.clone();
        let path = request.path.clone();
        let request_id = request.request_id.clone();

        let (response, kind) = match self.router.resolve(&verb, &path, &request.supplied_names()) {
            Ok(route) => {
                let kind = route.target.kind();
                tracing::debug!(
                    request_id = ?request_id,
                    method = %verb,
                    path = %path,
                    route = %route.name,
                    "Dispatching request"
                );
                let response = match self.invoke(&route, request).await {
                    Ok(response) => response,
                    Err(e) => self.fail(e, request_id.as_deref(), &path),
                };
                (response, kind)
            }
            Err(e) => (self.fail(e.into(), request_id.as_deref(), &path), "none"),
        };

        metrics::record_request(verb.as_str(), response.status().as_u16(), kind, start);
        response
    }

    async fn invoke(
        &self,
        route: &Arc<RouteDescriptor>,
        request: InboundRequest,
    ) -> Result<Response, DispatchError> {
        authorize(
            route.authenticated,
            &route.required_roles,
            request.principal.as_ref(),
        )?;

        let context = Arc::new(request.context());
        let policy = route.retry.resolve(&self.default_retry);

        match &route.target {
            RouteTarget::Handler(handler) => {
                let args = bind_arguments(route, &request, &context, &self.converters)?;
                let outcome = run_with_retry(policy, &route.name, || handler.call(args.clone()))
                    .await
                    .map_err(|source| DispatchError::Invocation {
                        route: route.name.clone(),
                        source,
                    })?;
                Ok(self.renderer.render(&route.render, outcome, &context).await)
            }
            RouteTarget::Rpc(object) => {
                let reply =
                    dispatch_call(object, &request.body, &context, &self.converters, policy).await;
                Ok(reply.into_response())
            }
            RouteTarget::RpcScheme(object) => {
                let mut response = Response::new(Body::from(render_scheme(object)));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                Ok(response)
            }
        }
    }

    fn fail(&self, error: DispatchError, request_id: Option<&str>, path: &str) -> Response {
        let status = error.status();
        if status.is_server_error() {
            tracing::error!(
                request_id = ?request_id,
                path = %path,
                kind = error.kind(),
                error = %error,
                "Request failed"
            );
        } else {
            tracing::debug!(
                request_id = ?request_id,
                path = %path,
                kind = error.kind(),
                status = status.as_u16(),
                error = %error,
                "Request rejected"
            );
        }
        error.into_response()
    }
}
