//! Request-level failures and their HTTP mapping.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::binding::BindError;
use crate::handler::HandlerError;
use crate::routing::ResolveError;
use crate::security::AuthError;

/// Every way a request can fail before or during invocation.
///
/// Rendering failures are handled inside the renderer and never reach here.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("handler `{route}` failed: {source}")]
    Invocation {
        route: String,
        #[source]
        source: HandlerError,
    },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("malformed request: {0}")]
    BadRequest(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Resolve(_) => StatusCode::NOT_FOUND,
            DispatchError::Auth(e) => e.status(),
            DispatchError::Bind(e) => e.status(),
            DispatchError::Invocation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Resolve(_) => "resolve",
            DispatchError::Auth(_) => "auth",
            DispatchError::Bind(_) => "bind",
            DispatchError::Invocation { .. } => "invocation",
            DispatchError::PayloadTooLarge { .. } => "payload",
            DispatchError::BadRequest(_) => "request",
        }
    }
}

impl IntoResponse for DispatchError {
    /// Generic body: the status reason only. Details stay in the logs.
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(
            status.canonical_reason().unwrap_or("Error").to_string(),
        ));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        if matches!(self, DispatchError::Auth(AuthError::Unauthenticated)) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
