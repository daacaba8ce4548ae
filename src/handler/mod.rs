//! Handler subsystem.
//!
//! # Data Flow
//! ```text
//! binding (ParameterSpec[] + request) → Args
//!     → Handler::call (async on the reactor, or spawn_blocking)
//!     → Outcome { Reply, hook }
//!     → render / rpc
//! ```
//!
//! # Design Decisions
//! - Handlers are plain closures paired with an explicit route descriptor
//! - Blocking handlers never run on the reactor thread
//! - Panics are caught and surface as invocation errors

pub mod args;
pub mod context;
pub mod reply;

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

pub use args::{ArgValue, Args, ParamType};
pub use context::{RequestContext, UploadedFile};
pub use reply::{FileRef, HookFlow, Opaque, Outcome, Reply, ResponseDraft, Scalar, REDIRECT_PREFIX};

/// Failure raised by a handler.
///
/// `kind` classifies the failure so retry policies can exclude it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    kind: Option<String>,
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }

    pub fn with_kind(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        Self::with_kind("io", e.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::with_kind("json", e.to_string())
    }
}

pub type HandlerResult = Result<Outcome, HandlerError>;

type AsyncFn = Arc<dyn Fn(Args) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type BlockingFn = Arc<dyn Fn(Args) -> HandlerResult + Send + Sync>;

/// A registered handler function.
#[derive(Clone)]
pub enum Handler {
    Async(AsyncFn),
    /// Dispatched onto the blocking worker pool.
    Blocking(BlockingFn),
}

impl Handler {
    pub fn from_async<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Into<Outcome>,
    {
        Handler::Async(Arc::new(move |args| {
            f(args).map(|result| result.map(Into::into)).boxed()
        }))
    }

    pub fn blocking<F, R>(f: F) -> Self
    where
        F: Fn(Args) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<Outcome>,
    {
        Handler::Blocking(Arc::new(move |args| f(args).map(Into::into)))
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Handler::Blocking(_))
    }

    /// Invoke once with fully bound arguments.
    pub async fn call(&self, args: Args) -> HandlerResult {
        match self {
            Handler::Async(f) => {
                let future = match catch_unwind(AssertUnwindSafe(|| f(args))) {
                    Ok(future) => future,
                    Err(_) => return Err(HandlerError::with_kind("panic", "handler panicked")),
                };
                AssertUnwindSafe(future)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(HandlerError::with_kind("panic", "handler panicked")))
            }
            Handler::Blocking(f) => {
                let f = Arc::clone(f);
                match tokio::task::spawn_blocking(move || f(args)).await {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => {
                        Err(HandlerError::with_kind("panic", "handler panicked"))
                    }
                    Err(_) => Err(HandlerError::new("handler cancelled")),
                }
            }
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Async(_) => f.write_str("Handler::Async"),
            Handler::Blocking(_) => f.write_str("Handler::Blocking"),
        }
    }
}
