//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → security::authn (bearer token → Principal)
//!     → request.rs (buffer body, decode query/form/multipart)
//!     → engine::Engine::dispatch
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{InboundRequest, UuidRequestId, X_REQUEST_ID};
pub use server::{shutdown_signal, AppState, HttpServer};
