//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Bound invocation:
//!     → retries.rs (bounded attempts, fixed delay, excluded error kinds)
//!     → handler
//!     → last failure (if any) surfaced to the engine
//! ```
//!
//! # Design Decisions
//! - Retries wrap a single handler invocation only
//! - Timeouts belong to the transport layer, not the engine

pub mod retries;

pub use retries::{run_with_retry, RetryPolicy, RetrySetting};
