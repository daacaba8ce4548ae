//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RouteDescriptor[] (from registered modules)
//!     → group by verb and path pattern
//!     → ordering.rs (sort by path specificity)
//!     → reject ambiguous parameter shapes
//!     → Freeze as immutable Router
//!
//! Incoming Request (verb, path, supplied parameter names)
//!     → router.rs (first pattern matching the path)
//!     → parameter-shape check among that pattern's handlers
//!     → Return: matched RouteDescriptor or NotFound / ShapeMismatch
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex: literal and `*` segments only
//! - Deterministic: same input always matches same route
//! - Parameter names compare case-insensitively

pub mod descriptor;
pub mod ordering;
pub mod pattern;
pub mod router;

pub use descriptor::{
    NullResult, ParamSource, ParameterSpec, RenderSpec, Route, RouteDescriptor, RouteTarget,
    ServeSpec,
};
pub use pattern::{normalize_path, PathPattern, PatternError};
pub use router::{ResolveError, Router, RouterError};
