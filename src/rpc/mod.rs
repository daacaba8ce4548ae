//! JSON-RPC 2.0 dispatch.
//!
//! # Data Flow
//! ```text
//! POST body
//!     → envelope.rs (parse, validate version and params shape)
//!     → object.rs (exported method lookup)
//!     → binding (named params, same conversions as query strings)
//!     → Handler::call (with the route's retry policy)
//!     → envelope.rs (result / error envelope, or nothing for notifications)
//! ```
//!
//! # Design Decisions
//! - Only named parameters; positional arrays are rejected with -32602
//! - Early validation failures always answer, with id "" when unknown
//! - Notifications answer 200 with an empty body whatever the outcome

pub mod dispatcher;
pub mod envelope;
pub mod object;
pub mod scheme;

pub use dispatcher::{dispatch_call, result_value, RpcReply};
pub use envelope::{RpcError, RpcPayload, RpcRequest, RpcResponse};
pub use object::{Export, ExportPolicy, RpcMethod, RpcMethodBuilder, RpcObject};
pub use scheme::render_scheme;
