//! Switchyard: declarative HTTP and JSON-RPC dispatch.
//!
//! Modules declare routes, converters and RPC objects; the engine resolves
//! each request to a handler, binds its arguments, invokes it and renders
//! the result.

pub mod binding;
pub mod config;
pub mod convert;
pub mod demo;
pub mod engine;
pub mod error;
pub mod handler;
pub mod http;
pub mod observability;
pub mod render;
pub mod resilience;
pub mod routing;
pub mod rpc;
pub mod security;

pub use config::EngineConfig;
pub use convert::{ConverterRegistry, ConverterRegistryBuilder};
pub use engine::{Engine, EngineBuilder, EngineError, Module};
pub use error::DispatchError;
pub use handler::{Args, HandlerError, HookFlow, Outcome, ParamType, Reply, ResponseDraft};
pub use http::{HttpServer, InboundRequest};
pub use resilience::RetryPolicy;
pub use routing::{Route, RouteDescriptor};
pub use rpc::{Export, ExportPolicy, RpcMethod, RpcObject};
pub use security::Principal;
