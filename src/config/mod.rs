//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → shared via Arc with the engine and the HTTP layer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, DispatchConfig, EngineConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    RetryConfig, TimeoutConfig, TokenConfig,
};
pub use validation::{validate_config, ValidationError};
