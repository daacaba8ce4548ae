//! Content-type conversion subsystem.
//!
//! # Data Flow
//! ```text
//! Module registration (startup):
//!     Module::converters()
//!     → registry.rs (ConverterRegistryBuilder, duplicate keys rejected)
//!     → ConverterRegistry (frozen, shared via Arc)
//!
//! Request time:
//!     body bytes + declared content type → From converter → typed object
//!     typed result + declared content type → To converter → body bytes
//! ```
//!
//! # Design Decisions
//! - Exact content-type string match, no negotiation or wildcards
//! - Keys are (content type, direction, type); first registration is kept
//! - Converter panics are caught and reported as conversion failures

pub mod registry;

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use registry::{ConvertError, ConverterRegistry, ConverterRegistryBuilder, RegistryError};

/// A type-erased, shareable converted value.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Runtime identity of a Rust type plus its readable name.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, generics stripped.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Which way a converter maps between bytes and a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Content type → Rust type (request body decoding).
    From,
    /// Rust type → content type (result encoding).
    To,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::From => f.write_str("from"),
            Direction::To => f.write_str("to"),
        }
    }
}
