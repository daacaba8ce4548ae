//! Converter registry.
//!
//! # Responsibilities
//! - Collect `From`/`To` converters declared by modules at startup
//! - Reject duplicate (content type, direction, type) keys
//! - Decode request bodies and encode results by exact content type
//! - Produce a sorted textual listing for diagnostics

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::body::Bytes;
use thiserror::Error;

use super::{AnyValue, Direction, TypeKey};

type DecodeFn = Arc<dyn Fn(&[u8]) -> Result<AnyValue, String> + Send + Sync>;
type EncodeFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<Vec<u8>, String> + Send + Sync>;

/// Failure while running a converter.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("no {direction} converter for {type_name} as `{content_type}`")]
    Missing {
        content_type: String,
        direction: Direction,
        type_name: &'static str,
    },

    #[error("converter `{converter}` failed: {reason}")]
    Failed { converter: String, reason: String },

    #[error("converter `{converter}` panicked")]
    Panicked { converter: String },

    #[error("converter `{converter}` produced an unexpected type")]
    TypeMismatch { converter: String },
}

/// Registration-time error.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate {direction} converter for {type_name} as `{content_type}`: `{existing}` already registered, `{rejected}` rejected")]
    Duplicate {
        content_type: String,
        direction: Direction,
        type_name: &'static str,
        existing: String,
        rejected: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ConverterKey {
    content_type: String,
    direction: Direction,
    ty: TypeKey,
}

#[derive(Clone)]
enum ConverterFn {
    Decode(DecodeFn),
    Encode(EncodeFn),
}

/// One registered converter.
#[derive(Clone)]
pub struct ConversionEntry {
    key: ConverterKey,
    name: String,
    func: ConverterFn,
}

impl ConversionEntry {
    pub fn content_type(&self) -> &str {
        &self.key.content_type
    }

    pub fn direction(&self) -> Direction {
        self.key.direction
    }

    pub fn type_key(&self) -> TypeKey {
        self.key.ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ConversionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionEntry")
            .field("content_type", &self.key.content_type)
            .field("direction", &self.key.direction)
            .field("type", &self.key.ty)
            .field("name", &self.name)
            .finish()
    }
}

/// Mutable collector used while modules are being registered.
#[derive(Default)]
pub struct ConverterRegistryBuilder {
    entries: BTreeMap<ConverterKey, ConversionEntry>,
}

impl ConverterRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter from `content_type` bytes into `T`.
    pub fn register_from<T, F, E>(
        &mut self,
        name: impl Into<String>,
        content_type: impl Into<String>,
        convert: F,
    ) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync,
        F: Fn(&[u8]) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let func: DecodeFn = Arc::new(move |bytes: &[u8]| {
            convert(bytes)
                .map(|value| Arc::new(value) as AnyValue)
                .map_err(|e| e.to_string())
        });
        self.insert(
            ConverterKey {
                content_type: content_type.into(),
                direction: Direction::From,
                ty: TypeKey::of::<T>(),
            },
            name.into(),
            ConverterFn::Decode(func),
        )
    }

    /// Register a converter from `T` into `content_type` bytes.
    pub fn register_to<T, F, E>(
        &mut self,
        name: impl Into<String>,
        content_type: impl Into<String>,
        convert: F,
    ) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<Vec<u8>, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let func: EncodeFn = Arc::new(move |value: &(dyn Any + Send + Sync)| {
            match value.downcast_ref::<T>() {
                Some(value) => convert(value).map_err(|e| e.to_string()),
                None => Err(format!("expected {}", std::any::type_name::<T>())),
            }
        });
        self.insert(
            ConverterKey {
                content_type: content_type.into(),
                direction: Direction::To,
                ty: TypeKey::of::<T>(),
            },
            name.into(),
            ConverterFn::Encode(func),
        )
    }

    fn insert(
        &mut self,
        key: ConverterKey,
        name: String,
        func: ConverterFn,
    ) -> Result<(), RegistryError> {
        if let Some(existing) = self.entries.get(&key) {
            return Err(RegistryError::Duplicate {
                content_type: key.content_type,
                direction: key.direction,
                type_name: key.ty.name(),
                existing: existing.name.clone(),
                rejected: name,
            });
        }
        tracing::debug!(
            converter = %name,
            content_type = %key.content_type,
            direction = %key.direction,
            type_name = key.ty.name(),
            "Converter registered"
        );
        self.entries
            .insert(key.clone(), ConversionEntry { key, name, func });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze into an immutable registry.
    pub fn build(self) -> ConverterRegistry {
        ConverterRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable converter table, read-only after startup.
#[derive(Default, Clone)]
pub struct ConverterRegistry {
    entries: BTreeMap<ConverterKey, ConversionEntry>,
}

impl ConverterRegistry {
    pub fn builder() -> ConverterRegistryBuilder {
        ConverterRegistryBuilder::new()
    }

    fn lookup(&self, content_type: &str, direction: Direction, ty: TypeKey) -> Option<&ConversionEntry> {
        self.entries.get(&ConverterKey {
            content_type: content_type.to_string(),
            direction,
            ty,
        })
    }

    pub fn has(&self, content_type: &str, direction: Direction, ty: TypeKey) -> bool {
        self.lookup(content_type, direction, ty).is_some()
    }

    /// Decode `body` into the type identified by `ty`.
    pub fn convert_from(
        &self,
        content_type: &str,
        ty: TypeKey,
        body: &[u8],
    ) -> Result<AnyValue, ConvertError> {
        let entry = self
            .lookup(content_type, Direction::From, ty)
            .ok_or_else(|| ConvertError::Missing {
                content_type: content_type.to_string(),
                direction: Direction::From,
                type_name: ty.name(),
            })?;
        let ConverterFn::Decode(func) = &entry.func else {
            return Err(ConvertError::TypeMismatch {
                converter: entry.name.clone(),
            });
        };
        match catch_unwind(AssertUnwindSafe(|| func(body))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(reason)) => Err(ConvertError::Failed {
                converter: entry.name.clone(),
                reason,
            }),
            Err(_) => Err(ConvertError::Panicked {
                converter: entry.name.clone(),
            }),
        }
    }

    /// Typed convenience over [`convert_from`](Self::convert_from).
    pub fn decode<T: Any + Send + Sync>(
        &self,
        content_type: &str,
        body: &[u8],
    ) -> Result<Arc<T>, ConvertError> {
        let value = self.convert_from(content_type, TypeKey::of::<T>(), body)?;
        value.downcast::<T>().map_err(|_| ConvertError::TypeMismatch {
            converter: format!("{content_type} from"),
        })
    }

    /// Encode a value whose concrete type is only known at runtime.
    ///
    /// Returns `None` when no converter exists for the value's type.
    pub fn convert_to(
        &self,
        content_type: &str,
        ty: TypeKey,
        value: &(dyn Any + Send + Sync),
    ) -> Option<Result<Bytes, ConvertError>> {
        let entry = self.lookup(content_type, Direction::To, ty)?;
        let ConverterFn::Encode(func) = &entry.func else {
            return Some(Err(ConvertError::TypeMismatch {
                converter: entry.name.clone(),
            }));
        };
        let result = match catch_unwind(AssertUnwindSafe(|| func(value))) {
            Ok(Ok(bytes)) => Ok(Bytes::from(bytes)),
            Ok(Err(reason)) => Err(ConvertError::Failed {
                converter: entry.name.clone(),
                reason,
            }),
            Err(_) => Err(ConvertError::Panicked {
                converter: entry.name.clone(),
            }),
        };
        Some(result)
    }

    /// Typed convenience over [`convert_to`](Self::convert_to).
    pub fn encode<T: Any + Send + Sync>(
        &self,
        content_type: &str,
        value: &T,
    ) -> Result<Bytes, ConvertError> {
        self.convert_to(content_type, TypeKey::of::<T>(), value)
            .unwrap_or_else(|| {
                Err(ConvertError::Missing {
                    content_type: content_type.to_string(),
                    direction: Direction::To,
                    type_name: std::any::type_name::<T>(),
                })
            })
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConversionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per converter, sorted by content type, direction, type name.
    pub fn listing(&self) -> Vec<String> {
        self.entries
            .values()
            .map(|e| {
                format!(
                    "{} {} {} -> {}",
                    e.key.content_type,
                    e.key.direction,
                    e.key.ty.name(),
                    e.name
                )
            })
            .collect()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.values()).finish()
    }
}
