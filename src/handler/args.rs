//! Declared parameter types and bound argument values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use serde_json::Value;

use crate::convert::{AnyValue, TypeKey};
use crate::handler::context::{RequestContext, UploadedFile};
use crate::handler::HandlerError;

/// Declared type of a handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Str,
    Int,
    Long,
    Double,
    Bool,
    Byte,
    Short,
    /// Raw byte buffer.
    Bytes,
    /// Structured JSON document.
    Document,
    /// Arbitrary type decoded through the converter registry.
    Object(TypeKey),
}

impl ParamType {
    pub fn object<T: Any>() -> Self {
        ParamType::Object(TypeKey::of::<T>())
    }

    /// Carried as JSON text rather than a bare scalar.
    pub fn is_structured(&self) -> bool {
        matches!(self, ParamType::Document | ParamType::Object(_))
    }

    /// Name used in scheme listings and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamType::Str => "string",
            ParamType::Int => "int",
            ParamType::Long => "long",
            ParamType::Double => "double",
            ParamType::Bool => "boolean",
            ParamType::Byte => "byte",
            ParamType::Short => "short",
            ParamType::Bytes => "bytes",
            ParamType::Document => "document",
            ParamType::Object(key) => key.short_name(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A single bound argument.
#[derive(Clone)]
pub enum ArgValue {
    /// Optional parameter absent with no declared default.
    Absent,
    Str(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Byte(i8),
    Short(i16),
    Bytes(Bytes),
    Document(Value),
    Object(AnyValue),
    /// Normalized request path.
    Path(String),
    Uploads(Arc<[UploadedFile]>),
    Context(Arc<RequestContext>),
}

impl ArgValue {
    fn kind(&self) -> &'static str {
        match self {
            ArgValue::Absent => "absent",
            ArgValue::Str(_) => "string",
            ArgValue::Int(_) => "int",
            ArgValue::Long(_) => "long",
            ArgValue::Double(_) => "double",
            ArgValue::Bool(_) => "boolean",
            ArgValue::Byte(_) => "byte",
            ArgValue::Short(_) => "short",
            ArgValue::Bytes(_) => "bytes",
            ArgValue::Document(_) => "document",
            ArgValue::Object(_) => "object",
            ArgValue::Path(_) => "path",
            ArgValue::Uploads(_) => "uploads",
            ArgValue::Context(_) => "context",
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Absent => f.write_str("Absent"),
            ArgValue::Str(v) => f.debug_tuple("Str").field(v).finish(),
            ArgValue::Int(v) => f.debug_tuple("Int").field(v).finish(),
            ArgValue::Long(v) => f.debug_tuple("Long").field(v).finish(),
            ArgValue::Double(v) => f.debug_tuple("Double").field(v).finish(),
            ArgValue::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            ArgValue::Byte(v) => f.debug_tuple("Byte").field(v).finish(),
            ArgValue::Short(v) => f.debug_tuple("Short").field(v).finish(),
            ArgValue::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            ArgValue::Document(v) => f.debug_tuple("Document").field(v).finish(),
            ArgValue::Object(_) => f.write_str("Object(..)"),
            ArgValue::Path(v) => f.debug_tuple("Path").field(v).finish(),
            ArgValue::Uploads(v) => write!(f, "Uploads({} files)", v.len()),
            ArgValue::Context(v) => f.debug_tuple("Context").field(&v.path).finish(),
        }
    }
}

/// Fully bound argument list for one invocation, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(String, ArgValue)>,
}

macro_rules! scalar_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self, name: &str) -> Result<$ty, HandlerError> {
            match self.require(name)? {
                ArgValue::$variant(v) => Ok(*v),
                other => Err(mismatch(name, stringify!($fn_name), other)),
            }
        }
    };
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    fn require(&self, name: &str) -> Result<&ArgValue, HandlerError> {
        match self.get(name) {
            Some(ArgValue::Absent) | None => Err(HandlerError::with_kind(
                "argument",
                format!("argument `{name}` was not supplied"),
            )),
            Some(v) => Ok(v),
        }
    }

    pub fn is_present(&self, name: &str) -> bool {
        !matches!(self.get(name), Some(ArgValue::Absent) | None)
    }

    pub fn str(&self, name: &str) -> Result<&str, HandlerError> {
        match self.require(name)? {
            ArgValue::Str(v) | ArgValue::Path(v) => Ok(v),
            other => Err(mismatch(name, "string", other)),
        }
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, HandlerError> {
        if self.is_present(name) {
            self.str(name).map(Some)
        } else {
            Ok(None)
        }
    }

    scalar_accessor!(i32, Int, i32);
    scalar_accessor!(i64, Long, i64);
    scalar_accessor!(f64, Double, f64);
    scalar_accessor!(bool, Bool, bool);
    scalar_accessor!(i8, Byte, i8);
    scalar_accessor!(i16, Short, i16);

    pub fn bytes(&self, name: &str) -> Result<Bytes, HandlerError> {
        match self.require(name)? {
            ArgValue::Bytes(v) => Ok(v.clone()),
            other => Err(mismatch(name, "bytes", other)),
        }
    }

    pub fn document(&self, name: &str) -> Result<&Value, HandlerError> {
        match self.require(name)? {
            ArgValue::Document(v) => Ok(v),
            other => Err(mismatch(name, "document", other)),
        }
    }

    pub fn object<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, HandlerError> {
        match self.require(name)? {
            ArgValue::Object(v) => v.clone().downcast::<T>().map_err(|_| {
                HandlerError::with_kind(
                    "argument",
                    format!(
                        "argument `{name}` is not a {}",
                        std::any::type_name::<T>()
                    ),
                )
            }),
            other => Err(mismatch(name, std::any::type_name::<T>(), other)),
        }
    }

    pub fn uploads(&self, name: &str) -> Result<&[UploadedFile], HandlerError> {
        match self.require(name)? {
            ArgValue::Uploads(v) => Ok(v),
            other => Err(mismatch(name, "uploads", other)),
        }
    }

    pub fn context(&self, name: &str) -> Result<&RequestContext, HandlerError> {
        match self.require(name)? {
            ArgValue::Context(v) => Ok(v),
            other => Err(mismatch(name, "context", other)),
        }
    }
}

fn mismatch(name: &str, expected: &str, found: &ArgValue) -> HandlerError {
    HandlerError::with_kind(
        "argument",
        format!("argument `{name}` is {}, not {expected}", found.kind()),
    )
}
