//! Handler results.
//!
//! A handler returns an [`Outcome`]: a [`Reply`] from a closed set of result
//! shapes plus an optional hook that can shape or fully take over the
//! response before default rendering runs.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::convert::{AnyValue, TypeKey};

/// Marker prefix turning a text result into an HTTP redirect.
pub const REDIRECT_PREFIX: &str = "redirect:";

/// Numeric or boolean result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    pub fn to_json(self) -> Value {
        match self {
            Scalar::Int(v) => Value::from(v),
            Scalar::UInt(v) => Value::from(v),
            Scalar::Float(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
            Scalar::Bool(v) => Value::Bool(v),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Reference to a file streamed back as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: PathBuf,
    /// Name presented to the client; defaults to the path's file name.
    pub download_name: Option<String>,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            download_name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.download_name = Some(name.into());
        self
    }

    pub fn file_name(&self) -> String {
        self.download_name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "download".to_string())
        })
    }
}

type StructureFn = fn(&(dyn Any + Send + Sync)) -> Result<Value, String>;
type DescribeFn = fn(&(dyn Any + Send + Sync)) -> String;

/// A result of arbitrary type.
///
/// Rendered through a `To` converter when the route declares a content type,
/// otherwise structurally as JSON, falling back to its `Debug` text.
#[derive(Clone)]
pub struct Opaque {
    value: AnyValue,
    ty: TypeKey,
    structure: Option<StructureFn>,
    describe: DescribeFn,
}

fn structure_of<T: Serialize + 'static>(value: &(dyn Any + Send + Sync)) -> Result<Value, String> {
    let value = value
        .downcast_ref::<T>()
        .ok_or_else(|| format!("expected {}", std::any::type_name::<T>()))?;
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn describe_of<T: fmt::Debug + 'static>(value: &(dyn Any + Send + Sync)) -> String {
    value
        .downcast_ref::<T>()
        .map(|v| format!("{v:?}"))
        .unwrap_or_default()
}

impl Opaque {
    /// A serializable value.
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value),
            ty: TypeKey::of::<T>(),
            structure: Some(structure_of::<T>),
            describe: describe_of::<T>,
        }
    }

    /// A value with no structural form; rendered through a converter or as text.
    pub fn unstructured<T>(value: T) -> Self
    where
        T: fmt::Debug + Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value),
            ty: TypeKey::of::<T>(),
            structure: None,
            describe: describe_of::<T>,
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    pub fn value(&self) -> &(dyn Any + Send + Sync) {
        &*self.value
    }

    pub fn to_structure(&self) -> Result<Value, String> {
        match self.structure {
            Some(structure) => structure(&*self.value),
            None => Err(format!("{} has no structural form", self.ty.name())),
        }
    }

    pub fn describe(&self) -> String {
        (self.describe)(&*self.value)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>({})", self.ty.short_name(), self.describe())
    }
}

/// Closed set of result shapes a handler may produce.
#[derive(Debug, Clone)]
pub enum Reply {
    File(FileRef),
    Buffer(Bytes),
    Document(Value),
    Mapping(Vec<(String, Reply)>),
    Sequence(Vec<Reply>),
    Scalar(Scalar),
    Text(String),
    Null,
    Opaque(Opaque),
}

impl Reply {
    pub fn text(value: impl Into<String>) -> Self {
        Reply::Text(value.into())
    }

    pub fn buffer(value: impl Into<Bytes>) -> Self {
        Reply::Buffer(value.into())
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Reply::File(FileRef::new(path.as_ref()))
    }

    pub fn object<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        Reply::Opaque(Opaque::new(value))
    }

    /// Variant name, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::File(_) => "file",
            Reply::Buffer(_) => "buffer",
            Reply::Document(_) => "document",
            Reply::Mapping(_) => "mapping",
            Reply::Sequence(_) => "sequence",
            Reply::Scalar(_) => "scalar",
            Reply::Text(_) => "text",
            Reply::Null => "null",
            Reply::Opaque(_) => "opaque",
        }
    }

    /// Generic structural encoding into JSON.
    ///
    /// Buffers become base64 strings. Nested opaque values that cannot be
    /// encoded fall back to their debug text; a top-level failure is returned.
    pub fn to_structure(&self) -> Result<Value, String> {
        Ok(match self {
            Reply::File(file) => serde_json::json!({
                "file": file.path.display().to_string(),
                "name": file.file_name(),
            }),
            Reply::Buffer(bytes) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Reply::Document(value) => value.clone(),
            Reply::Mapping(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.nested_structure());
                }
                Value::Object(map)
            }
            Reply::Sequence(items) => {
                Value::Array(items.iter().map(Reply::nested_structure).collect())
            }
            Reply::Scalar(scalar) => scalar.to_json(),
            Reply::Text(text) => Value::String(text.clone()),
            Reply::Null => Value::Null,
            Reply::Opaque(opaque) => opaque.to_structure()?,
        })
    }

    fn nested_structure(&self) -> Value {
        match self {
            Reply::Opaque(opaque) => opaque
                .to_structure()
                .unwrap_or_else(|_| Value::String(opaque.describe())),
            other => other.to_structure().unwrap_or(Value::Null),
        }
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Text(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Text(value.to_string())
    }
}

macro_rules! scalar_from {
    ($variant:ident as $target:ty: $($ty:ty),*) => {
        $(
            impl From<$ty> for Reply {
                fn from(value: $ty) -> Self {
                    Reply::Scalar(Scalar::$variant(value as $target))
                }
            }
        )*
    };
}

scalar_from!(Int as i64: i8, i16, i32, i64);
scalar_from!(UInt as u64: u8, u16, u32, u64, usize);
scalar_from!(Float as f64: f32, f64);

impl From<bool> for Reply {
    fn from(value: bool) -> Self {
        Reply::Scalar(Scalar::Bool(value))
    }
}

impl From<Bytes> for Reply {
    fn from(value: Bytes) -> Self {
        Reply::Buffer(value)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Document(value)
    }
}

impl From<FileRef> for Reply {
    fn from(value: FileRef) -> Self {
        Reply::File(value)
    }
}

impl From<Opaque> for Reply {
    fn from(value: Opaque) -> Self {
        Reply::Opaque(value)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Null
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Reply::Null)
    }
}

impl<T: Into<Reply>> From<Vec<T>> for Reply {
    fn from(value: Vec<T>) -> Self {
        Reply::Sequence(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Reply>> From<BTreeMap<String, T>> for Reply {
    fn from(value: BTreeMap<String, T>) -> Self {
        Reply::Mapping(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Reply>> From<HashMap<String, T>> for Reply {
    fn from(value: HashMap<String, T>) -> Self {
        let mut entries: Vec<(String, Reply)> =
            value.into_iter().map(|(k, v)| (k, v.into())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Reply::Mapping(entries)
    }
}

/// Response under construction, visible to result hooks.
pub struct ResponseDraft {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: Option<Body>,
}

impl fmt::Debug for ResponseDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseDraft")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

impl Default for ResponseDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseDraft {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = Some(body.into());
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn set_header(&mut self, name: header::HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
    }

    pub fn set_content_type(&mut self, value: &str) {
        self.set_header(header::CONTENT_TYPE, value);
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(self.body.unwrap_or_else(Body::empty));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Whether a result hook finished the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    /// The hook produced the whole response; rendering stops.
    Finished,
    /// Continue with default rendering, keeping the hook's status and headers.
    Continue,
}

pub type ResponseHook = Box<dyn FnOnce(&mut ResponseDraft) -> HookFlow + Send>;

/// What a handler hands back to the renderer.
pub struct Outcome {
    reply: Reply,
    hook: Option<ResponseHook>,
}

impl Outcome {
    pub fn new(reply: impl Into<Reply>) -> Self {
        Self {
            reply: reply.into(),
            hook: None,
        }
    }

    /// Redirect to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::new(format!("{REDIRECT_PREFIX}{location}"))
    }

    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut ResponseDraft) -> HookFlow + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn reply(&self) -> &Reply {
        &self.reply
    }

    pub fn into_parts(self) -> (Reply, Option<ResponseHook>) {
        (self.reply, self.hook)
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("reply", &self.reply)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl<T: Into<Reply>> From<T> for Outcome {
    fn from(value: T) -> Self {
        Outcome::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize)]
    struct User {
        name: String,
        age: u32,
    }

    #[test]
    fn test_structure_of_mapping_and_sequence() {
        let reply = Reply::Mapping(vec![
            ("count".into(), 2i32.into()),
            ("names".into(), vec!["a", "b"].into()),
            ("raw".into(), Reply::buffer(&b"hi"[..])),
            ("user".into(), Reply::object(User { name: "ann".into(), age: 3 })),
        ]);
        let value = reply.to_structure().unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "count": 2,
                "names": ["a", "b"],
                "raw": "aGk=",
                "user": {"name": "ann", "age": 3},
            })
        );
    }

    #[test]
    fn test_unstructured_opaque() {
        #[derive(Debug)]
        struct Secret(u8);

        let opaque = Opaque::unstructured(Secret(9));
        assert!(opaque.to_structure().is_err());
        assert_eq!(opaque.describe(), "Secret(9)");

        let nested = Reply::Sequence(vec![Reply::Opaque(opaque)]);
        assert_eq!(nested.to_structure().unwrap(), serde_json::json!(["Secret(9)"]));
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(Reply::from(None::<i32>), Reply::Null));
        assert!(matches!(Reply::from(3.5f64), Reply::Scalar(Scalar::Float(_))));
        assert!(matches!(Reply::from(true), Reply::Scalar(Scalar::Bool(true))));
        let outcome = Outcome::redirect("/login");
        assert!(matches!(outcome.reply(), Reply::Text(t) if t == "redirect:/login"));
    }
}
