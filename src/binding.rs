//! Parameter binding.
//!
//! # Responsibilities
//! - Build the argument list for one invocation from the request
//! - Convert raw strings to declared scalar types
//! - Decode bodies directly or through the converter registry
//!
//! # Design Decisions
//! - All-or-nothing: the first failure aborts binding before invocation
//! - Named lookups are case-insensitive
//! - Converter failures are client errors; converter panics are server errors

use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;

use crate::convert::{ConvertError, ConverterRegistry};
use crate::handler::{ArgValue, Args, ParamType, RequestContext};
use crate::http::request::InboundRequest;
use crate::routing::{ParamSource, ParameterSpec, RouteDescriptor};

/// Content type used to decode objects carried in query or form strings.
pub const TEXT_PLAIN: &str = "text/plain";

#[derive(Debug, Error)]
pub enum BindError {
    #[error("missing required parameter `{name}`")]
    MissingParameter { name: String },

    #[error("parameter `{name}` is not a valid {expected}: `{value}`")]
    InvalidValue {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("body for `{name}` is invalid: {reason}")]
    InvalidBody { name: String, reason: String },

    #[error("no converter for `{name}` ({type_name}) from {}", content_type.as_deref().unwrap_or("unspecified content type"))]
    UnsupportedMediaType {
        name: String,
        type_name: &'static str,
        content_type: Option<String>,
    },

    #[error("conversion of `{name}` failed: {source}")]
    Conversion {
        name: String,
        #[source]
        source: ConvertError,
    },
}

impl BindError {
    pub fn status(&self) -> StatusCode {
        match self {
            BindError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BindError::Conversion {
                source: ConvertError::Panicked { .. },
                ..
            } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Bind every declared parameter of `route`, in declaration order.
pub fn bind_arguments(
    route: &RouteDescriptor,
    request: &InboundRequest,
    context: &Arc<RequestContext>,
    converters: &ConverterRegistry,
) -> Result<Args, BindError> {
    let mut args = Args::new();
    for spec in &route.params {
        let value = match spec.source {
            ParamSource::Query => {
                bind_named(spec, request.parameter(&spec.name), converters, TEXT_PLAIN)?
            }
            ParamSource::PathWildcard => ArgValue::Path(request.path.clone()),
            ParamSource::Body => bind_body(spec, route, request, converters)?,
            ParamSource::Uploads => ArgValue::Uploads(request.uploads.clone().into()),
            ParamSource::Context => ArgValue::Context(Arc::clone(context)),
        };
        args.push(spec.name.clone(), value);
    }
    Ok(args)
}

/// Bind a named parameter from its raw text, applying optional defaults.
pub fn bind_named(
    spec: &ParameterSpec,
    raw: Option<&str>,
    converters: &ConverterRegistry,
    object_content_type: &str,
) -> Result<ArgValue, BindError> {
    let convert = |text: &str| convert_text(&spec.name, text, spec.ty, converters, object_content_type);
    match (raw, &spec.default) {
        (Some(raw), _) => convert(raw),
        (None, _) if spec.required => Err(BindError::MissingParameter {
            name: spec.name.clone(),
        }),
        (None, Some(default)) => convert(default),
        (None, None) => Ok(ArgValue::Absent),
    }
}

/// Convert raw text into the declared type.
///
/// `object_content_type` selects the `From` converter for object types.
pub fn convert_text(
    name: &str,
    raw: &str,
    ty: ParamType,
    converters: &ConverterRegistry,
    object_content_type: &str,
) -> Result<ArgValue, BindError> {
    let invalid = || BindError::InvalidValue {
        name: name.to_string(),
        expected: ty.type_name(),
        value: raw.to_string(),
    };
    let trimmed = raw.trim();
    Ok(match ty {
        ParamType::Str => ArgValue::Str(raw.to_string()),
        ParamType::Int => ArgValue::Int(trimmed.parse().map_err(|_| invalid())?),
        ParamType::Long => ArgValue::Long(trimmed.parse().map_err(|_| invalid())?),
        ParamType::Double => ArgValue::Double(trimmed.parse().map_err(|_| invalid())?),
        ParamType::Byte => ArgValue::Byte(trimmed.parse().map_err(|_| invalid())?),
        ParamType::Short => ArgValue::Short(trimmed.parse().map_err(|_| invalid())?),
        ParamType::Bool => ArgValue::Bool(parse_bool(trimmed).ok_or_else(invalid)?),
        ParamType::Bytes => ArgValue::Bytes(raw.to_string().into()),
        ParamType::Document => {
            ArgValue::Document(serde_json::from_str(raw).map_err(|_| invalid())?)
        }
        ParamType::Object(key) => {
            decode_object(name, key, Some(object_content_type), raw.as_bytes(), converters)?
        }
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn bind_body(
    spec: &ParameterSpec,
    route: &RouteDescriptor,
    request: &InboundRequest,
    converters: &ConverterRegistry,
) -> Result<ArgValue, BindError> {
    let body = &request.body;
    let as_text = || {
        std::str::from_utf8(body).map_err(|e| BindError::InvalidBody {
            name: spec.name.clone(),
            reason: e.to_string(),
        })
    };
    match spec.ty {
        ParamType::Bytes => Ok(ArgValue::Bytes(body.clone())),
        ParamType::Str => Ok(ArgValue::Str(as_text()?.to_string())),
        ParamType::Document => serde_json::from_slice(body)
            .map(ArgValue::Document)
            .map_err(|e| BindError::InvalidBody {
                name: spec.name.clone(),
                reason: e.to_string(),
            }),
        ParamType::Object(key) => {
            let content_type = route
                .consumes
                .as_deref()
                .or_else(|| request.content_type());
            decode_object(&spec.name, key, content_type, body, converters)
        }
        scalar => convert_text(&spec.name, as_text()?, scalar, converters, TEXT_PLAIN),
    }
}

fn decode_object(
    name: &str,
    key: crate::convert::TypeKey,
    content_type: Option<&str>,
    bytes: &[u8],
    converters: &ConverterRegistry,
) -> Result<ArgValue, BindError> {
    let Some(content_type) = content_type else {
        return Err(BindError::UnsupportedMediaType {
            name: name.to_string(),
            type_name: key.name(),
            content_type: None,
        });
    };
    match converters.convert_from(content_type, key, bytes) {
        Ok(value) => Ok(ArgValue::Object(value)),
        Err(ConvertError::Missing { .. }) => Err(BindError::UnsupportedMediaType {
            name: name.to_string(),
            type_name: key.name(),
            content_type: Some(content_type.to_string()),
        }),
        Err(source) => Err(BindError::Conversion {
            name: name.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use crate::handler::{HandlerError, UploadedFile};
    use crate::routing::Route;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    fn converters() -> ConverterRegistry {
        let mut builder = ConverterRegistry::builder();
        builder
            .register_from("point_csv", "text/csv", |b: &[u8]| -> Result<Point, String> {
                let text = std::str::from_utf8(b).map_err(|e| e.to_string())?;
                let (x, y) = text.split_once(',').ok_or("no comma")?;
                Ok(Point {
                    x: x.parse().map_err(|_| "bad x")?,
                    y: y.parse().map_err(|_| "bad y")?,
                })
            })
            .unwrap();
        builder.build()
    }

    fn context(request: &InboundRequest) -> Arc<RequestContext> {
        Arc::new(request.context())
    }

    fn noop(route: Route) -> RouteDescriptor {
        route
            .handler(|_args: Args| async move { Ok::<_, HandlerError>("ok") })
            .unwrap()
    }

    #[test]
    fn test_scalar_binding_and_defaults() {
        let route = noop(
            Route::get("/calc")
                .query("a", ParamType::Int)
                .query("flag", ParamType::Bool)
                .optional("b", ParamType::Long, Some("10"))
                .optional("c", ParamType::Str, None),
        );
        let request = InboundRequest::new(Method::GET, "/calc")
            .with_query("A", "5")
            .with_query("flag", "TRUE");
        let args = bind_arguments(&route, &request, &context(&request), &converters()).unwrap();

        assert_eq!(args.i32("a").unwrap(), 5);
        assert!(args.bool("flag").unwrap());
        assert_eq!(args.i64("b").unwrap(), 10);
        assert!(!args.is_present("c"));
    }

    #[test]
    fn test_numeric_parse_failure() {
        let route = noop(Route::get("/calc").query("a", ParamType::Short));
        let request = InboundRequest::new(Method::GET, "/calc").with_query("a", "70000");
        let err = bind_arguments(&route, &request, &context(&request), &converters()).unwrap_err();
        assert!(matches!(err, BindError::InvalidValue { expected: "short", .. }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_body_object_through_registry() {
        let route = noop(
            Route::post("/points")
                .consumes("text/csv")
                .body("point", ParamType::object::<Point>()),
        );
        let request = InboundRequest::new(Method::POST, "/points").with_body("text/plain", "3,4");
        let args = bind_arguments(&route, &request, &context(&request), &converters()).unwrap();
        assert_eq!(*args.object::<Point>("point").unwrap(), Point { x: 3, y: 4 });

        let bad = InboundRequest::new(Method::POST, "/points").with_body("text/csv", "3;4");
        let err = bind_arguments(&route, &bad, &context(&bad), &converters()).unwrap_err();
        assert!(matches!(err, BindError::Conversion { .. }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unsupported_media_type() {
        let route = noop(Route::post("/points").body("point", ParamType::object::<Point>()));
        let request = InboundRequest::new(Method::POST, "/points").with_body("application/xml", "<p/>");
        let err = bind_arguments(&route, &request, &context(&request), &converters()).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_body_pass_through_and_document() {
        let route = noop(
            Route::post("/raw")
                .body("raw", ParamType::Bytes)
                .path_param("path")
                .uploads("files")
                .context("ctx"),
        );
        let mut request = InboundRequest::new(Method::POST, "/raw//").with_body("application/octet-stream", &b"\x00\x01"[..]);
        request.uploads.push(UploadedFile {
            field_name: "f".into(),
            file_name: Some("a.txt".into()),
            content_type: None,
            data: "hello".into(),
        });
        let args = bind_arguments(&route, &request, &context(&request), &converters()).unwrap();
        assert_eq!(args.bytes("raw").unwrap().as_ref(), b"\x00\x01");
        assert_eq!(args.str("path").unwrap(), "/raw");
        assert_eq!(args.uploads("files").unwrap().len(), 1);
        assert_eq!(args.context("ctx").unwrap().method, Method::POST);

        let doc_route = noop(Route::post("/doc").body("doc", ParamType::Document));
        let bad = InboundRequest::new(Method::POST, "/doc").with_body("application/json", "{");
        assert!(bind_arguments(&doc_route, &bad, &context(&bad), &converters()).is_err());
    }
}
