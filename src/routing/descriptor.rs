//! Route descriptors and the builder used to declare them.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{Method, StatusCode};

use crate::handler::{Args, Handler, HandlerError, Outcome, ParamType};
use crate::resilience::{RetryPolicy, RetrySetting};
use crate::rpc::RpcObject;

use super::pattern::{PathPattern, PatternError};

/// Where a handler argument comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Named query or form parameter.
    Query,
    /// The full normalized request path.
    PathWildcard,
    /// The buffered request body.
    Body,
    /// Uploaded multipart files.
    Uploads,
    /// Request metadata.
    Context,
}

/// Metadata for one handler parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub source: ParamSource,
    pub name: String,
    pub required: bool,
    pub default: Option<String>,
    pub ty: ParamType,
}

impl ParameterSpec {
    pub fn query(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            source: ParamSource::Query,
            name: name.into(),
            required: true,
            default: None,
            ty,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType, default: Option<&str>) -> Self {
        Self {
            required: false,
            default: default.map(str::to_string),
            ..Self::query(name, ty)
        }
    }

    fn with_source(source: ParamSource, name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            source,
            ..Self::query(name, ty)
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::with_source(ParamSource::PathWildcard, name, ParamType::Str)
    }

    pub fn body(name: impl Into<String>, ty: ParamType) -> Self {
        Self::with_source(ParamSource::Body, name, ty)
    }

    pub fn uploads(name: impl Into<String>) -> Self {
        Self::with_source(ParamSource::Uploads, name, ParamType::Bytes)
    }

    pub fn context(name: impl Into<String>) -> Self {
        Self::with_source(ParamSource::Context, name, ParamType::Document)
    }

    /// Lowercased name used for shape matching.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn is_named(&self) -> bool {
        self.source == ParamSource::Query
    }
}

/// Serve a text result as a file under `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeSpec {
    pub root: PathBuf,
    /// Run textual files through the template engine.
    pub template: bool,
}

/// Response used when a handler returns nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullResult {
    pub status: StatusCode,
    pub body: String,
}

/// Rendering metadata attached to a route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSpec {
    /// Declared response content type; enables `To` converters.
    pub produces: Option<String>,
    pub serve: Option<ServeSpec>,
    pub null_result: Option<NullResult>,
}

/// What a matched route dispatches to.
#[derive(Debug, Clone)]
pub enum RouteTarget {
    Handler(Handler),
    /// JSON-RPC endpoint (POST).
    Rpc(Arc<RpcObject>),
    /// Scheme listing of an RPC object (GET).
    RpcScheme(Arc<RpcObject>),
}

impl RouteTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            RouteTarget::Handler(_) => "handler",
            RouteTarget::Rpc(_) => "rpc",
            RouteTarget::RpcScheme(_) => "scheme",
        }
    }
}

/// Immutable route metadata bound to its target.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub name: String,
    pub verb: Method,
    pub pattern: PathPattern,
    pub required_roles: Vec<String>,
    pub params: Vec<ParameterSpec>,
    /// Declared incoming content type for body conversion.
    pub consumes: Option<String>,
    pub render: RenderSpec,
    pub retry: RetrySetting,
    /// Requires an authenticated caller (set from protected prefixes).
    pub authenticated: bool,
    pub target: RouteTarget,
}

impl RouteDescriptor {
    pub fn named_params(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params.iter().filter(|p| p.is_named())
    }
}

/// Builder for [`RouteDescriptor`].
///
/// ```rust,ignore
/// Route::get("/concatenate")
///     .query("str1", ParamType::Str)
///     .query("str2", ParamType::Str)
///     .optional("str3", ParamType::Str, Some(""))
///     .handler(|args: Args| async move {
///         Ok(format!("{}{}{}", args.str("str1")?, args.str("str2")?, args.str("str3")?))
///     })
/// ```
#[derive(Debug, Clone)]
pub struct Route {
    name: Option<String>,
    verb: Method,
    path: String,
    roles: Vec<String>,
    params: Vec<ParameterSpec>,
    consumes: Option<String>,
    render: RenderSpec,
    retry: RetrySetting,
}

impl Route {
    pub fn new(verb: Method, path: impl Into<String>) -> Self {
        Self {
            name: None,
            verb,
            path: path.into(),
            roles: Vec::new(),
            params: Vec::new(),
            consumes: None,
            render: RenderSpec::default(),
            retry: RetrySetting::Never,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn query(self, name: &str, ty: ParamType) -> Self {
        self.param(ParameterSpec::query(name, ty))
    }

    pub fn optional(self, name: &str, ty: ParamType, default: Option<&str>) -> Self {
        self.param(ParameterSpec::optional(name, ty, default))
    }

    pub fn path_param(self, name: &str) -> Self {
        self.param(ParameterSpec::path(name))
    }

    pub fn body(self, name: &str, ty: ParamType) -> Self {
        self.param(ParameterSpec::body(name, ty))
    }

    pub fn uploads(self, name: &str) -> Self {
        self.param(ParameterSpec::uploads(name))
    }

    pub fn context(self, name: &str) -> Self {
        self.param(ParameterSpec::context(name))
    }

    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn consumes(mut self, content_type: impl Into<String>) -> Self {
        self.consumes = Some(content_type.into());
        self
    }

    pub fn produces(mut self, content_type: impl Into<String>) -> Self {
        self.render.produces = Some(content_type.into());
        self
    }

    /// Treat text results as paths of files under `root`.
    pub fn serve_from(mut self, root: impl Into<PathBuf>, template: bool) -> Self {
        self.render.serve = Some(ServeSpec {
            root: root.into(),
            template,
        });
        self
    }

    pub fn on_null(mut self, status: StatusCode, body: impl Into<String>) -> Self {
        self.render.null_result = Some(NullResult {
            status,
            body: body.into(),
        });
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetrySetting::Custom(policy);
        self
    }

    /// Retry with the engine-wide policy.
    pub fn retry_default(mut self) -> Self {
        self.retry = RetrySetting::Default;
        self
    }

    pub fn retry_setting(mut self, retry: RetrySetting) -> Self {
        self.retry = retry;
        self
    }

    pub fn handler<F, Fut, R>(self, f: F) -> Result<RouteDescriptor, PatternError>
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Into<Outcome>,
    {
        self.target(RouteTarget::Handler(Handler::from_async(f)))
    }

    /// Handler that must run on the blocking worker pool.
    pub fn blocking_handler<F, R>(self, f: F) -> Result<RouteDescriptor, PatternError>
    where
        F: Fn(Args) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<Outcome>,
    {
        self.target(RouteTarget::Handler(Handler::blocking(f)))
    }

    pub fn target(self, target: RouteTarget) -> Result<RouteDescriptor, PatternError> {
        let pattern = PathPattern::parse(&self.path)?;
        Ok(RouteDescriptor {
            name: self
                .name
                .unwrap_or_else(|| format!("{} {}", self.verb, pattern.canonical())),
            verb: self.verb,
            pattern,
            required_roles: self.roles,
            params: self.params,
            consumes: self.consumes,
            render: self.render,
            retry: self.retry,
            authenticated: false,
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let route = Route::get("/concatenate")
            .query("Str1", ParamType::Str)
            .optional("str3", ParamType::Str, Some("!"))
            .path_param("path")
            .roles(["admin"])
            .handler(|_args: Args| async move { Ok::<_, HandlerError>("ok") })
            .unwrap();

        assert_eq!(route.name, "GET /concatenate");
        assert_eq!(route.required_roles, vec!["admin".to_string()]);
        let named: Vec<String> = route.named_params().map(ParameterSpec::key).collect();
        assert_eq!(named, vec!["str1", "str3"]);
        assert_eq!(route.params[1].default.as_deref(), Some("!"));
        assert!(!route.params[1].required);
    }

    #[test]
    fn test_invalid_pattern() {
        let result = Route::get("no-slash")
            .handler(|_args: Args| async move { Ok::<_, HandlerError>("ok") });
        assert!(result.is_err());
    }
}
