//! RPC-exposed objects and their methods.

use std::future::Future;
use std::sync::Arc;

use crate::handler::{Args, Handler, HandlerError, Outcome, ParamType};
use crate::resilience::RetrySetting;
use crate::routing::{ParameterSpec, PatternError, Route, RouteDescriptor, RouteTarget};

/// Object-level export policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportPolicy {
    /// Every eligible method is exported unless excluded.
    #[default]
    All,
    /// Only methods that opt in are exported.
    None,
}

/// Method-level export choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Export {
    #[default]
    Inherit,
    Include,
    Exclude,
}

/// One remotely callable method.
#[derive(Debug, Clone)]
pub struct RpcMethod {
    pub name: String,
    /// Named parameters, bound by exact name.
    pub params: Vec<ParameterSpec>,
    pub returns: Option<ParamType>,
    pub export: Export,
    /// Dispatcher plumbing; never exported.
    pub internal: bool,
    pub handler: Handler,
}

impl RpcMethod {
    pub fn builder(name: impl Into<String>) -> RpcMethodBuilder {
        RpcMethodBuilder {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            export: Export::Inherit,
            internal: false,
        }
    }

    pub fn is_exported(&self, policy: ExportPolicy) -> bool {
        if self.internal {
            return false;
        }
        match (self.export, policy) {
            (Export::Exclude, _) => false,
            (Export::Include, _) => true,
            (Export::Inherit, ExportPolicy::All) => true,
            (Export::Inherit, ExportPolicy::None) => false,
        }
    }
}

pub struct RpcMethodBuilder {
    name: String,
    params: Vec<ParameterSpec>,
    returns: Option<ParamType>,
    export: Export,
    internal: bool,
}

impl RpcMethodBuilder {
    pub fn param(mut self, name: &str, ty: ParamType) -> Self {
        self.params.push(ParameterSpec::query(name, ty));
        self
    }

    pub fn optional(mut self, name: &str, ty: ParamType, default: Option<&str>) -> Self {
        self.params.push(ParameterSpec::optional(name, ty, default));
        self
    }

    pub fn returns(mut self, ty: ParamType) -> Self {
        self.returns = Some(ty);
        self
    }

    pub fn export(mut self, export: Export) -> Self {
        self.export = export;
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn handler<F, Fut, R>(self, f: F) -> RpcMethod
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Into<Outcome>,
    {
        self.finish(Handler::from_async(f))
    }

    pub fn blocking_handler<F, R>(self, f: F) -> RpcMethod
    where
        F: Fn(Args) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<Outcome>,
    {
        self.finish(Handler::blocking(f))
    }

    fn finish(self, handler: Handler) -> RpcMethod {
        RpcMethod {
            name: self.name,
            params: self.params,
            returns: self.returns,
            export: self.export,
            internal: self.internal,
            handler,
        }
    }
}

/// A named set of methods reachable by JSON-RPC POST at `path`.
#[derive(Debug, Clone)]
pub struct RpcObject {
    pub name: String,
    pub path: String,
    pub required_roles: Vec<String>,
    /// Serve the interface listing on GET at the same path.
    pub provide_scheme: bool,
    pub policy: ExportPolicy,
    pub retry: RetrySetting,
    methods: Vec<RpcMethod>,
}

impl RpcObject {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            required_roles: Vec::new(),
            provide_scheme: false,
            policy: ExportPolicy::All,
            retry: RetrySetting::Never,
            methods: Vec::new(),
        }
    }

    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn provide_scheme(mut self) -> Self {
        self.provide_scheme = true;
        self
    }

    pub fn policy(mut self, policy: ExportPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retry(mut self, retry: RetrySetting) -> Self {
        self.retry = retry;
        self
    }

    pub fn method(mut self, method: RpcMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Exported methods in registration order.
    pub fn exported(&self) -> impl Iterator<Item = &RpcMethod> {
        self.methods.iter().filter(|m| m.is_exported(self.policy))
    }

    /// Exact, case-sensitive lookup among exported methods.
    pub fn find(&self, name: &str) -> Option<&RpcMethod> {
        self.exported().find(|m| m.name == name)
    }

    /// POST route for calls, plus a GET route when the scheme is provided.
    pub fn into_routes(self) -> Result<Vec<RouteDescriptor>, PatternError> {
        let object = Arc::new(self);
        let mut routes = vec![Route::post(object.path.clone())
            .named(format!("rpc {}", object.name))
            .roles(object.required_roles.clone())
            .retry_setting(object.retry.clone())
            .target(RouteTarget::Rpc(Arc::clone(&object)))?];

        if object.provide_scheme {
            routes.push(
                Route::get(object.path.clone())
                    .named(format!("scheme {}", object.name))
                    .roles(object.required_roles.clone())
                    .target(RouteTarget::RpcScheme(Arc::clone(&object)))?,
            );
        }
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str) -> RpcMethodBuilder {
        RpcMethod::builder(name)
    }

    fn noop(builder: RpcMethodBuilder) -> RpcMethod {
        builder.handler(|_args: Args| async move { Ok::<_, HandlerError>(()) })
    }

    #[test]
    fn test_export_policy_all() {
        let object = RpcObject::new("Calc", "/calc")
            .method(noop(method("add")))
            .method(noop(method("bye").export(Export::Exclude)))
            .method(noop(method("dispatch").internal()));
        let names: Vec<&str> = object.exported().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["add"]);
        assert!(object.find("bye").is_none());
        assert!(object.find("Add").is_none());
    }

    #[test]
    fn test_export_policy_none_requires_opt_in() {
        let object = RpcObject::new("Calc", "/calc")
            .policy(ExportPolicy::None)
            .method(noop(method("add")))
            .method(noop(method("mul").export(Export::Include)));
        let names: Vec<&str> = object.exported().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["mul"]);
    }

    #[test]
    fn test_routes() {
        let routes = RpcObject::new("Calc", "/calc")
            .roles(["user"])
            .provide_scheme()
            .into_routes()
            .unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].verb, axum::http::Method::POST);
        assert_eq!(routes[0].target.kind(), "rpc");
        assert_eq!(routes[1].target.kind(), "scheme");
        assert_eq!(routes[1].required_roles, vec!["user".to_string()]);

        let routes = RpcObject::new("Calc", "/calc").into_routes().unwrap();
        assert_eq!(routes.len(), 1);
    }
}
