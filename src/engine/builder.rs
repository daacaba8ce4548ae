//! Module registration.

use std::sync::Arc;

use thiserror::Error;

use crate::config::EngineConfig;
use crate::convert::{ConverterRegistry, ConverterRegistryBuilder, RegistryError};
use crate::render::{Renderer, TemplateEngine};
use crate::resilience::RetryPolicy;
use crate::routing::{PatternError, RouteDescriptor, Router, RouterError};
use crate::rpc::RpcObject;

use super::Engine;

/// A unit of registration: routes, converters and RPC objects.
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    fn routes(&self) -> Result<Vec<RouteDescriptor>, PatternError> {
        Ok(Vec::new())
    }

    fn converters(&self, _registry: &mut ConverterRegistryBuilder) -> Result<(), RegistryError> {
        Ok(())
    }

    fn rpc_objects(&self) -> Vec<RpcObject> {
        Vec::new()
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("module `{module}` declares an invalid route: {source}")]
    Pattern {
        module: String,
        #[source]
        source: PatternError,
    },

    #[error("module `{module}`: {source}")]
    Converter {
        module: String,
        #[source]
        source: RegistryError,
    },

    #[error("protected prefix `{0}` must start with '/'")]
    InvalidPrefix(String),

    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Collects modules and freezes them into an [`Engine`].
pub struct EngineBuilder {
    routes: Vec<RouteDescriptor>,
    converters: ConverterRegistryBuilder,
    templates: Option<Arc<dyn TemplateEngine>>,
    template_types: Vec<String>,
    allow_ambiguous: bool,
    default_retry: RetryPolicy,
    modules: Vec<String>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            routes: Vec::new(),
            converters: ConverterRegistry::builder(),
            templates: None,
            template_types: config.dispatch.template_types.clone(),
            allow_ambiguous: config.dispatch.allow_ambiguous_routes,
            default_retry: RetryPolicy::from(&config.retries),
            modules: Vec::new(),
        }
    }

    pub fn allow_ambiguous_routes(mut self, allow: bool) -> Self {
        self.allow_ambiguous = allow;
        self
    }

    pub fn template_engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.templates = Some(Arc::new(engine));
        self
    }

    pub fn default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Scan `module` once. Routes under any of `protected_prefixes` require
    /// an authenticated caller.
    pub fn register<M>(mut self, module: &M, protected_prefixes: &[&str]) -> Result<Self, EngineError>
    where
        M: Module + ?Sized,
    {
        let name = module.name().to_string();
        if let Some(bad) = protected_prefixes.iter().find(|p| !p.starts_with('/')) {
            return Err(EngineError::InvalidPrefix(bad.to_string()));
        }

        let pattern_error = |source| EngineError::Pattern {
            module: name.clone(),
            source,
        };
        let mut routes = module.routes().map_err(pattern_error)?;
        for object in module.rpc_objects() {
            routes.extend(object.into_routes().map_err(pattern_error)?);
        }

        module
            .converters(&mut self.converters)
            .map_err(|source| EngineError::Converter {
                module: name.clone(),
                source,
            })?;

        for route in &mut routes {
            route.authenticated = protected_prefixes
                .iter()
                .any(|prefix| route.pattern.starts_with(prefix));
        }

        tracing::info!(
            module = %name,
            routes = routes.len(),
            converters = self.converters.len(),
            "Module registered"
        );
        self.routes.extend(routes);
        self.modules.push(name);
        Ok(self)
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let router = Router::new(self.routes, self.allow_ambiguous)?;
        let converters = Arc::new(self.converters.build());
        let renderer = Renderer::new(Arc::clone(&converters), self.templates, self.template_types);

        for line in router.listing() {
            tracing::debug!(route = %line, "Route");
        }
        for line in converters.listing() {
            tracing::debug!(converter = %line, "Converter");
        }

        Ok(Engine {
            router,
            converters,
            renderer,
            default_retry: self.default_retry,
            modules: self.modules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Args, HandlerError, ParamType};
    use crate::routing::Route;

    struct Admin;

    impl Module for Admin {
        fn name(&self) -> &str {
            "admin"
        }

        fn routes(&self) -> Result<Vec<RouteDescriptor>, PatternError> {
            Ok(vec![
                Route::get("/admin/users").handler(|_a: Args| async { Ok::<_, HandlerError>("users") })?,
                Route::get("/administrator").handler(|_a: Args| async { Ok::<_, HandlerError>("x") })?,
            ])
        }

        fn converters(&self, registry: &mut ConverterRegistryBuilder) -> Result<(), RegistryError> {
            registry.register_from("int_text", "text/plain", |b: &[u8]| {
                String::from_utf8_lossy(b).trim().parse::<i32>()
            })
        }
    }

    #[test]
    fn test_protected_prefixes() {
        let engine = Engine::builder()
            .register(&Admin, &["/admin"])
            .unwrap()
            .build()
            .unwrap();
        let protected = |pattern: &str| {
            engine
                .router()
                .routes()
                .find(|r| r.pattern.as_str() == pattern)
                .map(|r| r.authenticated)
        };
        assert_eq!(protected("/admin/users"), Some(true));
        assert_eq!(protected("/administrator"), Some(false));
        assert_eq!(engine.modules(), ["admin".to_string()]);
        assert_eq!(engine.converters().len(), 1);
    }

    #[test]
    fn test_duplicate_converters_across_modules() {
        let err = Engine::builder()
            .register(&Admin, &[])
            .unwrap()
            .register(&Admin, &[])
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Converter { .. }));
    }

    #[test]
    fn test_invalid_prefix() {
        let err = Engine::builder().register(&Admin, &["admin"]).err().unwrap();
        assert!(matches!(err, EngineError::InvalidPrefix(_)));
    }

    #[test]
    fn test_ambiguity_is_a_startup_error() {
        struct Twice;
        impl Module for Twice {
            fn name(&self) -> &str {
                "twice"
            }
            fn routes(&self) -> Result<Vec<RouteDescriptor>, PatternError> {
                let route = || {
                    Route::get("/x")
                        .query("a", ParamType::Int)
                        .handler(|_a: Args| async { Ok::<_, HandlerError>("x") })
                };
                Ok(vec![route()?, route()?])
            }
        }

        let err = Engine::builder().register(&Twice, &[]).unwrap().build().err().unwrap();
        assert!(matches!(err, EngineError::Router(RouterError::Ambiguous { .. })));

        assert!(Engine::builder()
            .allow_ambiguous_routes(true)
            .register(&Twice, &[])
            .unwrap()
            .build()
            .is_ok());
    }
}
