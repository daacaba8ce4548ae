//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes per verb, ordered by path specificity
//! - Select the first pattern matching the request path
//! - Among that pattern's handlers, pick the one whose declared named
//!   parameters fit the supplied parameter names
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Ambiguous parameter shapes are rejected at startup unless allowed
//! - Explicit NotFound / ShapeMismatch rather than a silent default
//! - The most specific matching pattern owns the path: if none of its
//!   handlers accepts the parameters the result is ShapeMismatch, and
//!   broader patterns (such as a `/*` catch-all) are not tried

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use super::descriptor::{RouteDescriptor, RouteTarget};
use super::ordering::sort_by_specificity;
use super::pattern::PathPattern;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("routes `{first}` and `{second}` on {verb} {pattern} accept the same parameter set")]
    Ambiguous {
        verb: Method,
        pattern: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no route for {verb} {path}")]
    NotFound { verb: Method, path: String },

    #[error("no handler on {pattern} accepts the supplied parameters")]
    ShapeMismatch { pattern: String },
}

/// Named-parameter shape of a route.
#[derive(Debug, Clone)]
struct Shape {
    required: BTreeSet<String>,
    declared: BTreeSet<String>,
    /// RPC and scheme routes match on path alone.
    any: bool,
}

impl Shape {
    fn of(route: &RouteDescriptor) -> Self {
        let mut required = BTreeSet::new();
        let mut declared = BTreeSet::new();
        for spec in route.named_params() {
            if spec.required {
                required.insert(spec.key());
            }
            declared.insert(spec.key());
        }
        Self {
            required,
            declared,
            any: !matches!(route.target, RouteTarget::Handler(_)),
        }
    }

    /// Every required name supplied, nothing supplied that is not declared.
    fn accepts(&self, supplied: &BTreeSet<String>) -> bool {
        self.any || (self.required.is_subset(supplied) && supplied.is_subset(&self.declared))
    }

    /// Some supplied set satisfies both shapes.
    fn overlaps(&self, other: &Shape) -> bool {
        if self.any || other.any {
            return self.any && other.any;
        }
        self.required.is_subset(&other.declared) && other.required.is_subset(&self.declared)
    }
}

#[derive(Debug)]
struct PatternGroup {
    pattern: PathPattern,
    routes: Vec<(Shape, Arc<RouteDescriptor>)>,
}

/// Immutable routing table.
#[derive(Debug, Default)]
pub struct Router {
    tables: HashMap<Method, Vec<PatternGroup>>,
}

impl Router {
    /// Compile routes. Registration order is kept within a pattern.
    pub fn new(routes: Vec<RouteDescriptor>, allow_ambiguous: bool) -> Result<Self, RouterError> {
        let mut tables: HashMap<Method, Vec<PatternGroup>> = HashMap::new();

        for route in routes {
            let groups = tables.entry(route.verb.clone()).or_default();
            let canonical = route.pattern.canonical();
            let shape = Shape::of(&route);
            let route = Arc::new(route);

            match groups
                .iter_mut()
                .find(|g| g.pattern.canonical() == canonical)
            {
                Some(group) => {
                    if let Some((_, existing)) =
                        group.routes.iter().find(|(s, _)| s.overlaps(&shape))
                    {
                        if !allow_ambiguous {
                            return Err(RouterError::Ambiguous {
                                verb: route.verb.clone(),
                                pattern: canonical,
                                first: existing.name.clone(),
                                second: route.name.clone(),
                            });
                        }
                        tracing::warn!(
                            verb = %route.verb,
                            pattern = %canonical,
                            first = %existing.name,
                            second = %route.name,
                            "Ambiguous parameter shapes, first registered wins"
                        );
                    }
                    group.routes.push((shape, route));
                }
                None => groups.push(PatternGroup {
                    pattern: route.pattern.clone(),
                    routes: vec![(shape, route)],
                }),
            }
        }

        for groups in tables.values_mut() {
            sort_by_specificity(groups, |g| &g.pattern);
        }

        Ok(Self { tables })
    }

    /// Resolve a request. `supplied` holds lowercased query/form names.
    pub fn resolve(
        &self,
        verb: &Method,
        path: &str,
        supplied: &BTreeSet<String>,
    ) -> Result<Arc<RouteDescriptor>, ResolveError> {
        let group = self
            .tables
            .get(verb)
            .and_then(|groups| groups.iter().find(|g| g.pattern.matches(path)))
            .ok_or_else(|| ResolveError::NotFound {
                verb: verb.clone(),
                path: path.to_string(),
            })?;

        group
            .routes
            .iter()
            .find(|(shape, _)| shape.accepts(supplied))
            .map(|(_, route)| Arc::clone(route))
            .ok_or_else(|| ResolveError::ShapeMismatch {
                pattern: group.pattern.canonical(),
            })
    }

    /// Ordered patterns registered for `verb`.
    pub fn patterns(&self, verb: &Method) -> Vec<&str> {
        self.tables
            .get(verb)
            .map(|groups| groups.iter().map(|g| g.pattern.as_str()).collect())
            .unwrap_or_default()
    }

    /// Every registered route, in no particular order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteDescriptor>> {
        self.tables
            .values()
            .flat_map(|groups| groups.iter())
            .flat_map(|g| g.routes.iter().map(|(_, route)| route))
    }

    pub fn len(&self) -> usize {
        self.tables
            .values()
            .flat_map(|groups| groups.iter())
            .map(|g| g.routes.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `VERB pattern -> route` lines, verbs sorted, patterns in match order.
    pub fn listing(&self) -> Vec<String> {
        let mut verbs: Vec<&Method> = self.tables.keys().collect();
        verbs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let mut lines = Vec::new();
        for verb in verbs {
            for group in &self.tables[verb] {
                for (_, route) in &group.routes {
                    lines.push(format!("{verb} {} -> {}", group.pattern, route.name));
                }
            }
        }
        lines
    }
}
