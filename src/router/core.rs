//! Router core module - hot path for route resolution.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use crate::error::DispatchError;
use crate::table::{placeholder_name, route_key, RouteDeclaration, RouteMethod};
use regex::Regex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of path/query parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., /users/{id}/posts/{postId}).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the route table and are
/// shared by every request that matches the route.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Which branch of the resolution algorithm produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// `METHOD:path` key lookup.
    Exact,
    /// Ordered scan of compiled templates for the method.
    Pattern,
}

/// Result of resolving a request against the index.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteDeclaration>,
    pub path_params: ParamVec,
    pub strategy: MatchStrategy,
}

impl RouteMatch {
    /// Get a path parameter by name.
    ///
    /// Uses "last write wins" semantics when a template repeats a name.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Convert path_params to HashMap.
    /// Note: This allocates - use get_path_param() in hot paths instead
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    regex: Regex,
    route: Arc<RouteDeclaration>,
}

/// Immutable in-memory index over a route table.
///
/// Built once per (re)load and shared behind an `Arc`; it is never mutated
/// after construction.
#[derive(Debug, Clone, Default)]
pub struct RouteIndex {
    /// `METHOD:path` → first declaration with that key.
    exact: HashMap<String, Arc<RouteDeclaration>>,
    /// Compiled templates per method, in declaration order.
    patterns: HashMap<RouteMethod, Vec<CompiledRoute>>,
    declarations: Vec<Arc<RouteDeclaration>>,
}

impl RouteIndex {
    /// Build the index. Declaration order is the tie-break for overlapping templates.
    pub fn new(routes: Vec<RouteDeclaration>) -> anyhow::Result<Self> {
        let mut exact: HashMap<String, Arc<RouteDeclaration>> =
            HashMap::with_capacity(routes.len());
        let mut patterns: HashMap<RouteMethod, Vec<CompiledRoute>> = HashMap::new();
        let mut declarations = Vec::with_capacity(routes.len());

        for route in routes {
            let route = Arc::new(route);
            let key = route.key();
            if let Some(first) = exact.get(&key) {
                warn!(
                    key = %key,
                    kept = %first.id,
                    shadowed = %route.id,
                    "Duplicate method/path declaration; earlier declaration wins"
                );
            } else {
                exact.insert(key, Arc::clone(&route));
            }
            let regex = path_to_regex(&route.path)
                .map_err(|e| anyhow::anyhow!("Route '{}' has an invalid path: {e}", route.id))?;
            patterns.entry(route.method).or_default().push(CompiledRoute {
                regex,
                route: Arc::clone(&route),
            });
            declarations.push(route);
        }

        let summary: Vec<String> = declarations
            .iter()
            .take(10)
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        info!(
            routes_count = declarations.len(),
            routes_summary = ?summary,
            "Route index built"
        );

        Ok(Self {
            exact,
            patterns,
            declarations,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// All declarations in load order.
    #[must_use]
    pub fn declarations(&self) -> &[Arc<RouteDeclaration>] {
        &self.declarations
    }

    /// Look up a declaration by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<RouteDeclaration>> {
        self.declarations.iter().find(|r| r.id == id)
    }

    /// Resolve `(method, path)` to a declaration without extracting params.
    ///
    /// 1. exact `METHOD:path` key (O(1));
    /// 2. first template for the method whose pattern matches, in declaration order.
    #[must_use]
    pub fn find(&self, method: RouteMethod, path: &str) -> Option<(Arc<RouteDeclaration>, MatchStrategy)> {
        if let Some(route) = self.exact.get(&route_key(method, path)) {
            return Some((Arc::clone(route), MatchStrategy::Exact));
        }
        self.patterns
            .get(&method)?
            .iter()
            .find(|c| c.regex.is_match(path))
            .map(|c| (Arc::clone(&c.route), MatchStrategy::Pattern))
    }

    /// Resolve and extract params.
    ///
    /// `Ok(None)` means nothing matched; `Err` means the matched template and the
    /// path disagree on shape, which is an internal consistency fault.
    pub fn resolve(
        &self,
        method: RouteMethod,
        path: &str,
    ) -> Result<Option<RouteMatch>, DispatchError> {
        let Some((route, strategy)) = self.find(method, path) else {
            debug!(method = %method, path = %path, "No route matched");
            return Ok(None);
        };
        let path_params = extract_params(&route, path)?;
        debug!(
            method = %method,
            path = %path,
            route_id = %route.id,
            strategy = ?strategy,
            path_params = ?path_params,
            "Route matched"
        );
        Ok(Some(RouteMatch {
            route,
            path_params,
            strategy,
        }))
    }

    /// True when `path` is already served by some declaration, exact or templated,
    /// under any method.
    #[must_use]
    pub fn covers_path(&self, path: &str) -> bool {
        self.patterns
            .values()
            .flatten()
            .any(|c| c.regex.is_match(path))
    }

    /// Print all registered routes to stdout.
    pub fn dump_routes(&self) {
        println!("[routes] count={}", self.declarations.len());
        for route in &self.declarations {
            println!(
                "[route] {} {} -> {} ({})",
                route.method, route.path, route.handler, route.id
            );
        }
    }
}

/// Convert a path template to an anchored regex.
///
/// Each `{name}` segment becomes `[^/]+` (exactly one non-empty segment);
/// literal segments are escaped and kept as-is, including empty ones, so
/// `/users` and `/users/` stay distinct.
pub(crate) fn path_to_regex(template: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(template.len() + 8);
    pattern.push('^');
    for (i, segment) in template.split('/').enumerate() {
        if i > 0 {
            pattern.push('/');
        }
        if placeholder_name(segment).is_some() {
            pattern.push_str("[^/]+");
        } else {
            pattern.push_str(&regex::escape(segment));
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

/// Pair template and path segments positionally; `{name}` segments bind params.
pub fn extract_params(route: &RouteDeclaration, path: &str) -> Result<ParamVec, DispatchError> {
    let template_segments = route.path.split('/');
    let path_segments = path.split('/');
    if template_segments.clone().count() != path_segments.clone().count() {
        return Err(DispatchError::ParamMismatch {
            route_id: route.id.clone(),
            template: route.path.clone(),
            path: path.to_string(),
        });
    }
    let mut params = ParamVec::new();
    for (template, actual) in template_segments.zip(path_segments) {
        if let Some(name) = placeholder_name(template) {
            params.push((Arc::from(name), actual.to_string()));
        }
    }
    Ok(params)
}
