//! # Router Module
//!
//! Resolves `(method, path)` against the declarative route table.
//!
//! ## Resolution order
//!
//! Resolution is deterministic so overlapping templates resolve the same way
//! on every run:
//!
//! 1. **Exact** - the key `METHOD:path` is looked up in a hash map (O(1)).
//! 2. **Pattern** - otherwise every declaration sharing the method is tried in
//!    declaration order; each `{name}` segment matches exactly one path segment.
//!    The first match wins.
//!
//! No trailing-slash normalization is performed: `/users` and `/users/` are
//! different paths.
//!
//! ## Example
//!
//! ```rust
//! use routeloop::router::{MatchStrategy, RouteIndex};
//! use routeloop::table::{RouteDeclaration, RouteMethod};
//!
//! let routes: Vec<RouteDeclaration> = serde_json::from_value(serde_json::json!([
//!     { "id": "me", "method": "GET", "path": "/users/me", "handler": "users::me" },
//!     { "id": "user", "method": "GET", "path": "/users/{id}", "handler": "users::get" }
//! ])).unwrap();
//! let index = RouteIndex::new(routes).unwrap();
//!
//! let m = index.resolve(RouteMethod::Get, "/users/42").unwrap().unwrap();
//! assert_eq!(m.route.id, "user");
//! assert_eq!(m.get_path_param("id"), Some("42"));
//! assert_eq!(m.strategy, MatchStrategy::Pattern);
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{extract_params, MatchStrategy, ParamVec, RouteIndex, RouteMatch, MAX_INLINE_PARAMS};
