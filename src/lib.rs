//! # routeloop
//!
//! **routeloop** is a declaratively-routed request dispatcher paired with a
//! closed-loop route suggester. Routes live in YAML route tables; the
//! suggester reads access logs, finds well-shaped paths nobody serves yet,
//! and writes handler stubs plus table entries for them.
//!
//! ## Architecture
//!
//! - **[`table`]** - Route declarations and route table files
//! - **[`router`]** - Exact-then-pattern route resolution and param extraction
//! - **[`registry`]** - Hot-swappable route index built from the configured tables
//! - **[`handlers`]** - Handler traits, loaders, and the single-flight handler cache
//! - **[`dispatcher`]** - Synchronous request dispatch and WebSocket sessions
//! - **[`suggest`]** - Log loading, scoring, candidate selection, and stub materialization
//! - **[`validator`]** - Checks that generated routes have loadable handlers
//! - **[`hot_reload`]** - Reload the registry when a route table changes on disk
//! - **[`config`]** / **[`logging`]** - YAML config with env overrides, `tracing` setup
//! - **[`cli`]** - The `routeloop` command
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Dispatcher
//!     participant Index as RouteIndex
//!     participant Cache as HandlerCache
//!     participant Handler
//!
//!     Caller->>Dispatcher: dispatch(IncomingRequest)
//!     Dispatcher->>Index: resolve(method, path)
//!     Index-->>Dispatcher: RouteMatch (route + params)
//!     Dispatcher->>Cache: get_or_load(handler ref)
//!     Cache-->>Dispatcher: Arc<HandlerModule>
//!     Dispatcher->>Handler: handle(HandlerRequest)
//!     Handler-->>Dispatcher: HandlerResponse
//!     Dispatcher-->>Caller: DispatchOutcome
//! ```
//!
//! ### Suggestion Loop
//!
//! ```mermaid
//! flowchart LR
//!     Logs[access logs] --> Load[load_logs]
//!     Load --> Score[vectorize]
//!     Score --> Select[select_candidates]
//!     Select --> Plan[plan_batch]
//!     Plan --> Write[materialize]
//!     Write --> Table[generated route table]
//!     Table --> Reload[registry reload]
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use routeloop::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse, IncomingRequest};
//! use routeloop::handlers::HandlerCatalog;
//! use routeloop::registry::RouteRegistry;
//! use routeloop::table::parse_route_table;
//! use std::sync::Arc;
//!
//! let routes = parse_route_table(serde_json::json!({
//!     "routes": [
//!         { "id": "get_user", "method": "GET", "path": "/users/{id}", "handler": "users::get" }
//!     ]
//! }))?;
//! let mut catalog = HandlerCatalog::new();
//! catalog.register_entry("users::get", |req: HandlerRequest| {
//!     Ok(HandlerResponse::json(200, serde_json::json!({ "id": req.get_path_param("id") })))
//! });
//!
//! let dispatcher = Dispatcher::new(
//!     Arc::new(RouteRegistry::from_declarations(routes)?),
//!     Arc::new(catalog),
//!     url::Url::parse("http://localhost")?,
//! );
//! let outcome = dispatcher.dispatch(IncomingRequest::new(http::Method::GET, "/users/42"));
//! assert_eq!(outcome.response().status, 200);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod atomic_write;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod hot_reload;
pub mod ids;
pub mod logging;
pub mod registry;
pub mod router;
pub mod suggest;
pub mod table;
pub mod validator;

pub use dispatcher::{DispatchOutcome, Dispatcher, HandlerRequest, HandlerResponse, IncomingRequest};
pub use error::DispatchError;
pub use registry::RouteRegistry;
pub use router::RouteIndex;
