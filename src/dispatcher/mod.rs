//! # Dispatcher Module
//!
//! Turns an [`IncomingRequest`] into a handler invocation.
//!
//! ## Request Flow
//!
//! 1. Parse the target against the base URL (`InvalidTarget` on failure)
//! 2. Pick the method: `WS` when the request carries `Upgrade: websocket`,
//!    the HTTP verb otherwise
//! 3. Resolve against the current [`RouteRegistry`](crate::registry::RouteRegistry)
//!    snapshot (`NotFound` when nothing matches)
//! 4. Load the handler module through the single-flight
//!    [`HandlerCache`](crate::handlers::HandlerCache) (`HandlerUnavailable`)
//! 5. Invoke the entry point, or run the WebSocket handshake and return a
//!    [`WebSocketSession`] (`HandlerFault` if the handler errors or panics)
//!
//! [`Dispatcher::dispatch`] never fails: faults are logged with the request
//! id and route id and become a generic JSON error response.
//!
//! ## Example
//!
//! ```rust
//! use routeloop::dispatcher::{DispatchOutcome, Dispatcher, HandlerResponse, IncomingRequest};
//! use routeloop::handlers::HandlerCatalog;
//! use routeloop::registry::RouteRegistry;
//! use routeloop::table::RouteDeclaration;
//! use std::sync::Arc;
//!
//! let routes: Vec<RouteDeclaration> = serde_json::from_value(serde_json::json!([
//!     { "id": "get_user", "method": "GET", "path": "/users/{id}", "handler": "users::get" }
//! ])).unwrap();
//! let registry = Arc::new(RouteRegistry::from_declarations(routes).unwrap());
//!
//! let mut catalog = HandlerCatalog::new();
//! catalog.register_entry("users::get", |req: routeloop::dispatcher::HandlerRequest| {
//!     Ok(HandlerResponse::json(200, serde_json::json!({ "id": req.get_path_param("id") })))
//! });
//!
//! let base = url::Url::parse("http://localhost/").unwrap();
//! let dispatcher = Dispatcher::new(registry, Arc::new(catalog), base);
//! let outcome = dispatcher.dispatch(IncomingRequest::new(http::Method::GET, "/users/7"));
//! assert_eq!(outcome.response().body["id"], "7");
//! ```

mod core;
mod websocket;

pub use core::{
    DispatchOutcome, Dispatcher, HandlerRequest, HandlerResponse, HeaderVec, IncomingRequest,
    MAX_INLINE_HEADERS, REQUEST_ID_HEADER,
};
pub use websocket::{WebSocketConnection, WebSocketSession, WsContext, WsMessage};
