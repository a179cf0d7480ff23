//! Handler modules: the contract, how they are loaded, and the
//! process-lifetime cache.
//!
//! A route's `handler` field is a [`HandlerRef`](crate::table::HandlerRef).
//! A [`HandlerLoader`] turns it into a [`HandlerModule`] exposing an entry
//! point, WebSocket callbacks, or both. [`HandlerCatalog`] serves modules
//! compiled into the binary; [`ScaffoldLoader`] serves stubs written by the
//! suggester; [`ChainLoader`] combines them. [`HandlerCache`] makes sure each
//! reference is loaded at most once.

mod cache;
mod scaffold;
mod types;

pub use cache::HandlerCache;
pub use scaffold::{is_valid_handler_name, ScaffoldHandler, ScaffoldLoader};
pub use types::{
    ChainLoader, Handler, HandlerCatalog, HandlerLoader, HandlerModule, LoadError,
    WebSocketHandler,
};
