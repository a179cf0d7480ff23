//! # Route Table Module
//!
//! The declarative route table: hand-written files plus the table the
//! suggester materializes. Both are lists of [`RouteDeclaration`] records in
//! YAML or JSON:
//!
//! ```yaml
//! routes:
//!   - id: get_user
//!     method: GET
//!     path: /users/{id}
//!     handler: users::get_user
//!     auth: user
//!     tags: [users]
//!     summary: Fetch one user
//!     sourcemap: true
//!   - id: live_feed
//!     method: WS
//!     path: /feed
//!     handler: feed::live
//! ```
//!
//! Tables are loaded once into the [`crate::registry::RouteRegistry`]; the
//! generated table is only ever rewritten through [`append_routes`].

mod load;
mod types;

pub use load::*;
pub use types::*;
