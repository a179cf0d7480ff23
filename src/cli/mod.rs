//! # CLI Module
//!
//! ## Commands
//!
//! ```bash
//! routeloop routes                         # list routes in resolution order
//! routeloop resolve GET /users/42          # which route, which params
//! routeloop dispatch GET '/users/42?x=1'   # run a request end to end
//! routeloop suggest --dry-run              # what the suggester would write
//! routeloop suggest                        # write stubs, append the generated table
//! routeloop rollback --table               # restore .bak backups
//! routeloop clean                          # remove un-backed-up stubs
//! routeloop validate                       # check sourcemap routes load
//! ```
//!
//! Every command reads `--config <FILE>` (or `ROUTELOOP_CONFIG`, or
//! `./routeloop.yaml`) plus the `ROUTELOOP_*` overrides described in
//! [`crate::config`].

mod commands;


pub use commands::{run, run_cli, Cli, Commands};
