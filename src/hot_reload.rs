//! # Hot Reload Module
//!
//! Watches the route-table files and swaps a fresh index into the
//! [`RouteRegistry`] when one changes. This is how materialized routes
//! become live without a restart.
//!
//! The watcher observes the tables' parent directories (the generated table
//! may not exist yet, and atomic publishes replace files by rename) and
//! filters events down to the registry's own source files.
//!
//! If a reload fails the previous index stays active and the error is logged.
//!
//! ```rust,ignore
//! let watcher = routeloop::hot_reload::watch_route_tables(registry.clone())?;
//! // Keep `watcher` alive for as long as reloads should happen.
//! ```

use crate::registry::RouteRegistry;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Start watching every source table of `registry`.
///
/// Dropping the returned watcher stops reloads.
pub fn watch_route_tables(registry: Arc<RouteRegistry>) -> notify::Result<RecommendedWatcher> {
    let watched = Arc::clone(&registry);
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                if !event.paths.iter().any(|p| watched.is_source(p)) {
                    return;
                }
                debug!(paths = ?event.paths, kind = ?event.kind, "Route table changed");
                if let Ok(count) = watched.reload() {
                    info!(routes_count = count, "hot-reload: route index swapped");
                }
            }
            Err(e) => error!(error = %e, "Route table watch error"),
        },
        Config::default(),
    )?;

    let dirs: BTreeSet<PathBuf> = registry
        .sources()
        .files()
        .iter()
        .map(|f| match f.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        })
        .collect();
    for dir in &dirs {
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!(dir = ?dir, "Watching route tables");
    }
    Ok(watcher)
}
