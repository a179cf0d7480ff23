//! # Route Registry
//!
//! Owns the in-memory [`RouteIndex`]. Request handling only ever reads a
//! snapshot; [`RouteRegistry::reload`] builds a fresh index from the route
//! table files and swaps it in wholesale, so a concurrent dispatch sees either
//! the old index or the new one, never a partially-updated one.

use crate::router::RouteIndex;
use crate::table::{self, RouteDeclaration};
use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Where the registry reads its declarations from.
#[derive(Debug, Clone, Default)]
pub struct RouteSources {
    /// Hand-written tables, loaded in order.
    pub tables: Vec<PathBuf>,
    /// Table appended to by the suggester; may not exist yet.
    pub generated: Option<PathBuf>,
}

impl RouteSources {
    pub fn new(tables: Vec<PathBuf>, generated: Option<PathBuf>) -> Self {
        Self { tables, generated }
    }

    /// Every file a watcher should observe.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.tables
            .iter()
            .cloned()
            .chain(self.generated.clone())
            .collect()
    }

    pub fn load(&self) -> anyhow::Result<Vec<RouteDeclaration>> {
        table::load_route_tables(&self.tables, self.generated.as_deref())
    }
}

pub struct RouteRegistry {
    sources: RouteSources,
    index: ArcSwap<RouteIndex>,
}

impl RouteRegistry {
    /// Load the route tables once; fails if any table is unreadable or invalid.
    pub fn load(sources: RouteSources) -> anyhow::Result<Self> {
        let index = RouteIndex::new(sources.load()?)?;
        Ok(Self {
            sources,
            index: ArcSwap::from_pointee(index),
        })
    }

    /// Registry over a fixed set of declarations with no backing files.
    /// [`reload`](Self::reload) yields an empty index.
    pub fn from_declarations(routes: Vec<RouteDeclaration>) -> anyhow::Result<Self> {
        Ok(Self {
            sources: RouteSources::default(),
            index: ArcSwap::from_pointee(RouteIndex::new(routes)?),
        })
    }

    /// Current index. Cheap; holders keep the snapshot alive across a reload.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RouteIndex> {
        self.index.load_full()
    }

    #[must_use]
    pub fn sources(&self) -> &RouteSources {
        &self.sources
    }

    /// Rebuild the index from the sources and swap it in.
    ///
    /// On failure the previous index stays active and the error is returned.
    pub fn reload(&self) -> anyhow::Result<usize> {
        match self.sources.load().and_then(RouteIndex::new) {
            Ok(index) => {
                let count = index.len();
                self.index.store(Arc::new(index));
                info!(routes_count = count, "Route registry reloaded");
                Ok(count)
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Route registry reload failed; keeping previous index");
                Err(e)
            }
        }
    }

    /// Swap in an explicit set of declarations.
    pub fn replace(&self, routes: Vec<RouteDeclaration>) -> anyhow::Result<usize> {
        let index = RouteIndex::new(routes)?;
        let count = index.len();
        self.index.store(Arc::new(index));
        Ok(count)
    }

    /// True when `path` is one of this registry's source files.
    #[must_use]
    pub fn is_source(&self, path: &Path) -> bool {
        self.sources.files().iter().any(|f| paths_equal(f, path))
    }
}

fn paths_equal(a: &Path, b: &Path) -> bool {
    normalize(a) == normalize(b)
}

/// Canonical parent joined with the file name, so files that do not exist yet still compare.
fn normalize(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RouteMethod;

    const V1: &str = "routes:\n  - id: foo_one\n    method: GET\n    path: /foo\n    handler: \"m::one\"\n";
    const V2: &str = "routes:\n  - id: foo_two\n    method: GET\n    path: /foo\n    handler: \"m::two\"\n";

    #[test]
    fn reload_swaps_index_and_keeps_old_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("routes.yaml");
        std::fs::write(&table, V1).unwrap();
        let registry = RouteRegistry::load(RouteSources::new(vec![table.clone()], None)).unwrap();

        let before = registry.snapshot();
        std::fs::write(&table, V2).unwrap();
        assert_eq!(registry.reload().unwrap(), 1);

        assert_eq!(before.find(RouteMethod::Get, "/foo").unwrap().0.id, "foo_one");
        let after = registry.snapshot();
        assert_eq!(after.find(RouteMethod::Get, "/foo").unwrap().0.id, "foo_two");
    }

    #[test]
    fn failed_reload_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("routes.yaml");
        std::fs::write(&table, V1).unwrap();
        let registry = RouteRegistry::load(RouteSources::new(vec![table.clone()], None)).unwrap();

        std::fs::write(&table, "routes: [ { id: broken, method: BREW } ]").unwrap();
        assert!(registry.reload().is_err());
        assert_eq!(
            registry.snapshot().find(RouteMethod::Get, "/foo").unwrap().0.id,
            "foo_one"
        );
    }

    #[test]
    fn generated_table_is_picked_up_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("routes.yaml");
        let generated = dir.path().join("routes.generated.yaml");
        std::fs::write(&table, V1).unwrap();
        let registry =
            RouteRegistry::load(RouteSources::new(vec![table], Some(generated.clone()))).unwrap();
        assert_eq!(registry.snapshot().len(), 1);

        std::fs::write(
            &generated,
            "routes:\n  - id: extra\n    method: POST\n    path: /extra\n    handler: \"m::extra\"\n",
        )
        .unwrap();
        assert_eq!(registry.reload().unwrap(), 2);
        assert!(registry.is_source(&generated));
    }
}
