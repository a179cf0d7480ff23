use super::types::RouteDeclaration;
use crate::atomic_write;
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parse a table document: `{ routes: [...] }` or a bare list.
///
/// Entries are decoded one at a time so an error names the offending route.
pub fn parse_route_table(value: Value) -> anyhow::Result<Vec<RouteDeclaration>> {
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("routes") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => anyhow::bail!("'routes' must be a list, found {other}"),
        },
        Value::Null => Vec::new(),
        other => anyhow::bail!("route table must be a list or a map, found {other}"),
    };

    let mut routes = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let label = entry
            .get("id")
            .and_then(Value::as_str)
            .map_or_else(|| format!("#{idx}"), str::to_string);
        let route: RouteDeclaration = serde_json::from_value(entry)
            .with_context(|| format!("Invalid route declaration '{label}'"))?;
        if route.id.trim().is_empty() {
            anyhow::bail!("Route declaration {label} has an empty id");
        }
        if !route.path.starts_with('/') {
            anyhow::bail!(
                "Route '{}' path '{}' must start with '/'",
                route.id,
                route.path
            );
        }
        routes.push(route);
    }
    Ok(routes)
}

/// Load a single route table file (YAML by extension, JSON otherwise).
pub fn load_route_table(path: &Path) -> anyhow::Result<Vec<RouteDeclaration>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read route table {path:?}"))?;
    let value: Value = if is_yaml(path) {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML route table {path:?}"))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON route table {path:?}"))?
    };
    let routes = parse_route_table(value).with_context(|| format!("In route table {path:?}"))?;
    debug!(table = ?path, routes_count = routes.len(), "Route table parsed");
    Ok(routes)
}

/// Load hand-written tables in order, then the generated table if it exists.
///
/// Declaration order across files is preserved; it is the tie-break for
/// overlapping templates. Duplicate ids are rejected.
pub fn load_route_tables(
    tables: &[PathBuf],
    generated: Option<&Path>,
) -> anyhow::Result<Vec<RouteDeclaration>> {
    let mut routes = Vec::new();
    for table in tables {
        routes.extend(load_route_table(table)?);
    }
    if let Some(generated) = generated {
        if generated.is_file() {
            routes.extend(load_route_table(generated)?);
        } else {
            debug!(table = ?generated, "Generated route table absent, treating as empty");
        }
    }

    let mut seen = HashSet::with_capacity(routes.len());
    for route in &routes {
        if !seen.insert(route.id.as_str()) {
            anyhow::bail!("Duplicate route id '{}'", route.id);
        }
    }

    info!(
        tables = tables.len(),
        generated = generated.is_some_and(Path::is_file),
        routes_count = routes.len(),
        "Route tables loaded"
    );
    Ok(routes)
}

#[derive(Serialize)]
struct RouteTableDoc<'a> {
    routes: &'a [RouteDeclaration],
}

/// Append declarations to a generated table, publishing it atomically.
///
/// The previous version is kept as `<table>.bak`. Returns the new route count.
pub fn append_routes(path: &Path, new_routes: &[RouteDeclaration]) -> anyhow::Result<usize> {
    let mut routes = if path.is_file() {
        load_route_table(path)?
    } else {
        Vec::new()
    };
    routes.extend_from_slice(new_routes);

    let rendered = if is_yaml(path) {
        serde_yaml::to_string(&RouteTableDoc { routes: &routes })?
    } else {
        serde_json::to_string_pretty(&RouteTableDoc { routes: &routes })?
    };
    atomic_write::publish_with_backup(path, rendered.as_bytes())
        .with_context(|| format!("Failed to publish route table {path:?}"))?;
    info!(
        table = ?path,
        appended = new_routes.len(),
        routes_count = routes.len(),
        "Generated route table updated"
    );
    Ok(routes.len())
}
