//! Turns accepted candidates into handler files and route declarations.

use super::template::{render_handler, HandlerStub};
use super::vector::VectorizedLog;
use crate::atomic_write;
use crate::error::{panic_message, MaterializationFailure};
use crate::ids::suggested_route_id;
use crate::router::RouteIndex;
use crate::table::{self, placeholder_name, HandlerRef, RouteDeclaration, RouteMethod};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Tag carried by every generated declaration.
pub const SUGGESTED_TAG: &str = "suggested";

/// Where and how candidates are written.
#[derive(Debug, Clone)]
pub struct MaterializerConfig {
    /// Directory the handler stubs are written to.
    pub generated_dir: PathBuf,
    /// Module namespace of generated handler refs (`<module>::<name>`).
    pub generated_module: String,
    /// Auth tag for generated routes.
    pub default_auth: String,
    /// Generated route table to append to; `None` writes handler files only.
    pub route_table: Option<PathBuf>,
}

/// A scored log entry promoted to a draft declaration.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateRoute {
    pub declaration: RouteDeclaration,
    pub file: PathBuf,
    pub stub: HandlerStub,
}

/// Candidates accepted in one run plus their audit hash.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializationBatch {
    pub candidates: Vec<CandidateRoute>,
    pub hash: String,
}

impl MaterializationBatch {
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .map(|c| c.declaration.path.as_str())
            .collect()
    }
}

/// A handler file that was published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrittenHandler {
    pub route_id: String,
    pub method: RouteMethod,
    pub path: String,
    pub file: PathBuf,
    /// An earlier file existed and was saved as `.bak`.
    pub backed_up: bool,
}

/// Outcome of [`materialize`]. Written and failed candidates are reported separately.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub hash: String,
    pub written: Vec<WrittenHandler>,
    pub failures: Vec<MaterializationFailure>,
    /// Route count of the generated table after the append.
    pub table_routes: Option<usize>,
    /// Why the table append failed, if it did. Written handler files stay.
    pub table_error: Option<String>,
}

impl BatchReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.table_error.is_none()
    }
}

/// File-system-safe handler name: `get_api_v1_users_by_id`.
#[must_use]
pub fn handler_name(method: RouteMethod, path: &str) -> String {
    let mut name = method.as_str().to_ascii_lowercase();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        name.push('_');
        match placeholder_name(segment) {
            Some(param) => {
                name.push_str("by_");
                push_sanitized(&mut name, param);
            }
            None => push_sanitized(&mut name, segment),
        }
    }
    if !path.split('/').any(|s| !s.is_empty()) {
        name.push_str("_root");
    }
    let mut collapsed = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed.trim_end_matches('_').to_string()
}

fn push_sanitized(out: &mut String, segment: &str) {
    out.extend(segment.chars().map(|c| {
        if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '_'
        }
    }));
}

#[derive(Serialize)]
struct HashedRoute<'a> {
    method: RouteMethod,
    path: &'a str,
    handler: &'a HandlerRef,
    auth: Option<&'a str>,
}

/// SHA-256 over the semantic content of the declarations, in order.
///
/// Ids are left out so identical suggestions hash identically across runs.
/// Audit-only: nothing is skipped because a hash was seen before.
#[must_use]
pub fn batch_hash(declarations: &[RouteDeclaration]) -> String {
    let hashed: Vec<HashedRoute<'_>> = declarations
        .iter()
        .map(|d| HashedRoute {
            method: d.method,
            path: &d.path,
            handler: &d.handler,
            auth: d.auth.as_deref(),
        })
        .collect();
    let mut hasher = Sha256::new();
    // Serializing plain structs and strings cannot fail.
    hasher.update(serde_json::to_vec(&hashed).unwrap_or_default());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Assign ids, handler refs and files to the selected entries.
///
/// Ids are fresh `suggested-*` tokens distinct from every existing id.
/// Handler names that collide within the batch, or with a live route in the
/// generated module, get a numeric suffix.
#[must_use]
pub fn plan_batch(
    selected: &[VectorizedLog],
    existing: &RouteIndex,
    config: &MaterializerConfig,
) -> MaterializationBatch {
    let mut taken_ids: HashSet<String> =
        existing.declarations().iter().map(|d| d.id.clone()).collect();
    // Names bound to live generated routes are never reused; a file with no
    // live route may still be overwritten (and backed up).
    let mut taken_names: HashSet<String> = existing
        .declarations()
        .iter()
        .filter_map(|d| match d.handler.split_module() {
            (Some(module), name) if module == config.generated_module => Some(name.to_string()),
            _ => None,
        })
        .collect();

    let candidates: Vec<CandidateRoute> = selected
        .iter()
        .map(|v| {
            let base = handler_name(v.entry.method, &v.entry.path);
            let mut name = base.clone();
            let mut n = 2;
            while !taken_names.insert(name.clone()) {
                name = format!("{base}_{n}");
                n += 1;
            }
            let declaration = RouteDeclaration {
                id: suggested_route_id(&mut taken_ids),
                method: v.entry.method,
                path: v.entry.path.clone(),
                handler: HandlerRef::new(format!("{}::{name}", config.generated_module)),
                auth: Some(config.default_auth.clone()),
                tags: vec![SUGGESTED_TAG.to_string()],
                summary: Some(format!(
                    "Suggested from access logs (confidence {:.3})",
                    v.score
                )),
                sourcemap: true,
            };
            CandidateRoute {
                file: config.generated_dir.join(format!("{name}.rs")),
                stub: HandlerStub::new(v.entry.method, &v.entry.path, v.score),
                declaration,
            }
        })
        .collect();

    let declarations: Vec<RouteDeclaration> =
        candidates.iter().map(|c| c.declaration.clone()).collect();
    MaterializationBatch {
        hash: batch_hash(&declarations),
        candidates,
    }
}

fn write_candidate(candidate: &CandidateRoute) -> anyhow::Result<bool> {
    let source = render_handler(&candidate.stub)?;
    let published = atomic_write::publish_with_backup(&candidate.file, source.as_bytes())?;
    Ok(published.backed_up)
}

/// Write every candidate's handler file, then append the written ones to the route table.
///
/// A failed candidate is reported and skipped; earlier writes stay committed.
pub fn materialize(batch: &MaterializationBatch, config: &MaterializerConfig) -> BatchReport {
    let mut report = BatchReport {
        hash: batch.hash.clone(),
        ..BatchReport::default()
    };
    let mut declarations = Vec::with_capacity(batch.candidates.len());

    for candidate in &batch.candidates {
        let decl = &candidate.declaration;
        let result = catch_unwind(AssertUnwindSafe(|| write_candidate(candidate)))
            .unwrap_or_else(|panic| {
                Err(anyhow::anyhow!("panicked: {}", panic_message(panic.as_ref())))
            });
        match result {
            Ok(backed_up) => {
                info!(
                    route_id = %decl.id,
                    method = %decl.method,
                    path = %decl.path,
                    file = ?candidate.file,
                    backed_up,
                    "Handler stub written"
                );
                report.written.push(WrittenHandler {
                    route_id: decl.id.clone(),
                    method: decl.method,
                    path: decl.path.clone(),
                    file: candidate.file.clone(),
                    backed_up,
                });
                declarations.push(decl.clone());
            }
            Err(e) => {
                error!(
                    route_id = %decl.id,
                    method = %decl.method,
                    path = %decl.path,
                    file = ?candidate.file,
                    error = %format!("{e:#}"),
                    "Handler stub write failed"
                );
                report.failures.push(MaterializationFailure {
                    method: decl.method,
                    path: decl.path.clone(),
                    file: candidate.file.clone(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    if let Some(table_path) = config.route_table.as_ref().filter(|_| !declarations.is_empty()) {
        match table::append_routes(table_path, &declarations) {
            Ok(count) => report.table_routes = Some(count),
            Err(e) => {
                error!(table = ?table_path, error = %format!("{e:#}"), "Route table append failed");
                report.table_error = Some(format!("{e:#}"));
            }
        }
    }

    info!(
        batch_hash = %report.hash,
        written = report.written.len(),
        failed = report.failures.len(),
        accepted_paths = ?batch.paths(),
        "Materialization batch complete"
    );
    report
}

/// True when `path` looks like a generated handler file name.
#[must_use]
pub fn is_generated_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "rs")
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(crate::handlers::is_valid_handler_name)
}
