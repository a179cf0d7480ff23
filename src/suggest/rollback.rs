//! Undo and cleanup for the generated-handlers directory.
//!
//! [`rollback`] only restores `.bak` backups. Removing files that were newly
//! created (no backup) is the separate [`clean`] operation.

use super::materialize::is_generated_file;
use super::template::SCAFFOLD_MARKER;
use crate::atomic_write::{self, BACKUP_SUFFIX};
use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RollbackReport {
    /// Live files whose backup was moved back over them.
    pub restored: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    /// Generated-looking files kept because they have a backup or no scaffold marker.
    pub kept: Vec<PathBuf>,
}

/// Move `<target>.bak` back over `target` and drop the backup.
///
/// Returns `false` when there is no backup.
pub fn restore_backup(target: &Path) -> anyhow::Result<bool> {
    let backup = atomic_write::backup_path(target);
    if !backup.is_file() {
        return Ok(false);
    }
    fs::rename(&backup, target)
        .with_context(|| format!("Failed to restore {backup:?} over {target:?}"))?;
    Ok(true)
}

fn sorted_entries(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {dir:?}"))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    entries.sort();
    Ok(entries)
}

/// Restore every file in `dir` that has a `.bak` sibling.
///
/// Files without a backup are untouched. A missing directory is an empty rollback.
pub fn rollback(dir: &Path) -> anyhow::Result<RollbackReport> {
    let mut report = RollbackReport::default();
    if !dir.is_dir() {
        return Ok(report);
    }
    for backup in sorted_entries(dir)? {
        let Some(live) = backup
            .to_str()
            .and_then(|s| s.strip_suffix(BACKUP_SUFFIX))
            .map(PathBuf::from)
        else {
            continue;
        };
        match restore_backup(&live) {
            Ok(true) => {
                info!(file = ?live, "Restored from backup");
                report.restored.push(live);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(file = ?live, error = %format!("{e:#}"), "Rollback failed for file");
                report.failures.push((live, format!("{e:#}")));
            }
        }
    }
    info!(
        dir = ?dir,
        restored = report.restored.len(),
        failed = report.failures.len(),
        "Rollback complete"
    );
    Ok(report)
}

/// Remove scaffold stubs that have no backup, plus staging temps left by
/// interrupted writes.
///
/// Only files that still carry the scaffold marker are removed, so a stub
/// that was turned into a real handler survives.
pub fn clean(dir: &Path) -> anyhow::Result<CleanReport> {
    let mut report = CleanReport::default();
    if !dir.is_dir() {
        return Ok(report);
    }
    for path in sorted_entries(dir)? {
        let removable = if atomic_write::is_staging_temp(&path) {
            true
        } else if is_generated_file(&path) {
            let has_backup = atomic_write::backup_path(&path).exists();
            let is_scaffold = fs::read_to_string(&path)
                .map(|src| src.starts_with(SCAFFOLD_MARKER))
                .unwrap_or(false);
            if has_backup || !is_scaffold {
                report.kept.push(path);
                continue;
            }
            true
        } else {
            false
        };
        if removable {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {path:?}"))?;
            report.removed.push(path);
        }
    }
    info!(dir = ?dir, removed = report.removed.len(), kept = report.kept.len(), "Clean complete");
    Ok(report)
}
