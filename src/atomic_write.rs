//! Copy-on-write atomic publish.
//!
//! New content is staged in a hidden temp file in the target's directory,
//! synced, then renamed over the target. Readers see either the old file or
//! the complete new one. A staged file that is dropped without
//! [`StagedFile::commit`] is removed and the target is left untouched.

use anyhow::Context;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix for the previous version of an overwritten file.
pub const BACKUP_SUFFIX: &str = ".bak";
const TEMP_SUFFIX: &str = ".tmp";

/// A write in progress that becomes visible only on [`commit`](StagedFile::commit).
#[derive(Debug)]
pub struct StagedFile {
    target: PathBuf,
    temp: PathBuf,
    file: Option<File>,
}

impl StagedFile {
    /// Open a temp file next to `target`. Missing parent directories are created.
    pub fn create(target: &Path) -> anyhow::Result<Self> {
        let dir = parent_dir(target);
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {dir:?}"))?;
        let name = target
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Target has no file name: {target:?}"))?;
        let temp = dir.join(format!(
            ".{name}.{}{TEMP_SUFFIX}",
            ulid::Ulid::new().to_string().to_lowercase()
        ));
        let file = File::create(&temp)
            .with_context(|| format!("Failed to create staging file {temp:?}"))?;
        Ok(Self {
            target: target.to_path_buf(),
            temp,
            file: Some(file),
        })
    }

    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let file = self
            .file
            .as_mut()
            .context("staging file already closed")?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write staging file {:?}", self.temp))
    }

    /// Sync the staged bytes and rename them over the target.
    pub fn commit(mut self) -> anyhow::Result<()> {
        let file = self.file.take().context("staging file already closed")?;
        file.sync_all()
            .with_context(|| format!("Failed to sync staging file {:?}", self.temp))?;
        drop(file);
        fs::rename(&self.temp, &self.target).with_context(|| {
            format!("Failed to rename {:?} over {:?}", self.temp, self.target)
        })?;
        sync_dir(parent_dir(&self.target));
        debug!(target_path = ?self.target, "Atomic publish complete");
        // The temp path no longer exists; Drop must not touch the target.
        self.temp = PathBuf::new();
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.temp.as_os_str().is_empty() {
            return;
        }
        self.file.take();
        if let Err(e) = fs::remove_file(&self.temp) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(temp_path = ?self.temp, error = %e, "Failed to remove abandoned staging file");
            }
        }
    }
}

/// Atomically replace (or create) `target` with `bytes`.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut staged = StagedFile::create(target)?;
    staged.write_all(bytes)?;
    staged.commit()
}

/// Outcome of [`publish_with_backup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Published {
    /// True when a previous version existed and was saved to the `.bak` sibling.
    pub backed_up: bool,
}

/// Save any existing `target` to `<target>.bak`, then atomically publish `bytes`.
///
/// Re-running against the same path overwrites the backup: the last write's backup wins.
pub fn publish_with_backup(target: &Path, bytes: &[u8]) -> anyhow::Result<Published> {
    let backed_up = if target.is_file() {
        let previous =
            fs::read(target).with_context(|| format!("Failed to read {target:?} for backup"))?;
        write_atomic(&backup_path(target), &previous)?;
        true
    } else {
        false
    };
    write_atomic(target, bytes)?;
    Ok(Published { backed_up })
}

/// `<target>.bak`
#[must_use]
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// True for staging files left behind by an interrupted write.
#[must_use]
pub fn is_staging_temp(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(TEMP_SUFFIX))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    // Makes the rename durable; failure only weakens durability, not atomicity.
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(dir = ?dir, error = %e, "Directory sync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.rs");
        write_atomic(&target, b"one").unwrap();
        write_atomic(&target, b"two").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "two");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| is_staging_temp(&e.path()))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn abandoned_stage_leaves_original_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("handler.rs");
        fs::write(&target, "original").unwrap();

        let mut staged = StagedFile::create(&target).unwrap();
        staged.write_all(b"half of the new ha").unwrap();
        let temp = staged.temp_path().to_path_buf();
        assert!(temp.exists());
        // Crash before rename.
        drop(staged);

        assert_eq!(fs::read_to_string(&target).unwrap(), "original");
        assert!(!temp.exists());
    }

    #[test]
    fn abandoned_stage_of_new_file_leaves_it_absent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("new.rs");
        let mut staged = StagedFile::create(&target).unwrap();
        staged.write_all(b"partial").unwrap();
        drop(staged);
        assert!(!target.exists());
    }

    #[test]
    fn backup_is_written_only_when_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("h.rs");

        let first = publish_with_backup(&target, b"v1").unwrap();
        assert!(!first.backed_up);
        assert!(!backup_path(&target).exists());

        let second = publish_with_backup(&target, b"v2").unwrap();
        assert!(second.backed_up);
        assert_eq!(fs::read_to_string(backup_path(&target)).unwrap(), "v1");

        publish_with_backup(&target, b"v3").unwrap();
        assert_eq!(fs::read_to_string(backup_path(&target)).unwrap(), "v2");
        assert_eq!(fs::read_to_string(&target).unwrap(), "v3");
    }

    #[test]
    fn staging_temp_names_are_recognised() {
        assert!(is_staging_temp(Path::new("/x/.h.rs.01abc.tmp")));
        assert!(!is_staging_temp(Path::new("/x/h.rs")));
        assert!(!is_staging_temp(Path::new("/x/h.rs.bak")));
    }
}
