//! Scratch directory for engine-owned output files
//!
//! Files are named `<prefix>-<uuid>.<ext>` so concurrent writers never share a
//! path. Removal is age based: [`ScratchDir::sweep`] deletes regular files whose
//! modification time is older than the retention window.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// Outcome of a sweep; failures are counted, not propagated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    pub removed: usize,
    pub retained: usize,
    pub failed: usize,
}

/// Manager for the shared scratch directory
#[derive(Debug, Clone)]
pub struct ScratchDir {
    /// Directory holding the scratch files
    dir: PathBuf,
    /// Age after which a file is eligible for removal
    retention: Duration,
}

impl ScratchDir {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Create the directory if needed and return its path; idempotent
    pub fn ensure(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        Ok(self.dir.clone())
    }

    /// Fresh, collision-resistant path inside the directory
    ///
    /// The file itself is not created; the writer creates it.
    pub fn allocate(&self, prefix: &str, extension: &str) -> PathBuf {
        let file_name = format!("{}-{}.{}", prefix, uuid::Uuid::new_v4(), extension);
        self.dir.join(file_name)
    }

    /// Delete every regular file older than the retention window
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// Sweep using `now` as the reference time
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        if !self.dir.exists() {
            return report;
        }

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable scratch entry: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            match self.remove_if_expired(entry.path(), now) {
                Ok(true) => report.removed += 1,
                Ok(false) => report.retained += 1,
                Err(e) => {
                    // Another sweeper may have won the race; that is a removal, not a failure
                    if e.kind() == io::ErrorKind::NotFound {
                        continue;
                    }
                    warn!("Failed to sweep {}: {}", entry.path().display(), e);
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                "Swept {}: removed {}, retained {}, failed {}",
                self.dir.display(),
                report.removed,
                report.retained,
                report.failed
            );
        }
        report
    }

    fn remove_if_expired(&self, path: &Path, now: SystemTime) -> io::Result<bool> {
        let modified = fs::metadata(path)?.modified()?;
        // Files from the future (clock skew) have age zero
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= self.retention {
            return Ok(false);
        }
        fs::remove_file(path)?;
        debug!("Removed expired scratch file {} (age {:?})", path.display(), age);
        Ok(true)
    }

    /// Delete a scratch file the caller no longer needs; missing files are fine
    pub fn release(&self, path: &Path) -> Result<()> {
        remove_quietly(path)
    }
}

/// Output file created by the engine inside the scratch directory
///
/// It stays eligible for sweeping until the caller moves it out with
/// [`ScratchAsset::persist_to`] or drops it with [`ScratchAsset::release`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScratchAsset {
    path: PathBuf,
}

impl ScratchAsset {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name inside the scratch directory
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Move the asset to `dest` and return the new location
    pub fn persist_to(self, dest: &Path) -> Result<PathBuf> {
        move_file(&self.path, dest)?;
        info!("Moved {} to {}", self.path.display(), dest.display());
        Ok(dest.to_path_buf())
    }

    /// Delete the asset; already-deleted assets are fine
    pub fn release(self) -> Result<()> {
        remove_quietly(&self.path)
    }
}

/// Remove a file, treating "already gone" as success
pub fn remove_quietly(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Move a file, falling back to copy + remove across filesystems
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    remove_quietly(from)
}
