//! File-backed FIFO of pre-generated secrets.
//!
//! The backing file is plain text, one Base32 secret per line. Every pop or
//! push rewrites the whole file through a temporary file in the same
//! directory followed by an atomic rename, so a crash leaves either the old
//! or the new queue on disk, never a torn one. Each read-modify-write holds
//! an exclusive OS lock on a `<path>.lock` sidecar, so separate handles and
//! separate processes sharing one queue file never interleave.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{QauthError, Result};
use crate::secret::Secret;

/// Durable queue of secrets consumed by the fallback source.
pub struct SeedQueue {
    path: PathBuf,
}

impl SeedQueue {
    /// Open the queue at `path`. A missing file is an empty queue.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove and return the oldest entry.
    ///
    /// Lines that are not valid secrets are discarded with a warning.
    pub fn pop_front(&self) -> Result<Secret> {
        let _guard = lock_exclusive(&self.path)?;
        let mut entries = self.read_entries()?.into_iter();
        let mut popped = None;
        let mut discarded = 0;
        for line in entries.by_ref() {
            match Secret::parse(&line) {
                Ok(secret) => {
                    popped = Some(secret);
                    break;
                }
                Err(e) => {
                    discarded += 1;
                    log::warn!("discarding malformed seed queue entry: {e}");
                }
            }
        }
        let rest: Vec<String> = entries.collect();
        if popped.is_some() || discarded > 0 {
            self.write_entries(&rest)?;
        }
        let secret = popped.ok_or_else(|| QauthError::QueueExhausted(self.path.clone()))?;
        log::info!("popped fallback secret, {} left in queue", rest.len());
        Ok(secret)
    }

    /// Append an entry at the back.
    pub fn push_back(&self, secret: &Secret) -> Result<()> {
        let _guard = lock_exclusive(&self.path)?;
        let mut entries = self.read_entries()?;
        entries.push(secret.as_str().to_string());
        self.write_entries(&entries)
    }

    pub fn len(&self) -> Result<usize> {
        let _guard = lock_shared(&self.path)?;
        Ok(self.read_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read_entries(&self) -> Result<Vec<String>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn write_entries(&self, entries: &[String]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(parent_dir(&self.path))?;
        for entry in entries {
            writeln!(tmp, "{entry}")?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Sidecar lock file for `path`: same name with `.lock` appended.
pub(crate) fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn open_lock_file(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(path))?;
    Ok(file)
}

/// Exclusive advisory lock on the sidecar of `path`, released on drop.
pub(crate) fn lock_exclusive(path: &Path) -> Result<File> {
    let file = open_lock_file(path)?;
    file.lock()?;
    Ok(file)
}

/// Shared advisory lock on the sidecar of `path`, released on drop.
pub(crate) fn lock_shared(path: &Path) -> Result<File> {
    let file = open_lock_file(path)?;
    file.lock_shared()?;
    Ok(file)
}

/// Directory holding `path`, `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
