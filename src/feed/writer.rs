use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors that can occur while persisting the feed.
///
/// Whatever the failure, the target path still holds its previous content
/// (or still does not exist) and no temporary file is left behind.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Output path '{}' has no file name", .0.display())]
    InvalidPath(PathBuf),

    #[error("Failed to create directory '{}': {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to create temporary file '{}': {source}", .path.display())]
    CreateTemp { path: PathBuf, source: io::Error },

    #[error("Failed to write temporary file '{}': {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to sync temporary file '{}' to disk: {source}", .path.display())]
    Sync { path: PathBuf, source: io::Error },

    #[error("Failed to rename '{}' to '{}': {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Failed to sync directory '{}' after rename: {source}", .path.display())]
    SyncDir { path: PathBuf, source: io::Error },
}

/// Fully written temp file waiting to be renamed over its target.
///
/// Dropping a `StagedFile` without calling [`StagedFile::commit`] deletes
/// the temp file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedFile {
    temp_path: PathBuf,
    target: PathBuf,
    dir: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically replaces the target with the staged content.
    ///
    /// POSIX guarantees atomicity for rename on the same filesystem, which
    /// is why the temp file lives next to the target. The directory is synced
    /// afterwards so the new entry survives a power loss.
    pub fn commit(mut self) -> Result<(), WriteError> {
        fs::rename(&self.temp_path, &self.target).map_err(|source| WriteError::Rename {
            from: self.temp_path.clone(),
            to: self.target.clone(),
            source,
        })?;
        self.committed = true;

        sync_dir(&self.dir).map_err(|source| WriteError::SyncDir {
            path: self.dir.clone(),
            source,
        })
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

// Directories cannot be opened for syncing here; rename durability is up to
// the filesystem.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Writes `contents` to a temp file in the target's directory and syncs it.
///
/// Missing parent directories are created. The temp file is named
/// `.{file_name}.tmp.{nanos}` and opened with `create_new`, so a stale or
/// planted file at that path makes staging fail instead of being reused.
pub fn stage(path: &Path, contents: &[u8]) -> Result<StagedFile, WriteError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| WriteError::InvalidPath(path.to_path_buf()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| WriteError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        tracing::debug!(dir = %dir.display(), "Created output directory");
    }

    // SEC-009: Randomized temp filename to prevent TOCTOU race conditions
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dir.join(format!(
        ".{}.tmp.{:016x}",
        file_name.to_string_lossy(),
        random_suffix
    ));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|source| WriteError::CreateTemp {
            path: temp_path.clone(),
            source,
        })?;

    // From here on, dropping `staged` cleans up the temp file on any error
    let staged = StagedFile {
        temp_path,
        target: path.to_path_buf(),
        dir: dir.to_path_buf(),
        committed: false,
    };

    file.write_all(contents).map_err(|source| WriteError::Write {
        path: staged.temp_path.clone(),
        source,
    })?;

    file.sync_all().map_err(|source| WriteError::Sync {
        path: staged.temp_path.clone(),
        source,
    })?;

    Ok(staged)
}

/// Replaces `path` with `contents` so readers never observe a partial file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), WriteError> {
    stage(path, contents.as_bytes())?.commit()?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "Feed written");
    Ok(())
}
