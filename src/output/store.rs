//! Output file store with age-based sweeping.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::{Builder, NamedTempFile};

use crate::error::{ErrorCode, Result, ServiceError};

/// File name prefix for every generated file.
pub const DEFAULT_PREFIX: &str = "songstarter-";

/// File extension for every generated file.
pub const OUTPUT_SUFFIX: &str = ".wav";

/// Marker between the leading dot and the store prefix of in-progress files.
const PARTIAL_MARKER: &str = "partial-";

/// An output file that is still being written.
///
/// It lives under a hidden name that [`OutputStore::outputs`] and
/// [`OutputStore::sweep`] never match, and is deleted when dropped.
/// [`PendingOutput::persist`] renames it to its final store name.
#[derive(Debug)]
pub struct PendingOutput {
    file: NamedTempFile,
    target: PathBuf,
}

impl PendingOutput {
    /// Path of the in-progress file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Path the file will have once persisted.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The open file handle.
    pub fn as_file(&self) -> &File {
        self.file.as_file()
    }

    /// Renames the file to its final name and returns that path.
    ///
    /// Fails rather than replacing an existing file; the pending file is
    /// removed on failure.
    pub fn persist(self) -> Result<PathBuf> {
        let Self { file, target } = self;
        file.persist_noclobber(&target).map_err(|e| {
            ServiceError::with_source(
                ErrorCode::EncodeError,
                format!("Failed to persist output file {}", target.display()),
                e.error,
            )
        })?;
        Ok(target)
    }
}

/// Directory that generated files are written into.
///
/// Every call to [`OutputStore::create`] yields a fresh, uniquely named
/// file. Nothing is deleted implicitly; [`OutputStore::sweep`] removes
/// old files on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputStore {
    dir: PathBuf,
    prefix: String,
}

impl OutputStore {
    /// Creates a store writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Creates a store writing into the system temporary directory.
    pub fn temp() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Returns the output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates a new scoped output file.
    ///
    /// The file is deleted when dropped unless it is persisted.
    pub fn create(&self) -> Result<PendingOutput> {
        let partial_prefix = self.partial_prefix();
        let file = Builder::new()
            .prefix(&partial_prefix)
            .suffix(OUTPUT_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| {
                ServiceError::with_source(
                    ErrorCode::EncodeError,
                    format!("Failed to create output file in {}", self.dir.display()),
                    e,
                )
            })?;

        let unique = file
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(partial_prefix.as_str()))
            .ok_or_else(|| ServiceError::encode_failed("unexpected temporary file name"))?;
        let target = self.dir.join(format!("{}{}", self.prefix, unique));

        Ok(PendingOutput { file, target })
    }

    fn partial_prefix(&self) -> String {
        format!(".{}{}", PARTIAL_MARKER, self.prefix)
    }

    fn is_output(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                !name.starts_with(&self.partial_prefix())
                    && name.starts_with(&self.prefix)
                    && name.ends_with(OUTPUT_SUFFIX)
            })
    }

    /// Lists files in the store, oldest first.
    pub fn outputs(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            ServiceError::with_source(
                ErrorCode::EncodeError,
                format!("Failed to read output directory {}", self.dir.display()),
                e,
            )
        })?;

        let mut outputs: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.is_output(path))
            .filter_map(|path| {
                let modified = path.metadata().and_then(|m| m.modified()).ok()?;
                Some((modified, path))
            })
            .collect();
        outputs.sort();
        Ok(outputs.into_iter().map(|(_, path)| path).collect())
    }

    /// Removes store files last modified more than `max_age` ago.
    ///
    /// Returns the number of files removed. Files that vanish or cannot be
    /// removed are skipped.
    pub fn sweep(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for path in self.outputs()? {
            let age = path
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());

            if age.is_some_and(|age| age >= max_age) {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove output")
                    }
                }
            }
        }

        tracing::info!(dir = %self.dir.display(), removed, "swept outputs");
        Ok(removed)
    }
}

impl Default for OutputStore {
    fn default() -> Self {
        Self::temp()
    }
}
