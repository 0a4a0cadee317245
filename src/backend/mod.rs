//! Archive backends
//!
//! Backends abstract the actual archive tool, allowing the tree, password
//! and navigation logic to work against:
//! - External CLI tools (zip/unzip)
//! - In-process snapshot archives (config `backend = "snapshot"`; also the
//!   workhorse of the test suite)
//! - Other implementations (library-backed codecs, etc.)

mod cli;
mod memory;

pub use cli::CliBackend;
pub use memory::MemoryBackend;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error type for backend operations
#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive not found: {0}")]
    NotFound(String),
    #[error("{tool} exited with status {status}")]
    ToolFailed { tool: String, status: i32 },
    #[error("{0} timed out")]
    Timeout(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("{0}")]
    Other(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Trait for archive backends
///
/// One backend instance is bound to exactly one physical archive file at a
/// time. Entry paths are slash-delimited strings relative to the archive
/// root; a trailing slash marks an explicit directory entry.
///
/// Failure ambiguity: listing reports wrong passwords only as an empty
/// result, which is indistinguishable from an archive that genuinely has no
/// entries. Callers must not assume otherwise — the password resolution
/// protocol in [`crate::password`] is built around exactly this signal.
pub trait ArchiveBackend {
    /// Bind this backend to an archive file
    fn open(&mut self, path: &Path) -> BackendResult<()>;

    /// The archive file this backend is bound to
    fn archive_path(&self) -> &Path;

    /// List entries at or below `prefix` (empty prefix = everything)
    fn list_entries(&mut self, prefix: &str) -> BackendResult<Vec<String>>;

    /// Extract a single entry to a temporary location, returning its path
    fn extract_entry(&mut self, entry: &str) -> BackendResult<PathBuf>;

    /// Extract the whole archive into `dest`
    fn extract_all(&mut self, dest: &Path) -> BackendResult<()>;

    /// Add local files into the archive under `dest_prefix`
    fn add_files(&mut self, files: &[PathBuf], dest_prefix: &str) -> BackendResult<()>;

    /// Remove entries by exact path; atomic-or-failed from the caller's view
    fn remove_entries(&mut self, entries: &[String]) -> BackendResult<()>;

    /// Set the password used for subsequent operations (empty = none)
    fn set_password(&mut self, password: &str);
}
