//! In-process archive backend over a JSON snapshot file
//!
//! A snapshot is a single JSON document holding an optional password and a
//! map of entry paths to byte contents. The backend honors the same failure
//! contract as the CLI tools: a wrong password does not produce a distinct
//! error, it simply makes listings come back empty and extractions fail.
//! That keeps the password-resolution protocol testable end to end against
//! the signal it actually gets in production.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ArchiveBackend, BackendError, BackendResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    /// Password required to read the snapshot; empty means unprotected
    #[serde(default)]
    password: String,
    /// Entry path → contents; a trailing-slash key marks a bare directory
    #[serde(default)]
    entries: BTreeMap<String, Vec<u8>>,
}

/// Snapshot-backed archive backend
#[derive(Default)]
pub struct MemoryBackend {
    path: PathBuf,
    snapshot: Snapshot,
    password: String,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a snapshot file; used to stage fixtures and nested archives
    #[allow(dead_code)]
    pub fn stage(
        path: &Path,
        password: &str,
        entries: &[(&str, &[u8])],
    ) -> std::io::Result<()> {
        let snapshot = Snapshot {
            password: password.to_string(),
            entries: entries
                .iter()
                .map(|(p, data)| (p.to_string(), data.to_vec()))
                .collect(),
        };
        fs::write(path, serde_json::to_vec(&snapshot)?)
    }

    fn unlocked(&self) -> bool {
        self.snapshot.password.is_empty() || self.password == self.snapshot.password
    }

    fn persist(&self) -> BackendResult<()> {
        let data = serde_json::to_vec(&self.snapshot)
            .map_err(|e| BackendError::Other(e.to_string()))?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

impl ArchiveBackend for MemoryBackend {
    fn open(&mut self, path: &Path) -> BackendResult<()> {
        if !path.exists() {
            return Err(BackendError::NotFound(path.display().to_string()));
        }
        let data = fs::read(path)?;
        self.snapshot = serde_json::from_slice(&data)
            .map_err(|e| BackendError::Other(format!("bad snapshot: {e}")))?;
        self.path = fs::canonicalize(path)?;
        Ok(())
    }

    fn archive_path(&self) -> &Path {
        &self.path
    }

    fn list_entries(&mut self, prefix: &str) -> BackendResult<Vec<String>> {
        if !self.unlocked() {
            // Same signal a wrong password produces with the CLI tools.
            return Ok(Vec::new());
        }
        Ok(self
            .snapshot
            .entries
            .keys()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn extract_entry(&mut self, entry: &str) -> BackendResult<PathBuf> {
        if !self.unlocked() {
            return Err(BackendError::Other(format!("extraction failed: {entry}")));
        }
        let data = self
            .snapshot
            .entries
            .get(entry)
            .ok_or_else(|| BackendError::NotFound(entry.to_string()))?;
        let dir = tempfile::Builder::new()
            .prefix("varc-mem-")
            .tempdir()?
            .keep();
        let out = dir.join(entry);
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out, data)?;
        Ok(out)
    }

    fn extract_all(&mut self, dest: &Path) -> BackendResult<()> {
        if !self.unlocked() {
            return Err(BackendError::Other("extraction failed".to_string()));
        }
        for (entry, data) in &self.snapshot.entries {
            if entry.ends_with('/') {
                fs::create_dir_all(dest.join(entry.trim_end_matches('/')))?;
                continue;
            }
            let out = dest.join(entry);
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(out, data)?;
        }
        Ok(())
    }

    fn add_files(&mut self, files: &[PathBuf], dest_prefix: &str) -> BackendResult<()> {
        let prefix = dest_prefix.trim_matches('/');
        for file in files {
            let name = file
                .file_name()
                .ok_or_else(|| BackendError::Other(format!("no file name: {}", file.display())))?
                .to_string_lossy()
                .into_owned();
            let entry = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let data = fs::read(file)?;
            self.snapshot.entries.insert(entry, data);
        }
        self.persist()
    }

    fn remove_entries(&mut self, entries: &[String]) -> BackendResult<()> {
        // Atomic-or-failed: verify everything exists before touching state.
        for entry in entries {
            if !self.snapshot.entries.contains_key(entry) {
                return Err(BackendError::NotFound(entry.clone()));
            }
        }
        for entry in entries {
            self.snapshot.entries.remove(entry);
        }
        self.persist()
    }

    fn set_password(&mut self, password: &str) {
        self.password = password.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_password_reads_as_empty_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.vfsarc");
        MemoryBackend::stage(&path, "secret", &[("a.txt", b"hello")]).unwrap();

        let mut backend = MemoryBackend::new();
        backend.open(&path).unwrap();

        // No password bound yet: indistinguishable from an empty archive.
        assert!(backend.list_entries("").unwrap().is_empty());
        assert!(backend.extract_entry("a.txt").is_err());

        backend.set_password("secret");
        assert_eq!(backend.list_entries("").unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn mutations_round_trip_through_the_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rw.vfsarc");
        MemoryBackend::stage(&path, "", &[("keep.txt", b"k"), ("drop.txt", b"d")]).unwrap();

        let mut backend = MemoryBackend::new();
        backend.open(&path).unwrap();
        backend.remove_entries(&["drop.txt".to_string()]).unwrap();

        let local = dir.path().join("added.txt");
        fs::write(&local, b"fresh").unwrap();
        backend.add_files(&[local], "sub").unwrap();

        let mut reopened = MemoryBackend::new();
        reopened.open(&path).unwrap();
        assert_eq!(
            reopened.list_entries("").unwrap(),
            vec!["keep.txt", "sub/added.txt"]
        );
        let out = reopened.extract_entry("sub/added.txt").unwrap();
        assert_eq!(fs::read(out).unwrap(), b"fresh");
    }

    #[test]
    fn remove_is_atomic_or_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rm.vfsarc");
        MemoryBackend::stage(&path, "", &[("a.txt", b"a")]).unwrap();

        let mut backend = MemoryBackend::new();
        backend.open(&path).unwrap();
        let err = backend
            .remove_entries(&["a.txt".to_string(), "ghost.txt".to_string()])
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
        // Nothing was removed.
        assert_eq!(backend.list_entries("").unwrap(), vec!["a.txt"]);
    }
}
