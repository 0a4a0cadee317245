//! Archive manifest record
//!
//! Each archive carries a small JSON metadata record at a reserved entry
//! name. Archives that lack one get a fresh record written back on first
//! access, so even a read-only browse of a manifest-less archive mutates it
//! once. Decode problems never abort an open; fields fall back to defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::ArchiveBackend;

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRecord {
    #[serde(default = "default_version")]
    pub version: String,
    /// RFC 3339 creation timestamp
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for ManifestRecord {
    fn default() -> Self {
        Self {
            version: default_version(),
            created: String::new(),
            tags: Vec::new(),
        }
    }
}

impl ManifestRecord {
    /// Record for an archive that never had a manifest
    fn fresh() -> Self {
        Self {
            version: default_version(),
            created: chrono::Local::now().to_rfc3339(),
            tags: vec!["new".to_string()],
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Version: {}\nCreated: {}\nTags: {}",
            self.version,
            self.created,
            self.tags.join(", ")
        )
    }
}

/// Extract and decode the manifest entry; when it is absent, synthesize a
/// fresh record and write it back through the backend so the archive has
/// one from now on.
pub fn load_or_create(backend: &mut dyn ArchiveBackend, entry_name: &str) -> ManifestRecord {
    match backend.extract_entry(entry_name) {
        Ok(path) => decode(&path),
        Err(_) => {
            let record = ManifestRecord::fresh();
            if let Err(e) = write_back(backend, entry_name, &record) {
                log::warn!("could not write manifest into archive: {e}");
            }
            record
        }
    }
}

fn decode(path: &Path) -> ManifestRecord {
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            log::warn!("garbled manifest, using defaults: {e}");
            ManifestRecord::default()
        }),
        Err(e) => {
            log::warn!("could not read extracted manifest: {e}");
            ManifestRecord::default()
        }
    }
}

fn write_back(
    backend: &mut dyn ArchiveBackend,
    entry_name: &str,
    record: &ManifestRecord,
) -> std::io::Result<()> {
    let staging = tempfile::tempdir()?;
    let file = staging.path().join(entry_name);
    fs::write(&file, serde_json::to_string_pretty(record)?)?;
    backend
        .add_files(&[file], "")
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(())
}
