//! Persisted snapshot-record store.
//!
//! Records previously scanned versions/identities so the next run for the
//! same coordinate can skip redundant work. Reads are deliberately
//! forgiving: a missing, unreadable, or corrupt record reads as absent,
//! which makes the skip engine rescan rather than silently miss new data.
//! Writes go through a temp file and rename so a crashed run never leaves
//! a half-written record.
//!
//! One run per key at a time is an assumed invariant, not an enforced
//! lock; the invoking pipeline serializes runs on the same coordinate.

pub mod error;
pub mod types;

use std::path::{Path, PathBuf};

pub use error::StoreError;
pub use types::{
    DependencySnapshot, EnvironmentDescriptor, PackageSnapshot, PipelineProvenance, SnapshotKey,
};

const RECORD_FILE: &str = "metadata.json";

pub trait SnapshotStore {
    /// Prior package record for this key, if a readable one exists.
    fn get_package(&self, key: &SnapshotKey) -> Option<PackageSnapshot>;

    fn put_package(&self, key: &SnapshotKey, record: &PackageSnapshot) -> Result<(), StoreError>;

    /// All composite identities recorded under a dependency key.
    fn list_dependency_idents(&self, key: &SnapshotKey) -> Vec<String>;

    /// Prior record for one exact composite identity under a dependency
    /// key, if a readable one exists.
    fn get_dependency(&self, key: &SnapshotKey, ident: &str) -> Option<DependencySnapshot>;

    fn put_dependency(
        &self,
        key: &SnapshotKey,
        record: &DependencySnapshot,
    ) -> Result<(), StoreError>;
}

/// Store backed by a directory tree of keyed JSON files.
#[derive(Debug)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, key: &SnapshotKey) -> PathBuf {
        self.root.join(key.relative_dir()).join(RECORD_FILE)
    }

    fn write_record(&self, path: &Path, json: &str) -> Result<(), StoreError> {
        let dir = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn get_package(&self, key: &SnapshotKey) -> Option<PackageSnapshot> {
        let path = self.record_path(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Unreadable snapshot record at {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    "Corrupt snapshot record at {} treated as absent: {e}",
                    path.display()
                );
                None
            }
        }
    }

    fn put_package(&self, key: &SnapshotKey, record: &PackageSnapshot) -> Result<(), StoreError> {
        let path = self.record_path(key);
        let json = serde_json::to_string_pretty(record)?;
        self.write_record(&path, &json)
    }

    fn list_dependency_idents(&self, key: &SnapshotKey) -> Vec<String> {
        let dir = self.root.join(key.relative_dir());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut idents = Vec::new();
        for entry in entries.flatten() {
            let record_path = entry.path().join(RECORD_FILE);
            let raw = match std::fs::read_to_string(&record_path) {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            match serde_json::from_str::<DependencySnapshot>(&raw) {
                Ok(record) => idents.push(record.ident),
                Err(e) => {
                    tracing::warn!(
                        "Corrupt dependency record at {} skipped: {e}",
                        record_path.display()
                    );
                }
            }
        }
        idents.sort();
        idents
    }

    fn get_dependency(&self, key: &SnapshotKey, ident: &str) -> Option<DependencySnapshot> {
        let version_dir = types::ident_version_dir(ident)?;
        let path = self
            .root
            .join(key.relative_dir())
            .join(version_dir)
            .join(RECORD_FILE);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<DependencySnapshot>(&raw) {
            Ok(record) if record.ident == ident => Some(record),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    "Corrupt dependency record at {} treated as absent: {e}",
                    path.display()
                );
                None
            }
        }
    }

    fn put_dependency(
        &self,
        key: &SnapshotKey,
        record: &DependencySnapshot,
    ) -> Result<(), StoreError> {
        let version_dir = record
            .version_dir()
            .ok_or_else(|| StoreError::UnqualifiedIdent(record.ident.clone()))?;
        let path = self
            .root
            .join(key.relative_dir())
            .join(version_dir)
            .join(RECORD_FILE);
        let json = serde_json::to_string_pretty(record)?;
        self.write_record(&path, &json)
    }
}
