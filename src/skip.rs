//! Scan-skip decision engine.
//!
//! A scan is skipped if and only if the newly resolved version/identity is
//! byte-identical to what the snapshot store holds for the same key.
//! Anything else — no prior record, a corrupt record, a different version —
//! forces a rescan: correctness favors redundant scanning over silently
//! missing new data.

use crate::store::{SnapshotKey, SnapshotStore};

/// Outcome of the skip check, with the reason for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDecision {
    pub skip: bool,
    pub reason: String,
}

impl SkipDecision {
    fn skip(reason: impl Into<String>) -> Self {
        Self {
            skip: true,
            reason: reason.into(),
        }
    }

    fn rescan(reason: impl Into<String>) -> Self {
        Self {
            skip: false,
            reason: reason.into(),
        }
    }
}

/// Package-mode check: compare the stored resolved version against the new
/// one. `full_scan` bypasses the store entirely.
pub fn evaluate_package(
    store: &dyn SnapshotStore,
    key: &SnapshotKey,
    resolved_version: &str,
    full_scan: bool,
) -> SkipDecision {
    if full_scan {
        return SkipDecision::rescan("full product scan requested, skip check bypassed");
    }

    match store.get_package(key) {
        Some(record) if record.resolved_version == resolved_version => SkipDecision::skip(format!(
            "version {resolved_version} already scanned for {}",
            key.describe()
        )),
        Some(record) => SkipDecision::rescan(format!(
            "resolved version {resolved_version} differs from last scanned {}",
            record.resolved_version
        )),
        None => SkipDecision::rescan(format!("no prior scan record for {}", key.describe())),
    }
}

/// Dependency-mode check: the composite identity must appear among the
/// per-version records stored under the key.
pub fn evaluate_dependency(
    store: &dyn SnapshotStore,
    key: &SnapshotKey,
    ident: &str,
    full_scan: bool,
) -> SkipDecision {
    if full_scan {
        return SkipDecision::rescan("full product scan requested, skip check bypassed");
    }

    let idents = store.list_dependency_idents(key);
    if idents.iter().any(|known| known == ident) {
        SkipDecision::skip(format!("identity {ident} already scanned"))
    } else {
        SkipDecision::rescan(format!("no scan record for identity {ident}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{ScannerProvenance, SeverityCounts};
    use crate::store::{
        DependencySnapshot, EnvironmentDescriptor, FsSnapshotStore, PackageSnapshot,
        PipelineProvenance,
    };
    use crate::types::{DownloadSite, PackageManager};
    use chrono::Utc;

    fn package_key() -> SnapshotKey {
        SnapshotKey::Package {
            product: "chef".into(),
            channel: "stable".into(),
            download_site: DownloadSite::Community,
            os: "ubuntu".into(),
            os_version: "22.04".into(),
            arch: "x86_64".into(),
        }
    }

    fn record(version: &str) -> PackageSnapshot {
        PackageSnapshot {
            resolved_version: version.into(),
            download_url_redacted: String::new(),
            scanned_at: Utc::now(),
            environment: EnvironmentDescriptor {
                os: "ubuntu".into(),
                os_version: "22.04".into(),
                arch: "x86_64".into(),
                package_manager: PackageManager::Deb,
            },
            scanner: ScannerProvenance::default(),
            severity_counts: SeverityCounts::default(),
            pipeline: PipelineProvenance::default(),
        }
    }

    #[test]
    fn test_skip_when_version_matches_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let key = package_key();
        store.put_package(&key, &record("18.4.12")).unwrap();

        let decision = evaluate_package(&store, &key, "18.4.12", false);
        assert!(decision.skip);
        assert!(decision.reason.contains("already scanned"));
    }

    #[test]
    fn test_rescan_when_no_prior_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());

        let decision = evaluate_package(&store, &package_key(), "18.4.12", false);
        assert!(!decision.skip);
        assert!(decision.reason.contains("no prior scan record"));
    }

    #[test]
    fn test_rescan_when_version_differs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let key = package_key();
        store.put_package(&key, &record("18.4.12")).unwrap();

        let decision = evaluate_package(&store, &key, "18.4.13", false);
        assert!(!decision.skip);
    }

    #[test]
    fn test_version_match_is_byte_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let key = package_key();
        store.put_package(&key, &record("18.4.12")).unwrap();

        // Semantically equal but not byte-identical: rescan.
        assert!(!evaluate_package(&store, &key, "18.04.12", false).skip);
        assert!(!evaluate_package(&store, &key, "v18.4.12", false).skip);
    }

    #[test]
    fn test_rescan_when_record_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let path = dir
            .path()
            .join("package/community/chef/stable/ubuntu/22.04/x86_64");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("metadata.json"), "garbage").unwrap();

        assert!(!evaluate_package(&store, &package_key(), "18.4.12", false).skip);
    }

    #[test]
    fn test_full_scan_bypasses_matching_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let key = package_key();
        store.put_package(&key, &record("18.4.12")).unwrap();

        let decision = evaluate_package(&store, &key, "18.4.12", true);
        assert!(!decision.skip);
        assert!(decision.reason.contains("bypassed"));
    }

    #[test]
    fn test_dependency_skip_on_exact_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let key = SnapshotKey::Dependency {
            origin: "core".into(),
            name: "glibc".into(),
        };
        store
            .put_dependency(
                &key,
                &DependencySnapshot {
                    ident: "core/glibc/2.35/20230724152139".into(),
                    scanned_at: Utc::now(),
                    severity_counts: SeverityCounts::default(),
                    installed_size_bytes: 0,
                },
            )
            .unwrap();

        assert!(evaluate_dependency(&store, &key, "core/glibc/2.35/20230724152139", false).skip);
        assert!(!evaluate_dependency(&store, &key, "core/glibc/2.36/20240101000000", false).skip);
        assert!(!evaluate_dependency(&store, &key, "core/glibc/2.35/20230724152139", true).skip);
    }
}
