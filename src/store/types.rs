use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scan::{ScannerProvenance, SeverityCounts};
use crate::types::{DownloadSite, PackageManager};

/// Coordinate a snapshot record is keyed by.
///
/// Package-style targets resolve to one record per platform coordinate;
/// dependency-style targets own a family of per-version records under
/// `(origin, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SnapshotKey {
    Package {
        product: String,
        channel: String,
        download_site: DownloadSite,
        os: String,
        os_version: String,
        arch: String,
    },
    Dependency {
        origin: String,
        name: String,
    },
}

impl SnapshotKey {
    /// Store-relative directory for this key.
    pub(crate) fn relative_dir(&self) -> PathBuf {
        match self {
            SnapshotKey::Package {
                product,
                channel,
                download_site,
                os,
                os_version,
                arch,
            } => ["package", download_site.as_str(), product, channel, os, os_version, arch]
                .iter()
                .collect(),
            SnapshotKey::Dependency { origin, name } => {
                ["dependency", origin.as_str(), name.as_str()].iter().collect()
            }
        }
    }

    /// Human-readable coordinate for log lines and skip reasons.
    pub fn describe(&self) -> String {
        match self {
            SnapshotKey::Package {
                product,
                channel,
                download_site,
                os,
                os_version,
                arch,
            } => format!(
                "{}/{}/{} on {} {} {}",
                download_site.as_str(),
                product,
                channel,
                os,
                os_version,
                arch
            ),
            SnapshotKey::Dependency { origin, name } => format!("{origin}/{name}"),
        }
    }
}

/// Target platform descriptor recorded with every package scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    pub os: String,
    pub os_version: String,
    pub arch: String,
    pub package_manager: PackageManager,
}

/// CI pipeline coordinates captured with a record so a snapshot can be
/// traced back to the run that produced it. All fields are best-effort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineProvenance {
    pub run_id: Option<String>,
    pub repository: Option<String>,
    pub workflow: Option<String>,
    pub git_sha: Option<String>,
}

impl PipelineProvenance {
    /// Read the standard CI environment variables; absent or empty ones
    /// stay `None`.
    pub fn capture() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            run_id: var("GITHUB_RUN_ID"),
            repository: var("GITHUB_REPOSITORY"),
            workflow: var("GITHUB_WORKFLOW"),
            git_sha: var("GITHUB_SHA"),
        }
    }
}

/// Persisted record of one completed package scan. Written at the end of a
/// successful run; read at the start of the next run for the same key.
/// Never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSnapshot {
    pub resolved_version: String,
    pub download_url_redacted: String,
    pub scanned_at: DateTime<Utc>,
    pub environment: EnvironmentDescriptor,
    pub scanner: ScannerProvenance,
    pub severity_counts: SeverityCounts,
    /// Missing in records written by older versions of this tool.
    #[serde(default)]
    pub pipeline: PipelineProvenance,
}

/// Persisted record of one scanned dependency version in dependency-tree
/// mode. `ident` is the full composite identity `origin/name/version/release`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySnapshot {
    pub ident: String,
    pub scanned_at: DateTime<Utc>,
    pub severity_counts: SeverityCounts,
    pub installed_size_bytes: u64,
}

impl DependencySnapshot {
    /// `version-release` subdirectory name, derived from the composite
    /// identity. `None` when the ident is not fully qualified.
    pub(crate) fn version_dir(&self) -> Option<String> {
        ident_version_dir(&self.ident)
    }
}

/// `version-release` directory component of a composite identity
/// `origin/name/version/release`.
pub(crate) fn ident_version_dir(ident: &str) -> Option<String> {
    let parts: Vec<&str> = ident.split('/').collect();
    match parts.as_slice() {
        [_origin, _name, ver, rel] => Some(format!("{ver}-{rel}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_key_dir_layout() {
        let key = SnapshotKey::Package {
            product: "chef".into(),
            channel: "stable".into(),
            download_site: DownloadSite::Community,
            os: "ubuntu".into(),
            os_version: "22.04".into(),
            arch: "x86_64".into(),
        };
        assert_eq!(
            key.relative_dir(),
            PathBuf::from("package/community/chef/stable/ubuntu/22.04/x86_64")
        );
    }

    #[test]
    fn test_dependency_key_dir_layout() {
        let key = SnapshotKey::Dependency {
            origin: "core".into(),
            name: "glibc".into(),
        };
        assert_eq!(key.relative_dir(), PathBuf::from("dependency/core/glibc"));
    }

    #[test]
    fn test_package_record_without_pipeline_block_still_loads() {
        let json = r#"{
            "resolved_version": "18.4.12",
            "download_url_redacted": "https://dl.example.com/chef.deb",
            "scanned_at": "2024-01-01T00:00:00Z",
            "environment": {"os":"ubuntu","os_version":"22.04","arch":"x86_64","package_manager":"deb"},
            "scanner": {"scanner":"grype","scanner_version":null,"db_built_at":null,"db_schema_version":null},
            "severity_counts": {"Critical":0,"High":0,"Medium":0,"Low":0,"Negligible":0,"Unknown":0}
        }"#;
        let record: PackageSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(record.resolved_version, "18.4.12");
        assert!(record.pipeline.run_id.is_none());
    }

    #[test]
    fn test_version_dir_from_qualified_ident() {
        let record = DependencySnapshot {
            ident: "core/glibc/2.35/20230724152139".into(),
            scanned_at: Utc::now(),
            severity_counts: SeverityCounts::default(),
            installed_size_bytes: 0,
        };
        assert_eq!(record.version_dir().as_deref(), Some("2.35-20230724152139"));
    }

    #[test]
    fn test_version_dir_rejects_unqualified_ident() {
        let record = DependencySnapshot {
            ident: "core/glibc".into(),
            scanned_at: Utc::now(),
            severity_counts: SeverityCounts::default(),
            installed_size_bytes: 0,
        };
        assert_eq!(record.version_dir(), None);
    }
}
