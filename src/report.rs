//! Pipeline output files.
//!
//! Downstream CI stages read these by fixed name from the output
//! directory: small marker files for shell logic, pretty-printed JSON
//! records for everything structured.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::scan::{CveDiff, ScanReport, SeverityCounts};
use crate::store::PackageSnapshot;

pub const RESOLVED_VERSION_FILE: &str = "_resolved_version.txt";
pub const REDACTED_URL_FILE: &str = "_download_url_redacted.txt";
pub const SKIPPED_FILE: &str = "_skipped.txt";
pub const METADATA_FILE: &str = "metadata.json";
pub const LATEST_FINDINGS_FILE: &str = "latest.json";
pub const DEPENDENCY_INDEX_FILE: &str = "dependency_index.json";
pub const SCANNER_DIFF_FILE: &str = "scanner_diff.json";

/// One scanned dependency's results in the dependency-tree index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyIndexEntry {
    pub ident: String,
    pub severity_counts: SeverityCounts,
    pub installed_size_bytes: u64,
}

/// Index record enumerating every scanned dependency plus aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyIndex {
    pub package: String,
    pub dependencies: Vec<DependencyIndexEntry>,
    pub totals: SeverityCounts,
    pub total_installed_size_bytes: u64,
}

impl DependencyIndex {
    /// Fold per-dependency results into the aggregate totals.
    pub fn build(package: String, dependencies: Vec<DependencyIndexEntry>) -> Self {
        let mut totals = SeverityCounts::default();
        let mut total_installed_size_bytes = 0u64;
        for entry in &dependencies {
            totals.merge(&entry.severity_counts);
            total_installed_size_bytes += entry.installed_size_bytes;
        }
        Self {
            package,
            dependencies,
            totals,
            total_installed_size_bytes,
        }
    }
}

pub fn write_resolved_version(dir: &Path, version: &str) -> anyhow::Result<()> {
    write_text(dir, RESOLVED_VERSION_FILE, version)
}

pub fn write_redacted_url(dir: &Path, redacted_url: &str) -> anyhow::Result<()> {
    write_text(dir, REDACTED_URL_FILE, redacted_url)
}

pub fn write_skip_marker(dir: &Path, skipped: bool) -> anyhow::Result<()> {
    write_text(dir, SKIPPED_FILE, if skipped { "true" } else { "false" })
}

pub fn write_metadata(dir: &Path, record: &PackageSnapshot) -> anyhow::Result<()> {
    write_json(dir, METADATA_FILE, record)
}

/// Write the scanner's full findings document, pretty-printed, for
/// downstream tooling that diffs or audits individual matches.
pub fn write_scanner_findings(dir: &Path, report: &ScanReport) -> anyhow::Result<()> {
    let document: serde_json::Value = serde_json::from_str(&report.raw_json)
        .with_context(|| format!("re-parsing the {} findings document", report.scanner))?;
    write_json(dir, LATEST_FINDINGS_FILE, &document)
}

pub fn write_dependency_index(dir: &Path, index: &DependencyIndex) -> anyhow::Result<()> {
    write_json(dir, DEPENDENCY_INDEX_FILE, index)
}

pub fn write_cve_diff(dir: &Path, diff: &CveDiff) -> anyhow::Result<()> {
    write_json(dir, SCANNER_DIFF_FILE, diff)
}

fn write_text(dir: &Path, name: &str, contents: &str) -> anyhow::Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, format!("{contents}\n"))
        .with_context(|| format!("writing {}", path.display()))
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> anyhow::Result<()> {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("encoding {}", path.display()))?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::SeverityBucket;

    #[test]
    fn test_marker_files() {
        let dir = tempfile::tempdir().unwrap();
        write_resolved_version(dir.path(), "18.4.12").unwrap();
        write_skip_marker(dir.path(), true).unwrap();
        write_redacted_url(dir.path(), "https://x.test/a?license_id=REDACTED").unwrap();

        let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read(RESOLVED_VERSION_FILE), "18.4.12\n");
        assert_eq!(read(SKIPPED_FILE), "true\n");
        assert_eq!(read(REDACTED_URL_FILE), "https://x.test/a?license_id=REDACTED\n");
    }

    #[test]
    fn test_skip_marker_false() {
        let dir = tempfile::tempdir().unwrap();
        write_skip_marker(dir.path(), false).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join(SKIPPED_FILE)).unwrap(),
            "false\n"
        );
    }

    #[test]
    fn test_scanner_findings_written_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let report = ScanReport {
            scanner: "grype".into(),
            counts: SeverityCounts::default(),
            cve_ids: std::collections::BTreeSet::new(),
            raw_json: r#"{"matches":[{"vulnerability":{"id":"CVE-2023-0001","severity":"High"}}]}"#
                .into(),
        };
        write_scanner_findings(dir.path(), &report).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(LATEST_FINDINGS_FILE)).unwrap();
        assert!(raw.lines().count() > 1, "expected pretty-printed output");
        let loaded: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(loaded["matches"][0]["vulnerability"]["id"], "CVE-2023-0001");
    }

    #[test]
    fn test_scanner_findings_reject_non_json() {
        let dir = tempfile::tempdir().unwrap();
        let report = ScanReport {
            scanner: "grype".into(),
            counts: SeverityCounts::default(),
            cve_ids: std::collections::BTreeSet::new(),
            raw_json: "panic: something went wrong".into(),
        };
        assert!(write_scanner_findings(dir.path(), &report).is_err());
    }

    #[test]
    fn test_dependency_index_aggregates() {
        let mut counts_a = SeverityCounts::default();
        counts_a.add(SeverityBucket::Critical);
        counts_a.add(SeverityBucket::Low);
        let mut counts_b = SeverityCounts::default();
        counts_b.add(SeverityBucket::Critical);

        let index = DependencyIndex::build(
            "core/glibc/2.35/20230724152139".into(),
            vec![
                DependencyIndexEntry {
                    ident: "core/glibc/2.35/20230724152139".into(),
                    severity_counts: counts_a,
                    installed_size_bytes: 1000,
                },
                DependencyIndexEntry {
                    ident: "core/linux-headers/5.15/20230724150000".into(),
                    severity_counts: counts_b,
                    installed_size_bytes: 500,
                },
            ],
        );

        assert_eq!(index.totals.critical, 2);
        assert_eq!(index.totals.low, 1);
        assert_eq!(index.totals.total(), 3);
        assert_eq!(index.total_installed_size_bytes, 1500);
    }

    #[test]
    fn test_dependency_index_round_trips_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let index = DependencyIndex::build("core/glibc/2.35/1".into(), Vec::new());
        write_dependency_index(dir.path(), &index).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(DEPENDENCY_INDEX_FILE)).unwrap();
        let loaded: DependencyIndex = serde_json::from_str(&raw).unwrap();
        assert_eq!(loaded.package, "core/glibc/2.35/1");
        assert!(loaded.dependencies.is_empty());
    }
}
