//! Vulnerability scanner invocation and result shaping.
//!
//! Both scanners run as external tools against an extracted directory tree
//! and emit JSON; only the severity label and vulnerability id of each
//! finding matter here. Database provenance lookups are best-effort and
//! never fail a scan.

pub mod types;

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub use types::{CveDiff, ScanReport, ScannerProvenance, SeverityBucket, SeverityCounts};

use crate::command::{self, CommandError};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scanner failed: {0}")]
    Command(#[from] CommandError),

    #[error("could not parse {scanner} output: {source}")]
    Parse {
        scanner: String,
        #[source]
        source: serde_json::Error,
    },
}

// --- grype ---

#[derive(Debug, Deserialize)]
struct GrypeDocument {
    #[serde(default)]
    matches: Vec<GrypeMatch>,
}

#[derive(Debug, Deserialize)]
struct GrypeMatch {
    vulnerability: GrypeVulnerability,
}

#[derive(Debug, Deserialize)]
struct GrypeVulnerability {
    id: String,
    #[serde(default)]
    severity: String,
}

/// Run grype against an extracted directory.
pub async fn run_grype(path: &Path) -> Result<ScanReport, ScanError> {
    let target = format!("dir:{}", path.display());
    let output = command::run_checked("grype", &[&target, "-o", "json", "--quiet"], &[]).await?;
    parse_grype_report(&output.stdout)
}

fn parse_grype_report(json: &str) -> Result<ScanReport, ScanError> {
    let doc: GrypeDocument = serde_json::from_str(json).map_err(|source| ScanError::Parse {
        scanner: "grype".to_string(),
        source,
    })?;

    let mut counts = SeverityCounts::default();
    let mut cve_ids = std::collections::BTreeSet::new();
    for m in &doc.matches {
        counts.add(SeverityBucket::from_label(&m.vulnerability.severity));
        cve_ids.insert(m.vulnerability.id.clone());
    }

    Ok(ScanReport {
        scanner: "grype".to_string(),
        counts,
        cve_ids,
        raw_json: json.to_string(),
    })
}

/// Grype database provenance via `grype db status`. Any failure is logged
/// and reported as unknown; provenance is context, not a gate.
pub async fn grype_db_provenance() -> ScannerProvenance {
    let mut provenance = ScannerProvenance {
        scanner: "grype".to_string(),
        ..Default::default()
    };

    match command::run("grype", &["version", "-o", "json"], &[]).await {
        Ok(out) if out.success() => {
            #[derive(Deserialize)]
            struct VersionDoc {
                version: Option<String>,
            }
            match serde_json::from_str::<VersionDoc>(&out.stdout) {
                Ok(doc) => provenance.scanner_version = doc.version,
                Err(e) => tracing::warn!("could not parse grype version output: {e}"),
            }
        }
        Ok(out) => {
            tracing::warn!("grype version lookup failed: {}", out.stderr.trim());
        }
        Err(e) => {
            tracing::warn!("grype version lookup failed: {e}");
        }
    }

    match command::run("grype", &["db", "status", "-o", "json"], &[]).await {
        Ok(out) if out.success() => {
            #[derive(Deserialize)]
            struct DbStatus {
                #[serde(default, alias = "builtAt")]
                built: Option<String>,
                #[serde(default, alias = "schemaVersion")]
                schema_version: Option<serde_json::Value>,
            }
            match serde_json::from_str::<DbStatus>(&out.stdout) {
                Ok(status) => {
                    provenance.db_built_at = status.built;
                    provenance.db_schema_version =
                        status.schema_version.map(|v| v.to_string().trim_matches('"').to_string());
                }
                Err(e) => tracing::warn!("could not parse grype db status: {e}"),
            }
        }
        Ok(out) => {
            tracing::warn!("grype db status failed: {}", out.stderr.trim());
        }
        Err(e) => {
            tracing::warn!("grype db status failed: {e}");
        }
    }

    provenance
}

// --- trivy ---

#[derive(Debug, Deserialize)]
struct TrivyDocument {
    #[serde(default, rename = "Results")]
    results: Vec<TrivyResult>,
}

#[derive(Debug, Deserialize)]
struct TrivyResult {
    #[serde(default, rename = "Vulnerabilities")]
    vulnerabilities: Vec<TrivyVulnerability>,
}

#[derive(Debug, Deserialize)]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID")]
    vulnerability_id: String,
    #[serde(default, rename = "Severity")]
    severity: String,
}

/// Run trivy's filesystem scanner against an extracted directory.
/// `severities` is forwarded as trivy's own severity filter when set.
pub async fn run_trivy(path: &Path, severities: Option<&str>) -> Result<ScanReport, ScanError> {
    let target = path.to_string_lossy().into_owned();
    let mut args: Vec<&str> = vec!["fs", "--format", "json", "--quiet"];
    if let Some(severities) = severities {
        args.push("--severity");
        args.push(severities);
    }
    args.push(&target);
    let output = command::run_checked("trivy", &args, &[]).await?;
    parse_trivy_report(&output.stdout)
}

fn parse_trivy_report(json: &str) -> Result<ScanReport, ScanError> {
    let doc: TrivyDocument = serde_json::from_str(json).map_err(|source| ScanError::Parse {
        scanner: "trivy".to_string(),
        source,
    })?;

    let mut counts = SeverityCounts::default();
    let mut cve_ids = std::collections::BTreeSet::new();
    for result in &doc.results {
        for v in &result.vulnerabilities {
            counts.add(SeverityBucket::from_label(&v.severity));
            cve_ids.insert(v.vulnerability_id.clone());
        }
    }

    Ok(ScanReport {
        scanner: "trivy".to_string(),
        counts,
        cve_ids,
        raw_json: json.to_string(),
    })
}
