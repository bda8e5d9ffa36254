use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed severity labels findings are bucketed into, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityBucket {
    Critical,
    High,
    Medium,
    Low,
    Negligible,
    Unknown,
}

impl SeverityBucket {
    /// Map a scanner's severity label onto a bucket, case-insensitively.
    /// Anything unrecognized (including empty) is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" | "moderate" => Self::Medium,
            "low" => Self::Low,
            "negligible" | "minimal" => Self::Negligible,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for SeverityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Negligible => "Negligible",
            Self::Unknown => "Unknown",
        };
        write!(f, "{label}")
    }
}

/// Per-bucket match counts for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    #[serde(rename = "Critical")]
    pub critical: u64,
    #[serde(rename = "High")]
    pub high: u64,
    #[serde(rename = "Medium")]
    pub medium: u64,
    #[serde(rename = "Low")]
    pub low: u64,
    #[serde(rename = "Negligible")]
    pub negligible: u64,
    #[serde(rename = "Unknown")]
    pub unknown: u64,
}

impl SeverityCounts {
    pub fn add(&mut self, bucket: SeverityBucket) {
        match bucket {
            SeverityBucket::Critical => self.critical += 1,
            SeverityBucket::High => self.high += 1,
            SeverityBucket::Medium => self.medium += 1,
            SeverityBucket::Low => self.low += 1,
            SeverityBucket::Negligible => self.negligible += 1,
            SeverityBucket::Unknown => self.unknown += 1,
        }
    }

    /// Fold another scan's counts into this accumulator.
    pub fn merge(&mut self, other: &SeverityCounts) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.negligible += other.negligible;
        self.unknown += other.unknown;
    }

    pub fn total(&self) -> u64 {
        self.critical + self.high + self.medium + self.low + self.negligible + self.unknown
    }
}

/// Scanner identity and database provenance recorded with every scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerProvenance {
    pub scanner: String,
    pub scanner_version: Option<String>,
    pub db_built_at: Option<String>,
    pub db_schema_version: Option<String>,
}

/// Outcome of running one scanner against one directory tree.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scanner: String,
    pub counts: SeverityCounts,
    pub cve_ids: BTreeSet<String>,
    /// Verbatim findings document as emitted by the scanner; persisted for
    /// downstream consumers that need more than the aggregates.
    pub raw_json: String,
}

/// Set comparison between two scanners' CVE findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveDiff {
    pub scanner_a: String,
    pub scanner_b: String,
    pub count_a: usize,
    pub count_b: usize,
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
    pub in_both: Vec<String>,
}

impl CveDiff {
    pub fn compute(a: &ScanReport, b: &ScanReport) -> Self {
        let only_in_a: Vec<String> = a.cve_ids.difference(&b.cve_ids).cloned().collect();
        let only_in_b: Vec<String> = b.cve_ids.difference(&a.cve_ids).cloned().collect();
        let in_both: Vec<String> = a.cve_ids.intersection(&b.cve_ids).cloned().collect();
        Self {
            scanner_a: a.scanner.clone(),
            scanner_b: b.scanner.clone(),
            count_a: a.cve_ids.len(),
            count_b: b.cve_ids.len(),
            only_in_a,
            only_in_b,
            in_both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_from_label() {
        assert_eq!(SeverityBucket::from_label("Critical"), SeverityBucket::Critical);
        assert_eq!(SeverityBucket::from_label("HIGH"), SeverityBucket::High);
        assert_eq!(SeverityBucket::from_label("moderate"), SeverityBucket::Medium);
        assert_eq!(SeverityBucket::from_label("negligible"), SeverityBucket::Negligible);
        assert_eq!(SeverityBucket::from_label("Minimal"), SeverityBucket::Negligible);
        assert_eq!(SeverityBucket::from_label(""), SeverityBucket::Unknown);
        assert_eq!(SeverityBucket::from_label("whatever"), SeverityBucket::Unknown);
    }

    #[test]
    fn test_counts_add_and_total() {
        let mut counts = SeverityCounts::default();
        counts.add(SeverityBucket::Critical);
        counts.add(SeverityBucket::High);
        counts.add(SeverityBucket::High);
        counts.add(SeverityBucket::Unknown);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.unknown, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_counts_merge() {
        let mut a = SeverityCounts {
            critical: 1,
            low: 2,
            ..Default::default()
        };
        let b = SeverityCounts {
            critical: 3,
            medium: 1,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.critical, 4);
        assert_eq!(a.medium, 1);
        assert_eq!(a.low, 2);
        assert_eq!(a.total(), 7);
    }

    #[test]
    fn test_counts_serialize_with_bucket_names() {
        let counts = SeverityCounts {
            critical: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(&counts).unwrap();
        assert_eq!(json["Critical"], 2);
        assert_eq!(json["Negligible"], 0);
    }

    #[test]
    fn test_cve_diff() {
        let a = ScanReport {
            scanner: "grype".into(),
            counts: SeverityCounts::default(),
            cve_ids: ["CVE-1", "CVE-2", "CVE-3"].iter().map(|s| s.to_string()).collect(),
            raw_json: String::new(),
        };
        let b = ScanReport {
            scanner: "trivy".into(),
            counts: SeverityCounts::default(),
            cve_ids: ["CVE-2", "CVE-4"].iter().map(|s| s.to_string()).collect(),
            raw_json: String::new(),
        };
        let diff = CveDiff::compute(&a, &b);
        assert_eq!(diff.only_in_a, vec!["CVE-1", "CVE-3"]);
        assert_eq!(diff.only_in_b, vec!["CVE-4"]);
        assert_eq!(diff.in_both, vec!["CVE-2"]);
        assert_eq!(diff.count_a, 3);
        assert_eq!(diff.count_b, 2);
    }
}
