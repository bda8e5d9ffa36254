use clap::Parser;

use crate::types::{DownloadSite, PackageManager, ScanMode};

/// All options carry an `env` attribute because the invoking pipeline
/// configures this tool entirely through environment variables; flags
/// exist for local debugging.
#[derive(Parser, Debug)]
#[command(
    name = "vulnscan",
    about = "Download a vendor package, scan it for vulnerabilities, and persist the results"
)]
pub struct Cli {
    /// Product to resolve and scan (e.g. chef, inspec)
    #[arg(long, env = "PRODUCT", default_value = "chef")]
    pub product: String,

    /// Release channel to resolve from
    #[arg(long, env = "CHANNEL", default_value = "stable")]
    pub channel: String,

    /// Distribution site
    #[arg(long, env = "DOWNLOAD_SITE", value_enum, default_value = "community")]
    pub download_site: DownloadSite,

    /// Target OS name (e.g. ubuntu)
    #[arg(long, env = "TARGET_OS", default_value = "ubuntu")]
    pub os: String,

    /// Target OS version (e.g. 22.04)
    #[arg(long, env = "TARGET_OS_VERSION", default_value = "22.04")]
    pub os_version: String,

    /// Target architecture
    #[arg(long, env = "TARGET_ARCH", default_value = "x86_64")]
    pub arch: String,

    /// Package manager of the target platform
    #[arg(long, env = "PACKAGE_MANAGER", value_enum, default_value = "deb")]
    pub package_manager: PackageManager,

    /// "latest" resolves over the network; anything else means use
    /// --pinned-version
    #[arg(long, env = "RESOLVE_VERSION", default_value = "latest")]
    pub resolve_version: String,

    /// Exact version to scan, bypassing resolution
    #[arg(long, env = "PINNED_VERSION")]
    pub pinned_version: Option<String>,

    /// License id; required when --download-site commercial.
    /// WARNING: visible in process listings when passed as a flag.
    /// Prefer the LICENSE_ID environment variable.
    #[arg(long, env = "LICENSE_ID")]
    pub license_id: Option<String>,

    /// Scan flow selection
    #[arg(long, env = "SCAN_MODE", value_enum, default_value = "native")]
    pub scan_mode: ScanMode,

    /// Scan unconditionally, bypassing the already-scanned check
    #[arg(long, env = "FULL_PRODUCT_SCAN")]
    pub full_product_scan: bool,

    /// Habitat package identifier (origin/name[/version[/release]])
    #[arg(long, env = "HAB_IDENT")]
    pub hab_ident: Option<String>,

    /// Habitat channel to resolve from
    #[arg(long, env = "HAB_CHANNEL", default_value = "stable")]
    pub hab_channel: String,

    /// Habitat Builder auth token for private origins
    #[arg(long, env = "HAB_AUTH_TOKEN")]
    pub hab_auth_token: Option<String>,

    /// Also run trivy and write a scanner comparison record
    #[arg(long, env = "ENABLE_TRIVY")]
    pub enable_trivy: bool,

    /// Comma-separated severity filter forwarded to trivy
    /// (e.g. "CRITICAL,HIGH")
    #[arg(long, env = "TRIVY_SEVERITIES")]
    pub trivy_severities: Option<String>,

    /// Directory for pipeline output files and metadata records
    #[arg(long, env = "OUTPUT_DIR", default_value = "./scan-output")]
    pub output_dir: String,

    /// Scratch directory for the downloaded artifact and extracted tree;
    /// recreated on every non-skipped run
    #[arg(long, env = "WORK_DIR", default_value = "./scan-work")]
    pub work_dir: String,

    /// Root of the persisted snapshot-record store
    #[arg(long, env = "SNAPSHOT_DIR", default_value = "./scan-snapshots")]
    pub snapshot_dir: String,

    /// Attempts per download strategy / retried operation
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Base backoff delay in seconds
    #[arg(long, env = "RETRY_BASE_DELAY", default_value_t = 2)]
    pub retry_base_delay: u64,

    /// Backoff delay cap in seconds
    #[arg(long, env = "RETRY_MAX_DELAY", default_value_t = 30)]
    pub retry_max_delay: u64,

    /// Overall timeout for a single download attempt, in seconds
    #[arg(long, env = "DOWNLOAD_TIMEOUT", default_value_t = 900)]
    pub download_timeout: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["vulnscan"]);
        assert_eq!(cli.product, "chef");
        assert_eq!(cli.channel, "stable");
        assert_eq!(cli.download_site, DownloadSite::Community);
        assert_eq!(cli.scan_mode, ScanMode::Native);
        assert_eq!(cli.resolve_version, "latest");
        assert!(!cli.full_product_scan);
        assert!(!cli.enable_trivy);
        assert_eq!(cli.max_retries, 3);
    }

    #[test]
    fn test_site_and_mode_flags() {
        let cli = Cli::parse_from([
            "vulnscan",
            "--download-site",
            "commercial",
            "--scan-mode",
            "habitat",
            "--hab-ident",
            "core/glibc",
        ]);
        assert_eq!(cli.download_site, DownloadSite::Commercial);
        assert_eq!(cli.scan_mode, ScanMode::Habitat);
        assert_eq!(cli.hab_ident.as_deref(), Some("core/glibc"));
    }
}
