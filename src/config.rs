use std::path::PathBuf;

use anyhow::bail;

use crate::cli::Cli;
use crate::retry::RetryConfig;
use crate::types::{DownloadSite, PackageManager, ScanMode};

/// Validated application configuration, assembled from the CLI/environment.
#[derive(Debug)]
pub struct Config {
    pub product: String,
    pub channel: String,
    pub download_site: DownloadSite,
    pub os: String,
    pub os_version: String,
    pub arch: String,
    pub package_manager: PackageManager,
    /// `Some` when a pinned version bypasses network resolution.
    pub pinned_version: Option<String>,
    pub license_id: Option<String>,
    pub scan_mode: ScanMode,
    pub full_product_scan: bool,
    pub hab_ident: Option<String>,
    pub hab_channel: String,
    pub hab_auth_token: Option<String>,
    pub enable_trivy: bool,
    pub trivy_severities: Option<String>,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub retry: RetryConfig,
    pub download_timeout_secs: u64,
}

impl Config {
    /// Validate and convert CLI input. All configuration errors surface
    /// here, before any network activity.
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        if cli.download_site.requires_license() && cli.license_id.is_none() {
            bail!(
                "download_site={} requires a license id but none was provided. \
                 Set LICENSE_ID (or pass --license-id) with a valid license for the commercial download site.",
                cli.download_site.as_str()
            );
        }

        if cli.scan_mode == ScanMode::Habitat && cli.hab_ident.is_none() {
            bail!(
                "scan_mode=habitat requires a package identifier. \
                 Set HAB_IDENT to origin/name (e.g. core/glibc)."
            );
        }

        // Any resolve_version other than "latest" means the pipeline pinned
        // an exact version.
        let pinned_version = if cli.resolve_version == "latest" {
            None
        } else {
            match cli.pinned_version {
                Some(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
                _ => bail!(
                    "resolve_version={} requests a pinned scan but PINNED_VERSION is empty. \
                     Set PINNED_VERSION to the exact version to scan, or set RESOLVE_VERSION=latest.",
                    cli.resolve_version
                ),
            }
        };

        if cli.max_retries == 0 {
            bail!("MAX_RETRIES must be at least 1 (it counts attempts, not extra tries)");
        }

        Ok(Self {
            product: cli.product,
            channel: cli.channel,
            download_site: cli.download_site,
            os: cli.os,
            os_version: cli.os_version,
            arch: cli.arch,
            package_manager: cli.package_manager,
            pinned_version,
            license_id: cli.license_id,
            scan_mode: cli.scan_mode,
            full_product_scan: cli.full_product_scan,
            hab_ident: cli.hab_ident,
            hab_channel: cli.hab_channel,
            hab_auth_token: cli.hab_auth_token,
            enable_trivy: cli.enable_trivy,
            trivy_severities: cli.trivy_severities,
            output_dir: PathBuf::from(cli.output_dir),
            work_dir: PathBuf::from(cli.work_dir),
            snapshot_dir: PathBuf::from(cli.snapshot_dir),
            retry: RetryConfig {
                max_retries: cli.max_retries,
                base_delay_secs: cli.retry_base_delay,
                max_delay_secs: cli.retry_max_delay,
            },
            download_timeout_secs: cli.download_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["vulnscan"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_commercial_without_license_fails_fast() {
        let cli = parse(&["--download-site", "commercial"]);
        let err = Config::from_cli(cli).unwrap_err();
        assert!(err.to_string().contains("LICENSE_ID"));
    }

    #[test]
    fn test_commercial_with_license_ok() {
        let cli = parse(&["--download-site", "commercial", "--license-id", "lic-123"]);
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.license_id.as_deref(), Some("lic-123"));
    }

    #[test]
    fn test_community_needs_no_license() {
        let cli = parse(&[]);
        assert!(Config::from_cli(cli).is_ok());
    }

    #[test]
    fn test_habitat_requires_ident() {
        let cli = parse(&["--scan-mode", "habitat"]);
        let err = Config::from_cli(cli).unwrap_err();
        assert!(err.to_string().contains("HAB_IDENT"));
    }

    #[test]
    fn test_latest_means_no_pin() {
        let cli = parse(&[]);
        let config = Config::from_cli(cli).unwrap();
        assert!(config.pinned_version.is_none());
    }

    #[test]
    fn test_pinned_resolution() {
        let cli = parse(&["--resolve-version", "pinned", "--pinned-version", "16.1.0"]);
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.pinned_version.as_deref(), Some("16.1.0"));
    }

    #[test]
    fn test_pinned_resolution_without_version_fails() {
        let cli = parse(&["--resolve-version", "pinned"]);
        let err = Config::from_cli(cli).unwrap_err();
        assert!(err.to_string().contains("PINNED_VERSION"));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let cli = parse(&["--max-retries", "0"]);
        assert!(Config::from_cli(cli).is_err());
    }
}
