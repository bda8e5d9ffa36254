//! vulnscan — CI orchestrator for recurring package vulnerability scans.
//!
//! Resolves a concrete version for a product/channel/site coordinate,
//! consults a snapshot store to skip targets already scanned at that exact
//! version, downloads and extracts the artifact with retrying transport
//! fallback, runs vulnerability scanners over the tree, and persists
//! structured results for the pipeline and for the next run's skip check.

#![warn(clippy::all)]

mod classify;
mod cli;
mod command;
mod config;
mod download;
mod extract;
mod habitat;
mod report;
mod resolver;
pub mod retry;
mod scan;
mod skip;
mod store;
mod types;
mod version;

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;
use download::Downloader;
use report::{DependencyIndex, DependencyIndexEntry};
use resolver::Resolver;
use scan::CveDiff;
use store::{
    DependencySnapshot, EnvironmentDescriptor, FsSnapshotStore, PackageSnapshot,
    PipelineProvenance, SnapshotKey, SnapshotStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_cli(cli)?;
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating output directory {}", config.output_dir.display()))?;

    if config.scan_mode.is_dependency_tree() {
        run_dependency_scan(&config).await
    } else {
        run_package_scan(&config).await
    }
}

/// Package-archive flow: resolve, skip-check, download, extract, scan,
/// persist.
async fn run_package_scan(config: &Config) -> anyhow::Result<()> {
    let coordinate = format!(
        "{}/{} on {} ({} {} {})",
        config.product,
        config.channel,
        config.download_site.as_str(),
        config.os,
        config.os_version,
        config.arch
    );

    let resolver = Resolver::new(config.download_site, config.license_id.clone())?;
    let resolved = resolver
        .resolve(
            &config.product,
            &config.channel,
            config.pinned_version.as_deref(),
        )
        .await
        .with_context(|| format!("resolving a version for {coordinate}"))?;
    tracing::info!(version = resolved, "Resolved {coordinate}");
    report::write_resolved_version(&config.output_dir, &resolved)?;

    let key = SnapshotKey::Package {
        product: config.product.clone(),
        channel: config.channel.clone(),
        download_site: config.download_site,
        os: config.os.clone(),
        os_version: config.os_version.clone(),
        arch: config.arch.clone(),
    };
    let store = FsSnapshotStore::new(&config.snapshot_dir);

    let decision = skip::evaluate_package(&store, &key, &resolved, config.full_product_scan);
    report::write_skip_marker(&config.output_dir, decision.skip)?;
    if decision.skip {
        tracing::info!("Skipping scan: {}", decision.reason);
        return Ok(());
    }
    tracing::info!("Scanning: {}", decision.reason);

    let url = resolver
        .artifact_url(
            &config.channel,
            &config.product,
            &resolved,
            &config.os,
            &config.os_version,
            &config.arch,
        )
        .await
        .with_context(|| format!("looking up the artifact for {coordinate}"))?;
    let redacted_url = download::redact_url(&url);
    report::write_redacted_url(&config.output_dir, &redacted_url)?;

    extract::prepare_workdir(&config.work_dir)?;
    let archive = config.work_dir.join(format!(
        "{}-{}.{}",
        config.product,
        resolved,
        config.package_manager.extension()
    ));
    let downloader = Downloader::new(config.retry.clone(), config.download_timeout_secs);
    downloader
        .fetch(&url, &redacted_url, &archive)
        .await
        .with_context(|| format!("downloading {coordinate} version {resolved}"))?;

    let extract_dir = config.work_dir.join("extracted");
    extract::extract(&archive, &extract_dir, config.package_manager)
        .await
        .with_context(|| format!("extracting the artifact for {coordinate}"))?;

    let provenance = scan::grype_db_provenance().await;
    let grype = scan::run_grype(&extract_dir)
        .await
        .with_context(|| format!("scanning {coordinate} version {resolved}"))?;
    tracing::info!(
        total = grype.counts.total(),
        critical = grype.counts.critical,
        high = grype.counts.high,
        "grype scan finished"
    );
    report::write_scanner_findings(&config.output_dir, &grype)?;

    if config.enable_trivy {
        match scan::run_trivy(&extract_dir, config.trivy_severities.as_deref()).await {
            Ok(trivy) => {
                let diff = CveDiff::compute(&grype, &trivy);
                tracing::info!(
                    in_both = diff.in_both.len(),
                    only_grype = diff.only_in_a.len(),
                    only_trivy = diff.only_in_b.len(),
                    "Scanner comparison finished"
                );
                report::write_cve_diff(&config.output_dir, &diff)?;
            }
            Err(e) => {
                tracing::warn!("trivy scan failed, scanner comparison skipped: {e}");
            }
        }
    }

    let record = PackageSnapshot {
        resolved_version: resolved.clone(),
        download_url_redacted: redacted_url,
        scanned_at: Utc::now(),
        environment: EnvironmentDescriptor {
            os: config.os.clone(),
            os_version: config.os_version.clone(),
            arch: config.arch.clone(),
            package_manager: config.package_manager,
        },
        scanner: provenance,
        severity_counts: grype.counts.clone(),
        pipeline: PipelineProvenance::capture(),
    };
    report::write_metadata(&config.output_dir, &record)?;
    store.put_package(&key, &record)?;

    tracing::info!(version = resolved, "Scan complete for {coordinate}");
    Ok(())
}

/// Dependency-tree flow: resolve the fully-qualified identity and its
/// transitive deps, then scan each install path separately. One failing
/// dependency is excluded; its siblings continue.
async fn run_dependency_scan(config: &Config) -> anyhow::Result<()> {
    let ident_input = config
        .hab_ident
        .as_deref()
        .context("habitat mode requires a package identifier")?;
    let (origin, name) = habitat::parse_ident(ident_input)?;

    let depot = habitat::DepotClient::new(config.hab_auth_token.clone())?;
    let resolved = depot
        .latest(&origin, &name, &config.hab_channel)
        .await
        .with_context(|| format!("resolving {origin}/{name} on channel {}", config.hab_channel))?;
    let composite = resolved.ident.composite();
    tracing::info!(ident = composite, "Resolved {origin}/{name}");
    report::write_resolved_version(&config.output_dir, &composite)?;

    let key = SnapshotKey::Dependency {
        origin: origin.clone(),
        name: name.clone(),
    };
    let store = FsSnapshotStore::new(&config.snapshot_dir);

    let decision = skip::evaluate_dependency(&store, &key, &composite, config.full_product_scan);
    report::write_skip_marker(&config.output_dir, decision.skip)?;
    if decision.skip {
        tracing::info!("Skipping scan: {}", decision.reason);
        return Ok(());
    }
    tracing::info!("Scanning: {}", decision.reason);

    habitat::ensure_installed(
        &composite,
        &config.hab_channel,
        config.hab_auth_token.as_deref(),
        &config.retry,
    )
    .await
    .with_context(|| format!("installing {composite}"))?;

    let pkg_root = Path::new(habitat::DEFAULT_PKG_ROOT);
    let scanned_at = Utc::now();
    let mut entries: Vec<DependencyIndexEntry> = Vec::new();

    for dep in std::iter::once(resolved.ident.clone()).chain(resolved.tdeps.iter().cloned()) {
        let dep_composite = dep.composite();
        let dep_key = SnapshotKey::Dependency {
            origin: dep.origin.clone(),
            name: dep.name.clone(),
        };

        if !config.full_product_scan {
            if let Some(prior) = store.get_dependency(&dep_key, &dep_composite) {
                tracing::debug!(ident = dep_composite, "Reusing prior dependency scan");
                entries.push(DependencyIndexEntry {
                    ident: prior.ident,
                    severity_counts: prior.severity_counts,
                    installed_size_bytes: prior.installed_size_bytes,
                });
                continue;
            }
        }

        let install_path = dep.install_path(pkg_root);
        if !install_path.exists() {
            tracing::warn!(
                ident = dep_composite,
                "Install path {} missing, dependency excluded from results",
                install_path.display()
            );
            continue;
        }

        match scan::run_grype(&install_path).await {
            Ok(scan_report) => {
                let record = DependencySnapshot {
                    ident: dep_composite.clone(),
                    scanned_at,
                    severity_counts: scan_report.counts,
                    installed_size_bytes: habitat::dir_size(&install_path),
                };
                if let Err(e) = store.put_dependency(&dep_key, &record) {
                    tracing::warn!(ident = dep_composite, "Could not persist dependency record: {e}");
                }
                entries.push(DependencyIndexEntry {
                    ident: record.ident,
                    severity_counts: record.severity_counts,
                    installed_size_bytes: record.installed_size_bytes,
                });
            }
            Err(e) => {
                tracing::warn!(
                    ident = dep_composite,
                    "Dependency scan failed, excluded from results: {e}"
                );
            }
        }
    }

    let index = DependencyIndex::build(composite.clone(), entries);
    tracing::info!(
        dependencies = index.dependencies.len(),
        total_findings = index.totals.total(),
        "Dependency-tree scan complete for {composite}"
    );
    report::write_dependency_index(&config.output_dir, &index)?;

    Ok(())
}
