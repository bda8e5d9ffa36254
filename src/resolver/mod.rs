//! Version resolution against the distribution sites' lookup APIs.
//!
//! A pinned version short-circuits everything. Otherwise the resolver asks
//! the site's `versions/latest` endpoint, with one twist for the `stable`
//! channel: the chosen stable release is pinned to the same major version
//! as the latest `current`-channel release, so the scan tracks the product
//! line actually shipping. That matching is best-effort; any failure inside
//! it logs a reason and falls back to the plain lookup.

pub mod error;

use serde_json::Value;

pub use error::ResolveError;

use crate::types::DownloadSite;
use crate::version;

/// Channel whose latest release supplies the reference major version.
const REFERENCE_CHANNEL: &str = "current";
/// Channel that gets major-version matching applied.
const STABILITY_CHANNEL: &str = "stable";

/// Accepted response-field names for a version envelope, in precedence order.
const VERSION_FIELDS: &[&str] = &["version", "latest", "artifact_version", "value"];

const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug)]
pub struct Resolver {
    client: reqwest::Client,
    base_url: String,
    site: DownloadSite,
    license_id: Option<String>,
}

impl Resolver {
    pub fn new(site: DownloadSite, license_id: Option<String>) -> anyhow::Result<Self> {
        Ok(Self::with_base_url(
            site,
            license_id,
            site.base_url().to_string(),
        )?)
    }

    /// Construct against an explicit base URL; tests point this at a mock
    /// server.
    pub fn with_base_url(
        site: DownloadSite,
        license_id: Option<String>,
        base_url: String,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vulnscan/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            site,
            license_id,
        })
    }

    /// Resolve a concrete version for `(product, channel)`.
    pub async fn resolve(
        &self,
        product: &str,
        channel: &str,
        pinned: Option<&str>,
    ) -> Result<String, ResolveError> {
        if let Some(pinned) = pinned {
            tracing::info!(product, channel, version = pinned, "Using pinned version");
            return Ok(pinned.to_string());
        }

        if channel == STABILITY_CHANNEL {
            if let Some(matched) = self.stable_major_pinned(product).await {
                return Ok(matched);
            }
        }

        self.latest_version(channel, product).await
    }

    /// Latest version on a channel via the `versions/latest` endpoint.
    pub async fn latest_version(
        &self,
        channel: &str,
        product: &str,
    ) -> Result<String, ResolveError> {
        let url = self.endpoint(channel, product, "versions/latest");
        let body = self.get_text(&url).await?;
        let version = extract_version(&body);
        if version.is_empty() {
            return Err(ResolveError::EmptyResponse {
                url: crate::download::redact_url(&url),
            });
        }
        Ok(version)
    }

    /// Every version published on a channel via the `versions/all` endpoint.
    pub async fn all_versions(
        &self,
        channel: &str,
        product: &str,
    ) -> Result<Vec<String>, ResolveError> {
        let url = self.endpoint(channel, product, "versions/all");
        let body = self.get_text(&url).await?;
        let values: Vec<Value> =
            serde_json::from_str(&body).map_err(|e| ResolveError::Malformed {
                url: crate::download::redact_url(&url),
                detail: format!("expected a JSON array of versions: {e}"),
            })?;
        Ok(values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect())
    }

    /// Artifact metadata lookup: returns the download URL for a concrete
    /// `(version, os, os_version, arch)` coordinate.
    pub async fn artifact_url(
        &self,
        channel: &str,
        product: &str,
        version: &str,
        os: &str,
        os_version: &str,
        arch: &str,
    ) -> Result<String, ResolveError> {
        let mut url = format!(
            "{}/{}/{}/metadata?v={}&p={}&pv={}&m={}",
            self.base_url, channel, product, version, os, os_version, arch
        );
        if let Some(license) = &self.license_id {
            url.push_str(&format!("&license_id={license}"));
        }

        let body = self.get_text(&url).await?;

        // JSON envelope first, then the legacy "key value" plain-text shape.
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&body) {
            if let Some(found) = map.get("url").and_then(Value::as_str) {
                return Ok(found.to_string());
            }
        }
        for line in body.lines() {
            let mut parts = line.split_whitespace();
            if parts.next() == Some("url") {
                if let Some(found) = parts.next() {
                    return Ok(found.to_string());
                }
            }
        }

        Err(ResolveError::Malformed {
            url: crate::download::redact_url(&url),
            detail: "no download url in metadata response".to_string(),
        })
    }

    /// Pin the stable release to the major version of the latest
    /// `current`-channel release. Returns `None` on any failure; this
    /// feature degrades, it never breaks a scan.
    async fn stable_major_pinned(&self, product: &str) -> Option<String> {
        let reference = match self.latest_version(REFERENCE_CHANNEL, product).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    product,
                    "Major-version matching disabled, reference channel lookup failed: {e}"
                );
                return None;
            }
        };

        let major = match version::parse(&reference) {
            Some(tuple) => tuple.major,
            None => {
                tracing::warn!(
                    product,
                    reference,
                    "Major-version matching disabled, reference version is unparseable"
                );
                return None;
            }
        };

        let all = match self.all_versions(STABILITY_CHANNEL, product).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    product,
                    "Major-version matching disabled, stable version list unavailable: {e}"
                );
                return None;
            }
        };

        match version::best_match(&all, major) {
            Some(matched) => {
                tracing::info!(
                    product,
                    reference,
                    matched,
                    "Pinned stable scan to reference major version {major}"
                );
                Some(matched.to_string())
            }
            None => {
                tracing::warn!(
                    product,
                    major,
                    "Major-version matching found no stable release for the reference major, \
                     falling back to latest"
                );
                None
            }
        }
    }

    fn endpoint(&self, channel: &str, product: &str, leaf: &str) -> String {
        let mut url = format!("{}/{}/{}/{}", self.base_url, channel, product, leaf);
        if let Some(license) = &self.license_id {
            url.push_str(&format!("?license_id={license}"));
        }
        url
    }

    async fn get_text(&self, url: &str) -> Result<String, ResolveError> {
        let redacted = crate::download::redact_url(url);
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| ResolveError::Http {
                    url: redacted.clone(),
                    source,
                })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ResolveError::Http {
                url: redacted.clone(),
                source,
            })?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ResolveError::Auth {
                site: self.site.as_str().to_string(),
                status: status.as_u16(),
                detail: truncate(&body, 200),
            });
        }
        if status.is_client_error() && body.to_ascii_lowercase().contains("license") {
            // License-rejection bodies show up under assorted 4xx codes.
            return Err(ResolveError::Auth {
                site: self.site.as_str().to_string(),
                status: status.as_u16(),
                detail: truncate(&body, 200),
            });
        }
        if !status.is_success() {
            return Err(ResolveError::Status {
                status: status.as_u16(),
                url: redacted,
                body: truncate(&body, 200),
            });
        }
        Ok(body)
    }
}

/// Pull a version string out of a lookup response: a JSON object consulted
/// field-by-field in precedence order, a JSON string, or the raw body with
/// wrapping quotes and whitespace stripped.
fn extract_version(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            for field in VERSION_FIELDS {
                match map.get(*field) {
                    Some(Value::String(s)) => return s.trim().to_string(),
                    Some(Value::Number(n)) => return n.to_string(),
                    _ => {}
                }
            }
            String::new()
        }
        Ok(Value::String(s)) => s.trim().to_string(),
        _ => body.trim().trim_matches('"').trim().to_string(),
    }
}

fn truncate(s: &str, limit: usize) -> String {
    let trimmed = s.trim();
    if trimmed.len() <= limit {
        trimmed.to_string()
    } else {
        let cut = trimmed
            .char_indices()
            .take_while(|(i, _)| *i < limit)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(limit);
        format!("{}...", &trimmed[..cut])
    }
}
