//! Dependency-tree (Habitat) mode support.
//!
//! Resolves a package identifier to its fully-qualified identity and
//! transitive dependency set via the Builder depot API, and locates each
//! dependency's install path under `/hab/pkgs` for scanning.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::command::{self, CommandError, CommandOutput};
use crate::retry::RetryConfig;

pub const DEFAULT_DEPOT_URL: &str = "https://bldr.habitat.sh/v1";
pub const DEFAULT_PKG_ROOT: &str = "/hab/pkgs";

const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum HabitatError {
    #[error("package identifier {0} is malformed; expected origin/name[/version[/release]]")]
    MalformedIdent(String),

    #[error("depot request failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(
        "depot returned HTTP {status} for {url}: {body}. \
         For private origins, check that HAB_AUTH_TOKEN is set and valid"
    )]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("could not parse depot response from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fully-qualified package identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct PackageIdent {
    pub origin: String,
    pub name: String,
    pub version: String,
    pub release: String,
}

impl PackageIdent {
    /// Composite identity string `origin/name/version/release`.
    pub fn composite(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.origin, self.name, self.version, self.release
        )
    }

    /// Filesystem location of the installed package.
    pub fn install_path(&self, root: &Path) -> PathBuf {
        root.join(&self.origin)
            .join(&self.name)
            .join(&self.version)
            .join(&self.release)
    }
}

/// The resolved target plus its transitive dependency closure.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub ident: PackageIdent,
    pub tdeps: Vec<PackageIdent>,
}

/// Split a user-supplied identifier into `(origin, name)`, ignoring any
/// version/release segments.
pub fn parse_ident(input: &str) -> Result<(String, String), HabitatError> {
    let mut parts = input.trim().trim_matches('/').split('/');
    match (parts.next(), parts.next()) {
        (Some(origin), Some(name)) if !origin.is_empty() && !name.is_empty() => {
            Ok((origin.to_string(), name.to_string()))
        }
        _ => Err(HabitatError::MalformedIdent(input.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    ident: PackageIdent,
    #[serde(default)]
    tdeps: Vec<PackageIdent>,
}

#[derive(Debug)]
pub struct DepotClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl DepotClient {
    pub fn new(auth_token: Option<String>) -> Result<Self, reqwest::Error> {
        Self::with_base_url(auth_token, DEFAULT_DEPOT_URL.to_string())
    }

    pub fn with_base_url(
        auth_token: Option<String>,
        base_url: String,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vulnscan/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    /// Latest release of `origin/name` on a channel, with its transitive
    /// dependency closure.
    pub async fn latest(
        &self,
        origin: &str,
        name: &str,
        channel: &str,
    ) -> Result<ResolvedPackage, HabitatError> {
        let url = format!(
            "{}/depot/channels/{}/{}/pkgs/{}/latest",
            self.base_url, origin, channel, name
        );

        let mut request = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| HabitatError::Http {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| HabitatError::Http {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(HabitatError::Status {
                status: status.as_u16(),
                url,
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: LatestResponse =
            serde_json::from_str(&body).map_err(|source| HabitatError::Parse { url, source })?;
        Ok(ResolvedPackage {
            ident: parsed.ident,
            tdeps: parsed.tdeps,
        })
    }
}

/// Install a package (and its deps) via the `hab` CLI so the scan has
/// filesystem trees to walk. Transient Builder failures retry with backoff.
pub async fn ensure_installed(
    ident: &str,
    channel: &str,
    auth_token: Option<&str>,
    retry: &RetryConfig,
) -> Result<CommandOutput, CommandError> {
    let mut envs: Vec<(&str, &str)> = Vec::new();
    if let Some(token) = auth_token {
        envs.push(("HAB_AUTH_TOKEN", token));
    }
    command::run_with_retry(
        "hab",
        &["pkg", "install", "--channel", channel, ident],
        &envs,
        retry,
        CommandError::default_retry_action,
    )
    .await
}

/// Total size in bytes of a directory tree. Unreadable entries are skipped;
/// the footprint is informational.
pub fn dir_size(path: &Path) -> u64 {
    let mut total = 0u64;
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            total += dir_size(&entry.path());
        } else {
            total += metadata.len();
        }
    }
    total
}
