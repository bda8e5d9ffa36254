use thiserror::Error;

/// Version-resolution errors, classified at the point of origin so callers
/// never re-derive meaning from formatted message text.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// 401/403 or a license-rejection body. Never retried: retrying an
    /// auth failure cannot succeed. The message names the credential and
    /// site so the pipeline operator knows what to fix.
    #[error(
        "the {site} download site rejected the request (HTTP {status}): {detail}. \
         Check that the license/credential configured for {site} (LICENSE_ID) is valid and not expired"
    )]
    Auth {
        site: String,
        status: u16,
        detail: String,
    },

    #[error("version lookup returned HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("version lookup request failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("version lookup for {url} returned an empty response")]
    EmptyResponse { url: String },

    #[error("unexpected response shape from {url}: {detail}")]
    Malformed { url: String, detail: String },
}

impl ResolveError {
    /// Auth failures are terminal; everything else may be transient.
    pub fn is_auth(&self) -> bool {
        matches!(self, ResolveError::Auth { .. })
    }
}
