use std::path::PathBuf;

use thiserror::Error;

/// Typed download errors. URLs carried here are already credential-redacted
/// by the caller; these messages end up in logs and pipeline output.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(
        "server rejected the download of {url}: {detail}. \
         Client errors are not retried; check the URL, version, and credentials"
    )]
    ClientError { url: String, detail: String },

    #[error(
        "downloaded artifact {path} from {url} is empty. \
         The upstream artifact may be truncated; the next scheduled run will re-fetch it"
    )]
    EmptyArtifact { path: PathBuf, url: String },

    #[error(
        "all download strategies exhausted for {url} (tried {strategies}); last error: {last_error}"
    )]
    AllStrategiesFailed {
        url: String,
        strategies: String,
        last_error: String,
    },

    #[error("could not start the download tool: {0}")]
    Spawn(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
