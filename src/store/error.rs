//! Error types for the snapshot record store.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write snapshot record at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("dependency ident {0} is not fully qualified (need origin/name/version/release)")]
    UnqualifiedIdent(String),
}
