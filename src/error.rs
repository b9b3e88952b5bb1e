use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SeqidError {
    #[error("invalid UniProt accession: {0}")]
    InvalidAccession(String),

    #[error("invalid identifier scheme: {0}")]
    InvalidScheme(String),

    #[error("empty identifier")]
    EmptyIdentifier,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigValue(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("cache entry {key} is corrupt: {message}")]
    CacheCorrupt { key: String, message: String },

    #[error("uniprot request failed: {0}")]
    Transport(String),

    #[error("uniprot returned status {status}: {message}")]
    TransportStatus { status: u16, message: String },

    #[error("uniprot returned an error page instead of {0}")]
    #[diagnostic(help("the service rejected the request; retry later or check the scheme codes"))]
    ServiceError(String),

    #[error("no metadata found for: {0}")]
    NotFound(String),
}

impl SeqidError {
    /// Whether repeating the same call may succeed. Cached chunks written
    /// before the failure stay valid for the retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SeqidError::Transport(_)
                | SeqidError::TransportStatus { .. }
                | SeqidError::ServiceError(_)
        )
    }
}
