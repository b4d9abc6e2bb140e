//! Error taxonomy for trust decisions, storage and connections.

use std::io;
use std::path::PathBuf;

/// Errors surfaced by the trust subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// Trust query or secure connection attempted before bootstrap completed.
    #[error("certificate store not yet initialized")]
    NotInitialized,

    #[error("trust store unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("trust store at {} is corrupt: {reason}", path.display())]
    StorageCorrupt { path: PathBuf, reason: String },

    /// Neither the platform anchors nor the local store accept the chain.
    #[error("certificate chain not trusted")]
    ChainNotTrusted,

    #[error("malformed certificate: {0}")]
    CertificateParse(String),

    #[error("security configuration error: {0}")]
    Security(String),

    /// Waiting for initialization was interrupted; the caller must retry.
    #[error("interrupted while waiting for initialization")]
    Interrupted,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("connect timed out")]
    Timeout,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TrustError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TrustError::StorageCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TrustError::StorageUnavailable {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = TrustError> = std::result::Result<T, E>;
