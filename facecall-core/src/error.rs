//! Error types shared by the facecall crates

/// Result type alias using the facecall [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted before the peer connection was created
    #[error("peer connection not initialized")]
    NotInitialized,

    /// Peer connection created twice without teardown
    #[error("peer connection already initialized")]
    AlreadyInitialized,

    /// The negotiation primitive produced no description
    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The session was torn down while the operation was suspended
    #[error("operation cancelled by teardown")]
    Cancelled,

    /// Failure reported by the media transport
    #[error("transport error: {0}")]
    Transport(String),

    /// Signaling store failure
    #[error("signaling error: {0}")]
    Signaling(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether restarting the whole negotiation sequence may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::NegotiationFailed(_) | Error::Transport(_) | Error::Signaling(_)
        )
    }

    /// Programming errors: surfaced, never retried.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::NotInitialized | Error::AlreadyInitialized)
    }
}
