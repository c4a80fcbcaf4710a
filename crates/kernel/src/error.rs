/// Errors surfaced by the engine API.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("not connected")]
    NotConnected,
    #[error("invalid config: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a pending `enter` did not resolve with a welcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connection(String),
    /// A newer `enter` call replaced this one before it completed.
    #[error("superseded by a newer enter request")]
    Superseded,
}

impl From<SessionError> for SyncError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Connection(reason) => Self::Connection(reason),
            other => Self::Connection(other.to_string()),
        }
    }
}
