//! Error types for the I/O-bound edges of the pipeline.
//!
//! Only collaborators have a failure channel. Callers absorb these errors
//! (log, then fall back to empty data) before anything reaches rendering.

/// The reference payload could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("invalid reference payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reference unavailable: {0}")]
    Unavailable(String),
}

/// The thumbnail collaborator failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("thumbnail fetch failed: {0}")]
    Failed(String),
    #[error("invalid thumbnail payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
