//! Error types for the snapshot pipeline.

/// Fatal errors that abort a snapshot.
#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    /// The URL is unparseable or uses a scheme other than http/https.
    #[error("Validation error: {0}")]
    Validation(String),

    /// robots.txt disallows the target path for our user agent.
    #[error("Blocked by robots.txt: {0}")]
    PolicyBlocked(String),

    /// Navigation timed out or the page answered with a non-2xx status.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The render context failed outside of navigation.
    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-request failure of the HTTP fetch primitive.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type SnapshotResult<T> = Result<T, SnapshotError>;
