/// Errors that can occur in worker and channel operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] tmlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] tmlink_frame::FrameError),

    /// State record error.
    #[error("state error: {0}")]
    State(#[from] tmlink_state::StateError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),

    /// The client and handler were lost to a panicked or unspawned thread.
    #[error("worker {0} has no client to run")]
    Unavailable(String),
}

/// Result alias for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
