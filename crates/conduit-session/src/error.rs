/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] conduit_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] conduit_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The command is missing a field its action requires.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// `open` was called while the session is connecting or connected.
    #[error("session already active")]
    AlreadyActive,

    /// The operation needs a connected session.
    #[error("session not connected")]
    NotConnected,

    /// The connection was closed before the operation completed.
    #[error("operation cancelled: connection closed")]
    Cancelled,

    /// Connecting timed out.
    #[error("connect timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, SessionError>;
