use thiserror::Error;

/// Result type for labeling operations
pub type Result<T> = std::result::Result<T, LabelError>;

/// Errors the labeling backend can report
#[derive(Error, Debug)]
pub enum LabelError {
    /// The labeling capability is absent or denied
    #[error("labeling backend unavailable")]
    Unavailable,

    /// The capability exists but its model is still downloading
    #[error("labeling backend is downloading its model")]
    Downloading,

    /// Session creation failed
    #[error("failed to create labeling session: {0}")]
    SessionCreate(String),

    /// A single labeling invocation failed
    #[error("labeling call failed: {0}")]
    Invocation(String),
}

impl LabelError {
    /// Create a session creation error
    pub fn session_create(msg: impl Into<String>) -> Self {
        Self::SessionCreate(msg.into())
    }

    /// Create an invocation error
    pub fn invocation(msg: impl Into<String>) -> Self {
        Self::Invocation(msg.into())
    }
}
