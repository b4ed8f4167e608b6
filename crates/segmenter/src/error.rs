use thiserror::Error;

/// Result type for segmentation operations
pub type Result<T> = std::result::Result<T, SegmenterError>;

/// Errors that can occur while building or configuring a segmenter
#[derive(Error, Debug)]
pub enum SegmenterError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configured boilerplate pattern failed to compile
    #[error("Invalid boilerplate pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A configured selector failed to compile
    #[error(transparent)]
    Selector(#[from] outliner_dom::DomError),
}

impl SegmenterError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}
