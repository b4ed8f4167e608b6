use thiserror::Error;

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DomError>;

/// Errors that can occur while querying a page snapshot
#[derive(Error, Debug)]
pub enum DomError {
    /// A CSS selector string failed to compile
    #[error("Invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },
}

impl DomError {
    /// Create an invalid selector error
    pub fn invalid_selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.into(),
        }
    }
}
