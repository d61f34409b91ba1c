use crate::shortcode::ShortCode;
use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code was deleted: {0}")]
    Gone(String),
    /// The original URL is already stored; carries the code it is stored under.
    #[error("url already shortened as: {0}")]
    Conflict(ShortCode),
    #[error("could not allocate a unique code after {attempts} attempts")]
    GenerationExhausted { attempts: usize },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("snapshot serialization failed: {0}")]
    Serialization(String),
    #[error("storage io failed: {0}")]
    Io(String),
    #[error("storage operation cancelled")]
    Cancelled,
}

impl StorageError {
    /// Returns the existing short code when the error is a conflict.
    pub fn conflict_code(&self) -> Option<&ShortCode> {
        match self {
            StorageError::Conflict(code) => Some(code),
            _ => None,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::GenerationExhausted { .. }
                | StorageError::Unavailable(_)
                | StorageError::Timeout(_)
                | StorageError::Query(_)
                | StorageError::Io(_)
        )
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value.to_string())
    }
}
