//! Error types for image store operations

use thiserror::Error;

/// Result type for image store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during image store operations.
///
/// Every variant carries the description reported by the underlying store so
/// callers can surface it unchanged. The type is `Clone` because a single
/// initialization outcome is shared between every caller awaiting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The database failed to open (upgrade failure, version conflict, permission denial)
    #[error("failed to open database: {0}")]
    StoreOpen(String),

    /// The binary source could not be converted to (or from) its stored encoding
    #[error("failed to read image data: {0}")]
    Decode(String),

    /// An add request or its transaction failed
    #[error("failed to save image: {0}")]
    Write(String),

    /// A read request failed
    #[error("failed to retrieve images: {0}")]
    Read(String),

    /// A delete request or its transaction failed
    #[error("failed to delete image: {0}")]
    Delete(String),

    /// No usable database handle (initialize not awaited, failed, or closed)
    #[error("database handle is null: call initialize() and await it first")]
    NotInitialized,

    /// Store configuration was rejected
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// The environment does not provide the embedded store
    #[error("storage not available: {0}")]
    NotAvailable(String),
}

impl StoreError {
    /// Stable name of the error kind, used as the JS error name at the browser boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::StoreOpen(_) => "StoreOpenError",
            StoreError::Decode(_) => "DecodeError",
            StoreError::Write(_) => "WriteError",
            StoreError::Read(_) => "ReadError",
            StoreError::Delete(_) => "DeleteError",
            StoreError::NotInitialized => "NotInitializedError",
            StoreError::InvalidConfig(_) => "InvalidConfigError",
            StoreError::NotAvailable(_) => "NotAvailableError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_description() {
        let err = StoreError::Write("ConstraintError: Key already exists".into());
        assert_eq!(
            err.to_string(),
            "failed to save image: ConstraintError: Key already exists"
        );
        assert_eq!(err.kind(), "WriteError");
    }

    #[test]
    fn test_not_initialized_kind() {
        assert_eq!(StoreError::NotInitialized.kind(), "NotInitializedError");
    }
}
