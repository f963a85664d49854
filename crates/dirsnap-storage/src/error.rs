//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing a payload file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload envelope could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid payload name
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A stored entry does not belong to the name it was looked up by
    #[error("Corrupted entry for {name}: {message}")]
    Corrupted { name: String, message: String },

    /// The in-memory map lock was poisoned.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StorageError {
    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey(message.into())
    }

    /// Create a corrupted entry error.
    pub fn corrupted(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_invalid_key_formats_message() {
        let err = StorageError::invalid_key("Name cannot be empty");
        assert_eq!(err.to_string(), "Invalid key: Name cannot be empty");
    }

    #[test]
    fn storage_error_corrupted_formats_name() {
        let err = StorageError::corrupted("5; /data", "name mismatch");
        assert_eq!(err.to_string(), "Corrupted entry for 5; /data: name mismatch");
    }

    #[test]
    fn storage_error_io_wraps_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StorageError::from(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn storage_error_json_wraps_serde_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err = StorageError::from(json_err);
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn storage_error_lock_poisoned_displays() {
        let err = StorageError::LockPoisoned("rwlock poisoned".to_string());
        assert_eq!(err.to_string(), "Lock poisoned: rwlock poisoned");
    }
}
