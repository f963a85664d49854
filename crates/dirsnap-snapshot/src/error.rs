//! Snapshot error types.

use crate::config::SourceType;
use dirsnap_storage::StorageError;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur while taking, storing or comparing snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The transport could not be reached or refused authentication.
    #[error("{source_type} transport unavailable: {message}")]
    TransportUnavailable {
        source_type: SourceType,
        message: String,
    },

    /// A directory could not be enumerated.
    #[error("Failed to list {path}: {message}")]
    Listing { path: String, message: String },

    /// A file could not be read.
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    /// A modification time could not be parsed.
    #[error("Invalid timestamp {value:?}: {message}")]
    Parse { value: String, message: String },

    /// Snapshot store error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid channel configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapshotError {
    /// Create a transport unavailable error.
    pub fn transport_unavailable(source_type: SourceType, message: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            source_type,
            message: message.into(),
        }
    }

    /// Create a listing error.
    pub fn listing(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Listing {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a read error.
    pub fn read(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Read {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a timestamp parse error.
    pub fn parse(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error came from the transport rather than from
    /// snapshot data or the store.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable { .. } | Self::Listing { .. } | Self::Read { .. }
        )
    }
}
