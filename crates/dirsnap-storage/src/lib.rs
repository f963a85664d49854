//! Storage layer for dirsnap.
//!
//! Serialized snapshots are kept under an opaque name, one payload per
//! name. Two backends are provided:
//! - JSON file storage (default)
//! - In-memory storage (for testing)
//!
//! Access goes through a [`StorageSession`] obtained from
//! [`Storage::session`]. A session is released when it is dropped, so a
//! caller that returns early or fails halfway still gives it back.

pub mod error;
pub mod json;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use json::JsonStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;

/// A backend that persists snapshot payloads by name.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open a session for reading and writing payloads.
    ///
    /// The session is released when the returned value is dropped.
    async fn session(&self) -> StorageResult<Box<dyn StorageSession>>;

    /// List the names of all stored payloads.
    async fn list(&self) -> StorageResult<Vec<String>>;
}

/// A scoped handle to a [`Storage`] backend.
#[async_trait]
pub trait StorageSession: Send + Sync {
    /// Read the payload stored under `name`.
    ///
    /// Returns `None` if nothing was stored under that name.
    async fn get(&self, name: &str) -> StorageResult<Option<String>>;

    /// Store `payload` under `name`, replacing any previous payload.
    async fn store(&self, name: &str, payload: &str) -> StorageResult<()>;

    /// Remove the payload stored under `name`. Removing a missing name is not an error.
    async fn remove(&self, name: &str) -> StorageResult<()>;
}

/// Reject names that cannot identify a payload.
pub(crate) fn validate_name(name: &str) -> StorageResult<()> {
    if name.trim().is_empty() {
        return Err(StorageError::invalid_key("Name cannot be empty"));
    }
    Ok(())
}
