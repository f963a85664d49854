//! In-memory storage implementation for testing.

use crate::{validate_name, Storage, StorageError, StorageResult, StorageSession};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type Payloads = Arc<RwLock<HashMap<String, String>>>;

/// In-memory storage for testing.
///
/// This stores all data in memory and is not persistent. It also counts
/// sessions that are currently open, which lets tests check that every
/// session gets released.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    data: Payloads,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions opened and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Number of stored payloads.
    ///
    /// Still counts after a writer panicked while holding the lock.
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no payload is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn session(&self) -> StorageResult<Box<dyn StorageSession>> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            data: Arc::clone(&self.data),
            open_sessions: Arc::clone(&self.open_sessions),
        }))
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        let mut names: Vec<String> = data.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

struct MemorySession {
    data: Payloads,
    open_sessions: Arc<AtomicUsize>,
}

#[async_trait]
impl StorageSession for MemorySession {
    async fn get(&self, name: &str) -> StorageResult<Option<String>> {
        validate_name(name)?;
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        Ok(data.get(name).cloned())
    }

    async fn store(&self, name: &str, payload: &str) -> StorageResult<()> {
        validate_name(name)?;
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.insert(name.to_string(), payload.to_string());
        Ok(())
    }

    async fn remove(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.remove(name);
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        let session = storage.session().await.unwrap();

        session.store("5; /data", "payload").await.unwrap();
        assert_eq!(session.get("5; /data").await.unwrap().as_deref(), Some("payload"));
        assert_eq!(session.get("5; /other").await.unwrap(), None);

        session.remove("5; /data").await.unwrap();
        assert_eq!(session.get("5; /data").await.unwrap(), None);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_share_data() {
        let storage = MemoryStorage::new();

        {
            let session = storage.session().await.unwrap();
            session.store("5; /data", "payload").await.unwrap();
        }

        let session = storage.session().await.unwrap();
        assert_eq!(session.get("5; /data").await.unwrap().as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_open_sessions_tracks_drop() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.open_sessions(), 0);

        let first = storage.session().await.unwrap();
        let second = storage.session().await.unwrap();
        assert_eq!(storage.open_sessions(), 2);

        drop(first);
        assert_eq!(storage.open_sessions(), 1);
        drop(second);
        assert_eq!(storage.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();

        let session = clone.session().await.unwrap();
        session.store("7; /srv", "x").await.unwrap();

        assert_eq!(storage.len(), 1);
        assert_eq!(storage.open_sessions(), 1);
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let storage = MemoryStorage::new();
        let session = storage.session().await.unwrap();
        session.store("7; /srv", "x").await.unwrap();
        session.store("5; /data", "y").await.unwrap();

        assert_eq!(
            storage.list().await.unwrap(),
            vec!["5; /data".to_string(), "7; /srv".to_string()]
        );
    }

    #[tokio::test]
    async fn test_remove_nonexistent() {
        let storage = MemoryStorage::new();
        let session = storage.session().await.unwrap();
        session.remove("does; not exist").await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let storage = MemoryStorage::new();
        let session = storage.session().await.unwrap();
        assert!(session.store("", "x").await.is_err());
        assert!(session.get("  ").await.is_err());
        assert!(session.remove("").await.is_err());
    }

    #[tokio::test]
    async fn test_len_survives_poisoned_lock() {
        let storage = MemoryStorage::new();
        storage
            .session()
            .await
            .unwrap()
            .store("5; /data", "x")
            .await
            .unwrap();

        let data = Arc::clone(&storage.data);
        let _ = std::thread::spawn(move || {
            let _guard = data.write().unwrap();
            panic!("writer died");
        })
        .join();

        assert_eq!(storage.len(), 1);
        assert!(!storage.is_empty());
        assert!(storage.list().await.is_err());
    }
}
