//! JSON file-based storage implementation.
//!
//! Each name is stored as a separate JSON file holding a small envelope
//! (`name`, `payload`, `stored_at`). Names are free-form, e.g.
//! `"5; /data/in"`, so the file is named after the SHA-256 digest of the
//! name rather than the name itself.

use crate::{validate_name, Storage, StorageError, StorageResult, StorageSession};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{debug, trace, warn};

/// On-disk envelope around a stored payload.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    name: String,
    payload: String,
    stored_at: DateTime<Utc>,
}

/// JSON file-based storage.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    base_path: PathBuf,
}

impl JsonStorage {
    /// Create a new JSON storage at the given base path.
    ///
    /// The directory is created on first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory holding the entry files.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the file path for a name.
    fn name_to_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;

        let file_name = format!("{}.json", hex::encode(Sha256::digest(name.as_bytes())));
        Ok(self.base_path.join(file_name))
    }

    async fn read_entry(path: &Path) -> StorageResult<Option<StoredEntry>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[async_trait]
impl Storage for JsonStorage {
    async fn session(&self) -> StorageResult<Box<dyn StorageSession>> {
        trace!(path = %self.base_path.display(), "Opening storage session");
        Ok(Box::new(JsonSession {
            storage: self.clone(),
            opened_at: Instant::now(),
        }))
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        debug!(path = %self.base_path.display(), "Listing storage");

        let mut names = Vec::new();
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(StorageError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match Self::read_entry(&path).await {
                Ok(Some(stored)) => names.push(stored.name),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Session over a [`JsonStorage`].
struct JsonSession {
    storage: JsonStorage,
    opened_at: Instant,
}

#[async_trait]
impl StorageSession for JsonSession {
    async fn get(&self, name: &str) -> StorageResult<Option<String>> {
        let path = self.storage.name_to_path(name)?;
        debug!(name, path = %path.display(), "Reading from storage");

        match JsonStorage::read_entry(&path).await? {
            Some(stored) if stored.name == name => Ok(Some(stored.payload)),
            Some(stored) => Err(StorageError::corrupted(
                name,
                format!("entry file holds {:?}", stored.name),
            )),
            None => Ok(None),
        }
    }

    async fn store(&self, name: &str, payload: &str) -> StorageResult<()> {
        let path = self.storage.name_to_path(name)?;
        debug!(name, path = %path.display(), "Writing to storage");

        fs::create_dir_all(&self.storage.base_path).await?;

        let entry = StoredEntry {
            name: name.to_string(),
            payload: payload.to_string(),
            stored_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&entry)?;

        // Write atomically (write to temp file, then rename)
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    async fn remove(&self, name: &str) -> StorageResult<()> {
        let path = self.storage.name_to_path(name)?;
        debug!(name, path = %path.display(), "Removing from storage");

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

impl Drop for JsonSession {
    fn drop(&mut self) {
        trace!(
            path = %self.storage.base_path.display(),
            held_ms = self.opened_at.elapsed().as_millis() as u64,
            "Released storage session"
        );
    }
}
