//! Local filesystem access.

use super::{utf8_name, FileAccessClient};
use crate::config::SourceType;
use crate::record::ListingEntry;
use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

/// Reads directories and files straight from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalClient;

impl LocalClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileAccessClient for LocalClient {
    fn source_type(&self) -> SourceType {
        SourceType::Local
    }

    async fn connect(&self) -> SnapshotResult<()> {
        Ok(())
    }

    async fn list(&self, path: &str) -> SnapshotResult<Vec<ListingEntry>> {
        let mut dir = fs::read_dir(path)
            .await
            .map_err(|e| SnapshotError::listing(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| SnapshotError::listing(path, e))?
        {
            let Some(name) = utf8_name(path, &entry.file_name()) else {
                continue;
            };

            // Follows symlinks, so a link to a regular file counts as a file.
            let metadata = match fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(path, name = %name, error = %e, "Skipping entry without metadata");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata
                .modified()
                .map_err(|e| SnapshotError::listing(path, e))?;
            entries.push(ListingEntry::new(name, metadata.len() as i64, modified));
        }

        debug!(path, files = entries.len(), "Listed local directory");
        Ok(entries)
    }

    async fn get_file_data(&self, path: &str) -> SnapshotResult<Vec<u8>> {
        fs::read(path).await.map_err(|e| SnapshotError::read(path, e))
    }
}
