//! Snapshot orchestration for one channel.

use crate::client::{build_client, FileAccessClient};
use crate::config::ChannelConfig;
use crate::snapshot::Snapshot;
use crate::SnapshotResult;
use dirsnap_storage::{Storage, StorageSession};
use dirsnap_util::TimingGuard;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces snapshots of the directories of one configured channel.
///
/// The maker owns the transport client (whose connection is reused between
/// calls) and a handle to the snapshot store. It keeps no other state, so the
/// caller decides what to diff against and when to call again. Calls for the
/// same path must not overlap: the store lookup and the store write are not
/// atomic.
pub struct SnapshotMaker {
    channel: ChannelConfig,
    client: Arc<dyn FileAccessClient>,
    storage: Arc<dyn Storage>,
}

impl SnapshotMaker {
    pub fn new(
        channel: ChannelConfig,
        client: Arc<dyn FileAccessClient>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            channel,
            client,
            storage,
        }
    }

    /// Validate the channel and build its transport client.
    pub fn from_config(channel: ChannelConfig, storage: Arc<dyn Storage>) -> SnapshotResult<Self> {
        channel.validate()?;
        let client = build_client(&channel)?;
        Ok(Self::new(channel, client, storage))
    }

    pub fn channel(&self) -> &ChannelConfig {
        &self.channel
    }

    /// Store key for `path` on this channel.
    pub fn store_key(&self, path: &str) -> String {
        self.channel.store_key(path)
    }

    pub async fn connect(&self) -> SnapshotResult<()> {
        self.client.connect().await
    }

    /// Snapshot the directory at `path`.
    ///
    /// With `is_initial` and `needs_store`, a snapshot already in the store is
    /// returned as is, without touching the transport. If there is none, a
    /// live listing is returned and nothing is written. Otherwise the
    /// directory is listed live and, with `needs_store`, the result is
    /// written to the store.
    ///
    /// Errors are logged with the channel's source type and store key, then
    /// returned. Nothing is retried here.
    pub async fn get_snapshot(
        &self,
        path: &str,
        is_initial: bool,
        needs_store: bool,
    ) -> SnapshotResult<Snapshot> {
        let key = self.store_key(path);
        match self.snapshot_inner(path, &key, is_initial, needs_store).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(
                    source_type = %self.client.source_type(),
                    key = %key,
                    error = %e,
                    "Snapshot failed"
                );
                Err(e)
            }
        }
    }

    async fn snapshot_inner(
        &self,
        path: &str,
        key: &str,
        is_initial: bool,
        needs_store: bool,
    ) -> SnapshotResult<Snapshot> {
        // Released on every return path when dropped.
        let session: Option<Box<dyn StorageSession>> = if needs_store {
            Some(self.storage.session().await?)
        } else {
            None
        };

        if is_initial {
            if let Some(session) = &session {
                if let Some(payload) = session.get(key).await? {
                    let snapshot = Snapshot::from_stored_payload(path, &payload)?;
                    info!(key, files = snapshot.len(), "Using stored initial snapshot");
                    return Ok(snapshot);
                }
            }
            debug!(key, "No stored initial snapshot, listing live");
            return self.current_snapshot(path).await;
        }

        let snapshot = self.current_snapshot(path).await?;
        if let Some(session) = &session {
            session.store(key, &snapshot.to_json()?).await?;
            debug!(key, files = snapshot.len(), "Stored snapshot");
        }
        Ok(snapshot)
    }

    async fn current_snapshot(&self, path: &str) -> SnapshotResult<Snapshot> {
        self.client.connect().await?;
        let entries = {
            let _timing = TimingGuard::listing(path);
            self.client.list(path).await?
        };
        Snapshot::from_listing(path, entries)
    }

    /// Read a file through the channel's transport.
    pub async fn get_file_data(&self, path: &str) -> SnapshotResult<Vec<u8>> {
        self.client.connect().await?;
        let _timing = TimingGuard::transfer(path);
        self.client.get_file_data(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsnap_storage::MemoryStorage;

    #[test]
    fn test_store_key_uses_channel_id() {
        let maker = SnapshotMaker::from_config(
            ChannelConfig::local("5"),
            Arc::new(MemoryStorage::new()),
        )
        .unwrap();
        assert_eq!(maker.store_key("/data"), "5; /data");
        assert_eq!(maker.channel().id, "5");
    }

    #[test]
    fn test_from_config_rejects_invalid_channel() {
        let mut channel = ChannelConfig::local("5");
        channel.poll_interval_secs = 0.5;
        assert!(SnapshotMaker::from_config(channel, Arc::new(MemoryStorage::new())).is_err());
    }
}
