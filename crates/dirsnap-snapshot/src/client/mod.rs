//! Transport access for snapshots.
//!
//! A [`FileAccessClient`] lists the regular files directly under a
//! directory and reads single files. Each transport implements it, and the
//! one a channel uses is picked from its configuration by
//! [`build_client`].

mod ftp;
mod local;
mod sftp;

pub use ftp::FtpClient;
pub use local::LocalClient;
pub use sftp::SftpClient;

use crate::config::{ChannelConfig, SourceType};
use crate::record::ListingEntry;
use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::sync::Arc;
use tracing::warn;

/// Access to the files of one transport.
#[async_trait]
pub trait FileAccessClient: Send + Sync {
    /// Transport behind this client.
    fn source_type(&self) -> SourceType;

    /// Make sure the transport is ready.
    ///
    /// Reuses an existing connection when it is still alive, so calling it
    /// before every listing is cheap.
    async fn connect(&self) -> SnapshotResult<()>;

    /// List the regular files directly under `path`.
    ///
    /// Subdirectories are left out.
    async fn list(&self, path: &str) -> SnapshotResult<Vec<ListingEntry>>;

    /// Read the contents of the file at `path`.
    async fn get_file_data(&self, path: &str) -> SnapshotResult<Vec<u8>>;
}

/// Build the client for a channel's transport.
pub fn build_client(channel: &ChannelConfig) -> SnapshotResult<Arc<dyn FileAccessClient>> {
    let missing = |block: &str| {
        SnapshotError::config(format!("channel {}: missing `{block}` settings", channel.id))
    };

    Ok(match channel.source_type {
        SourceType::Local => Arc::new(LocalClient::new()),
        SourceType::Ftp => {
            let ftp = channel.ftp.clone().ok_or_else(|| missing("ftp"))?;
            Arc::new(FtpClient::new(ftp))
        }
        SourceType::Sftp => {
            let sftp = channel.sftp.clone().ok_or_else(|| missing("sftp"))?;
            Arc::new(SftpClient::new(sftp))
        }
    })
}

/// Name of a listed file, or `None` when it is not valid UTF-8.
///
/// Such files are skipped with a warning on every transport: a lossy name
/// could not be read back, and two raw names could collide on one record.
pub(crate) fn utf8_name(dir: &str, raw: &OsStr) -> Option<String> {
    match raw.to_str() {
        Some(name) => Some(name.to_string()),
        None => {
            warn!(path = dir, name = ?raw, "Skipping file whose name is not UTF-8");
            None
        }
    }
}

/// Run a blocking transport call on the blocking thread pool.
pub(crate) async fn run_blocking<T, F>(source_type: SourceType, op: F) -> SnapshotResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> SnapshotResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op).await.map_err(|e| {
        SnapshotError::transport_unavailable(source_type, format!("transport task failed: {e}"))
    })?
}
