//! Directory snapshots and change detection for dirsnap.
//!
//! This crate lists the regular files directly under a directory, over the
//! local filesystem, FTP or SFTP, and records their name, size and
//! modification time. Two snapshots of the same directory can then be
//! compared to find files that were created or modified:
//! - [`SnapshotMaker`] takes snapshots for one configured channel and keeps
//!   them in a [`dirsnap_storage::Storage`]
//! - [`SnapshotDiff`] compares two snapshots
//! - [`FileAccessClient`] is implemented once per transport
//!
//! Comparison uses metadata only. A rewrite that keeps both size and
//! modification time is not detected, and deleted files are not reported.
//!
//! # Example
//!
//! ```no_run
//! use dirsnap_snapshot::{ChannelConfig, SnapshotDiff, SnapshotMaker};
//! use dirsnap_storage::JsonStorage;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(JsonStorage::new("/var/lib/dirsnap/snapshots"));
//! let maker = SnapshotMaker::from_config(ChannelConfig::local("5"), storage)?;
//!
//! // Reuses the stored snapshot after a restart, if there is one
//! let previous = maker.get_snapshot("/data/incoming", true, true).await?;
//!
//! // ... wait for the next poll ...
//!
//! let current = maker.get_snapshot("/data/incoming", false, true).await?;
//! for name in SnapshotDiff::compute(&previous, &current).changed() {
//!     println!("changed: {name}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod diff;
mod error;
mod maker;
mod record;
mod snapshot;

pub use client::{build_client, FileAccessClient, FtpClient, LocalClient, SftpClient};
pub use config::{ChannelConfig, FtpConfig, SftpConfig, SourceType};
pub use diff::SnapshotDiff;
pub use error::{SnapshotError, SnapshotResult};
pub use maker::SnapshotMaker;
pub use record::{
    format_timestamp, parse_timestamp, FileRecord, LastModified, ListingEntry, UNKNOWN_SIZE,
};
pub use snapshot::{Snapshot, SnapshotDocument};
