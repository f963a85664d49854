//! Command handlers for the dirsnap CLI.

pub mod diff;
pub mod snapshot;
pub mod watch;

pub use diff::*;
pub use snapshot::*;
pub use watch::*;

use anyhow::Context;
use dirsnap_snapshot::ChannelConfig;
use std::path::Path;

/// Load and validate a channel configuration file.
pub(crate) async fn load_channel(path: &Path) -> anyhow::Result<ChannelConfig> {
    let channel = ChannelConfig::load_file(path)
        .await
        .with_context(|| format!("loading channel config {}", path.display()))?;
    Ok(channel)
}
