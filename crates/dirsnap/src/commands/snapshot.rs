//! One-shot snapshot command.

use super::load_channel;
use dirsnap_snapshot::SnapshotMaker;
use dirsnap_storage::Storage;
use std::path::Path;
use std::sync::Arc;

/// Take a single snapshot of `path` and print it.
pub async fn snapshot(
    config: &Path,
    path: &str,
    initial: bool,
    store: bool,
    storage: Arc<dyn Storage>,
) -> anyhow::Result<()> {
    let channel = load_channel(config).await?;
    let maker = SnapshotMaker::from_config(channel, storage)?;

    let snapshot = maker.get_snapshot(path, initial, store).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot.to_dict())?);
    Ok(())
}
