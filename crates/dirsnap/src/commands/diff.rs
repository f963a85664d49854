//! Snapshot file comparison.

use anyhow::Context;
use dirsnap_snapshot::{Snapshot, SnapshotDiff};
use std::path::Path;

async fn read_snapshot(file: &Path) -> anyhow::Result<Snapshot> {
    let payload = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    Snapshot::from_stored_payload("", &payload)
        .with_context(|| format!("parsing snapshot {}", file.display()))
}

/// Print the files created and modified between two snapshot files.
pub async fn diff(previous: &Path, current: &Path) -> anyhow::Result<()> {
    let previous = read_snapshot(previous).await?;
    let current = read_snapshot(current).await?;

    let diff = SnapshotDiff::compute(&previous, &current);
    println!("{}", serde_json::to_string_pretty(&diff)?);
    Ok(())
}
