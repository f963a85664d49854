//! Poll loops over a channel's directories.

use super::load_channel;
use dirsnap_snapshot::{Snapshot, SnapshotDiff, SnapshotMaker};
use dirsnap_storage::Storage;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Poll directories until Ctrl-C, printing every created or modified file.
///
/// Watches `path` if given, otherwise every path listed in the channel.
/// Each directory gets its own loop, and polls within a loop run one after
/// another, so a directory never has two snapshots in flight.
pub async fn watch(
    config: &Path,
    path: Option<String>,
    interval: Option<f64>,
    store: bool,
    storage: Arc<dyn Storage>,
) -> anyhow::Result<()> {
    let mut channel = load_channel(config).await?;
    if let Some(secs) = interval {
        channel.poll_interval_secs = secs;
    }
    let paths = match path {
        Some(path) => vec![path],
        None => channel.paths.clone(),
    };
    if paths.is_empty() {
        anyhow::bail!("channel {} has no paths, pass --path", channel.id);
    }

    let maker = Arc::new(SnapshotMaker::from_config(channel, storage)?);
    let mut loops = JoinSet::new();
    for path in paths {
        loops.spawn(poll_loop(Arc::clone(&maker), path, store));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping");
        }
        Some(joined) = loops.join_next() => {
            joined?;
        }
    }
    loops.shutdown().await;
    Ok(())
}

/// The first successful poll is the initial one and may come from the
/// store. A failed poll is skipped and retried on the next tick.
async fn poll_loop(maker: Arc<SnapshotMaker>, path: String, store: bool) {
    let mut ticker = tokio::time::interval(maker.channel().poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut previous: Option<Snapshot> = None;
    loop {
        ticker.tick().await;

        // Failures are already logged by the maker.
        let Ok(current) = maker.get_snapshot(&path, previous.is_none(), store).await else {
            continue;
        };

        match &previous {
            Some(previous) => print_changes(previous, &current),
            None => info!(path = %path, files = current.len(), "Initial snapshot taken"),
        }
        previous = Some(current);
    }
}

fn print_changes(previous: &Snapshot, current: &Snapshot) {
    let diff = SnapshotDiff::compute(previous, current);
    for (kind, names) in [
        ("created", &diff.files_created),
        ("modified", &diff.files_modified),
    ] {
        for name in names {
            let full_path = current.get(name).map_or(name.as_str(), |r| r.full_path());
            println!("{kind}\t{full_path}");
        }
    }
}
