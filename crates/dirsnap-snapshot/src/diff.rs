//! Metadata-only comparison of two snapshots.

use crate::Snapshot;
use serde::Serialize;
use std::collections::BTreeSet;

/// Files created or modified between two snapshots of the same directory.
///
/// Only size and modification time are compared. A file whose content
/// changed while both stayed the same is not reported. Files present only
/// in the previous snapshot are not reported either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    /// Names present only in the current snapshot.
    pub files_created: BTreeSet<String>,
    /// Names present in both with a different size or modification time.
    pub files_modified: BTreeSet<String>,
}

impl SnapshotDiff {
    /// Compare `current` against `previous`.
    pub fn compute(previous: &Snapshot, current: &Snapshot) -> Self {
        let mut diff = Self::default();

        for (name, record) in current.records() {
            match previous.get(name) {
                None => {
                    diff.files_created.insert(name.clone());
                }
                Some(before) if record.differs_from(before) => {
                    diff.files_modified.insert(name.clone());
                }
                Some(_) => {}
            }
        }

        diff
    }

    /// Whether nothing was created or modified.
    pub fn is_empty(&self) -> bool {
        self.files_created.is_empty() && self.files_modified.is_empty()
    }

    /// Created names followed by modified names.
    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.files_created
            .iter()
            .chain(self.files_modified.iter())
            .map(String::as_str)
    }
}
