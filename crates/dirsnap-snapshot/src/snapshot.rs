//! Snapshot data structures.

use crate::record::{FileRecord, ListingEntry};
use crate::SnapshotResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized form of a snapshot, as stored and exchanged.
///
/// ```json
/// { "dir_snapshot_file_list": [
///     { "full_path": "/data/a.csv", "name": "a.csv", "size": 10,
///       "last_modified": "2023-01-01T00:00:00Z" } ] }
/// ```
///
/// `full_path` is ignored when reading; it is rebuilt from the snapshot
/// path and the name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub dir_snapshot_file_list: Vec<ListingEntry>,
}

/// The regular files directly under one directory at one point in time.
///
/// Records are keyed by file name. Each snapshot owns its records; two
/// snapshots never share them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    path: String,
    records: BTreeMap<String, FileRecord>,
}

impl Snapshot {
    /// Create an empty snapshot of `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Build a snapshot of `path` from a listing.
    pub fn from_listing<I>(path: impl Into<String>, entries: I) -> SnapshotResult<Self>
    where
        I: IntoIterator<Item = ListingEntry>,
    {
        let mut snapshot = Self::new(path);
        snapshot.add_file_list(entries)?;
        Ok(snapshot)
    }

    /// Rebuild a snapshot from a payload produced by [`Snapshot::to_json`].
    ///
    /// The result diffs exactly like a snapshot built from a live listing of
    /// the same files.
    pub fn from_stored_payload(path: impl Into<String>, payload: &str) -> SnapshotResult<Self> {
        let document: SnapshotDocument = serde_json::from_str(payload)?;
        Self::from_document(path, document)
    }

    /// Rebuild a snapshot from an already parsed document.
    pub fn from_document(
        path: impl Into<String>,
        document: SnapshotDocument,
    ) -> SnapshotResult<Self> {
        Self::from_listing(path, document.dir_snapshot_file_list)
    }

    /// Add one record per entry, keyed by name.
    ///
    /// A later entry replaces an earlier one with the same name. If any
    /// timestamp fails to parse, nothing is added.
    pub fn add_file_list<I>(&mut self, entries: I) -> SnapshotResult<()>
    where
        I: IntoIterator<Item = ListingEntry>,
    {
        let mut batch = BTreeMap::new();
        for entry in entries {
            let last_modified = entry.last_modified.normalize()?;
            let full_path = dirsnap_util::path::join(&self.path, &entry.name);
            let record = FileRecord::new(full_path, entry.name.clone(), entry.size, last_modified);
            batch.insert(entry.name, record);
        }

        self.records.extend(batch);
        Ok(())
    }

    /// Directory this snapshot describes.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Records keyed by file name.
    pub fn records(&self) -> &BTreeMap<String, FileRecord> {
        &self.records
    }

    /// Look up a record by file name.
    pub fn get(&self, name: &str) -> Option<&FileRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// File names in this snapshot, in sorted order.
    ///
    /// Deletions are not part of [`SnapshotDiff`](crate::SnapshotDiff); a
    /// caller that needs them can compare the names of two snapshots.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The snapshot as a JSON document.
    pub fn to_dict(&self) -> serde_json::Value {
        let files: Vec<serde_json::Value> =
            self.records.values().map(FileRecord::to_dict).collect();
        serde_json::json!({ "dir_snapshot_file_list": files })
    }

    /// The snapshot serialized for storage.
    pub fn to_json(&self) -> SnapshotResult<String> {
        Ok(serde_json::to_string(&self.to_dict())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LastModified;
    use crate::SnapshotError;
    use chrono::{DateTime, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_add_file_list_builds_full_paths() {
        let snapshot = Snapshot::from_listing(
            "/data/in",
            vec![
                ListingEntry::new("a.csv", 10, t0()),
                ListingEntry::new("b.csv", 20, "2023-01-01T00:00:05"),
            ],
        )
        .unwrap();

        assert_eq!(snapshot.len(), 2);
        let b = snapshot.get("b.csv").unwrap();
        assert_eq!(b.full_path(), "/data/in/b.csv");
        assert_eq!(b.size(), 20);
        assert_eq!(b.last_modified(), t0() + chrono::Duration::seconds(5));
        for record in snapshot.records().values() {
            assert_eq!(
                record.full_path(),
                dirsnap_util::path::join(snapshot.path(), record.name())
            );
        }
    }

    #[test]
    fn test_later_entry_with_same_name_wins() {
        let snapshot = Snapshot::from_listing(
            "/data",
            vec![
                ListingEntry::new("a.csv", 10, t0()),
                ListingEntry::new("a.csv", 99, t0()),
            ],
        )
        .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a.csv").unwrap().size(), 99);
    }

    #[test]
    fn test_bad_timestamp_fails_whole_batch() {
        let mut snapshot = Snapshot::new("/data");
        let err = snapshot
            .add_file_list(vec![
                ListingEntry::new("a.csv", 10, t0()),
                ListingEntry::new("b.csv", 10, "not a date"),
            ])
            .unwrap_err();

        assert!(matches!(err, SnapshotError::Parse { .. }));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_to_dict_shape() {
        let snapshot =
            Snapshot::from_listing("/data", vec![ListingEntry::new("a.csv", 10, t0())]).unwrap();

        assert_eq!(
            snapshot.to_dict(),
            serde_json::json!({
                "dir_snapshot_file_list": [{
                    "full_path": "/data/a.csv",
                    "name": "a.csv",
                    "size": 10,
                    "last_modified": "2023-01-01T00:00:00Z",
                }]
            })
        );
    }

    #[test]
    fn test_stored_payload_round_trip() {
        let original = Snapshot::from_listing(
            "/data",
            vec![
                ListingEntry::new("a.csv", 10, t0() + chrono::Duration::milliseconds(1500)),
                ListingEntry::new("b.csv", -1, "2023-06-01 10:00:00"),
                ListingEntry::new(
                    "c.csv",
                    0,
                    LastModified::Text("2023-06-01T12:00:00+02:00".into()),
                ),
            ],
        )
        .unwrap();

        let payload = original.to_json().unwrap();
        let restored = Snapshot::from_stored_payload("/data", &payload).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_from_stored_payload_accepts_foreign_formats() {
        let payload = r#"{"dir_snapshot_file_list": [
            {"full_path": "/elsewhere/a.csv", "name": "a.csv", "size": 10, "last_modified": "2023-01-01T00:00:00"},
            {"name": "b.csv", "size": 3, "last_modified": 1672531200}
        ]}"#;

        let snapshot = Snapshot::from_stored_payload("/data", payload).unwrap();
        assert_eq!(snapshot.get("a.csv").unwrap().full_path(), "/data/a.csv");
        assert_eq!(snapshot.get("a.csv").unwrap().last_modified(), t0());
        assert_eq!(snapshot.get("b.csv").unwrap().last_modified(), t0());
    }

    #[test]
    fn test_from_stored_payload_rejects_bad_json() {
        let err = Snapshot::from_stored_payload("/data", "{not json").unwrap_err();
        assert!(matches!(err, SnapshotError::Serialization(_)));
    }

    #[test]
    fn test_names_sorted() {
        let snapshot = Snapshot::from_listing(
            "/data",
            vec![ListingEntry::new("b", 1, t0()), ListingEntry::new("a", 1, t0())],
        )
        .unwrap();
        assert_eq!(snapshot.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(snapshot.contains("a"));
        assert!(!snapshot.contains("c"));
    }
}
