//! Listing entries, file records and timestamp normalization.
//!
//! Transports report modification times in different shapes: the local
//! filesystem gives a [`SystemTime`], FTP and SFTP listings give parsed
//! values at their own resolution, and stored snapshots give ISO-8601
//! strings. All of them are normalized to a [`DateTime<Utc>`] before a
//! [`FileRecord`] is built, so records compare by instant and never by
//! string form.

use crate::{SnapshotError, SnapshotResult};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::time::SystemTime;

/// Size reported when a transport does not provide one.
pub const UNKNOWN_SIZE: i64 = -1;

/// Naive forms accepted in addition to RFC 3339. These carry no offset
/// and are read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (`2023-01-01T00:00:00Z`, `2023-01-01T02:00:00+02:00`),
/// offsets without a colon (`+0200`), and naive forms with `T` or a space
/// and optional fractional seconds.
pub fn parse_timestamp(value: &str) -> SnapshotResult<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.and_utc());
        }
    }

    Err(SnapshotError::parse(value, "expected an ISO-8601 timestamp"))
}

/// Render a timestamp the way it is persisted.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn serialize_timestamp<S: Serializer>(
    value: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(value))
}

/// Modification time as reported by a listing, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastModified {
    /// Already a point in time.
    Native(DateTime<Utc>),
    /// An ISO-8601 string, parsed when the record is built.
    Text(String),
}

impl LastModified {
    /// Normalize to the internal representation.
    pub fn normalize(&self) -> SnapshotResult<DateTime<Utc>> {
        match self {
            Self::Native(value) => Ok(*value),
            Self::Text(value) => parse_timestamp(value),
        }
    }
}

impl From<DateTime<Utc>> for LastModified {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Native(value)
    }
}

impl From<SystemTime> for LastModified {
    fn from(value: SystemTime) -> Self {
        Self::Native(DateTime::<Utc>::from(value))
    }
}

impl From<String> for LastModified {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for LastModified {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl Serialize for LastModified {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Native(value) => serialize_timestamp(value, serializer),
            Self::Text(value) => serializer.serialize_str(value),
        }
    }
}

impl<'de> Deserialize<'de> for LastModified {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            EpochSeconds(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(value) => Ok(Self::Text(value)),
            Raw::EpochSeconds(secs) => DateTime::from_timestamp(secs, 0)
                .map(Self::Native)
                .ok_or_else(|| de::Error::custom(format!("epoch seconds out of range: {secs}"))),
        }
    }
}

fn unknown_size() -> i64 {
    UNKNOWN_SIZE
}

/// One file as reported by a transport listing or a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// File name, without the directory.
    pub name: String,
    /// Size in bytes, [`UNKNOWN_SIZE`] if not reported.
    #[serde(default = "unknown_size")]
    pub size: i64,
    /// Modification time.
    pub last_modified: LastModified,
}

impl ListingEntry {
    /// Create a listing entry.
    pub fn new(name: impl Into<String>, size: i64, last_modified: impl Into<LastModified>) -> Self {
        Self {
            name: name.into(),
            size,
            last_modified: last_modified.into(),
        }
    }
}

/// Identity and metadata of a single file in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    full_path: String,
    name: String,
    size: i64,
    #[serde(serialize_with = "serialize_timestamp")]
    last_modified: DateTime<Utc>,
}

impl FileRecord {
    /// Create a file record.
    pub fn new(
        full_path: impl Into<String>,
        name: impl Into<String>,
        size: i64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            full_path: full_path.into(),
            name: name.into(),
            size,
            last_modified,
        }
    }

    /// Directory and name joined.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes, [`UNKNOWN_SIZE`] if the transport did not report one.
    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Whether size or modification time differ from `other`.
    ///
    /// A file rewritten with the same size and the same modification time
    /// is indistinguishable from an untouched one.
    pub fn differs_from(&self, other: &FileRecord) -> bool {
        self.size != other.size || self.last_modified != other.last_modified
    }

    /// The record as a JSON map with `full_path`, `name`, `size` and
    /// `last_modified` keys.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "full_path": self.full_path,
            "name": self.name,
            "size": self.size,
            "last_modified": format_timestamp(&self.last_modified),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_naive_iso_is_utc() {
        assert_eq!(parse_timestamp("2023-01-01T00:00:00").unwrap(), new_year());
        assert_eq!(parse_timestamp("2023-01-01 00:00:00").unwrap(), new_year());
    }

    #[test]
    fn test_parse_with_offsets() {
        assert_eq!(parse_timestamp("2023-01-01T00:00:00Z").unwrap(), new_year());
        assert_eq!(parse_timestamp("2023-01-01T02:00:00+02:00").unwrap(), new_year());
        assert_eq!(parse_timestamp("2023-01-01T02:00:00+0200").unwrap(), new_year());
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let parsed = parse_timestamp("2023-01-01T00:00:00.250").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
        assert_eq!(parsed.timestamp(), new_year().timestamp());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_timestamp("last tuesday").unwrap_err();
        assert!(matches!(err, SnapshotError::Parse { .. }));
    }

    #[test]
    fn test_format_round_trips() {
        let value = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 5).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let formatted = format_timestamp(&value);
        assert_eq!(parse_timestamp(&formatted).unwrap(), value);
        assert_eq!(format_timestamp(&new_year()), "2023-01-01T00:00:00Z");
    }

    #[test]
    fn test_text_and_native_normalize_equal() {
        let text = LastModified::from("2023-01-01T00:00:00");
        let native = LastModified::from(new_year());
        assert_eq!(text.normalize().unwrap(), native.normalize().unwrap());
    }

    #[test]
    fn test_system_time_conversion() {
        let system = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_672_531_200);
        assert_eq!(LastModified::from(system).normalize().unwrap(), new_year());
    }

    #[test]
    fn test_listing_entry_deserializes_string_and_epoch() {
        let from_text: ListingEntry =
            serde_json::from_str(r#"{"name":"a","size":1,"last_modified":"2023-01-01T00:00:00"}"#)
                .unwrap();
        let from_epoch: ListingEntry =
            serde_json::from_str(r#"{"name":"a","size":1,"last_modified":1672531200}"#).unwrap();

        assert_eq!(from_text.last_modified, LastModified::Text("2023-01-01T00:00:00".into()));
        assert_eq!(from_epoch.last_modified, LastModified::Native(new_year()));
    }

    #[test]
    fn test_listing_entry_missing_size_is_unknown() {
        let entry: ListingEntry =
            serde_json::from_str(r#"{"name":"a","last_modified":"2023-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(entry.size, UNKNOWN_SIZE);
    }

    #[test]
    fn test_file_record_to_dict() {
        let record = FileRecord::new("/data/a.csv", "a.csv", 10, new_year());
        assert_eq!(
            record.to_dict(),
            serde_json::json!({
                "full_path": "/data/a.csv",
                "name": "a.csv",
                "size": 10,
                "last_modified": "2023-01-01T00:00:00Z",
            })
        );
        assert_eq!(serde_json::to_value(&record).unwrap(), record.to_dict());
    }

    #[test]
    fn test_differs_from() {
        let base = FileRecord::new("/d/a", "a", 10, new_year());
        let same = FileRecord::new("/d/a", "a", 10, new_year());
        let resized = FileRecord::new("/d/a", "a", 11, new_year());
        let touched = FileRecord::new("/d/a", "a", 10, new_year() + chrono::Duration::seconds(1));

        assert!(!base.differs_from(&same));
        assert!(base.differs_from(&resized));
        assert!(base.differs_from(&touched));
    }
}
