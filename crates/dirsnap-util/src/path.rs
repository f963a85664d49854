//! Path utilities.
//!
//! Directory paths handled by dirsnap may point at the local filesystem or
//! at a remote FTP/SFTP server, so they are kept as strings and joined with
//! `/` rather than going through [`std::path::Path`], whose separator rules
//! follow the host OS.

use std::path::PathBuf;

/// Get the dirsnap data directory.
///
/// This follows XDG conventions:
/// - `$XDG_DATA_HOME/dirsnap` if set
/// - `~/.local/share/dirsnap` otherwise
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("dirsnap"))
}

/// Default location of persisted snapshots.
pub fn snapshots_dir() -> Option<PathBuf> {
    data_dir().map(|p| p.join("snapshots"))
}

/// Join a directory and a file name with `/`.
///
/// An absolute `name` replaces the directory, and an empty directory
/// yields the name unchanged.
pub fn join(dir: &str, name: &str) -> String {
    if name.starts_with('/') || dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
