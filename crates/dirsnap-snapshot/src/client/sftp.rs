//! SFTP access through `ssh2`.

use super::{run_blocking, utf8_name, FileAccessClient};
use crate::config::{SftpConfig, SourceType};
use crate::record::{ListingEntry, UNKNOWN_SIZE};
use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssh2::{FileStat, Session, Sftp};
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

struct SftpConnection {
    // Keeps the SSH session alive for as long as the SFTP channel is used.
    _session: Session,
    sftp: Sftp,
}

type ConnectionSlot = Arc<Mutex<Option<SftpConnection>>>;

/// Lists and reads files over SFTP.
///
/// One SSH session is kept open and reused across calls.
pub struct SftpClient {
    config: Arc<SftpConfig>,
    connection: ConnectionSlot,
}

impl SftpClient {
    pub fn new(config: SftpConfig) -> Self {
        Self {
            config: Arc::new(config),
            connection: Arc::new(Mutex::new(None)),
        }
    }
}

fn unavailable(message: impl Into<String>) -> SnapshotError {
    SnapshotError::transport_unavailable(SourceType::Sftp, message)
}

fn lock(slot: &ConnectionSlot) -> SnapshotResult<MutexGuard<'_, Option<SftpConnection>>> {
    slot.lock()
        .map_err(|e| unavailable(format!("connection lock poisoned: {e}")))
}

fn authenticate(session: &Session, config: &SftpConfig) -> SnapshotResult<()> {
    let user = config.username.as_str();
    let result = if let Some(password) = &config.password {
        session.userauth_password(user, password)
    } else if let Some(key) = &config.key_path {
        session.userauth_pubkey_file(user, None, key, config.key_passphrase.as_deref())
    } else {
        session.userauth_agent(user)
    };

    result.map_err(|e| unavailable(format!("authentication as {user} failed: {e}")))?;
    if !session.authenticated() {
        return Err(unavailable(format!("authentication as {user} was rejected")));
    }
    Ok(())
}

fn open(config: &SftpConfig) -> SnapshotResult<SftpConnection> {
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| unavailable(format!("cannot resolve {}: {e}", config.host)))?
        .next()
        .ok_or_else(|| unavailable(format!("no address for {}", config.host)))?;

    let tcp = TcpStream::connect_timeout(&addr, config.timeout())
        .map_err(|e| unavailable(format!("cannot connect to {addr}: {e}")))?;

    let mut session = Session::new().map_err(|e| unavailable(e.to_string()))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(config.timeout().as_millis().min(u32::MAX as u128) as u32);
    session
        .handshake()
        .map_err(|e| unavailable(format!("handshake with {addr} failed: {e}")))?;

    authenticate(&session, config)?;

    let sftp = session
        .sftp()
        .map_err(|e| unavailable(format!("cannot start SFTP subsystem: {e}")))?;

    Ok(SftpConnection {
        _session: session,
        sftp,
    })
}

/// Build an entry for a regular file, or `None` for anything else.
///
/// A file the server reports without a usable mtime gets the Unix epoch.
fn entry_from_stat(name: &str, stat: &FileStat) -> Option<ListingEntry> {
    if name == "." || name == ".." || !stat.is_file() {
        return None;
    }

    let size = stat.size.map(|s| s as i64).unwrap_or(UNKNOWN_SIZE);
    let last_modified = match stat
        .mtime
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
    {
        Some(time) => time,
        None => {
            debug!(name, mtime = ?stat.mtime, "No usable modification time, using the epoch");
            DateTime::<Utc>::default()
        }
    };

    Some(ListingEntry::new(name, size, last_modified))
}

#[async_trait]
impl FileAccessClient for SftpClient {
    fn source_type(&self) -> SourceType {
        SourceType::Sftp
    }

    async fn connect(&self) -> SnapshotResult<()> {
        let config = Arc::clone(&self.config);
        let slot = Arc::clone(&self.connection);

        run_blocking(SourceType::Sftp, move || {
            let mut guard = lock(&slot)?;
            if let Some(connection) = guard.as_ref() {
                if connection.sftp.realpath(Path::new(".")).is_ok() {
                    return Ok(());
                }
                debug!(host = %config.host, "SFTP session went stale, reconnecting");
                *guard = None;
            }

            *guard = Some(open(&config)?);
            info!(host = %config.host, port = config.port, "Connected to SFTP server");
            Ok(())
        })
        .await
    }

    async fn list(&self, path: &str) -> SnapshotResult<Vec<ListingEntry>> {
        let slot = Arc::clone(&self.connection);
        let path = path.to_string();

        run_blocking(SourceType::Sftp, move || {
            let guard = lock(&slot)?;
            let connection = guard.as_ref().ok_or_else(|| unavailable("not connected"))?;
            let items = connection
                .sftp
                .readdir(Path::new(&path))
                .map_err(|e| SnapshotError::listing(&path, e))?;

            let entries: Vec<ListingEntry> = items
                .iter()
                .filter_map(|(item, stat)| {
                    let name = utf8_name(&path, item.file_name()?)?;
                    entry_from_stat(&name, stat)
                })
                .collect();

            debug!(path = %path, files = entries.len(), "Listed SFTP directory");
            Ok(entries)
        })
        .await
    }

    async fn get_file_data(&self, path: &str) -> SnapshotResult<Vec<u8>> {
        let slot = Arc::clone(&self.connection);
        let path = path.to_string();

        run_blocking(SourceType::Sftp, move || {
            let guard = lock(&slot)?;
            let connection = guard.as_ref().ok_or_else(|| unavailable("not connected"))?;
            let mut file = connection
                .sftp
                .open(Path::new(&path))
                .map_err(|e| SnapshotError::read(&path, e))?;

            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| SnapshotError::read(&path, e))?;
            Ok(data)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stat(perm: u32, size: Option<u64>, mtime: Option<u64>) -> FileStat {
        FileStat {
            size,
            uid: None,
            gid: None,
            perm: Some(perm),
            atime: None,
            mtime,
        }
    }

    #[test]
    fn test_entry_from_regular_file() {
        let stat = stat(0o100644, Some(10), Some(1_672_531_200));
        let entry = entry_from_stat("a.csv", &stat).unwrap();
        assert_eq!(entry.name, "a.csv");
        assert_eq!(entry.size, 10);
        assert_eq!(
            entry.last_modified.normalize().unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_entry_skips_directories_and_dot_entries() {
        assert!(entry_from_stat("archive", &stat(0o040755, Some(4096), Some(0))).is_none());
        assert!(entry_from_stat(".", &stat(0o100644, Some(1), Some(0))).is_none());
        assert!(entry_from_stat("..", &stat(0o100644, Some(1), Some(0))).is_none());
    }

    #[test]
    fn test_entry_without_size_is_unknown() {
        let entry = entry_from_stat("a.csv", &stat(0o100644, None, None)).unwrap();
        assert_eq!(entry.size, UNKNOWN_SIZE);
    }

    #[test]
    fn test_entry_without_mtime_gets_the_epoch() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();

        let missing = entry_from_stat("a.csv", &stat(0o100644, Some(1), None)).unwrap();
        assert_eq!(missing.last_modified.normalize().unwrap(), epoch);

        // Beyond what chrono can represent.
        let far_future = stat(0o100644, Some(1), Some(i64::MAX as u64));
        let out_of_range = entry_from_stat("b.csv", &far_future).unwrap();
        assert_eq!(out_of_range.last_modified.normalize().unwrap(), epoch);
    }

    #[tokio::test]
    async fn test_read_without_connect_is_unavailable() {
        let client = SftpClient::new(SftpConfig::new("sftp.invalid", "etl"));
        let err = client.get_file_data("/in/a.csv").await.unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::TransportUnavailable {
                source_type: SourceType::Sftp,
                ..
            }
        ));
    }
}
