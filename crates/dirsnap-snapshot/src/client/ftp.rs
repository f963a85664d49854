//! FTP access through `suppaftp`.

use super::{run_blocking, FileAccessClient};
use crate::config::{FtpConfig, SourceType};
use crate::record::ListingEntry;
use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use std::fmt;
use std::net::ToSocketAddrs;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use suppaftp::list::{File, ParseError};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, info};

type StreamSlot = Arc<Mutex<Option<FtpStream>>>;

/// Lists and reads files on an FTP server.
///
/// One control connection is kept open and reused across calls.
///
/// Directories are listed with `MLSD`, whose `modify` fact is an exact UTC
/// time. Servers that reject `MLSD` are listed with `LIST`, and each file's
/// time is then taken from `MDTM` where the server answers it, because `LIST`
/// drops the year for recent files and the time of day for older ones.
pub struct FtpClient {
    config: Arc<FtpConfig>,
    stream: StreamSlot,
    mlsd_supported: Arc<AtomicBool>,
}

impl FtpClient {
    pub fn new(config: FtpConfig) -> Self {
        Self {
            config: Arc::new(config),
            stream: Arc::new(Mutex::new(None)),
            mlsd_supported: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Command used to list a directory, and the line format it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingFormat {
    Mlsd,
    List,
}

impl ListingFormat {
    fn parse(self, line: &str) -> Result<File, ParseError> {
        match self {
            Self::Mlsd => File::from_mlsx_line(line),
            Self::List => File::from_str(line),
        }
    }
}

impl fmt::Display for ListingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mlsd => "MLSD",
            Self::List => "LIST",
        })
    }
}

fn unavailable(message: impl Into<String>) -> SnapshotError {
    SnapshotError::transport_unavailable(SourceType::Ftp, message)
}

fn lock(slot: &StreamSlot) -> SnapshotResult<MutexGuard<'_, Option<FtpStream>>> {
    slot.lock()
        .map_err(|e| unavailable(format!("connection lock poisoned: {e}")))
}

fn open(config: &FtpConfig) -> SnapshotResult<FtpStream> {
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| unavailable(format!("cannot resolve {}: {e}", config.host)))?
        .next()
        .ok_or_else(|| unavailable(format!("no address for {}", config.host)))?;

    let mut stream = FtpStream::connect_timeout(addr, config.timeout())
        .map_err(|e| unavailable(format!("cannot connect to {addr}: {e}")))?;

    let socket = stream.get_ref();
    socket
        .set_read_timeout(Some(config.timeout()))
        .and_then(|_| socket.set_write_timeout(Some(config.timeout())))
        .map_err(|e| unavailable(format!("cannot set timeouts: {e}")))?;

    let user = config.username.as_deref().unwrap_or("anonymous");
    let password = config.password.as_deref().unwrap_or("");
    stream
        .login(user, password)
        .map_err(|e| unavailable(format!("login as {user} failed: {e}")))?;
    stream
        .transfer_type(FileType::Binary)
        .map_err(|e| unavailable(format!("cannot switch to binary mode: {e}")))?;

    Ok(stream)
}

/// Turn listing output into entries for regular files.
///
/// Directory totals and blank lines are ignored. Other lines that do not
/// parse are skipped, but a listing where no line parses at all is an
/// error: the server speaks a format this client does not understand.
fn entries_from_lines(
    path: &str,
    lines: &[String],
    format: ListingFormat,
) -> SnapshotResult<Vec<ListingEntry>> {
    let mut listed = 0usize;
    let mut parsed = 0usize;
    let mut entries = Vec::new();

    for line in lines {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with("total ") {
            continue;
        }
        listed += 1;

        match format.parse(line) {
            Ok(file) => {
                parsed += 1;
                if file.is_file() {
                    entries.push(ListingEntry::new(
                        file.name(),
                        file.size() as i64,
                        file.modified(),
                    ));
                }
            }
            Err(e) => {
                debug!(path, %format, line, error = %e, "Skipping unparsable listing line")
            }
        }
    }

    if listed > 0 && parsed == 0 {
        return Err(SnapshotError::listing(
            path,
            format!("none of the {listed} {format} lines could be parsed"),
        ));
    }
    Ok(entries)
}

/// Replace `LIST` times with `MDTM` times.
///
/// Gives up if the server does not answer `MDTM` for the first file.
fn refine_with_mdtm(stream: &mut FtpStream, dir: &str, entries: &mut [ListingEntry]) {
    let mut refined = 0usize;
    for entry in entries.iter_mut() {
        let file_path = dirsnap_util::path::join(dir, &entry.name);
        match stream.mdtm(&file_path) {
            Ok(modified) => {
                entry.last_modified = modified.and_utc().into();
                refined += 1;
            }
            Err(e) if refined == 0 => {
                debug!(path = %file_path, error = %e, "MDTM unavailable, keeping LIST times");
                return;
            }
            Err(e) => debug!(path = %file_path, error = %e, "MDTM failed, keeping LIST time"),
        }
    }
}

fn list_directory(
    stream: &mut FtpStream,
    path: &str,
    mlsd_supported: &AtomicBool,
) -> SnapshotResult<Vec<ListingEntry>> {
    let tried_mlsd = mlsd_supported.load(Ordering::Relaxed);
    if tried_mlsd {
        match stream.mlsd(Some(path)) {
            Ok(lines) => return entries_from_lines(path, &lines, ListingFormat::Mlsd),
            Err(e @ FtpError::UnexpectedResponse(_)) => {
                debug!(path, error = %e, "MLSD rejected, trying LIST");
            }
            Err(e) => return Err(SnapshotError::listing(path, e)),
        }
    }

    let lines = stream
        .list(Some(path))
        .map_err(|e| SnapshotError::listing(path, e))?;
    if tried_mlsd {
        // MLSD failed where LIST works, so the server lacks MLSD.
        mlsd_supported.store(false, Ordering::Relaxed);
        info!(path, "Server does not support MLSD, listing with LIST");
    }

    let mut entries = entries_from_lines(path, &lines, ListingFormat::List)?;
    refine_with_mdtm(stream, path, &mut entries);
    Ok(entries)
}

#[async_trait]
impl FileAccessClient for FtpClient {
    fn source_type(&self) -> SourceType {
        SourceType::Ftp
    }

    async fn connect(&self) -> SnapshotResult<()> {
        let config = Arc::clone(&self.config);
        let slot = Arc::clone(&self.stream);

        run_blocking(SourceType::Ftp, move || {
            let mut guard = lock(&slot)?;
            if let Some(stream) = guard.as_mut() {
                if stream.noop().is_ok() {
                    return Ok(());
                }
                debug!(host = %config.host, "FTP connection went stale, reconnecting");
                *guard = None;
            }

            *guard = Some(open(&config)?);
            info!(host = %config.host, port = config.port, "Connected to FTP server");
            Ok(())
        })
        .await
    }

    async fn list(&self, path: &str) -> SnapshotResult<Vec<ListingEntry>> {
        let slot = Arc::clone(&self.stream);
        let mlsd_supported = Arc::clone(&self.mlsd_supported);
        let path = path.to_string();

        run_blocking(SourceType::Ftp, move || {
            let mut guard = lock(&slot)?;
            let stream = guard.as_mut().ok_or_else(|| unavailable("not connected"))?;
            let entries = list_directory(stream, &path, &mlsd_supported)?;
            debug!(path = %path, files = entries.len(), "Listed FTP directory");
            Ok(entries)
        })
        .await
    }

    async fn get_file_data(&self, path: &str) -> SnapshotResult<Vec<u8>> {
        let slot = Arc::clone(&self.stream);
        let path = path.to_string();

        run_blocking(SourceType::Ftp, move || {
            let mut guard = lock(&slot)?;
            let stream = guard.as_mut().ok_or_else(|| unavailable("not connected"))?;
            let data = stream
                .retr_as_buffer(&path)
                .map_err(|e| SnapshotError::read(&path, e))?;
            Ok(data.into_inner())
        })
        .await
    }
}
