//! Channel configuration.
//!
//! A channel is one configured source of files: an identifier, a transport
//! and the transport's connection settings. Configuration files are JSON
//! with optional comments and support variable substitution so that
//! credentials need not be written down:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents (relative to the config file)

use crate::{SnapshotError, SnapshotResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Default interval between two scheduled snapshots, in seconds.
///
/// One second is the smallest gap between two runs of a scheduled job, so
/// the interval has to stay above it.
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.1;

/// Default I/O timeout for remote transports, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

static VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn var_regex() -> &'static regex::Regex {
    VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\{(env|file):([^}]+)\}")
            .expect("substitution pattern is valid")
    })
}

/// Transport a channel reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Ftp,
    Sftp,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Local => "local",
            SourceType::Ftp => "ftp",
            SourceType::Sftp => "sftp",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_ftp_port() -> u16 {
    21
}

fn default_sftp_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_poll_interval() -> f64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// FTP connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpConfig {
    pub host: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    /// Anonymous login when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl FtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_ftp_port(),
            username: None,
            password: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// SFTP connection settings.
///
/// Authentication uses the password when set, otherwise the key file,
/// otherwise the ssh-agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SftpConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_passphrase: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SftpConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_sftp_port(),
            username: username.into(),
            password: None,
            key_path: None,
            key_passphrase: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Channel identifiers are often numeric database IDs; accept both forms.
fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// One configured channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel identifier, part of every store key.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,

    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub source_type: SourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ftp: Option<FtpConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sftp: Option<SftpConfig>,

    /// Directories watched by this channel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    /// Seconds between two scheduled snapshots.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
}

impl ChannelConfig {
    fn with_source(id: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            id: id.into(),
            name: None,
            source_type,
            ftp: None,
            sftp: None,
            paths: Vec::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }

    /// A channel over the local filesystem.
    pub fn local(id: impl Into<String>) -> Self {
        Self::with_source(id, SourceType::Local)
    }

    /// A channel over FTP.
    pub fn ftp(id: impl Into<String>, ftp: FtpConfig) -> Self {
        Self {
            ftp: Some(ftp),
            ..Self::with_source(id, SourceType::Ftp)
        }
    }

    /// A channel over SFTP.
    pub fn sftp(id: impl Into<String>, sftp: SftpConfig) -> Self {
        Self {
            sftp: Some(sftp),
            ..Self::with_source(id, SourceType::Sftp)
        }
    }

    /// Store key for a directory watched by this channel.
    ///
    /// Unique per channel and directory: `"<channel-id>; <path>"`.
    pub fn store_key(&self, path: &str) -> String {
        format!("{}; {}", self.id, path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    /// Check that the settings needed by the source type are present.
    pub fn validate(&self) -> SnapshotResult<()> {
        if self.id.trim().is_empty() {
            return Err(SnapshotError::config("channel id cannot be empty"));
        }
        if !self.poll_interval_secs.is_finite() || self.poll_interval_secs <= 1.0 {
            return Err(SnapshotError::config(format!(
                "poll_interval_secs must be more than 1 second, got {}",
                self.poll_interval_secs
            )));
        }

        let missing = |block: &str| {
            SnapshotError::config(format!("channel {}: missing `{block}` settings", self.id))
        };

        match self.source_type {
            SourceType::Local => {}
            SourceType::Ftp => {
                let ftp = self.ftp.as_ref().ok_or_else(|| missing("ftp"))?;
                if ftp.host.trim().is_empty() {
                    return Err(SnapshotError::config("ftp host cannot be empty"));
                }
            }
            SourceType::Sftp => {
                let sftp = self.sftp.as_ref().ok_or_else(|| missing("sftp"))?;
                if sftp.host.trim().is_empty() {
                    return Err(SnapshotError::config("sftp host cannot be empty"));
                }
                if sftp.username.trim().is_empty() {
                    return Err(SnapshotError::config("sftp username cannot be empty"));
                }
            }
        }

        Ok(())
    }

    /// Load and validate a channel from a JSON or JSONC file.
    pub async fn load_file(path: &Path) -> SnapshotResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = substitute_variables(&content, path)?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse and validate a channel from JSONC content.
    pub fn parse(content: &str, source: &str) -> SnapshotResult<Self> {
        let stripped = strip_comments(content);
        let config: Self = serde_json::from_str(&stripped)
            .map_err(|e| SnapshotError::config(format!("invalid config at {source}: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Strip `//` and `/* */` comments outside of string literals.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if escape_next {
                escape_next = false;
            } else if c == '\\' {
                escape_next = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                result.push(c);
            }
            ('/', Some(&'/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            ('/', Some(&'*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    // Keep line numbers in parse errors accurate
                    if c == '\n' {
                        result.push('\n');
                    }
                    prev = c;
                }
            }
            _ => result.push(c),
        }
    }

    result
}

/// Replace `{env:VAR}` and `{file:path}` placeholders.
fn substitute_variables(content: &str, config_path: &Path) -> SnapshotResult<String> {
    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    let mut result = content.to_string();

    for cap in var_regex().captures_iter(content) {
        let (Some(full_match), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2))
        else {
            continue;
        };

        let replacement = match kind.as_str() {
            "env" => std::env::var(value.as_str()).map_err(|_| {
                SnapshotError::config(format!("environment variable {} is not set", value.as_str()))
            })?,
            "file" => {
                let file_path = config_dir.join(value.as_str());
                std::fs::read_to_string(&file_path)
                    .map(|v| v.trim().to_string())
                    .map_err(|e| {
                        SnapshotError::config(format!("cannot read {}: {e}", file_path.display()))
                    })?
            }
            _ => continue,
        };

        result = result.replace(full_match.as_str(), &json_escape(&replacement));
    }

    Ok(result)
}

/// Escape a substituted value so it stays valid inside a JSON string.
fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
