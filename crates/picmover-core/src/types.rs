// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Type definitions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port every PicMover server listens on
pub const DEFAULT_PORT: u16 = 54321;

/// Number of assets submitted per `/upload` request
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A server found on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMeta {
    /// Address used to reach the server (IP or hostname)
    pub host: String,
    /// Name reported by the server's `/ping` endpoint
    pub name: String,
}

impl PeerMeta {
    pub fn new(host: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
        }
    }
}

/// An approved connection to a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub connect_id: i64,
    pub approved: bool,
}

impl Session {
    pub(crate) fn pending(connect_id: i64) -> Self {
        Self {
            connect_id,
            approved: false,
        }
    }

    /// Mark the session approved. Approval is never revoked.
    pub(crate) fn approve(&mut self) {
        self.approved = true;
    }
}

/// Server-side processing state of one uploaded batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Finished,
}

impl TaskStatus {
    /// Anything other than the exact string `Finished` is still pending.
    pub fn from_wire(value: &str) -> Self {
        if value == "Finished" {
            Self::Finished
        } else {
            Self::Pending
        }
    }
}

/// Snapshot of an upload task as reported by `/status?TaskId=`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub task_id: i64,
    pub status: TaskStatus,
    /// Batch-local indices of items the server failed to store.
    /// Only meaningful once `status` is `Finished`.
    pub result: Vec<i64>,
}

/// Backup run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientState {
    Init,
    Connecting,
    Uploading,
    Done,
    Error,
}

impl ClientState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether a progress indicator should be shown
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Connecting | Self::Uploading)
    }

    /// Short label for the backup action in this state
    pub fn action_label(&self) -> &'static str {
        match self {
            Self::Init => "Start backup",
            Self::Connecting => "Connecting server",
            Self::Uploading => "Uploading pictures",
            Self::Done => "Backup done",
            Self::Error => "ERROR",
        }
    }
}

/// What observers of a backup run receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    pub state: ClientState,
    pub description: String,
}

impl Default for BackupStatus {
    fn default() -> Self {
        Self {
            state: ClientState::Init,
            description: String::new(),
        }
    }
}

/// Which assets a run uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupMode {
    /// The whole library
    #[default]
    All,
    /// Only assets recorded as failed by earlier runs
    FailedOnly,
}

/// Client settings (frontend-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    /// Port of the PicMover server (default: 54321)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Name sent to the server when asking for a connection
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// Assets per upload request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between status polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up waiting for approval after this long. None waits forever.
    #[serde(default)]
    pub approval_timeout_secs: Option<u64>,
    /// Give up waiting for a batch to finish after this long. None waits forever.
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,
    /// How long to wait for a connection or for the server to send more data
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Timeout for a discovery ping
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_client_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "picmover".to_string())
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_ping_timeout_ms() -> u64 {
    1500
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            client_name: default_client_name(),
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            approval_timeout_secs: None,
            task_timeout_secs: None,
            request_timeout_secs: default_request_timeout_secs(),
            ping_timeout_ms: default_ping_timeout_ms(),
        }
    }
}

impl ClientSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::InvalidConfig(
                "batchSize must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::InvalidConfig(
                "pollIntervalMs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn approval_timeout(&self) -> Option<Duration> {
        self.approval_timeout_secs.map(Duration::from_secs)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// Error types for the backup engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// The request could not be executed at all
    #[error("Send http request failed: {0}")]
    Transport(String),

    /// The server answered, but not in the expected shape
    #[error("{0}")]
    Protocol(String),

    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Backup cancelled")]
    Cancelled,
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileIo(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
