// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Backup engine shared by all frontends
//
// This crate provides:
// - BackupOrchestrator, the connect/approve/upload state machine
// - PeerClient for the PicMover server protocol
// - FailureTracker for assets that must be retried on a later run
// - Asset sources, discovery and settings persistence
//
// Rendering progress is left to the frontend crates.

pub mod assets;
pub mod backup;
pub mod client;
pub mod discovery;
pub mod failures;
pub mod negotiator;
pub mod poll;
pub mod settings;
pub mod status;
pub mod transport;
pub mod types;
pub mod uploader;

// Re-export commonly used items
pub use assets::{AssetLibrary, AssetRecord, DirectoryLibrary, FileAsset, MediaAsset, SharedAsset};
pub use backup::BackupOrchestrator;
pub use client::PeerClient;
pub use discovery::{lan_candidates, probe_peer, scan};
pub use failures::{FailureStore, FailureTracker, JsonFailureStore, MemoryFailureStore};
pub use negotiator::Negotiator;
pub use poll::poll_until;
pub use settings::SettingsStore;
pub use status::StatusReporter;
pub use types::{
    AppError, BackupMode, BackupStatus, ClientSettings, ClientState, PeerMeta, Session,
    TaskStatus, UploadTask, DEFAULT_BATCH_SIZE, DEFAULT_PORT,
};
pub use uploader::{batches, BatchUploader, UploadSummary};

// Re-exported so frontends need not depend on tokio-util directly
pub use tokio_util::sync::CancellationToken;
