// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Backup orchestration
//
// Init -> Connecting -> Uploading -> Done | Error
//
// One orchestrator drives exactly one run. Done and Error are final;
// backing up again takes a new orchestrator.

use crate::assets::{AssetLibrary, SharedAsset};
use crate::client::PeerClient;
use crate::failures::FailureTracker;
use crate::negotiator::Negotiator;
use crate::status::StatusReporter;
use crate::types::{AppError, BackupMode, BackupStatus, ClientSettings, ClientState, PeerMeta};
use crate::uploader::{BatchUploader, UploadSummary};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub struct BackupOrchestrator {
    peer: PeerMeta,
    settings: ClientSettings,
    library: Arc<dyn AssetLibrary>,
    tracker: Arc<FailureTracker>,
    status: StatusReporter,
    cancel: CancellationToken,
}

impl BackupOrchestrator {
    pub fn new(
        peer: PeerMeta,
        settings: ClientSettings,
        library: Arc<dyn AssetLibrary>,
        tracker: Arc<FailureTracker>,
    ) -> Result<Self, AppError> {
        settings.validate()?;

        Ok(Self {
            peer,
            settings,
            library,
            tracker,
            status: StatusReporter::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn peer(&self) -> &PeerMeta {
        &self.peer
    }

    pub fn tracker(&self) -> &Arc<FailureTracker> {
        &self.tracker
    }

    /// Receive a snapshot on every state or description change
    pub fn subscribe(&self) -> watch::Receiver<BackupStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> BackupStatus {
        self.status.current()
    }

    pub fn state(&self) -> ClientState {
        self.status.state()
    }

    /// Whether `run` may still be called
    pub fn can_start(&self) -> bool {
        self.state() == ClientState::Init
    }

    /// Token that aborts the run at its next suspension point
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Connect, get approval, and upload the selected assets.
    ///
    /// Fails with `InvalidState`, changing nothing, unless the orchestrator
    /// is still in `Init`.
    pub async fn run(&self, mode: BackupMode) -> Result<UploadSummary, AppError> {
        if !self.status.begin("Connecting server...") {
            return Err(AppError::InvalidState(format!(
                "backup already started (state {:?})",
                self.state()
            )));
        }

        tracing::info!(
            "Starting {:?} backup to {} ({})",
            mode,
            self.peer.name,
            self.peer.host
        );

        match self.execute(mode).await {
            Ok(summary) => {
                self.tracker.save();
                self.status
                    .transition(ClientState::Done, "Backup success");
                Ok(summary)
            }
            Err(e) => {
                self.tracker.save();
                tracing::error!("Backup failed: {}", e);
                self.status.transition(ClientState::Error, e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(&self, mode: BackupMode) -> Result<UploadSummary, AppError> {
        let client = PeerClient::for_peer(&self.peer, &self.settings)?;

        let session = Negotiator::new(client.clone(), &self.settings)
            .connect(&self.status, &self.cancel)
            .await?;

        self.status.describe("Fetching photos...");
        let items = self.select_items(mode).await?;
        tracing::info!("Selected {} photos", items.len());

        self.status
            .transition(ClientState::Uploading, "Uploading photos...");
        BatchUploader::new(client, self.tracker.clone(), &self.settings)
            .upload(&session, &items, &self.status, &self.cancel)
            .await
    }

    async fn select_items(&self, mode: BackupMode) -> Result<Vec<SharedAsset>, AppError> {
        let library = self.library.clone();
        let ids = match mode {
            BackupMode::All => None,
            BackupMode::FailedOnly => Some(self.tracker.list()),
        };

        let selection = tokio::task::spawn_blocking(move || match ids {
            None => library.all_assets(),
            Some(ids) => library.assets_with_ids(&ids),
        });

        tokio::select! {
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            joined = selection => joined
                .map_err(|e| AppError::FileIo(format!("Library scan failed: {}", e)))?,
        }
    }
}
