// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Backup status publication
//
// A single writer owns the state; frontends hold watch receivers and
// render whatever snapshot is current on their own thread.

use crate::types::{BackupStatus, ClientState};
use tokio::sync::watch;

pub struct StatusReporter {
    tx: watch::Sender<BackupStatus>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(BackupStatus::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<BackupStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> BackupStatus {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> ClientState {
        self.tx.borrow().state
    }

    /// Update the description, keeping the state
    pub fn describe(&self, description: impl Into<String>) {
        let description = description.into();
        tracing::debug!("{}", description);
        self.tx.send_modify(|status| status.description = description);
    }

    /// Move to `state`. Only the orchestrator drives state changes.
    pub(crate) fn transition(&self, state: ClientState, description: impl Into<String>) {
        let description = description.into();
        tracing::info!("Backup state -> {:?}: {}", state, description);
        self.tx.send_replace(BackupStatus { state, description });
    }

    /// Atomically leave `Init` for `Connecting`. False if a run already began.
    pub(crate) fn begin(&self, description: &str) -> bool {
        let started = self.tx.send_if_modified(|status| {
            if status.state != ClientState::Init {
                return false;
            }
            status.state = ClientState::Connecting;
            status.description = description.to_string();
            true
        });
        if started {
            tracing::info!("Backup state -> Connecting: {}", description);
        }
        started
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}
