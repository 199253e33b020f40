// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Connection negotiation
//
// The server admits a client only after someone approves it on the
// server side, which may take any amount of time.

use crate::client::PeerClient;
use crate::poll::poll_until;
use crate::status::StatusReporter;
use crate::types::{AppError, ClientSettings, Session};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Negotiator {
    client: PeerClient,
    client_name: String,
    poll_interval: Duration,
    approval_timeout: Option<Duration>,
}

impl Negotiator {
    pub fn new(client: PeerClient, settings: &ClientSettings) -> Self {
        Self {
            client,
            client_name: settings.client_name.clone(),
            poll_interval: settings.poll_interval(),
            approval_timeout: settings.approval_timeout(),
        }
    }

    /// Open a session and wait until the server approves it
    pub async fn connect(
        &self,
        status: &StatusReporter,
        cancel: &CancellationToken,
    ) -> Result<Session, AppError> {
        let connect_id = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            id = self.client.connect(&self.client_name) => id?,
        };
        tracing::info!("Connected to {} as {}", self.client.base_url(), connect_id);

        let mut session = Session::pending(connect_id);

        status.describe("Waiting for server approval");
        let client = &self.client;
        let ((), polls) = poll_until(
            self.poll_interval,
            self.approval_timeout,
            cancel,
            move || async move { Ok(client.connection_status(connect_id).await?.then_some(())) },
        )
        .await
        .map_err(|e| match e {
            AppError::Timeout(_) => AppError::Timeout("server never approved the connection".into()),
            other => other,
        })?;

        session.approve();
        tracing::info!("Connection {} approved after {} polls", connect_id, polls);
        status.describe("Server approved connection");

        Ok(session)
    }
}
