// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Batched upload
//
// Assets go to the server in fixed-size batches, strictly one after
// another. Each batch is a task on the server that we poll until it
// finishes and reports which of its items failed.

use crate::assets::{encode_batch, SharedAsset};
use crate::client::PeerClient;
use crate::failures::FailureTracker;
use crate::poll::poll_until;
use crate::status::StatusReporter;
use crate::types::{AppError, ClientSettings, Session, TaskStatus, UploadTask};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Split `items` into consecutive batches of at most `size`, in order
pub fn batches<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

/// What a completed upload did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub batches: usize,
    /// Items whose content was sent to the server
    pub submitted: usize,
    /// Items that could not be read locally
    pub unreadable: usize,
    /// Items the server reported as failed
    pub rejected: usize,
}

impl UploadSummary {
    pub fn failed(&self) -> usize {
        self.unreadable + self.rejected
    }
}

pub struct BatchUploader {
    client: PeerClient,
    tracker: Arc<FailureTracker>,
    batch_size: usize,
    poll_interval: Duration,
    task_timeout: Option<Duration>,
}

impl BatchUploader {
    pub fn new(client: PeerClient, tracker: Arc<FailureTracker>, settings: &ClientSettings) -> Self {
        Self {
            client,
            tracker,
            batch_size: settings.batch_size,
            poll_interval: settings.poll_interval(),
            task_timeout: settings.task_timeout(),
        }
    }

    /// Upload every item, batch by batch. Stops at the first batch that
    /// hits a transport or protocol error.
    pub async fn upload(
        &self,
        session: &Session,
        items: &[SharedAsset],
        status: &StatusReporter,
        cancel: &CancellationToken,
    ) -> Result<UploadSummary, AppError> {
        let mut summary = UploadSummary::default();
        let total = items.len();
        tracing::info!(
            "Uploading {} items in batches of {}",
            total,
            self.batch_size
        );

        for (index, batch) in batches(items, self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let start = index * self.batch_size;
            let end = start + batch.len();
            status.describe(format!("Uploading photos from {} to {}", start, end));

            let result = self.upload_one(session, batch, cancel, &mut summary).await;
            // Whatever was learned about this batch is kept even if it aborted
            self.tracker.save();
            result?;

            summary.batches += 1;
        }

        tracing::info!(
            "Upload finished: {} batches, {} sent, {} failed",
            summary.batches,
            summary.submitted,
            summary.failed()
        );
        Ok(summary)
    }

    async fn upload_one(
        &self,
        session: &Session,
        batch: &[SharedAsset],
        cancel: &CancellationToken,
        summary: &mut UploadSummary,
    ) -> Result<(), AppError> {
        let owned = batch.to_vec();
        let encoded = tokio::task::spawn_blocking(move || encode_batch(&owned))
            .await
            .map_err(|e| AppError::FileIo(format!("Encoding task failed: {}", e)))?;

        for &position in &encoded.unreadable {
            self.tracker.add(batch[position].id());
        }
        summary.unreadable += encoded.unreadable.len();

        let records = &encoded.records;
        let task_id = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            id = self.client.upload_batch(session.connect_id, records) => id?,
        };
        tracing::debug!("Batch of {} records is task {}", records.len(), task_id);
        summary.submitted += records.len();

        let task = self.wait_for_task(task_id, cancel).await?;

        // Indices the server reports refer to the records it received
        let failed: HashSet<usize> = task
            .result
            .iter()
            .filter_map(|&i| {
                let index = usize::try_from(i).ok().filter(|&p| p < records.len());
                if index.is_none() {
                    tracing::warn!("Task {} reported out of range index {}", task_id, i);
                }
                index
            })
            .collect();

        // Removals first so an identifier that failed anywhere in the batch stays tracked
        for (index, &position) in encoded.positions.iter().enumerate() {
            if !failed.contains(&index) {
                self.tracker.remove(batch[position].id());
            }
        }
        for &index in &failed {
            self.tracker.add(batch[encoded.positions[index]].id());
        }
        for &position in &encoded.unreadable {
            self.tracker.add(batch[position].id());
        }
        summary.rejected += failed.len();

        Ok(())
    }

    async fn wait_for_task(
        &self,
        task_id: i64,
        cancel: &CancellationToken,
    ) -> Result<UploadTask, AppError> {
        let client = &self.client;

        let (task, polls) = poll_until(
            self.poll_interval,
            self.task_timeout,
            cancel,
            move || async move {
                let task = client.task_status(task_id).await?;
                Ok((task.status == TaskStatus::Finished).then_some(task))
            },
        )
        .await?;

        tracing::debug!("Task {} finished after {} polls", task_id, polls);
        Ok(task)
    }
}
