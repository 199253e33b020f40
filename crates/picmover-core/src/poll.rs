// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Interval polling

use crate::types::AppError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Invoke `probe` every `interval` until it produces a value.
///
/// `Ok(Some(_))` from the probe ends the loop, `Ok(None)` waits one interval
/// and probes again, and `Err` ends the loop with that error. The token is
/// honoured while a probe is in flight and while sleeping. With a `limit`,
/// the loop fails with `Timeout` once that much time has passed without the
/// probe finishing.
///
/// Returns the probe's value and how many times the probe ran.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    limit: Option<Duration>,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<(T, u32), AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, AppError>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        attempts += 1;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            outcome = probe() => outcome?,
        };
        if let Some(value) = outcome {
            return Ok((value, attempts));
        }

        if let Some(limit) = limit {
            if started.elapsed() >= limit {
                return Err(AppError::Timeout(format!(
                    "still waiting after {} polls ({:?})",
                    attempts, limit
                )));
            }
        }

        tracing::trace!("poll attempt {} not done, sleeping {:?}", attempts, interval);
        tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            _ = sleep(interval) => {}
        }
    }
}
