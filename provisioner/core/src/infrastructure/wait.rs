// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cancellable waiting primitives
//!
//! [`exponential_backoff`] re-runs a condition until it yields a value, fails,
//! runs out of attempts or the cancellation token fires. Cancellation is
//! checked before anything else at every suspension point.

use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::domain::backoff::Backoff;

#[derive(Debug, Error)]
pub enum WaitError<E> {
    #[error("timed out waiting for the condition after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("wait cancelled")]
    Cancelled,

    #[error("condition failed: {0}")]
    Condition(E),
}

/// Marker returned by [`cancellable`] when the token fired first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Run `future` unless `cancel` fires first
pub async fn cancellable<F>(cancel: &CancellationToken, future: F) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        output = future => Ok(output),
    }
}

/// Poll `condition` with exponential backoff
///
/// The condition receives the 1-based attempt number and returns
/// `Ok(Some(value))` when done, `Ok(None)` to keep waiting, or `Err` to abort.
/// The first attempt runs immediately; between attempts the delay of
/// `backoff` is slept and then grown by its factor.
///
/// # Returns
/// * `Ok(T)` - Value produced by the condition
/// * `Err(WaitError::Condition)` - Condition error, returned without retrying
/// * `Err(WaitError::Timeout)` - `backoff.steps` attempts were made without success
/// * `Err(WaitError::Cancelled)` - `cancel` fired during an attempt or a delay
pub async fn exponential_backoff<T, E, F, Fut>(
    mut backoff: Backoff,
    cancel: &CancellationToken,
    mut condition: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let mut attempt = 0;

    while backoff.steps > 0 {
        attempt += 1;

        match cancellable(cancel, condition(attempt)).await {
            Err(Cancelled) => return Err(WaitError::Cancelled),
            Ok(Err(e)) => return Err(WaitError::Condition(e)),
            Ok(Ok(Some(value))) => return Ok(value),
            Ok(Ok(None)) => {}
        }

        if backoff.steps == 1 {
            break;
        }

        let delay = backoff.step();
        trace!(attempt, delay_ms = delay.as_millis() as u64, "Condition not met, backing off");

        if cancellable(cancel, tokio::time::sleep(delay)).await.is_err() {
            return Err(WaitError::Cancelled);
        }
    }

    Err(WaitError::Timeout { attempts: attempt })
}
