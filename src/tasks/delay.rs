//! # Cancellable delay capability.
//!
//! [`Delay`] abstracts "wait for a duration, abortable by a [`CancellationToken`]".
//! Controllers take it as an injected `Arc<dyn Delay>` so tests can swap the clock:
//!
//! - [`TokioDelay`]: `tokio::time::sleep`, the default;
//! - [`InstantDelay`]: completes immediately unless already cancelled.
//!
//! ## Rules
//! - A delay that is cancelled returns `Err(TaskError::Canceled)`.
//! - A delay whose token is already cancelled never waits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to a delay implementation.
pub type DelayRef = Arc<dyn Delay>;

/// # Cancellable wait.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use taskgate::{Delay, TaskError};
///
/// /// Waits twice as long as requested.
/// struct Sluggish;
///
/// #[async_trait]
/// impl Delay for Sluggish {
///     async fn delay(&self, d: Duration, cancel: &CancellationToken) -> Result<(), TaskError> {
///         tokio::select! {
///             _ = tokio::time::sleep(d * 2) => Ok(()),
///             _ = cancel.cancelled() => Err(TaskError::Canceled),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Delay: Send + Sync + 'static {
    /// Waits for `duration` unless `cancel` fires first.
    async fn delay(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), TaskError>;
}

/// Delay backed by `tokio::time::sleep`.
///
/// Honors a paused tokio clock, which makes it deterministic under `test-util`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn delay(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), TaskError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TaskError::Canceled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// Delay that never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantDelay;

#[async_trait]
impl Delay for InstantDelay {
    async fn delay(&self, _duration: Duration, cancel: &CancellationToken) -> Result<(), TaskError> {
        if cancel.is_cancelled() {
            Err(TaskError::Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn tokio_delay_waits_full_duration() {
        let start = Instant::now();
        TokioDelay
            .delay(Duration::from_millis(250), &CancellationToken::new())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_delay_aborts_on_cancel() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let res = TokioDelay.delay(Duration::from_secs(60), &token).await;
        assert_eq!(res, Err(TaskError::Canceled));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn instant_delay_respects_prior_cancel() {
        let token = CancellationToken::new();
        assert_eq!(InstantDelay.delay(Duration::from_secs(5), &token).await, Ok(()));
        token.cancel();
        assert_eq!(
            InstantDelay.delay(Duration::from_secs(5), &token).await,
            Err(TaskError::Canceled)
        );
    }
}
