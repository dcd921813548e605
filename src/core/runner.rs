//! # Awaiting work against a deadline.
//!
//! Races a future against a [`Delay`] and reports who won. The loser is never leaked:
//! the deadline timer is cancelled as soon as the race is decided, and the awaited
//! future is borrowed, so on timeout it stays with the caller to reconcile.
//!
//! ## Flow
//! ```text
//! await_with_timeout(op, deadline):
//!   select { op completes → settle(outcome) → Ok(true)
//!          , delay fires  → Ok(false)            (op left running) }
//!   timer token cancelled
//!
//! run_with_timeout(work, deadline):
//!   launch work(token) → await_with_timeout
//!     ├─ true  → Ok(())
//!     └─ false → token.cancel() → publish TimeoutHit
//!                → await work unconditionally → Err(TaskTimedOut)
//! ```
//!
//! ## Rules
//! - Cancellation outcomes of the awaited work are published (`TaskCanceled`) and swallowed
//! - Any other failure is returned as [`ControllerError::Task`]
//! - Work that ignores its signal after a timeout makes `run_with_timeout` wait for it

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ControllerError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::Launch;
use crate::tasks::{Delay, Operation, Outcome};

/// Awaits `op` for at most `timeout`.
///
/// Returns `Ok(true)` if `op` completed first and `Ok(false)` if the deadline elapsed
/// first. In the latter case `op` is left untouched and may still be polled again.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use taskgate::{await_with_timeout, Bus, TaskError, TokioDelay};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = Bus::default();
/// let mut op = Box::pin(async { Ok::<(), TaskError>(()) });
/// let done = await_with_timeout(&mut op, "ping", Duration::from_secs(1), &TokioDelay, &bus)
///     .await
///     .unwrap();
/// assert!(done);
/// # }
/// ```
pub async fn await_with_timeout<F>(
    op: &mut F,
    label: &str,
    timeout: Duration,
    delay: &dyn Delay,
    bus: &Bus,
) -> Result<bool, ControllerError>
where
    F: Future<Output = Outcome> + Unpin,
{
    let timer = CancellationToken::new();
    let _timer_guard = timer.clone().drop_guard();

    tokio::select! {
        biased;
        res = &mut *op => {
            settle(res, label, bus)?;
            Ok(true)
        }
        _ = delay.delay(timeout, &timer) => Ok(false),
    }
}

/// Awaits `op` for at most `timeout`, failing with [`ControllerError::TaskTimedOut`]
/// when the deadline wins.
pub async fn await_within<F>(
    op: &mut F,
    label: &str,
    timeout: Duration,
    delay: &dyn Delay,
    bus: &Bus,
) -> Result<(), ControllerError>
where
    F: Future<Output = Outcome> + Unpin,
{
    if await_with_timeout(op, label, timeout, delay, bus).await? {
        return Ok(());
    }
    publish_timeout(bus, label, timeout);
    Err(ControllerError::TaskTimedOut {
        label: label.into(),
        timeout,
    })
}

/// Launches `work` with a fresh signal and awaits it for at most `timeout`.
///
/// On timeout the signal is raised and the work is awaited unconditionally; once it
/// exits, the call fails with [`ControllerError::TaskTimedOut`]. A non-cancellation
/// failure reported by the work takes precedence over the timeout.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use taskgate::{run_with_timeout, Bus, ControllerError, Launch, TaskError, TokioDelay};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = Bus::default();
/// let res = run_with_timeout(
///     "slow",
///     Launch::Inline,
///     Duration::from_millis(10),
///     &TokioDelay,
///     &bus,
///     |token| async move {
///         token.cancelled().await;
///         Err(TaskError::Canceled)
///     },
/// )
/// .await;
/// assert!(matches!(res, Err(ControllerError::TaskTimedOut { .. })));
/// # }
/// ```
pub async fn run_with_timeout<F, Fut>(
    label: &str,
    launch: Launch,
    timeout: Duration,
    delay: &dyn Delay,
    bus: &Bus,
    work: F,
) -> Result<(), ControllerError>
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    if label.is_empty() {
        return Err(ControllerError::EmptyLabel);
    }
    bus.publish_with(|| {
        Event::new(EventKind::TaskStarting)
            .with_task(label)
            .with_reason(launch.as_str())
    });

    let token = CancellationToken::new();
    let op = Operation::launch(launch, token.clone(), work);
    let mut outcome = op.outcome();

    if await_with_timeout(&mut outcome, label, timeout, delay, bus).await? {
        return Ok(());
    }

    token.cancel();
    publish_timeout(bus, label, timeout);
    settle(outcome.await, label, bus)?;

    Err(ControllerError::TaskTimedOut {
        label: label.into(),
        timeout,
    })
}

/// Swallows cancellation outcomes, forwards everything else.
pub(crate) fn settle(res: Outcome, label: &str, bus: &Bus) -> Result<(), TaskError> {
    match res {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancellation() => {
            bus.publish_with(|| Event::new(EventKind::TaskCanceled).with_task(label));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn publish_timeout(bus: &Bus, label: &str, timeout: Duration) {
    bus.publish(
        Event::new(EventKind::TimeoutHit)
            .with_task(label)
            .with_timeout(timeout),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{InstantDelay, TokioDelay};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::broadcast::Receiver;
    use tokio::time::Instant;

    fn kinds(rx: &mut Receiver<Event>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn completes_before_deadline() {
        let bus = Bus::new(16);
        let mut op = Box::pin(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<(), TaskError>(())
        });
        let done = await_with_timeout(&mut op, "fast", Duration::from_secs(1), &TokioDelay, &bus)
            .await
            .unwrap();
        assert!(done);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_leaves_op_pending() {
        let bus = Bus::new(16);
        let start = Instant::now();
        let mut op = Box::pin(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(TaskError::fail("late"))
        });

        let done = await_with_timeout(&mut op, "slow", Duration::from_millis(100), &TokioDelay, &bus)
            .await
            .unwrap();
        assert!(!done);
        assert!(start.elapsed() < Duration::from_secs(1));

        // The caller still owns the op and can reconcile it.
        assert_eq!(op.await, Err(TaskError::fail("late")));
    }

    #[tokio::test]
    async fn cancellation_outcome_is_swallowed_and_published() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let mut op = Box::pin(async { Err(TaskError::Canceled) });

        let done = await_with_timeout(&mut op, "c", Duration::from_secs(1), &TokioDelay, &bus)
            .await
            .unwrap();
        assert!(done);
        assert_eq!(kinds(&mut rx), vec![EventKind::TaskCanceled]);
    }

    #[tokio::test]
    async fn failure_is_propagated() {
        let bus = Bus::new(16);
        let mut op = Box::pin(async { Err(TaskError::fatal("disk")) });
        let res = await_within(&mut op, "f", Duration::from_secs(1), &TokioDelay, &bus).await;
        assert_eq!(res, Err(ControllerError::Task(TaskError::fatal("disk"))));
    }

    #[tokio::test]
    async fn await_within_reports_timeout() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let mut op = Box::pin(futures::future::pending::<Outcome>());

        let res = await_within(&mut op, "stuck", Duration::from_millis(20), &InstantDelay, &bus).await;
        assert_eq!(
            res,
            Err(ControllerError::TaskTimedOut {
                label: "stuck".into(),
                timeout: Duration::from_millis(20),
            })
        );
        assert_eq!(kinds(&mut rx), vec![EventKind::TimeoutHit]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_with_timeout_cancels_and_waits_for_work() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let exited = Arc::new(AtomicBool::new(false));
        let flag = exited.clone();

        let res = run_with_timeout(
            "sync",
            Launch::Inline,
            Duration::from_millis(100),
            &TokioDelay,
            &bus,
            move |token| async move {
                token.cancelled().await;
                tokio::time::sleep(Duration::from_millis(30)).await;
                flag.store(true, Ordering::SeqCst);
                Err(TaskError::Canceled)
            },
        )
        .await;

        assert!(matches!(res, Err(ControllerError::TaskTimedOut { .. })));
        assert!(exited.load(Ordering::SeqCst));
        assert_eq!(
            kinds(&mut rx),
            vec![
                EventKind::TaskStarting,
                EventKind::TimeoutHit,
                EventKind::TaskCanceled
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_with_timeout_passes_through_success() {
        let bus = Bus::new(16);
        let res = run_with_timeout(
            "ok",
            Launch::Inline,
            Duration::from_secs(1),
            &TokioDelay,
            &bus,
            |_| async { Ok(()) },
        )
        .await;
        assert_eq!(res, Ok(()));
    }

    #[tokio::test]
    async fn run_with_timeout_rejects_empty_label() {
        let bus = Bus::new(16);
        let res = run_with_timeout("", Launch::Inline, Duration::from_secs(1), &TokioDelay, &bus, |_| async {
            Ok(())
        })
        .await;
        assert_eq!(res, Err(ControllerError::EmptyLabel));
    }
}
