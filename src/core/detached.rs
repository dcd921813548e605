//! # Fire-and-forget execution with an explicit logging continuation.
//!
//! [`spawn_detached`] runs a future nobody is going to await, and makes sure its
//! failure still ends up somewhere:
//!
//! ```text
//! fut ──► Ok(())                 → nothing
//!     ──► Err(Canceled)          → TaskCanceled (Debug)
//!     ──► Err(Fail/Fatal/...)    → DetachedFailed (Error)
//!     ──► panic                  → DetachedFailed (Error, reason = panic payload)
//! ```
//!
//! The returned [`JoinHandle`] never yields an error and can be awaited to wait for
//! the continuation itself.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind, LogCategory};
use crate::tasks::{Outcome, panic_message};

/// Spawns `fut` and logs its failure to `bus` under `category`.
///
/// Must be called from within a tokio runtime.
///
/// # Example
/// ```rust
/// use taskgate::{spawn_detached, Bus, LogCategory, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = Bus::default();
/// let mut rx = bus.subscribe();
/// spawn_detached(&bus, "flush", LogCategory::TASK, async { Err(TaskError::fail("io")) })
///     .await
///     .unwrap();
/// assert_eq!(rx.recv().await.unwrap().reason.as_deref(), Some("execution failed: io"));
/// # }
/// ```
pub fn spawn_detached<Fut>(
    bus: &Bus,
    label: impl Into<Arc<str>>,
    category: LogCategory,
    fut: Fut,
) -> JoinHandle<()>
where
    Fut: Future<Output = Outcome> + Send + 'static,
{
    let bus = bus.clone();
    let label: Arc<str> = label.into();

    tokio::spawn(async move {
        let res = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => {
                bus.publish(
                    Event::new(EventKind::DetachedFailed)
                        .with_task(label)
                        .with_category(category)
                        .with_reason(panic_message(&*panic)),
                );
                return;
            }
        };

        match res {
            Ok(()) => {}
            Err(e) if e.is_cancellation() => {
                bus.publish_with(|| {
                    Event::new(EventKind::TaskCanceled)
                        .with_task(Arc::clone(&label))
                        .with_category(category)
                });
            }
            Err(e) => {
                bus.publish(
                    Event::new(EventKind::DetachedFailed)
                        .with_task(label)
                        .with_category(category)
                        .with_reason(e.to_string()),
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::events::LogLevel;

    async fn explode() -> Outcome {
        panic!("bad state")
    }

    #[tokio::test]
    async fn success_is_silent() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        spawn_detached(&bus, "ok", LogCategory::TASK, async { Ok(()) })
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancellation_is_debug() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        spawn_detached(&bus, "c", LogCategory::DEBOUNCE, async {
            Err(TaskError::Canceled)
        })
        .await
        .unwrap();

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::TaskCanceled);
        assert_eq!(ev.level, LogLevel::Debug);
        assert_eq!(ev.category, LogCategory::DEBOUNCE);
    }

    #[tokio::test]
    async fn panic_is_logged_not_propagated() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let handle = spawn_detached(&bus, "boom", LogCategory::TASK, explode());
        assert!(handle.await.is_ok());

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::DetachedFailed);
        assert_eq!(ev.level, LogLevel::Error);
        assert_eq!(ev.task.as_deref(), Some("boom"));
        assert_eq!(ev.reason.as_deref(), Some("bad state"));
    }
}
