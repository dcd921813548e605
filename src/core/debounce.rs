//! # DebouncedTask: run an action once triggers stop arriving.
//!
//! Every [`DebouncedTask::start`] (re)schedules the action to run after a quiet
//! period. A trigger that arrives while the previous one is still waiting cancels
//! it, so a burst of triggers produces a single invocation.
//!
//! ```text
//! start(d) ──► lock pending
//!              ├─ previous run pending → cancel + DebounceSuperseded → await its teardown
//!              └─ new token → DebounceScheduled
//!                   └─ spawn_detached {
//!                        delay(d, token)   ── cancelled → TaskCanceled (debug), no action
//!                        DebounceFired → action()  (inline, or on a blocking thread)
//!                      }                   ── Err / panic → DetachedFailed (error)
//! ```
//!
//! ## Rules
//! - Concurrent `start` calls are serialized; each one supersedes the one before it.
//! - Cancellation only prevents the action; once it is running it completes.
//! - Action failures are logged, never returned to the caller of `start`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::detached::spawn_detached;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind, LogCategory};
use crate::policies::Launch;
use crate::tasks::{DelayRef, Outcome, TokioDelay, panic_message};

type Action = Arc<dyn Fn() -> Outcome + Send + Sync>;

#[derive(Default)]
struct Pending {
    handle: Option<JoinHandle<()>>,
    token: CancellationToken,
}

/// Debounced runner for a synchronous action.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use taskgate::{Bus, DebouncedTask};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let save = DebouncedTask::new("save-settings", Bus::default(), || {
///     // write the file
///     Ok(())
/// });
///
/// for _ in 0..10 {
///     save.start(Duration::from_millis(20)).await; // only the last one fires
/// }
/// tokio::time::sleep(Duration::from_millis(50)).await;
/// assert!(!save.is_pending().await);
/// # }
/// ```
pub struct DebouncedTask {
    label: Arc<str>,
    bus: Bus,
    delay: DelayRef,
    launch: Launch,
    action: Action,
    pending: Mutex<Pending>,
}

impl DebouncedTask {
    /// Creates a debouncer for `action`, identified by `label` in events.
    pub fn new<A>(label: impl Into<Arc<str>>, bus: Bus, action: A) -> Self
    where
        A: Fn() -> Outcome + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            bus,
            delay: Arc::new(TokioDelay),
            launch: Launch::Inline,
            action: Arc::new(action),
            pending: Mutex::new(Pending::default()),
        }
    }

    /// Replaces the delay source.
    #[must_use]
    pub fn with_delay(mut self, delay: DelayRef) -> Self {
        self.delay = delay;
        self
    }

    /// Chooses where the action runs once the quiet period elapses.
    #[must_use]
    pub fn with_launch(mut self, launch: Launch) -> Self {
        self.launch = launch;
        self
    }

    /// Label used in events.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Schedules the action to run after `delay`, superseding any pending run.
    ///
    /// Returns once the new run is scheduled. If the superseded run had already
    /// started its action, this waits for the action to finish first.
    pub async fn start(&self, delay: Duration) {
        let mut pending = self.pending.lock().await;
        self.retire(&mut pending).await;

        pending.token = CancellationToken::new();
        self.bus.publish_with(|| {
            Event::new(EventKind::DebounceScheduled)
                .with_task(Arc::clone(&self.label))
                .with_delay(delay)
        });

        let run = DelayedRun {
            label: Arc::clone(&self.label),
            bus: self.bus.clone(),
            delay: Arc::clone(&self.delay),
            launch: self.launch,
            action: Arc::clone(&self.action),
            token: pending.token.clone(),
        };
        pending.handle = Some(spawn_detached(
            &self.bus,
            Arc::clone(&self.label),
            LogCategory::DEBOUNCE,
            run.execute(delay),
        ));
    }

    /// Drops the pending run, if any, without scheduling a new one.
    pub async fn cancel(&self) {
        let mut pending = self.pending.lock().await;
        self.retire(&mut pending).await;
    }

    /// Returns true while a scheduled run has not finished (waiting or executing).
    pub async fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .await
            .handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    async fn retire(&self, pending: &mut Pending) {
        let Some(handle) = pending.handle.take() else {
            return;
        };
        if !handle.is_finished() {
            pending.token.cancel();
            self.bus.publish_with(|| {
                Event::new(EventKind::DebounceSuperseded).with_task(Arc::clone(&self.label))
            });
        }
        // The continuation logs its own failures and never panics.
        let _ = handle.await;
    }
}

/// Everything a scheduled run needs, detached from the controller.
struct DelayedRun {
    label: Arc<str>,
    bus: Bus,
    delay: DelayRef,
    launch: Launch,
    action: Action,
    token: CancellationToken,
}

impl DelayedRun {
    async fn execute(self, delay: Duration) -> Outcome {
        self.delay.delay(delay, &self.token).await?;
        if self.token.is_cancelled() {
            return Err(TaskError::Canceled);
        }

        self.bus
            .publish_with(|| Event::new(EventKind::DebounceFired).with_task(Arc::clone(&self.label)));

        match self.launch {
            Launch::Inline => (self.action)(),
            Launch::Threaded => {
                let action = self.action;
                match tokio::task::spawn_blocking(move || action()).await {
                    Ok(res) => res,
                    Err(e) if e.is_panic() => Err(TaskError::Panicked {
                        info: panic_message(&*e.into_panic()),
                    }),
                    Err(_) => Err(TaskError::Canceled),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogLevel;
    use crate::tasks::InstantDelay;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast::Receiver;
    use tokio::time::{Instant, sleep};

    fn counting(bus: &Bus) -> (DebouncedTask, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let task = DebouncedTask::new("save", bus.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (task, calls)
    }

    fn kinds(rx: &mut Receiver<Event>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn burst_coalesces_into_one_invocation() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let fired_at = Arc::new(StdMutex::new(Vec::new()));
        let log = fired_at.clone();
        let task = DebouncedTask::new("save", bus.clone(), move || {
            log.lock().unwrap().push(Instant::now());
            Ok(())
        });

        let t0 = Instant::now();
        for _ in 0..5 {
            task.start(Duration::from_millis(100)).await;
            sleep(Duration::from_millis(10)).await;
        }
        sleep(Duration::from_millis(500)).await;

        let fired_at = fired_at.lock().unwrap();
        assert_eq!(fired_at.len(), 1);
        // Last trigger at 40ms plus the 100ms quiet period.
        let elapsed = fired_at[0] - t0;
        assert!(elapsed >= Duration::from_millis(140), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(150), "{elapsed:?}");

        let kinds = kinds(&mut rx);
        let count = |k: EventKind| kinds.iter().filter(|&&x| x == k).count();
        assert_eq!(count(EventKind::DebounceScheduled), 5);
        assert_eq!(count(EventKind::DebounceSuperseded), 4);
        assert_eq!(count(EventKind::DebounceFired), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_triggers_each_fire() {
        let bus = Bus::new(16);
        let (task, calls) = counting(&bus);

        task.start(Duration::from_millis(50)).await;
        sleep(Duration::from_millis(100)).await;
        assert!(!task.is_pending().await);
        task.start(Duration::from_millis(50)).await;
        sleep(Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_invocation() {
        let bus = Bus::new(16);
        let (task, calls) = counting(&bus);

        task.start(Duration::from_millis(100)).await;
        assert!(task.is_pending().await);
        task.cancel().await;
        assert!(!task.is_pending().await);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn action_failure_is_logged_not_returned() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task = DebouncedTask::new("flaky", bus.clone(), || Err(TaskError::fail("disk full")));

        task.start(Duration::from_millis(10)).await;
        sleep(Duration::from_millis(50)).await;

        let events: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let ev = events
            .iter()
            .find(|e| e.kind == EventKind::DetachedFailed)
            .unwrap();
        assert_eq!(ev.level, LogLevel::Error);
        assert_eq!(ev.category, LogCategory::DEBOUNCE);
        assert_eq!(ev.task.as_deref(), Some("flaky"));
    }

    #[tokio::test]
    async fn instant_delay_fires_without_waiting() {
        let bus = Bus::new(16);
        let (task, calls) = counting(&bus);
        let task = task.with_delay(Arc::new(InstantDelay));

        // The second trigger supersedes the first before it gets polled.
        task.start(Duration::from_secs(3600)).await;
        task.start(Duration::from_secs(3600)).await;
        while task.is_pending().await {
            tokio::task::yield_now().await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn threaded_action_runs_off_scheduler() {
        let bus = Bus::new(16);
        let (task, calls) = counting(&bus);
        let task = task.with_launch(Launch::Threaded);

        for _ in 0..5 {
            task.start(Duration::from_millis(30)).await;
        }
        sleep(Duration::from_millis(200)).await;
        assert!(!task.is_pending().await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
