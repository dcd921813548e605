//! # SingleTask: one cancellable operation at a time.
//!
//! A [`SingleTask`] owns a slot for at most one running operation, the cancellation
//! signal of that operation, and a binary gate that serializes `start`/`stop`.
//! The gate can also be held by external code to freeze start/stop while it
//! processes results.
//!
//! ## State
//! ```text
//!          start (gate)                   stop (gate)
//!   Idle ────────────────► Running ─────────────────────► Idle
//!    ▲                        │ work returns on its own       ▲
//!    │                        ▼                              │
//!    └──── start replaces ── Finished ── stop reaps ─────────┘
//!
//!   GateExternallyHeld is orthogonal: while held, start/stop wait at most
//!   `max_hold` for the gate, then fail with ExternalHoldTimeout.
//! ```
//!
//! ## Stop sequence
//! ```text
//! stop_within(max):
//!   acquire gate
//!   ├─ no operation          → StopSkipped, Ok(())
//!   └─ race(max) {
//!        finished?  → AlreadyFinished   : running → CancelRequested + token.cancel()
//!        await outcome (Canceled swallowed, other failures returned)
//!        free slot → TaskStopped
//!        on_stopped callback
//!      }
//!      └─ lost race → StopTimedOut (handle stays in the slot for a later stop)
//!   release gate
//! ```
//!
//! ## Rules
//! - Runs never overlap: admission is decided under the gate.
//! - The work itself runs outside the gate; only launch and teardown are serialized.
//! - Cancellation is cooperative: `stop`'s budget bounds the *wait*, not the work.
//! - A run's failure is delivered once, to the first caller awaiting it.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskgate::{AdmissionPolicy, Bus, Config, SingleTask, TaskError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), taskgate::ControllerError> {
//! let task = SingleTask::new(Config::default(), Bus::default());
//!
//! task.start("ticker", AdmissionPolicy::FailIfRunning, |token| async move {
//!     while !token.is_cancelled() {
//!         tokio::time::sleep(Duration::from_millis(5)).await;
//!     }
//!     Err(TaskError::Canceled)
//! })
//! .await?;
//!
//! assert!(task.is_task_running());
//! task.stop_within(Duration::from_secs(1)).await?;
//! assert!(!task.is_task_running());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as Gate, MutexGuard as GateGuard, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::runner::{await_with_timeout, settle};
use crate::error::{ControllerError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{AdmissionPolicy, Launch};
use crate::tasks::{DelayRef, Operation, Outcome, TokioDelay};

/// Gate held by external code, with the budget it declared.
struct ExternalHold {
    _guard: OwnedMutexGuard<()>,
    max_hold: Duration,
}

struct State {
    operation: Option<Operation>,
    token: Option<CancellationToken>,
    label: Arc<str>,
    hold: Option<ExternalHold>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            operation: None,
            token: None,
            label: Arc::from(""),
            hold: None,
        }
    }
}

/// Single-flight controller for one cancellable operation.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct SingleTask {
    cfg: Config,
    bus: Bus,
    delay: DelayRef,
    gate: Arc<Gate<()>>,
    state: Mutex<State>,
}

impl Default for SingleTask {
    fn default() -> Self {
        let cfg = Config::default();
        let bus = cfg.bus();
        Self::new(cfg, bus)
    }
}

impl SingleTask {
    /// Creates an idle controller publishing to `bus`.
    pub fn new(cfg: Config, bus: Bus) -> Self {
        Self {
            cfg,
            bus,
            delay: Arc::new(TokioDelay),
            gate: Arc::new(Gate::new(())),
            state: Mutex::new(State::default()),
        }
    }

    /// Replaces the delay used to bound `stop`.
    #[must_use]
    pub fn with_delay(mut self, delay: DelayRef) -> Self {
        self.delay = delay;
        self
    }

    /// The bus this controller publishes to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    // ---- start -------------------------------------------------------------

    /// Launches `work` on the async scheduler and returns once it is launched.
    ///
    /// `work` receives the run's cancellation signal. Under
    /// [`AdmissionPolicy::FailIfRunning`] a busy controller rejects the call with
    /// [`ControllerError::AlreadyRunning`]; under [`AdmissionPolicy::DropIfRunning`]
    /// the call returns `Ok(())` without launching anything.
    ///
    /// Waits for the gate, so a concurrent `stop` delays the start until it completes.
    pub async fn start<F, Fut>(
        &self,
        label: impl Into<Arc<str>>,
        admission: AdmissionPolicy,
        work: F,
    ) -> Result<(), ControllerError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        self.launch(label.into(), admission, Launch::Inline, work)
            .await
            .map(|_| ())
    }

    /// Like [`start`](Self::start), but drives `work` on a blocking worker thread.
    pub async fn start_threaded<F, Fut>(
        &self,
        label: impl Into<Arc<str>>,
        admission: AdmissionPolicy,
        work: F,
    ) -> Result<(), ControllerError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        self.launch(label.into(), admission, Launch::Threaded, work)
            .await
            .map(|_| ())
    }

    /// Launches `work` and waits for it to finish.
    ///
    /// The gate is released right after launch, so `stop` can cancel the run while
    /// this call is waiting. A cancellation outcome is swallowed; any other failure
    /// is returned as [`ControllerError::Task`].
    pub async fn start_awaitable<F, Fut>(
        &self,
        label: impl Into<Arc<str>>,
        admission: AdmissionPolicy,
        work: F,
    ) -> Result<(), ControllerError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        self.launch_and_wait(label.into(), admission, Launch::Inline, work)
            .await
    }

    /// Like [`start_awaitable`](Self::start_awaitable), on a blocking worker thread.
    pub async fn start_awaitable_threaded<F, Fut>(
        &self,
        label: impl Into<Arc<str>>,
        admission: AdmissionPolicy,
        work: F,
    ) -> Result<(), ControllerError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        self.launch_and_wait(label.into(), admission, Launch::Threaded, work)
            .await
    }

    async fn launch_and_wait<F, Fut>(
        &self,
        label: Arc<str>,
        admission: AdmissionPolicy,
        launch: Launch,
        work: F,
    ) -> Result<(), ControllerError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let Some(op) = self.launch(label.clone(), admission, launch, work).await? else {
            return Ok(());
        };
        let res = op.observe().await;
        settle(res, &label, &self.bus).map_err(|e| {
            self.publish_failure(&label, &e);
            ControllerError::Task(e)
        })
    }

    /// Admission + launch under the gate. Returns the launched operation, if any.
    async fn launch<F, Fut>(
        &self,
        label: Arc<str>,
        admission: AdmissionPolicy,
        launch: Launch,
        work: F,
    ) -> Result<Option<Operation>, ControllerError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        if label.is_empty() {
            return Err(ControllerError::EmptyLabel);
        }
        let _gate = self.acquire_gate(&label).await?;

        let (token, previous) = {
            let mut st = self.lock_state();

            if st.operation.as_ref().is_some_and(|op| !op.is_finished()) {
                let running = Arc::clone(&st.label);
                return match admission {
                    AdmissionPolicy::DropIfRunning => {
                        self.bus.publish_with(|| {
                            Event::new(EventKind::StartSkipped)
                                .with_task(Arc::clone(&running))
                                .with_reason(already_running_text(&running, &label))
                        });
                        Ok(None)
                    }
                    AdmissionPolicy::FailIfRunning => Err(ControllerError::AlreadyRunning {
                        running,
                        requested: label,
                    }),
                };
            }

            let previous = st
                .operation
                .take()
                .map(|op| (op, Arc::clone(&st.label)));

            let token = CancellationToken::new();
            st.token = Some(token.clone());
            st.label = Arc::clone(&label);
            (token, previous)
        };

        // The replaced run has finished, so its outcome is at most a poll away.
        if let Some((prev, prev_label)) = previous {
            if let Some(e) = prev.take_unobserved_failure().await {
                self.bus.publish(
                    Event::new(EventKind::UnobservedFailure)
                        .with_task(prev_label)
                        .with_reason(e.to_string()),
                );
            }
        }

        self.bus.publish_with(|| {
            Event::new(EventKind::TaskStarting)
                .with_task(Arc::clone(&label))
                .with_reason(launch.as_str())
        });

        // The state lock is not held here: an inline launch calls `work` right away.
        let op = Operation::launch(launch, token, work);
        self.lock_state().operation = Some(op.clone());
        Ok(Some(op))
    }

    // ---- stop --------------------------------------------------------------

    /// Stops the current run using [`Config::stop_timeout`] as budget.
    pub async fn stop(&self) -> Result<(), ControllerError> {
        self.stop_within(self.cfg.stop_timeout).await
    }

    /// Cancels the current run and waits for it to finish, for at most `max_stop`.
    ///
    /// - Nothing to stop → `Ok(())`.
    /// - Run already finished → no cancellation; its unobserved failure is returned.
    /// - Otherwise the signal is raised and the run awaited. A cancellation outcome
    ///   is swallowed, any other failure is returned unchanged.
    ///
    /// Exceeding `max_stop` fails with [`ControllerError::StopTimedOut`]; the run
    /// keeps its slot and a later `stop` waits for it again.
    pub async fn stop_within(&self, max_stop: Duration) -> Result<(), ControllerError> {
        self.stop_inner(max_stop, async {}).await
    }

    /// Like [`stop_within`](Self::stop_within), then calls `on_stopped` after teardown,
    /// still under the gate. The callback counts against `max_stop`.
    ///
    /// The callback does not run when there was nothing to stop or the run failed.
    pub async fn stop_then<C>(&self, max_stop: Duration, on_stopped: C) -> Result<(), ControllerError>
    where
        C: FnOnce() + Send,
    {
        self.stop_inner(max_stop, async move { on_stopped() }).await
    }

    /// Like [`stop_then`](Self::stop_then) with an async callback.
    pub async fn stop_then_async<C>(
        &self,
        max_stop: Duration,
        on_stopped: C,
    ) -> Result<(), ControllerError>
    where
        C: Future<Output = ()> + Send,
    {
        self.stop_inner(max_stop, on_stopped).await
    }

    async fn stop_inner<C>(&self, max_stop: Duration, on_stopped: C) -> Result<(), ControllerError>
    where
        C: Future<Output = ()> + Send,
    {
        let waiting_for = self.current_label();
        let _gate = self.acquire_gate(&waiting_for).await?;

        // A start queued ahead of us on the gate may have replaced the run.
        let (op, token, label) = {
            let st = self.lock_state();
            (st.operation.clone(), st.token.clone(), Arc::clone(&st.label))
        };
        let Some(op) = op else {
            self.bus.publish_with(|| Event::new(EventKind::StopSkipped).with_task(Arc::clone(&label)));
            return Ok(());
        };

        let sequence = async {
            if op.is_finished() {
                self.bus
                    .publish_with(|| Event::new(EventKind::AlreadyFinished).with_task(Arc::clone(&label)));
            } else {
                self.bus
                    .publish_with(|| Event::new(EventKind::CancelRequested).with_task(Arc::clone(&label)));
                if let Some(token) = &token {
                    token.cancel();
                }
            }

            let res = settle(op.observe().await, &label, &self.bus);

            self.lock_state().operation = None;
            self.bus
                .publish_with(|| Event::new(EventKind::TaskStopped).with_task(Arc::clone(&label)));

            if let Err(e) = res {
                self.publish_failure(&label, &e);
                return Err(e);
            }
            on_stopped.await;
            Ok(())
        };
        let mut sequence = std::pin::pin!(sequence);

        if await_with_timeout(&mut sequence, &label, max_stop, self.delay.as_ref(), &self.bus).await? {
            return Ok(());
        }

        self.bus.publish(
            Event::new(EventKind::StopTimedOut)
                .with_task(Arc::clone(&label))
                .with_timeout(max_stop),
        );
        Err(ControllerError::StopTimedOut {
            label: Arc::clone(&label),
            timeout: max_stop,
        })
    }

    // ---- external gate -----------------------------------------------------

    /// Waits for the gate and keeps it until [`release_lock_externally`](Self::release_lock_externally).
    ///
    /// While held, `start`/`stop` wait at most `max_hold` for the gate and then fail
    /// with [`ControllerError::ExternalHoldTimeout`]. Forgetting to release starves
    /// every later start/stop.
    pub async fn wait_lock_externally(&self, max_hold: Duration) -> Result<(), ControllerError> {
        if self.is_lock_held_externally() {
            return Err(ControllerError::AlreadyHeld);
        }
        let guard = Arc::clone(&self.gate).lock_owned().await;
        self.install_hold(guard, max_hold);
        Ok(())
    }

    /// Like [`wait_lock_externally`](Self::wait_lock_externally), giving up after
    /// `acquire_timeout`. Returns whether the gate was acquired.
    pub async fn wait_lock_externally_with_timeout(
        &self,
        acquire_timeout: Duration,
        max_hold: Duration,
    ) -> Result<bool, ControllerError> {
        if self.is_lock_held_externally() {
            return Err(ControllerError::AlreadyHeld);
        }
        match tokio::time::timeout(acquire_timeout, Arc::clone(&self.gate).lock_owned()).await {
            Ok(guard) => {
                self.install_hold(guard, max_hold);
                Ok(true)
            }
            Err(_elapsed) => {
                self.bus.publish(
                    Event::new(EventKind::GateWaitTimedOut)
                        .with_task(self.current_label())
                        .with_timeout(acquire_timeout),
                );
                Ok(false)
            }
        }
    }

    /// Releases a gate acquired with `wait_lock_externally*`.
    pub fn release_lock_externally(&self) -> Result<(), ControllerError> {
        let (hold, label) = {
            let mut st = self.lock_state();
            (st.hold.take(), Arc::clone(&st.label))
        };
        let hold = hold.ok_or(ControllerError::NotHeld)?;
        drop(hold);
        self.bus
            .publish_with(|| Event::new(EventKind::GateReleased).with_task(label));
        Ok(())
    }

    /// Returns true while the gate is held externally.
    pub fn is_lock_held_externally(&self) -> bool {
        self.lock_state().hold.is_some()
    }

    fn install_hold(&self, guard: OwnedMutexGuard<()>, max_hold: Duration) {
        let label = {
            let mut st = self.lock_state();
            st.hold = Some(ExternalHold {
                _guard: guard,
                max_hold,
            });
            Arc::clone(&st.label)
        };
        self.bus.publish_with(|| {
            Event::new(EventKind::GateHeld)
                .with_task(label)
                .with_timeout(max_hold)
        });
    }

    /// Internal gate acquisition, bounded by the external holder's budget if any.
    async fn acquire_gate(&self, label: &Arc<str>) -> Result<GateGuard<'_, ()>, ControllerError> {
        let max_hold = self.lock_state().hold.as_ref().map(|h| h.max_hold);
        let Some(max_hold) = max_hold else {
            return Ok(self.gate.lock().await);
        };

        match tokio::time::timeout(max_hold, self.gate.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_elapsed) => {
                self.bus.publish(
                    Event::new(EventKind::ExternalHoldExceeded)
                        .with_task(Arc::clone(label))
                        .with_timeout(max_hold),
                );
                Err(ControllerError::ExternalHoldTimeout {
                    label: Arc::clone(label),
                    max_hold,
                })
            }
        }
    }

    // ---- properties --------------------------------------------------------

    /// Whether the current run's signal has been raised.
    ///
    /// Fails with [`ControllerError::NotStarted`] if nothing was ever started.
    pub fn is_cancellation_requested(&self) -> Result<bool, ControllerError> {
        self.lock_state()
            .token
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .ok_or(ControllerError::NotStarted)
    }

    /// The signal of the current (or last) run.
    pub fn cancellation_token(&self) -> Result<CancellationToken, ControllerError> {
        self.lock_state()
            .token
            .clone()
            .ok_or(ControllerError::NotStarted)
    }

    /// Returns true while a launched run has not finished yet.
    pub fn is_task_running(&self) -> bool {
        self.lock_state()
            .operation
            .as_ref()
            .is_some_and(|op| !op.is_finished())
    }

    /// Label of the current (or last) run.
    pub fn label(&self) -> Option<Arc<str>> {
        let st = self.lock_state();
        (!st.label.is_empty()).then(|| Arc::clone(&st.label))
    }

    fn current_label(&self) -> Arc<str> {
        Arc::clone(&self.lock_state().label)
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_failure(&self, label: &Arc<str>, e: &TaskError) {
        self.bus.publish(
            Event::new(EventKind::TaskFailed)
                .with_task(Arc::clone(label))
                .with_reason(e.to_string()),
        );
    }
}

fn already_running_text(running: &str, requested: &str) -> String {
    if running == requested {
        format!("task {running:?} is already running")
    } else {
        format!("cannot start task {requested:?}: task {running:?} is already running")
    }
}
