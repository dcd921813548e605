//! # taskgate
//!
//! **Taskgate** provides small async controllers for work that must never run twice
//! at the same time.
//!
//! - [`SingleTask`] runs at most one cancellable operation, serializes start/stop
//!   through a gate that callers can also hold, and bounds `stop` with a timeout.
//! - [`DebouncedTask`] coalesces bursts of triggers into one delayed invocation.
//! - [`await_with_timeout`], [`await_within`] and [`run_with_timeout`] race work
//!   against a deadline without leaking the loser.
//! - [`spawn_detached`] runs fire-and-forget work whose failures still get logged.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  SingleTask  │   │DebouncedTask │   │ run_with_    │
//!     │ (gate + slot)│   │(pending run) │   │   timeout    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │   Delay (TokioDelay / InstantDelay / custom)
//!            │                  │                  │
//!            │ Publishes        │ Publishes        │ Publishes
//!            │ - TaskStarting   │ - DebounceSched. │ - TaskStarting
//!            │ - CancelRequested│ - DebounceFired  │ - TimeoutHit
//!            │ - StopTimedOut   │ - DetachedFailed │ - TaskCanceled
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                   (capacity: Config::bus_capacity)                │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │   attach() listener    │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                    LogWriter   sub2      subN
//! ```
//!
//! ### Start / stop
//! ```text
//! start(label, admission, work)          stop_within(max)
//!   ├─► acquire gate                       ├─► acquire gate
//!   ├─► running? ─► Drop: skip             ├─► nothing? ─► Ok
//!   │             └► Fail: AlreadyRunning  ├─► race(max) { cancel, await, free slot, callback }
//!   ├─► new token, launch work(token)      │     └─ lost ─► StopTimedOut (slot kept)
//!   └─► release gate                       └─► release gate
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                           |
//! |-------------------|-------------------------------------------------------------------|----------------------------------------------|
//! | **Controllers**   | Single-flight start/stop, debounced triggers.                     | [`SingleTask`], [`DebouncedTask`]            |
//! | **Policies**      | What a busy controller does, where work runs.                     | [`AdmissionPolicy`], [`Launch`]              |
//! | **Deadlines**     | Race work against an injectable delay source.                     | [`Delay`], [`await_within`]                  |
//! | **Subscriber API**| Hook into controller events (logging, metrics, custom).           | [`Subscribe`], [`attach`]                    |
//! | **Errors**        | Typed errors for work and controllers.                            | [`TaskError`], [`ControllerError`]           |
//! | **Configuration** | Bus sizing and the default stop budget.                           | [`Config`]                                   |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], a subscriber that forwards events to `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskgate::{AdmissionPolicy, Bus, Config, SingleTask, Subscribe, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let bus = cfg.bus();
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(taskgate::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!     let listener = taskgate::attach(&bus, subs);
//!
//!     let sync = SingleTask::new(cfg, bus);
//!     sync.start("sync", AdmissionPolicy::FailIfRunning, |token| async move {
//!         while !token.is_cancelled() {
//!             tokio::time::sleep(Duration::from_millis(10)).await;
//!         }
//!         Err(TaskError::Canceled)
//!     })
//!     .await?;
//!
//!     sync.stop_within(Duration::from_secs(1)).await?;
//!     listener.shutdown().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    Config, DebouncedTask, SingleTask, await_with_timeout, await_within, run_with_timeout,
    spawn_detached,
};
pub use error::{ControllerError, TaskError};
pub use events::{Bus, Event, EventKind, LogCategory, LogLevel};
pub use policies::{AdmissionPolicy, Launch};
pub use subscribers::{Listener, Subscribe, SubscriberSet, attach};
pub use tasks::{Delay, DelayRef, InstantDelay, Outcome, TokioDelay};

// Built-in subscriber forwarding events to `tracing`.
// Enabled by default; disable with `--no-default-features`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
