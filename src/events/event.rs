//! # Runtime events emitted by the controllers.
//!
//! The [`EventKind`] enum classifies event types across four groups:
//! - **Lifecycle events**: run flow (starting, cancel requested, stopped, failed)
//! - **Gate events**: external holds and gate wait budgets
//! - **Debounce events**: scheduled, superseded and fired runs
//! - **Subscriber events**: delivery problems inside the fan-out
//!
//! The [`Event`] struct carries metadata such as timestamps, task label,
//! reasons, deadlines and delays, plus a [`LogLevel`] and [`LogCategory`].
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskgate::{Event, EventKind, LogLevel};
//!
//! let ev = Event::new(EventKind::StopTimedOut)
//!     .with_task("sync")
//!     .with_timeout(Duration::from_millis(200));
//!
//! assert_eq!(ev.kind, EventKind::StopTimedOut);
//! assert_eq!(ev.level, LogLevel::Warning);
//! assert_eq!(ev.timeout_ms, Some(200));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use super::level::{LogCategory, LogLevel};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Run lifecycle ===
    /// A run is about to be launched.
    ///
    /// Sets: `task`, `reason` (`"inline"` or `"threaded"`).
    TaskStarting,

    /// A start was ignored because a run is already active.
    ///
    /// Sets: `task` (active label), `reason` (explanation).
    StartSkipped,

    /// A finished run was replaced before anyone observed its failure.
    ///
    /// Sets: `task`, `reason` (the failure).
    UnobservedFailure,

    /// Stop raised the cancellation signal of the active run.
    ///
    /// Sets: `task`.
    CancelRequested,

    /// Stop found nothing to stop (never started, or already torn down).
    ///
    /// Sets: `task` (last label, if any).
    StopSkipped,

    /// Stop found the run already finished; no cancellation was raised.
    ///
    /// Sets: `task`.
    AlreadyFinished,

    /// The run observed cancellation and exited.
    ///
    /// Sets: `task`.
    TaskCanceled,

    /// Stop tore the run down and freed the slot.
    ///
    /// Sets: `task`.
    TaskStopped,

    /// The run failed with a non-cancellation error.
    ///
    /// Sets: `task`, `reason`.
    TaskFailed,

    // === Deadlines ===
    /// Stop did not complete within its budget.
    ///
    /// Sets: `task`, `timeout_ms`.
    StopTimedOut,

    /// An awaited run did not complete before its deadline.
    ///
    /// Sets: `task`, `timeout_ms`.
    TimeoutHit,

    // === Gate ===
    /// An external caller now holds the gate.
    ///
    /// Sets: `task`, `timeout_ms` (declared max hold).
    GateHeld,

    /// The external hold was released.
    ///
    /// Sets: `task`.
    GateReleased,

    /// An external caller gave up waiting for the gate.
    ///
    /// Sets: `task`, `timeout_ms` (acquire timeout).
    GateWaitTimedOut,

    /// An internal start/stop gave up because an external hold exceeded its budget.
    ///
    /// Sets: `task`, `timeout_ms` (declared max hold).
    ExternalHoldExceeded,

    // === Debounce ===
    /// A debounced run was scheduled.
    ///
    /// Sets: `task`, `delay_ms`.
    DebounceScheduled,

    /// A pending debounced run was cancelled by a newer trigger.
    ///
    /// Sets: `task`.
    DebounceSuperseded,

    /// The quiet period elapsed and the action is being invoked.
    ///
    /// Sets: `task`.
    DebounceFired,

    // === Detached ===
    /// A fire-and-forget future ended with an error nobody awaited.
    ///
    /// Sets: `task`, `reason`.
    DetachedFailed,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason` (`"full"` or `"closed"`).
    SubscriberOverflow,
}

impl EventKind {
    /// Default severity for this kind.
    pub fn level(&self) -> LogLevel {
        match self {
            EventKind::UnobservedFailure
            | EventKind::TaskFailed
            | EventKind::ExternalHoldExceeded
            | EventKind::DetachedFailed
            | EventKind::SubscriberPanicked => LogLevel::Error,

            EventKind::StopTimedOut | EventKind::TimeoutHit | EventKind::SubscriberOverflow => {
                LogLevel::Warning
            }

            _ => LogLevel::Debug,
        }
    }

    /// Default category for this kind.
    pub fn category(&self) -> LogCategory {
        match self {
            EventKind::GateHeld
            | EventKind::GateReleased
            | EventKind::GateWaitTimedOut
            | EventKind::ExternalHoldExceeded => LogCategory::GATE,

            EventKind::StopTimedOut | EventKind::TimeoutHit => {
                LogCategory::TASK | LogCategory::TIMEOUT
            }

            EventKind::DebounceScheduled
            | EventKind::DebounceSuperseded
            | EventKind::DebounceFired => LogCategory::DEBOUNCE,

            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {
                LogCategory::SUBSCRIBER
            }

            _ => LogCategory::TASK,
        }
    }

    /// Short stable name (kebab-case) for log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskStarting => "starting",
            EventKind::StartSkipped => "start-skipped",
            EventKind::UnobservedFailure => "unobserved-failure",
            EventKind::CancelRequested => "cancel-requested",
            EventKind::StopSkipped => "stop-skipped",
            EventKind::AlreadyFinished => "already-finished",
            EventKind::TaskCanceled => "canceled",
            EventKind::TaskStopped => "stopped",
            EventKind::TaskFailed => "failed",
            EventKind::StopTimedOut => "stop-timed-out",
            EventKind::TimeoutHit => "timeout",
            EventKind::GateHeld => "gate-held",
            EventKind::GateReleased => "gate-released",
            EventKind::GateWaitTimedOut => "gate-wait-timed-out",
            EventKind::ExternalHoldExceeded => "external-hold-exceeded",
            EventKind::DebounceScheduled => "debounce-scheduled",
            EventKind::DebounceSuperseded => "debounce-superseded",
            EventKind::DebounceFired => "debounce-fired",
            EventKind::DetachedFailed => "detached-failed",
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - `level` / `category`: defaulted from [`EventKind`], overridable
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Severity.
    pub level: LogLevel,
    /// Category set.
    pub category: LogCategory,

    /// Label of the run, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Deadline or budget in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            level: kind.level(),
            category: kind.category(),
            task: None,
            reason: None,
            timeout_ms: None,
            delay_ms: None,
        }
    }

    /// Attaches a task label.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a deadline (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Overrides the severity.
    #[inline]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Overrides the category set.
    #[inline]
    pub fn with_category(mut self, category: LogCategory) -> Self {
        self.category = category;
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::TaskStarting);
        let b = Event::new(EventKind::TaskStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn defaults_follow_kind() {
        let ev = Event::new(EventKind::ExternalHoldExceeded);
        assert_eq!(ev.level, LogLevel::Error);
        assert_eq!(ev.category, LogCategory::GATE);

        let ev = Event::new(EventKind::TaskFailed).with_level(LogLevel::Fatal);
        assert_eq!(ev.level, LogLevel::Fatal);
    }

    #[test]
    fn durations_are_clamped() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
