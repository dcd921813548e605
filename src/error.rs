//! Error types used by the controllers and by the work they run.
//!
//! This module defines two main error enums:
//!
//! - [`TaskError`]: errors raised by the work itself (one run of an operation).
//! - [`ControllerError`]: errors raised by [`SingleTask`](crate::SingleTask),
//!   the timeout helpers and the gate.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for events/metrics.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by a single run of work.
///
/// [`TaskError::Canceled`] is the "observed cancellation and exited" outcome:
/// controllers swallow it whenever it results from their own cancellation request.
/// Everything else is propagated to the first awaiting caller.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Work observed its cancellation signal and exited early.
    #[error("context cancelled")]
    Canceled,

    /// Work failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work failed in a way the caller should treat as unrecoverable.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Work panicked; the panic payload was captured by the runtime.
    #[error("work panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`TaskError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        TaskError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskgate::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Canceled => "task_canceled",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Canceled => "context cancelled".to_string(),
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Fatal { error } => format!("fatal: {error}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
        }
    }

    /// Indicates whether this outcome means "the work observed cancellation and exited".
    ///
    /// # Example
    /// ```
    /// use taskgate::TaskError;
    ///
    /// assert!(TaskError::Canceled.is_cancellation());
    /// assert!(!TaskError::fatal("nope").is_cancellation());
    /// ```
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// # Errors produced by the controllers.
///
/// Timeouts and misuse conditions are reported synchronously by the call that
/// detected them; nothing here is retried automatically.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// A start was requested while another run is still active.
    #[error("cannot start task {requested:?}: task {running:?} is already running")]
    AlreadyRunning {
        /// Label of the run that is active.
        running: Arc<str>,
        /// Label passed to the rejected start.
        requested: Arc<str>,
    },

    /// Stop (cancel + await + teardown + callback) exceeded its budget.
    ///
    /// Cancellation was requested but the run may still complete later; the
    /// controller stays in a transitional state until a later stop succeeds.
    #[error("task {label:?} took longer than the specified {timeout:?} to stop")]
    StopTimedOut {
        /// Label of the run being stopped.
        label: Arc<str>,
        /// The stop budget that was exceeded.
        timeout: Duration,
    },

    /// An internal start/stop could not acquire the gate because an external
    /// holder kept it longer than its declared budget.
    #[error("operation on {label:?} could not complete: gate held externally for more than {max_hold:?}")]
    ExternalHoldTimeout {
        /// Label of the last run (empty if none was ever started).
        label: Arc<str>,
        /// Budget declared by the external holder.
        max_hold: Duration,
    },

    /// The gate is already held externally on this controller.
    #[error("gate has already been acquired externally; release it first")]
    AlreadyHeld,

    /// Release was requested but no external hold exists.
    #[error("gate is not held externally")]
    NotHeld,

    /// No signal exists because no run has been started yet.
    #[error("there is no cancellation token since no task has been started")]
    NotStarted,

    /// Labels are used in events and errors; they must not be empty.
    #[error("task label must not be empty")]
    EmptyLabel,

    /// Work did not complete before its deadline.
    #[error("task {label:?} did not finish within {timeout:?}")]
    TaskTimedOut {
        /// Label of the run.
        label: Arc<str>,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The work itself failed.
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl ControllerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskgate::ControllerError;
    ///
    /// assert_eq!(ControllerError::AlreadyHeld.as_label(), "gate_already_held");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ControllerError::AlreadyRunning { .. } => "already_running",
            ControllerError::StopTimedOut { .. } => "stop_timed_out",
            ControllerError::ExternalHoldTimeout { .. } => "external_hold_timeout",
            ControllerError::AlreadyHeld => "gate_already_held",
            ControllerError::NotHeld => "gate_not_held",
            ControllerError::NotStarted => "not_started",
            ControllerError::EmptyLabel => "empty_label",
            ControllerError::TaskTimedOut { .. } => "task_timed_out",
            ControllerError::Task(e) => e.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ControllerError::Task(e) => e.as_message(),
            other => other.to_string(),
        }
    }

    /// Returns the work error wrapped by [`ControllerError::Task`], if any.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            ControllerError::Task(e) => Some(e),
            _ => None,
        }
    }
}
