//! # Admission policy for a busy controller
//!
//! A [`SingleTask`](crate::SingleTask) runs at most **one** operation at a time.
//! When a start request arrives while the previous run is still active, the
//! admission policy decides what to do.
//!
//! ## Variants
//! - `DropIfRunning`: **ignore** the new request (a debug event is published).
//! - `FailIfRunning`: reject it with [`ControllerError::AlreadyRunning`](crate::ControllerError::AlreadyRunning).
//!
//! ## Invariants
//! - Runs within the same controller never overlap (use one controller per slot if
//!   you need parallel execution).
//! - A run that already finished never blocks admission, whatever the policy.

/// Policy controlling how new starts are handled when a run is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AdmissionPolicy {
    /// Skip the start if a run is already active.
    ///
    /// Use when:
    /// - Repeated triggers are expected and harmless
    /// - Redundant work should be avoided
    /// - Example: a periodic refresh started from several places
    #[default]
    DropIfRunning,

    /// Fail the start if a run is already active.
    ///
    /// Use when:
    /// - A concurrent start indicates a logic error in the caller
    /// - The caller must know its request was not honoured
    FailIfRunning,
}
