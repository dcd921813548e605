//! # Policies controlling how controllers admit and execute runs.
//!
//! - [`AdmissionPolicy`]: what `start` does when a run is already active.
//! - [`Launch`]: whether work runs on the async scheduler or a blocking worker thread.

mod admission;
mod launch;

pub use admission::AdmissionPolicy;
pub use launch::Launch;
