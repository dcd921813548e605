//! # Building blocks for a single run.
//!
//! - [`Delay`] - cancellable wait capability ([`TokioDelay`], [`InstantDelay`])
//! - `Operation` - observable handle to one launched run (crate-internal)

mod delay;
mod operation;

pub use delay::{Delay, DelayRef, InstantDelay, TokioDelay};
pub use operation::Outcome;
pub(crate) use operation::{Operation, panic_message};
