//! Controllers and the helpers they are built from.
//!
//! Internal modules:
//! - [`single`]: single-flight controller with a shareable gate;
//! - [`debounce`]: delayed runner that coalesces bursts of triggers;
//! - [`runner`]: awaits work against a deadline;
//! - [`detached`]: fire-and-forget with a logging continuation;
//! - [`config`]: controller settings.

mod config;
mod debounce;
mod detached;
mod runner;
mod single;

pub use config::Config;
pub use debounce::DebouncedTask;
pub use detached::spawn_detached;
pub use runner::{await_with_timeout, await_within, run_with_timeout};
pub use single::SingleTask;
