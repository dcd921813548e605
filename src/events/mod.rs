//! Runtime events: types, severity and the broadcast bus.
//!
//! This module groups the event **data model** and the **bus** that controllers
//! publish to. The bus is the crate's logging capability: it is injected into
//! every controller instead of a global logger.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`LogLevel`], [`LogCategory`] severity and category set
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `SingleTask`, `DebouncedTask`, the timeout helpers,
//!   `spawn_detached`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the listener spawned by [`attach`](crate::attach), or any
//!   receiver obtained from [`Bus::subscribe`].

mod bus;
mod event;
mod level;

pub use bus::Bus;
pub use event::{Event, EventKind};
pub use level::{LogCategory, LogLevel};
