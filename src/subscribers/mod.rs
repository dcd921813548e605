//! # Event subscribers: where published events end up.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out,
//! the built-in [`LogWriter`] (feature `logging`) and [`attach`], which wires a
//! set of subscribers to a [`Bus`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   SingleTask ── publish(Event) ──► Bus ──► listener (attach) ──► SubscriberSet::emit
//!                                                                   ┌────┴────┬────────┐
//!                                                                   ▼         ▼        ▼
//!                                                               LogWriter  Metrics  Custom
//! ```
//!
//! ## Lifecycle
//! [`attach`] returns a [`Listener`]. Call [`Listener::shutdown`] to stop
//! forwarding, flush what is already buffered and wait for every subscriber
//! worker to finish. Dropping the listener stops forwarding without flushing.

mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
mod log;

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::Bus;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;

/// Handle to the task forwarding bus events into a [`SubscriberSet`].
pub struct Listener {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Listener {
    /// Stops forwarding, delivers events still buffered on the bus, and waits for
    /// all subscribers to process their queues.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        let _ = (&mut self.join).await;
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawns a listener that forwards every event published on `bus` to `subscribers`.
///
/// Must be called from within a tokio runtime.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use taskgate::{attach, Bus, Config, SingleTask, Subscribe};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = Bus::default();
/// let subs: Vec<Arc<dyn Subscribe>> = Vec::new(); // e.g. vec![Arc::new(LogWriter::new())]
/// let listener = attach(&bus, subs);
///
/// let task = SingleTask::new(Config::default(), bus);
/// // ... start / stop ...
/// # drop(task);
/// listener.shutdown().await;
/// # }
/// ```
pub fn attach(bus: &Bus, subscribers: Vec<Arc<dyn Subscribe>>) -> Listener {
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subscribers, bus.clone());
    let token = CancellationToken::new();
    let stop = token.clone();

    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    loop {
                        match rx.try_recv() {
                            Ok(ev) => set.emit(ev),
                            Err(TryRecvError::Lagged(_)) => continue,
                            Err(_) => break,
                        }
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    });

    Listener { token, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
    }

    #[tokio::test]
    async fn shutdown_flushes_buffered_events() {
        let bus = Bus::new(64);
        let rec = Arc::new(Recorder::default());
        let listener = attach(&bus, vec![rec.clone()]);

        bus.publish(Event::new(EventKind::TaskStarting));
        bus.publish(Event::new(EventKind::CancelRequested));
        bus.publish(Event::new(EventKind::TaskStopped));
        listener.shutdown().await;

        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![
                EventKind::TaskStarting,
                EventKind::CancelRequested,
                EventKind::TaskStopped
            ]
        );
    }

    #[tokio::test]
    async fn dropping_listener_stops_forwarding() {
        let bus = Bus::new(64);
        let rec = Arc::new(Recorder::default());
        let listener = attach(&bus, vec![rec.clone()]);
        assert!(bus.is_observed());

        // The set holds its own bus clone, so only the listener can end forwarding.
        drop(listener);
        while bus.is_observed() {
            tokio::task::yield_now().await;
        }

        bus.publish(Event::new(EventKind::TaskStarting));
        tokio::task::yield_now().await;
        assert!(rec.0.lock().unwrap().is_empty());
    }
}
