//! # Event bus: the logging capability handed to controllers.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Controllers receive a
//! clone at construction and publish [`Event`]s to it; nothing in the crate logs
//! through a process-wide singleton.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Consumers:
//!   SingleTask    ──┐
//!   DebouncedTask ──┼──────► Bus ──────► attach() listener ───► SubscriberSet
//!   timeout fns   ──┤  (broadcast chan)                           └─► LogWriter, ...
//!   spawn_detached──┘                 ─► bus.subscribe() (tests, ad-hoc)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Lazy publish**: `publish_with()` builds the event only when someone listens.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers, the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Publishes an event built by `make`, skipping the construction entirely
    /// when there is nobody to deliver it to.
    pub fn publish_with(&self, make: impl FnOnce() -> Event) {
        if self.tx.receiver_count() == 0 {
            return;
        }
        let _ = self.tx.send(make());
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Returns true if at least one receiver is attached.
    pub fn is_observed(&self) -> bool {
        self.tx.receiver_count() > 0
    }
}

impl Default for Bus {
    /// A bus with the default capacity of 1024.
    fn default() -> Self {
        Bus::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn lazy_publish_skips_without_receivers() {
        let bus = Bus::new(8);
        let mut built = false;
        bus.publish_with(|| {
            built = true;
            Event::new(EventKind::TaskStarting)
        });
        assert!(!built);
        assert!(!bus.is_observed());
    }

    #[test]
    fn receivers_see_events_published_after_subscribe() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::TaskStarting));
        let mut rx = bus.subscribe();
        bus.publish_with(|| Event::new(EventKind::TaskStopped).with_task("a"));

        let ev = rx.try_recv().expect("event");
        assert_eq!(ev.kind, EventKind::TaskStopped);
        assert_eq!(ev.task.as_deref(), Some("a"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn capacity_is_clamped() {
        let bus = Bus::new(0);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::TaskStarting));
        assert!(rx.try_recv().is_ok());
    }
}
