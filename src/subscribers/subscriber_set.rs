//! # Routing events to subscribers without blocking the publisher.
//!
//! [`SubscriberSet`] gives each subscriber its own bounded queue and worker. An
//! event is only queued for the subscribers whose [`Subscribe::accepts`] takes it,
//! so a filtered-out event never costs queue space.
//!
//! ```text
//! emit(event) ─► Arc<Event>
//!     ├─ sub1.accepts? ──yes──► [queue 1] ──► worker 1 ──► sub1.on_event()
//!     │                                          └────────► panic → SubscriberPanicked
//!     ├─ sub2.accepts? ──no───► (skipped)
//!     └─ subN.accepts? ──yes──► [queue N] ──► worker N ──► subN.on_event()
//! ```
//!
//! ## Rules
//! - `emit` never waits: a full or closed queue drops the event for that subscriber
//!   and publishes `SubscriberOverflow` (never about an overflow event itself).
//! - Each subscriber sees its accepted events in publish order.
//! - A panicking subscriber is reported and keeps receiving events.
//!
//! **Warning**: panics are caught with `AssertUnwindSafe`; a subscriber that panics
//! while holding its own lock may leave that state poisoned.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;
use crate::tasks::panic_message;

struct Route {
    sub: Arc<dyn Subscribe>,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Per-subscriber queues and workers fed by [`attach`](crate::attach).
pub struct SubscriberSet {
    routes: Vec<Route>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Overflow and panic reports go to `bus`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (routes, workers): (Vec<_>, Vec<_>) = subs
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let worker = tokio::spawn(drain(Arc::clone(&sub), rx, bus.clone()));
                (Route { sub, queue }, worker)
            })
            .unzip();
        Self {
            routes,
            workers,
            bus,
        }
    }

    /// Queues `event` for every subscriber that accepts it.
    pub fn emit(&self, event: Event) {
        let mut shared: Option<Arc<Event>> = None;

        for route in self.routes.iter().filter(|r| r.sub.accepts(&event)) {
            let ev = Arc::clone(shared.get_or_insert_with(|| Arc::new(event.clone())));
            let reason = match route.queue.try_send(ev) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if event.kind != EventKind::SubscriberOverflow {
                self.bus
                    .publish(Event::subscriber_overflow(route.sub.name(), reason));
            }
        }
    }

    /// Closes every queue and waits for the workers to drain them.
    pub async fn shutdown(self) {
        drop(self.routes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn drain(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let delivered = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await;
        if let Err(panic) = delivered {
            bus.publish(Event::subscriber_panicked(sub.name(), panic_message(&*panic)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogLevel;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploding;

    #[async_trait]
    impl Subscribe for Exploding {
        async fn on_event(&self, _ev: &Event) {
            panic!("boom");
        }
        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    /// Only takes warnings and worse, through a one-slot queue.
    struct Alerts(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Alerts {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
        fn accepts(&self, ev: &Event) -> bool {
            ev.level >= LogLevel::Warning
        }
        fn name(&self) -> &'static str {
            "alerts"
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_is_isolated_and_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
        let set = SubscriberSet::new(vec![Arc::new(Exploding), rec.clone()], bus.clone());

        set.emit(Event::new(EventKind::TaskStarting));
        set.emit(Event::new(EventKind::TaskStopped));
        set.shutdown().await;

        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![EventKind::TaskStarting, EventKind::TaskStopped]
        );

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.task.as_deref(), Some("exploding"));
        assert_eq!(ev.reason.as_deref(), Some("boom"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejected_events_take_no_queue_space() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let alerts = Arc::new(Alerts(Mutex::new(Vec::new())));
        let set = SubscriberSet::new(vec![alerts.clone()], bus.clone());

        // The worker has not run yet, so the single slot is still free for the
        // warning after three debug events were skipped.
        set.emit(Event::new(EventKind::TaskStarting));
        set.emit(Event::new(EventKind::CancelRequested));
        set.emit(Event::new(EventKind::TaskStopped));
        set.emit(Event::new(EventKind::StopTimedOut));
        set.emit(Event::new(EventKind::TaskFailed));
        set.shutdown().await;

        assert_eq!(*alerts.0.lock().unwrap(), vec![EventKind::StopTimedOut]);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.task.as_deref(), Some("alerts"));
        assert_eq!(ev.reason.as_deref(), Some("full"));
    }
}
