//! # LogWriter: forwards events to `tracing`
//!
//! A subscriber that turns each [`Event`] into a `tracing` event under the
//! `taskgate` target. The event's [`LogLevel`] picks the tracing level
//! (`Fatal` maps to `ERROR`, tracing has nothing above it).
//!
//! ## Example output (with `tracing-subscriber`'s fmt layer)
//! ```text
//! DEBUG taskgate: starting kind="starting" task="sync" reason="inline"
//! DEBUG taskgate: cancel-requested kind="cancel-requested" task="sync"
//!  WARN taskgate: stop-timed-out kind="stop-timed-out" task="sync" timeout_ms=200
//! ```

use async_trait::async_trait;

use crate::events::{Event, LogCategory, LogLevel};
use crate::subscribers::Subscribe;

macro_rules! emit {
    ($lvl:expr, $e:expr) => {
        tracing::event!(
            target: "taskgate",
            $lvl,
            kind = $e.kind.as_str(),
            seq = $e.seq,
            category = ?$e.category,
            task = $e.task.as_deref(),
            reason = $e.reason.as_deref(),
            timeout_ms = $e.timeout_ms,
            delay_ms = $e.delay_ms,
            "{}",
            $e.kind.as_str()
        )
    };
}

/// Event writer subscriber.
///
/// Filters on a minimum [`LogLevel`] and on a [`LogCategory`] set before
/// handing events to `tracing` (which applies its own filtering on top).
#[derive(Debug, Clone, Copy)]
pub struct LogWriter {
    min_level: LogLevel,
    categories: LogCategory,
}

impl Default for LogWriter {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Debug,
            categories: LogCategory::all(),
        }
    }
}

impl LogWriter {
    /// Construct a writer that forwards every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop events below `level`.
    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Only forward events whose category set intersects `categories`.
    #[must_use]
    pub fn with_categories(mut self, categories: LogCategory) -> Self {
        self.categories = categories;
        self
    }

    fn write(&self, e: &Event) {
        match e.level {
            LogLevel::Debug => emit!(tracing::Level::DEBUG, e),
            LogLevel::Info => emit!(tracing::Level::INFO, e),
            LogLevel::Warning => emit!(tracing::Level::WARN, e),
            LogLevel::Error | LogLevel::Fatal => emit!(tracing::Level::ERROR, e),
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        self.write(e);
    }

    fn accepts(&self, e: &Event) -> bool {
        e.level >= self.min_level && e.category.intersects(self.categories)
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn filters_by_level_and_category() {
        let w = LogWriter::new()
            .with_min_level(LogLevel::Warning)
            .with_categories(LogCategory::GATE | LogCategory::TIMEOUT);

        assert!(!w.accepts(&Event::new(EventKind::GateHeld)));
        assert!(w.accepts(&Event::new(EventKind::ExternalHoldExceeded)));
        assert!(w.accepts(&Event::new(EventKind::StopTimedOut)));
        assert!(!w.accepts(&Event::new(EventKind::TaskFailed)));
    }

    #[test]
    fn default_accepts_everything() {
        let w = LogWriter::default();
        assert!(w.accepts(&Event::new(EventKind::TaskStarting)));
        assert!(w.accepts(&Event::new(EventKind::SubscriberOverflow)));
    }
}
