//! # Severity and category of runtime events.
//!
//! Every [`Event`](crate::Event) carries a [`LogLevel`] and a [`LogCategory`] set
//! so that sinks can filter or route it without matching on the event kind.

use bitflags::bitflags;

/// Severity of an event.
///
/// Ordered from least to most severe, so `level >= LogLevel::Warning` works as a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    /// Routine lifecycle details.
    #[default]
    Debug,
    /// Notable but expected.
    Info,
    /// Something went wrong but the controller is still consistent.
    Warning,
    /// A failure someone should look at.
    Error,
    /// An unrecoverable failure.
    Fatal,
}

impl LogLevel {
    /// Returns a short stable label for logs/metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

bitflags! {
    /// Set of categories an event belongs to.
    ///
    /// Bits above `1 << 15` are free for application-defined categories
    /// (build them with [`LogCategory::from_bits_retain`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct LogCategory: u32 {
        /// Run lifecycle: start, stop, cancellation, failures.
        const TASK = 1 << 0;
        /// Gate ownership, including external holds.
        const GATE = 1 << 1;
        /// Deadlines and stop budgets.
        const TIMEOUT = 1 << 2;
        /// Debounced runs.
        const DEBOUNCE = 1 << 3;
        /// Subscriber delivery problems (overflow, panics).
        const SUBSCRIBER = 1 << 4;
    }
}

impl Default for LogCategory {
    fn default() -> Self {
        LogCategory::TASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn categories_combine() {
        let set = LogCategory::TASK | LogCategory::TIMEOUT;
        assert!(set.contains(LogCategory::TIMEOUT));
        assert!(!set.contains(LogCategory::GATE));
        assert_eq!(LogCategory::default(), LogCategory::TASK);
    }
}
