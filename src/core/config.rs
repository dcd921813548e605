//! # Controller configuration.
//!
//! Provides [`Config`], the settings shared by a [`SingleTask`](crate::SingleTask)
//! and the [`Bus`](crate::Bus) it publishes to.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by [`Config::bus_capacity_clamped`]
//! - `stop_timeout = 0s` → [`SingleTask::stop`](crate::SingleTask::stop) times out
//!   unless the run is already torn down

use std::time::Duration;

/// Configuration for a controller.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `stop_timeout`: Budget of the parameterless `stop()`
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over repeating sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Maximum time `stop()` waits for cancel, completion, teardown and callback.
    ///
    /// `stop_within` / `stop_then` take an explicit budget instead.
    pub stop_timeout: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Builds a [`Bus`](crate::Bus) sized by this config.
    pub fn bus(&self) -> crate::Bus {
        crate::Bus::new(self.bus_capacity_clamped())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024` (good baseline)
    /// - `stop_timeout = 30s`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            stop_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(Config::default().stop_timeout, Duration::from_secs(30));
    }
}
