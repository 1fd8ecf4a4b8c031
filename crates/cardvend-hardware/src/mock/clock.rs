//! Mock calendar clock for testing and development.
//!
//! A settable clock that only moves when told to: deterministic under test,
//! and good enough for the simulator where the operator can set it like the
//! real RTC.

use crate::{Result, traits::Clock};
use cardvend_core::ClockTime;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Inner {
    current: ClockTime,
}

/// Mock calendar clock.
///
/// # Examples
///
/// ```
/// use cardvend_hardware::mock::MockClock;
/// use cardvend_hardware::traits::Clock;
/// use cardvend_core::ClockTime;
///
/// let start = ClockTime::new(23, 59, 31, 12, 2025).unwrap();
/// let (clock, handle) = MockClock::with_time(start);
///
/// assert_eq!(clock.now().unwrap(), start);
///
/// handle.set_time(ClockTime::new(0, 0, 1, 1, 2026).unwrap());
/// assert_eq!(clock.now().unwrap().year, 2026);
/// ```
#[derive(Debug)]
pub struct MockClock {
    inner: Arc<Mutex<Inner>>,
}

impl MockClock {
    /// Create a mock clock seeded from the host's wall clock.
    pub fn new() -> (Self, MockClockHandle) {
        Self::with_time(ClockTime::from_datetime(&chrono::Local::now()))
    }

    /// Create a mock clock starting at a fixed time.
    pub fn with_time(time: ClockTime) -> (Self, MockClockHandle) {
        let inner = Arc::new(Mutex::new(Inner { current: time }));

        let clock = Self {
            inner: Arc::clone(&inner),
        };
        let handle = MockClockHandle { inner };

        (clock, handle)
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for MockClock {
    fn now(&self) -> Result<ClockTime> {
        Ok(self.locked().current)
    }

    fn set(&mut self, time: ClockTime) -> Result<()> {
        self.locked().current = time;
        Ok(())
    }
}

/// Handle for controlling a mock clock.
#[derive(Debug, Clone)]
pub struct MockClockHandle {
    inner: Arc<Mutex<Inner>>,
}

impl MockClockHandle {
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the clock to a new time.
    pub fn set_time(&self, time: ClockTime) {
        self.locked().current = time;
    }

    /// The time the clock currently reports.
    pub fn time(&self) -> ClockTime {
        self.locked().current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_holds_until_set() {
        let start = ClockTime::new(10, 30, 15, 6, 2025).unwrap();
        let (clock, handle) = MockClock::with_time(start);

        assert_eq!(clock.now().unwrap(), start);
        assert_eq!(clock.now().unwrap(), start);

        let later = ClockTime::new(10, 31, 15, 6, 2025).unwrap();
        handle.set_time(later);
        assert_eq!(clock.now().unwrap(), later);
    }

    #[test]
    fn test_core_set_visible_through_handle() {
        let (mut clock, handle) = MockClock::new();

        let t = ClockTime::new(0, 0, 1, 1, 2030).unwrap();
        clock.set(t).unwrap();

        assert_eq!(handle.time(), t);
    }
}
