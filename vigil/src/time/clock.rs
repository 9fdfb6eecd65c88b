use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::Instant;

/// A millisecond time source.
///
/// The reactor only ever subtracts and compares values returned by
/// [`now_ms`](Clock::now_ms), so the epoch is arbitrary; it must simply
/// stay fixed for the lifetime of the reactor and never run backwards.
pub trait Clock {
    /// Current time in milliseconds since the clock's epoch.
    fn now_ms(&self) -> u64;
}

/// The default clock: milliseconds elapsed since a process-wide epoch.
///
/// The epoch is captured the first time any `MonotonicClock` is read, so
/// every reactor in the process shares the same timeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

static EPOCH: OnceLock<Instant> = OnceLock::new();

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_millis() as u64
    }
}

/// A hand-driven clock.
///
/// Clones share the same counter, so a test can keep one handle while
/// the reactor owns another and move time forward explicitly.
///
/// # Examples
///
/// ```rust
/// use vigil::time::{Clock, ManualClock};
///
/// let clock = ManualClock::new(100);
/// let handle = clock.clone();
/// handle.advance(50);
/// assert_eq!(clock.now_ms(), 150);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Creates a clock reading `start` milliseconds.
    pub fn new(start: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Moves the clock forward by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    /// Sets the clock to an absolute reading.
    ///
    /// # Panics
    ///
    /// Panics if `ms` is earlier than the current reading.
    pub fn set(&self, ms: u64) {
        assert!(ms >= self.now.get(), "ManualClock must not run backwards");
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, MonotonicClock};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock;
        let before = clock.now_ms();
        thread::sleep(Duration::from_millis(20));
        let after = clock.now_ms();

        assert!(after >= before + 20, "clock should advance by at least the slept time");
    }

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(10);
        let other = clock.clone();

        other.advance(5);
        assert_eq!(clock.now_ms(), 15);

        clock.set(40);
        assert_eq!(other.now_ms(), 40);
    }

    #[test]
    #[should_panic(expected = "must not run backwards")]
    fn test_manual_clock_rejects_going_back() {
        let clock = ManualClock::new(10);
        clock.set(5);
    }
}
