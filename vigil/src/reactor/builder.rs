use super::Reactor;
use crate::time::{Clock, MonotonicClock};

use std::time::Duration;

/// Longest the reactor blocks between two timer scans by default.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(500);

/// Readiness events fetched per backend wait by default.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// When [`Reactor::run`] keeps iterating.
///
/// Either way the loop ends as soon as it is stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Termination {
    /// Run while at least one timer is pending. A reactor holding only
    /// descriptor registrations returns from `run` at once without
    /// servicing them.
    #[default]
    TimersOnly,

    /// Run while at least one timer is pending or one descriptor is
    /// registered.
    TimersOrDescriptors,
}

/// Builder for configuring and creating a reactor.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use vigil::{ReactorBuilder, Termination};
///
/// let reactor = ReactorBuilder::new()
///     .max_wait(Duration::from_millis(100))
///     .termination(Termination::TimersOrDescriptors)
///     .build();
/// # drop(reactor);
/// ```
pub struct ReactorBuilder {
    /// Cap on the computed poll timeout.
    pub(crate) max_wait: Duration,

    /// Events fetched per backend wait.
    pub(crate) event_capacity: usize,

    pub(crate) termination: Termination,

    pub(crate) clock: Box<dyn Clock>,
}

impl ReactorBuilder {
    /// Creates a new `ReactorBuilder` with default configuration:
    /// a 500 ms wait cap, 64 events per wait, [`Termination::TimersOnly`]
    /// and the [`MonotonicClock`].
    pub fn new() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            termination: Termination::default(),
            clock: Box::new(MonotonicClock),
        }
    }

    /// Sets the longest the reactor may block before scanning timers
    /// again, even when no timer is close to due.
    ///
    /// # Panics
    ///
    /// Panics if `max_wait` is zero.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        assert!(!max_wait.is_zero(), "max_wait must be > 0");

        self.max_wait = max_wait;
        self
    }

    /// Sets how many readiness events one backend wait may return.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn event_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "event_capacity must be > 0");

        self.event_capacity = n;
        self
    }

    /// Sets when [`Reactor::run`] stops iterating on its own.
    pub fn termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Sets the time source timers are scheduled against.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Builds the reactor. No backend resources are allocated yet.
    pub fn build(self) -> Reactor {
        Reactor::from_builder(self)
    }
}

impl Default for ReactorBuilder {
    /// Creates a default `ReactorBuilder`.
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ReactorBuilder;
    use std::time::Duration;

    #[test]
    #[should_panic(expected = "max_wait must be > 0")]
    fn test_zero_max_wait_panics() {
        let _ = ReactorBuilder::new().max_wait(Duration::ZERO);
    }

    #[test]
    #[should_panic(expected = "event_capacity must be > 0")]
    fn test_zero_event_capacity_panics() {
        let _ = ReactorBuilder::new().event_capacity(0);
    }
}
