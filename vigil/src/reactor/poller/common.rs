use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::reactor::event::Event;

/// Readiness a descriptor is registered for.
///
/// Read interest is always present; write interest is opt-in because a
/// connected socket is writable almost all the time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Report readability (including hang-up and error conditions).
    Read,

    /// Report readability and writability.
    ReadWrite,
}

impl Mode {
    /// Returns `true` when write readiness should be watched.
    pub(crate) fn writes(self) -> bool {
        matches!(self, Mode::ReadWrite)
    }
}

/// A native readiness-notification mechanism.
///
/// Exactly one implementation is compiled in as [`Poller`](super::Poller).
/// Every implementation keeps its own native registration state and
/// must honour the same contract:
///
/// - `add` on an already registered descriptor replaces its interest
///   in place rather than registering it twice,
/// - `remove` of an unknown descriptor may fail; the caller treats that
///   as success,
/// - `wait` blocks for at most `timeout` and a timeout with nothing
///   ready is not an error.
pub(crate) trait Backend: Sized {
    /// Short name used in logs.
    const NAME: &'static str;

    /// Highest descriptor value (exclusive) the backend can watch, if
    /// it has such a limit.
    const FD_LIMIT: Option<usize> = None;

    /// Creates the native handle. `capacity` bounds how many events one
    /// `wait` can return.
    fn new(capacity: usize) -> io::Result<Self>;

    /// Registers `fd`, or updates its interest if already registered.
    fn add(&mut self, fd: RawFd, mode: Mode) -> io::Result<()>;

    /// Stops watching `fd`.
    fn remove(&mut self, fd: RawFd) -> io::Result<()>;

    /// Waits up to `timeout` and appends ready descriptors to `events`.
    fn wait(&mut self, events: &mut Vec<Event>, timeout: Duration) -> io::Result<()>;
}

/// Converts a timeout into the millisecond count native calls expect.
pub(crate) fn timeout_ms(timeout: Duration) -> i32 {
    timeout.as_millis().min(i32::MAX as u128) as i32
}
