use super::builder::{ReactorBuilder, Termination};
use super::event::Event;
use super::io::Io;
use super::poller::common::Mode;
use super::poller::{Backend, Poller};
use super::timer::{Host, Tick, TimerAction, TimerId, TimerQueue};
use crate::error::Result;
use crate::time::Clock;

use std::fmt;
use std::os::fd::RawFd;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

/// Handler shared by every registered descriptor for one kind of
/// readiness. Receives the reactor and the descriptor that fired.
pub type IoHandler = Box<dyn FnMut(&mut Reactor, RawFd)>;

type IdleHook = Box<dyn FnMut(&mut Reactor) -> IdleAction>;

/// What the idle hook wants the reactor to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleAction {
    /// Go on with the I/O wait and the next iteration.
    Continue,

    /// Stop the reactor before the I/O wait.
    Stop,
}

/// A single-threaded reactor multiplexing timers and descriptor readiness.
///
/// Each iteration of [`run`](Self::run):
///
/// 1. forgets the current event descriptor,
/// 2. runs every due timer (most recently registered first among timers
///    due together) and computes how long it may block,
/// 3. when nothing fired and the wait is positive, consults the idle
///    hook, which may stop the loop,
/// 4. blocks in the poll backend for at most that long and hands each
///    ready descriptor to the shared read and/or write handler.
///
/// There is exactly one read handler and one write handler per reactor.
/// A handler serving several descriptors tells them apart through its
/// `fd` argument or [`current_event_descriptor`](Self::current_event_descriptor).
///
/// Callbacks receive `&mut Reactor` and may add timers, change
/// registrations, swap handlers or call [`quit`](Self::quit). Nothing is
/// preempted: a callback that blocks stalls the whole reactor.
pub struct Reactor {
    /// Set by `quit`, an idle stop, or the end of `run`.
    stop: bool,

    /// A `run` or `iterate_once` is on the stack.
    active: bool,

    timers: TimerQueue<Reactor>,
    io: Io,

    idle: Option<IdleHook>,
    on_read: Option<IoHandler>,
    on_write: Option<IoHandler>,

    /// Bumped whenever the matching slot is replaced, so a hook or
    /// handler taken out to run is only put back if the callback did not
    /// install another one in its own slot.
    idle_version: u64,
    read_version: u64,
    write_version: u64,

    /// Descriptor being dispatched, if any.
    current_fd: Option<RawFd>,

    clock: Box<dyn Clock>,
    max_wait_ms: u64,
    termination: Termination,
}

/// Whole milliseconds, with any non-zero sub-millisecond span rounded up.
fn millis(d: Duration) -> u64 {
    let ms = d.as_millis().min(u64::MAX as u128) as u64;
    if ms == 0 && !d.is_zero() { 1 } else { ms }
}

impl Reactor {
    /// Name of the poll backend compiled into this build.
    pub const BACKEND: &'static str = <Poller as Backend>::NAME;

    /// Creates a reactor with the default configuration.
    ///
    /// Nothing is allocated until the first timer or descriptor is added.
    pub fn new() -> Self {
        ReactorBuilder::new().build()
    }

    /// Returns a builder for a custom configuration.
    pub fn builder() -> ReactorBuilder {
        ReactorBuilder::new()
    }

    pub(crate) fn from_builder(builder: ReactorBuilder) -> Self {
        Self {
            stop: false,
            active: false,
            timers: TimerQueue::new(),
            io: Io::new(builder.event_capacity),
            idle: None,
            on_read: None,
            on_write: None,
            idle_version: 0,
            read_version: 0,
            write_version: 0,
            current_fd: None,
            clock: builder.clock,
            max_wait_ms: millis(builder.max_wait),
            termination: builder.termination,
        }
    }

    /// Schedules `callback` to run `interval` from now, and then every
    /// `interval` for as long as it returns [`TimerAction::Keep`].
    ///
    /// With a zero interval the timer is due immediately; returning
    /// `Keep` from it turns it into a task that runs on every iteration.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`](crate::Error::OutOfMemory) if the timer
    /// could not be stored.
    pub fn add_timer<F>(&mut self, interval: Duration, callback: F) -> Result<TimerId>
    where
        F: FnMut(&mut Reactor) -> TimerAction + 'static,
    {
        let now = self.clock.now_ms();
        let id = self.timers.schedule(Box::new(callback), millis(interval), now)?;

        trace!(?id, interval_ms = millis(interval), "timer scheduled");
        Ok(id)
    }

    /// Starts watching `fd`. Registering a descriptor again replaces its
    /// mode instead of adding a second registration.
    ///
    /// The descriptor stays owned by the caller and must remain open
    /// until it is removed.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`](crate::Error::InvalidArgument) for a
    ///   negative descriptor, or one the backend cannot watch.
    /// - [`Error::BackendRegistration`](crate::Error::BackendRegistration)
    ///   if the native registration failed.
    /// - [`Error::OutOfMemory`](crate::Error::OutOfMemory).
    pub fn add_descriptor(&mut self, fd: RawFd, mode: Mode) -> Result<()> {
        self.io.add(fd, mode)
    }

    /// Stops watching `fd`. Removing a descriptor that is not registered
    /// is not an error.
    pub fn remove_descriptor(&mut self, fd: RawFd) -> Result<()> {
        self.io.remove(fd)
    }

    /// Installs the hook consulted on iterations where no timer fired
    /// and the reactor is about to block.
    pub fn set_idle_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&mut Reactor) -> IdleAction + 'static,
    {
        self.idle = Some(Box::new(hook));
        self.idle_version += 1;
    }

    pub fn clear_idle_hook(&mut self) {
        self.idle = None;
        self.idle_version += 1;
    }

    /// Replaces both readiness handlers at once. `None` uninstalls one.
    pub fn set_io_handlers(&mut self, on_read: Option<IoHandler>, on_write: Option<IoHandler>) {
        self.on_read = on_read;
        self.on_write = on_write;
        self.read_version += 1;
        self.write_version += 1;
    }

    /// Installs the handler called for every readable descriptor.
    pub fn on_read<F>(&mut self, handler: F)
    where
        F: FnMut(&mut Reactor, RawFd) + 'static,
    {
        self.on_read = Some(Box::new(handler));
        self.read_version += 1;
    }

    /// Installs the handler called for every writable descriptor.
    pub fn on_write<F>(&mut self, handler: F)
    where
        F: FnMut(&mut Reactor, RawFd) + 'static,
    {
        self.on_write = Some(Box::new(handler));
        self.write_version += 1;
    }

    /// The descriptor whose handler is running, or the last one
    /// dispatched in this iteration. `None` before any I/O dispatch.
    pub fn current_event_descriptor(&self) -> Option<RawFd> {
        self.current_fd
    }

    /// Asks the reactor to stop.
    ///
    /// Nothing in flight is interrupted: the stop is observed before the
    /// next timer or descriptor dispatch and at the next iteration check.
    /// Stopping is terminal.
    #[doc(alias = "stop")]
    pub fn quit(&mut self) {
        if !self.stop {
            debug!("reactor stop requested");
        }
        self.stop = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stop
    }

    /// Returns `true` while the timer is still scheduled.
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.contains(id)
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn descriptor_count(&self) -> usize {
        self.io.len()
    }

    /// Current reading of the reactor's clock, in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Runs the reactor until it stops.
    ///
    /// With [`Termination::TimersOnly`] the loop ends when no timer is
    /// left; [`Termination::TimersOrDescriptors`] also keeps it alive
    /// while descriptors are registered. On the way out every pending
    /// timer is dropped and the reactor is left stopped, so calling
    /// `run` again returns immediately.
    ///
    /// Calling `run` from inside one of the reactor's own callbacks does
    /// nothing.
    pub fn run(&mut self) {
        if self.active {
            warn!("run called from inside a reactor callback; ignored");
            return;
        }
        self.active = true;

        debug!(
            backend = Self::BACKEND,
            timers = self.timers.len(),
            descriptors = self.io.len(),
            "reactor running"
        );

        while self.keeps_running() {
            let tick = self.scan_timers();
            if !self.keeps_running() {
                break;
            }

            if tick.fired == 0 && tick.wait_ms > 0 && self.consult_idle() == IdleAction::Stop {
                debug!("idle hook stopped the reactor");
                break;
            }

            self.wait(Duration::from_millis(tick.wait_ms));
        }

        let dropped = self.timers.clear();
        self.stop = true;
        self.active = false;

        debug!(dropped, "reactor stopped");
    }

    /// Runs one pass without blocking: every due timer, then a
    /// zero-timeout poll whose ready descriptors are dispatched.
    ///
    /// Meant for driving the reactor from a foreign loop. Returns the
    /// number of timers that fired. Does nothing once stopped or when
    /// called from inside a reactor callback.
    pub fn iterate_once(&mut self) -> usize {
        if self.active {
            warn!("iterate_once called from inside a reactor callback; ignored");
            return 0;
        }
        if self.stop {
            return 0;
        }
        self.active = true;

        let tick = self.scan_timers();
        if !self.stop && self.services_io() {
            self.poll_io(Duration::ZERO);
        }

        self.active = false;
        tick.fired
    }

    /// Tears the reactor down: closes the poll backend and drops every
    /// pending timer. Dropping the reactor does the same.
    pub fn destroy(self) {
        debug!(
            timers = self.timers.len(),
            descriptors = self.io.len(),
            "reactor destroyed"
        );
    }

    fn keeps_running(&self) -> bool {
        if self.stop {
            return false;
        }

        match self.termination {
            Termination::TimersOnly => !self.timers.is_empty(),
            Termination::TimersOrDescriptors => !self.timers.is_empty() || !self.io.is_empty(),
        }
    }

    fn scan_timers(&mut self) -> Tick {
        self.current_fd = None;
        let max_wait_ms = self.max_wait_ms;
        TimerQueue::advance(self, max_wait_ms)
    }

    fn consult_idle(&mut self) -> IdleAction {
        let Some(mut hook) = self.idle.take() else {
            return IdleAction::Continue;
        };

        let version = self.idle_version;
        let action = hook(self);
        if self.idle_version == version {
            self.idle = Some(hook);
        }

        action
    }

    /// I/O is only waited on when something is registered and someone
    /// would be told about it.
    fn services_io(&self) -> bool {
        !self.io.is_empty() && (self.on_read.is_some() || self.on_write.is_some())
    }

    fn wait(&mut self, timeout: Duration) {
        if self.services_io() {
            self.poll_io(timeout);
        } else {
            thread::sleep(timeout);
        }
    }

    fn poll_io(&mut self, timeout: Duration) {
        match self.io.wait(timeout) {
            Ok(events) => self.dispatch(events),
            Err(e) => {
                warn!(error = %e, "backend wait failed; sleeping instead");
                thread::sleep(timeout);
            }
        }
    }

    fn dispatch(&mut self, events: Vec<Event>) {
        for event in &events {
            if self.stop {
                break;
            }

            // Removed by a handler earlier in this batch.
            if !self.io.is_registered(event.fd) {
                trace!(fd = event.fd, "skipping event for removed descriptor");
                continue;
            }

            self.current_fd = Some(event.fd);

            if event.readable {
                self.call_read(event.fd);
            }

            if event.writable && !self.stop && self.io.is_registered(event.fd) {
                self.call_write(event.fd);
            }
        }

        self.io.recycle(events);
    }

    fn call_read(&mut self, fd: RawFd) {
        let Some(mut handler) = self.on_read.take() else {
            return;
        };

        let version = self.read_version;
        handler(self, fd);
        if self.read_version == version {
            self.on_read = Some(handler);
        }
    }

    fn call_write(&mut self, fd: RawFd) {
        let Some(mut handler) = self.on_write.take() else {
            return;
        };

        let version = self.write_version;
        handler(self, fd);
        if self.write_version == version {
            self.on_write = Some(handler);
        }
    }
}

impl Host for Reactor {
    fn timers(&mut self) -> &mut TimerQueue<Self> {
        &mut self.timers
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn is_stopped(&self) -> bool {
        self.stop
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("backend", &Self::BACKEND)
            .field("stopped", &self.stop)
            .field("timers", &self.timers.len())
            .field("descriptors", &self.io.len())
            .field("current_fd", &self.current_fd)
            .field("termination", &self.termination)
            .finish()
    }
}
