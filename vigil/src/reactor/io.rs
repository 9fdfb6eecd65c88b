use super::event::Event;
use super::poller::common::Mode;
use super::poller::{Backend, Poller};
use crate::error::{Error, Result};

use std::collections::HashMap;
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::time::Duration;

use tracing::{debug, trace, warn};

/// Descriptor registrations of one reactor.
///
/// The native poller is created on the first successful `add`, so a
/// reactor that only ever runs timers never opens a poll handle. The
/// registry mirrors what has been handed to the poller: it makes
/// re-registration a modify, lets removal of unknown descriptors
/// succeed quietly, and lets the reactor skip events for descriptors
/// removed earlier in the same dispatch.
pub(crate) struct Io {
    poller: Option<Poller>,
    registered: HashMap<RawFd, Mode>,

    /// Reused between waits.
    events: Vec<Event>,

    /// Events fetched per wait.
    capacity: usize,
}

impl Io {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            poller: None,
            registered: HashMap::new(),
            events: Vec::new(),
            capacity,
        }
    }

    pub(crate) fn add(&mut self, fd: RawFd, mode: Mode) -> Result<()> {
        if fd < 0 {
            return Err(Error::InvalidArgument("negative descriptor"));
        }
        if let Some(limit) = Poller::FD_LIMIT {
            if fd as usize >= limit {
                return Err(Error::InvalidArgument("descriptor exceeds FD_SETSIZE"));
            }
        }

        self.registered.try_reserve(1)?;

        let poller = match self.poller.take() {
            Some(poller) => poller,
            None => {
                let poller = Poller::new(self.capacity)
                    .map_err(|source| Error::BackendRegistration { fd, source })?;
                debug!(backend = Poller::NAME, "poll backend created");
                poller
            }
        };
        let poller = self.poller.insert(poller);

        if let Err(source) = poller.add(fd, mode) {
            // A partial add may have left native state behind.
            if !self.registered.contains_key(&fd) {
                if let Err(e) = poller.remove(fd) {
                    trace!(fd, error = %e, "nothing to undo after failed registration");
                }
            }
            warn!(fd, ?mode, error = %source, "descriptor registration failed");
            return Err(Error::BackendRegistration { fd, source });
        }

        let previous = self.registered.insert(fd, mode);
        debug!(fd, ?mode, modified = previous.is_some(), "descriptor registered");

        Ok(())
    }

    pub(crate) fn remove(&mut self, fd: RawFd) -> Result<()> {
        if fd < 0 {
            return Err(Error::InvalidArgument("negative descriptor"));
        }

        if self.registered.remove(&fd).is_none() {
            trace!(fd, "descriptor was not registered");
            return Ok(());
        }

        let Some(poller) = self.poller.as_mut() else {
            return Ok(());
        };

        match poller.remove(fd) {
            Ok(()) => {
                debug!(fd, "descriptor removed");
                Ok(())
            }
            // Closing a descriptor already drops it from the kernel's set.
            Err(e) if matches!(e.raw_os_error(), Some(libc::ENOENT) | Some(libc::EBADF)) => {
                debug!(fd, error = %e, "descriptor already gone from backend");
                Ok(())
            }
            Err(source) => Err(Error::BackendRegistration { fd, source }),
        }
    }

    pub(crate) fn is_registered(&self, fd: RawFd) -> bool {
        self.registered.contains_key(&fd)
    }

    pub(crate) fn len(&self) -> usize {
        self.registered.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Blocks in the backend for at most `timeout`.
    ///
    /// The returned buffer should be handed back with
    /// [`recycle`](Self::recycle) once dispatched.
    pub(crate) fn wait(&mut self, timeout: Duration) -> io::Result<Vec<Event>> {
        let mut events = mem::take(&mut self.events);
        events.clear();

        if let Some(poller) = self.poller.as_mut() {
            if let Err(e) = poller.wait(&mut events, timeout) {
                self.events = events;
                return Err(e);
            }
        }

        Ok(events)
    }

    pub(crate) fn recycle(&mut self, mut events: Vec<Event>) {
        events.clear();
        self.events = events;
    }
}
