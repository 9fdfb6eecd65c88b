//! Linux `epoll`-based poller implementation.
//!
//! Descriptors are registered edge-triggered: a readiness change is
//! reported once, so the read handler must drain a descriptor fully in
//! one dispatch or it will not hear about it again until its state
//! changes. Hang-up, peer shutdown and priority data are always watched
//! and reported as readable.
//!
//! This backend is selected automatically on Linux targets unless the
//! `select` feature is enabled.

use super::common::{Backend, Mode, timeout_ms};
use crate::reactor::event::Event;

use libc::{
    EEXIST, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLET,
    EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLPRI, EPOLLRDHUP, epoll_create1, epoll_ctl, epoll_event,
    epoll_wait,
};
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Conditions folded into "readable" when reported.
const READ_FLAGS: u32 = (EPOLLIN | EPOLLPRI | EPOLLHUP | EPOLLRDHUP | EPOLLERR) as u32;

/// Linux `epoll` poller.
///
/// This poller owns:
/// - an `epoll` instance,
/// - a reusable event buffer.
pub(crate) struct EpollPoller {
    /// Epoll file descriptor.
    epoll: RawFd,

    /// Reusable buffer for epoll events.
    events: Vec<epoll_event>,
}

impl EpollPoller {
    fn ctl(&self, op: i32, fd: RawFd, mode: Mode) -> io::Result<()> {
        let mut flags = EPOLLIN | EPOLLPRI | EPOLLHUP | EPOLLRDHUP | EPOLLET;
        if mode.writes() {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: fd as u64,
        };

        let rc = unsafe { epoll_ctl(self.epoll, op, fd, &mut event) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Backend for EpollPoller {
    const NAME: &'static str = "epoll";

    fn new(capacity: usize) -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            epoll,
            events: vec![epoll_event { events: 0, u64: 0 }; capacity],
        })
    }

    /// Registers a descriptor, falling back to a modify when the kernel
    /// says it is already part of this epoll set.
    fn add(&mut self, fd: RawFd, mode: Mode) -> io::Result<()> {
        match self.ctl(EPOLL_CTL_ADD, fd, mode) {
            Err(e) if e.raw_os_error() == Some(EEXIST) => self.ctl(EPOLL_CTL_MOD, fd, mode),
            other => other,
        }
    }

    fn remove(&mut self, fd: RawFd) -> io::Result<()> {
        // Kernels before 2.6.9 reject a null event even for DEL.
        let mut event = epoll_event { events: 0, u64: 0 };

        let rc = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, &mut event) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn wait(&mut self, events: &mut Vec<Event>, timeout: Duration) -> io::Result<()> {
        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                self.events.len() as i32,
                timeout_ms(timeout),
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        for ev in &self.events[..n as usize] {
            let flags = ev.events;
            let fd = ev.u64 as RawFd;

            let readable = flags & READ_FLAGS != 0;
            let writable = flags & (EPOLLOUT as u32) != 0;

            // epoll reports each descriptor at most once per wait.
            events.push(Event {
                fd,
                readable,
                writable,
            });
        }

        Ok(())
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll);
        }
    }
}
