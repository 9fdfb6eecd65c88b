//! Portable `select(2)`-based poller implementation.
//!
//! Interest lives in three descriptor sets. Every registered descriptor
//! sits in the read and exceptional sets; the write set is only filled
//! for read-write registrations. A wait copies the sets, calls
//! `select(2)` and then scans `[0, max_fd)` to turn set membership back
//! into events, so each wake costs O(max_fd).
//!
//! This is the fallback on targets without `epoll` or `kqueue`, and it
//! can be forced everywhere with the `select` feature.

use super::common::{Backend, Mode};
use crate::reactor::event::Event;

use libc::{FD_CLR, FD_ISSET, FD_SET, FD_SETSIZE, FD_ZERO, fd_set, timeval};
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::time::Duration;

/// Descriptor-set poller.
pub(crate) struct SelectPoller {
    /// One past the highest registered descriptor.
    max_fd: RawFd,

    /// Descriptors watched for readability.
    read: fd_set,

    /// Descriptors watched for writability.
    write: fd_set,

    /// Descriptors watched for exceptional conditions.
    except: fd_set,
}

fn empty_set() -> fd_set {
    let mut set: fd_set = unsafe { mem::zeroed() };
    unsafe { FD_ZERO(&mut set) };
    set
}

impl SelectPoller {
    fn watches(&self, fd: RawFd) -> bool {
        unsafe { FD_ISSET(fd, &self.read) || FD_ISSET(fd, &self.write) }
    }
}

impl Backend for SelectPoller {
    const NAME: &'static str = "select";
    const FD_LIMIT: Option<usize> = Some(FD_SETSIZE as usize);

    fn new(_capacity: usize) -> io::Result<Self> {
        Ok(Self {
            max_fd: 0,
            read: empty_set(),
            write: empty_set(),
            except: empty_set(),
        })
    }

    fn add(&mut self, fd: RawFd, mode: Mode) -> io::Result<()> {
        if fd < 0 || fd as usize >= FD_SETSIZE as usize {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }

        unsafe {
            FD_SET(fd, &mut self.read);
            FD_SET(fd, &mut self.except);
            if mode.writes() {
                FD_SET(fd, &mut self.write);
            } else {
                FD_CLR(fd, &mut self.write);
            }
        }

        if fd >= self.max_fd {
            self.max_fd = fd + 1;
        }

        Ok(())
    }

    fn remove(&mut self, fd: RawFd) -> io::Result<()> {
        if fd < 0 || fd >= self.max_fd {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }

        unsafe {
            FD_CLR(fd, &mut self.read);
            FD_CLR(fd, &mut self.write);
            FD_CLR(fd, &mut self.except);
        }

        while self.max_fd > 0 && !self.watches(self.max_fd - 1) {
            self.max_fd -= 1;
        }

        Ok(())
    }

    fn wait(&mut self, events: &mut Vec<Event>, timeout: Duration) -> io::Result<()> {
        if self.max_fd == 0 {
            return Ok(());
        }

        let mut read = self.read;
        let mut write = self.write;
        let mut except = self.except;

        let mut tv = timeval {
            tv_sec: timeout.as_secs() as _,
            tv_usec: timeout.subsec_micros() as _,
        };

        let n = unsafe { libc::select(self.max_fd, &mut read, &mut write, &mut except, &mut tv) };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        if n == 0 {
            return Ok(());
        }

        for fd in 0..self.max_fd {
            let (readable, writable) = unsafe {
                (
                    FD_ISSET(fd, &read) || FD_ISSET(fd, &except),
                    FD_ISSET(fd, &write),
                )
            };

            if readable || writable {
                events.push(Event {
                    fd,
                    readable,
                    writable,
                });
            }
        }

        Ok(())
    }
}
