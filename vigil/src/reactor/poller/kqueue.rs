//! BSD/macOS `kqueue`-based poller implementation.
//!
//! Read and write interest are two independent filters on the same
//! descriptor. A read-write registration installs both; a read-only
//! registration installs the read filter and drops any write filter
//! left over from an earlier registration. Removal always deletes both
//! filters, whichever of them is actually installed.

use super::common::{Backend, Mode};
use crate::reactor::event::Event;

use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::ptr;
use std::time::Duration;

/// Builds a change-list entry for one filter of `fd`.
fn change(fd: RawFd, write: bool, add: bool) -> libc::kevent {
    let mut ev: libc::kevent = unsafe { mem::zeroed() };
    ev.ident = fd as libc::uintptr_t;

    if write {
        ev.filter = libc::EVFILT_WRITE;
    } else {
        ev.filter = libc::EVFILT_READ;
    }

    if add {
        ev.flags = libc::EV_ADD | libc::EV_ENABLE;
    } else {
        ev.flags = libc::EV_DELETE;
    }

    ev
}

/// BSD/macOS `kqueue` poller.
pub(crate) struct KqueuePoller {
    /// Kqueue file descriptor.
    kq: RawFd,

    /// Reusable buffer for returned events.
    events: Vec<libc::kevent>,
}

impl KqueuePoller {
    fn apply(&self, changes: &[libc::kevent]) -> io::Result<()> {
        let rc = unsafe {
            libc::kevent(
                self.kq,
                changes.as_ptr(),
                changes.len() as _,
                ptr::null_mut(),
                0,
                ptr::null(),
            )
        };

        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Backend for KqueuePoller {
    const NAME: &'static str = "kqueue";

    fn new(capacity: usize) -> io::Result<Self> {
        let kq = unsafe { libc::kqueue() };
        if kq < 0 {
            return Err(io::Error::last_os_error());
        }

        let events = (0..capacity)
            .map(|_| unsafe { mem::zeroed::<libc::kevent>() })
            .collect();

        Ok(Self { kq, events })
    }

    fn add(&mut self, fd: RawFd, mode: Mode) -> io::Result<()> {
        if mode.writes() {
            return self.apply(&[change(fd, false, true), change(fd, true, true)]);
        }

        self.apply(&[change(fd, false, true)])?;

        // Downgrade from an earlier read-write registration. ENOENT means
        // no write filter was installed.
        match self.apply(&[change(fd, true, false)]) {
            Err(e) if e.raw_os_error() != Some(libc::ENOENT) => Err(e),
            _ => Ok(()),
        }
    }

    fn remove(&mut self, fd: RawFd) -> io::Result<()> {
        let read = self.apply(&[change(fd, false, false)]);
        let write = self.apply(&[change(fd, true, false)]);

        match (read, write) {
            (Err(e), Err(_)) => Err(e),
            _ => Ok(()),
        }
    }

    fn wait(&mut self, events: &mut Vec<Event>, timeout: Duration) -> io::Result<()> {
        let ts = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as _,
        };

        let n = unsafe {
            libc::kevent(
                self.kq,
                ptr::null(),
                0,
                self.events.as_mut_ptr(),
                self.events.len() as _,
                &ts,
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
            let fd = ev.ident as RawFd;
            let failed = ev.flags & (libc::EV_EOF | libc::EV_ERROR) != 0;

            let readable = ev.filter == libc::EVFILT_READ || failed;
            let writable = ev.filter == libc::EVFILT_WRITE;

            Event::merge(events, fd, readable, writable);
        }

        Ok(())
    }
}

impl Drop for KqueuePoller {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.kq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::KqueuePoller;
    use crate::reactor::poller::common::{Backend, Mode};
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    #[test]
    fn test_read_and_write_filters_merge_into_one_event() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let mut poller = KqueuePoller::new(8).unwrap();
        poller.add(b.as_raw_fd(), Mode::ReadWrite).unwrap();

        a.write_all(b"x").unwrap();

        let mut events = Vec::new();
        poller.wait(&mut events, Duration::from_millis(100)).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].readable && events[0].writable);
    }

    #[test]
    fn test_remove_deletes_both_filters() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let mut poller = KqueuePoller::new(8).unwrap();
        poller.add(b.as_raw_fd(), Mode::ReadWrite).unwrap();
        poller.remove(b.as_raw_fd()).unwrap();

        a.write_all(b"x").unwrap();

        let mut events = Vec::new();
        poller.wait(&mut events, Duration::from_millis(20)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_downgrade_drops_write_filter() {
        let (_a, b) = UnixStream::pair().unwrap();
        let mut poller = KqueuePoller::new(8).unwrap();

        poller.add(b.as_raw_fd(), Mode::Read).expect("fresh read-only add must succeed");
        poller.add(b.as_raw_fd(), Mode::ReadWrite).unwrap();
        poller
            .add(b.as_raw_fd(), Mode::Read)
            .expect("downgrade must succeed");

        let mut events = Vec::new();
        poller.wait(&mut events, Duration::from_millis(20)).unwrap();
        assert!(events.is_empty(), "idle socket must not be writable after a downgrade");
    }

    #[test]
    fn test_remove_read_only_registration_succeeds() {
        let (_a, b) = UnixStream::pair().unwrap();
        let mut poller = KqueuePoller::new(8).unwrap();
        poller.add(b.as_raw_fd(), Mode::Read).unwrap();

        assert!(poller.remove(b.as_raw_fd()).is_ok());
    }
}
