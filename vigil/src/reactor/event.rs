use std::os::fd::RawFd;

/// An I/O event reported by the poller.
///
/// An `Event` represents readiness information for a registered
/// descriptor. It is produced by the poller and consumed by the
/// reactor, which hands the descriptor to the shared read and/or
/// write handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Event {
    /// The descriptor that became ready.
    pub(crate) fd: RawFd,

    /// The descriptor is readable, hung up, or has a pending
    /// priority/error condition.
    pub(crate) readable: bool,

    /// The descriptor is writable.
    pub(crate) writable: bool,
}

impl Event {
    /// Records readiness for `fd`, folding it into an event already
    /// collected for the same descriptor in this wait.
    ///
    /// Backends that report read and write readiness separately (one
    /// kqueue filter each) rely on this to hand the reactor a single
    /// event per descriptor.
    #[cfg_attr(
        not(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd",
            target_os = "dragonfly"
        )),
        allow(dead_code)
    )]
    pub(crate) fn merge(events: &mut Vec<Event>, fd: RawFd, readable: bool, writable: bool) {
        if let Some(e) = events.iter_mut().find(|e| e.fd == fd) {
            e.readable |= readable;
            e.writable |= writable;
        } else {
            events.push(Event {
                fd,
                readable,
                writable,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Event;

    #[test]
    fn test_merge_folds_same_descriptor() {
        let mut events = Vec::new();
        Event::merge(&mut events, 4, true, false);
        Event::merge(&mut events, 7, false, true);
        Event::merge(&mut events, 4, false, true);

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            Event {
                fd: 4,
                readable: true,
                writable: true
            }
        );
        assert!(events[1].writable && !events[1].readable);
    }
}
