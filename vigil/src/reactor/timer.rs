use crate::error::Result;
use crate::utils::{Key, Slab};

/// What a timer callback wants done with its timer after it ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerAction {
    /// Keep the timer. A periodic timer is pushed to its next due time;
    /// a timer with a zero interval fires again on every scan.
    Keep,

    /// Unlink and drop the timer now.
    Remove,
}

/// Handle to a scheduled timer.
///
/// Handles are generational: once the timer is gone, its handle never
/// matches a timer registered later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(Key);

pub(crate) type TimerCallback<H> = Box<dyn FnMut(&mut H) -> TimerAction>;

/// One scheduled, possibly repeating, callback.
pub(crate) struct TimerEvent<H> {
    /// `None` only while the callback is running.
    callback: Option<TimerCallback<H>>,

    /// Absolute due time in clock milliseconds.
    when: u64,

    /// Spacing between fires; zero means no automatic rescheduling.
    interval: u64,
}

/// What the owner of a [`TimerQueue`] must provide for a scan.
///
/// Callbacks receive the host itself, so the queue has to be reached
/// through it rather than borrowed for the whole scan.
pub(crate) trait Host: Sized {
    fn timers(&mut self) -> &mut TimerQueue<Self>;

    fn now_ms(&self) -> u64;

    fn is_stopped(&self) -> bool;
}

/// Outcome of one scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Tick {
    /// Number of callbacks invoked.
    pub(crate) fired: usize,

    /// How long the host may block before the next scan is needed.
    pub(crate) wait_ms: u64,
}

/// The set of pending timers.
///
/// Timer events live in a generational [`Slab`]; `order` lists their keys
/// in registration order. Scans walk `order` from the back, so among
/// timers due on the same tick the most recently registered fires first.
pub(crate) struct TimerQueue<H> {
    slots: Slab<TimerEvent<H>>,
    order: Vec<Key>,
}

impl<H> TimerQueue<H> {
    /// Creates an empty queue. Nothing is allocated until the first timer.
    pub(crate) fn new() -> Self {
        Self {
            slots: Slab::new(0),
            order: Vec::new(),
        }
    }

    /// Adds a timer first due at `now + interval`.
    pub(crate) fn schedule(
        &mut self,
        callback: TimerCallback<H>,
        interval: u64,
        now: u64,
    ) -> Result<TimerId> {
        self.order.try_reserve(1)?;

        let key = self.slots.try_insert(TimerEvent {
            callback: Some(callback),
            when: now.saturating_add(interval),
            interval,
        })?;
        self.order.push(key);

        Ok(TimerId(key))
    }

    pub(crate) fn contains(&self, id: TimerId) -> bool {
        self.slots.contains(id.0)
    }

    /// Next due time of a pending timer.
    #[cfg(test)]
    pub(crate) fn due_at(&self, id: TimerId) -> Option<u64> {
        self.slots.get(id.0).map(|event| event.when)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.len() == 0
    }

    /// Drops every pending timer and returns how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.slots.len();
        self.order.clear();
        self.slots.clear();
        dropped
    }
}

impl<H: Host> TimerQueue<H> {
    /// Runs every due timer once and works out the next wait.
    ///
    /// For each timer with `when <= now` the callback runs. `Remove`
    /// drops the timer on the spot. `Keep` on a periodic timer moves
    /// `when` past `now` in whole intervals, so any number of missed
    /// periods collapses into this single fire.
    ///
    /// The returned wait runs from the clock reading at the end of the
    /// scan to the earliest pending due time, capped at `max_wait_ms`, so
    /// time spent inside callbacks is not slept again. Timers registered by a
    /// callback during the scan are left for the next scan but still
    /// bound the wait, down to zero if they are already due.
    ///
    /// The scan stops dispatching as soon as the host reports it has
    /// been stopped.
    pub(crate) fn advance(host: &mut H, max_wait_ms: u64) -> Tick {
        let mut fired = 0;
        // Earliest absolute due time still ahead of the scan.
        let mut next_due = u64::MAX;

        let scanned = host.timers().order.len();
        let mut removed = 0;
        let mut pos = scanned;

        while pos > 0 {
            pos -= 1;
            if host.is_stopped() {
                break;
            }

            let now = host.now_ms();
            let key = host.timers().order[pos];

            let callback = match host.timers().slots.get_mut(key) {
                Some(event) if event.when > now => {
                    next_due = next_due.min(event.when);
                    continue;
                }
                Some(event) => event.callback.take(),
                None => None,
            };

            let Some(mut callback) = callback else {
                continue;
            };

            fired += 1;
            let action = callback(host);

            // The callback may have taken a while.
            let now = host.now_ms();
            let queue = host.timers();
            match action {
                TimerAction::Remove => {
                    if queue.slots.remove(key).is_some() && queue.order.get(pos) == Some(&key) {
                        queue.order.remove(pos);
                        removed += 1;
                    }
                }
                TimerAction::Keep => {
                    if let Some(event) = queue.slots.get_mut(key) {
                        event.callback = Some(callback);

                        if event.interval > 0 && event.when <= now {
                            let missed = (now - event.when) / event.interval + 1;
                            event.when = event
                                .when
                                .saturating_add(missed.saturating_mul(event.interval));
                            next_due = next_due.min(event.when);
                        }
                    }
                }
            }
        }

        let now = host.now_ms();
        let queue = host.timers();
        let start = scanned.saturating_sub(removed).min(queue.order.len());

        for key in &queue.order[start..] {
            if let Some(event) = queue.slots.get(*key) {
                next_due = next_due.min(event.when);
            }
        }

        Tick {
            fired,
            wait_ms: next_due.saturating_sub(now).min(max_wait_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Host, Tick, TimerAction, TimerQueue};

    const MAX_WAIT: u64 = 500;

    struct TestHost {
        timers: TimerQueue<TestHost>,
        now: u64,
        stopped: bool,
        log: Vec<&'static str>,
    }

    impl TestHost {
        fn new() -> Self {
            Self {
                timers: TimerQueue::new(),
                now: 1_000,
                stopped: false,
                log: Vec::new(),
            }
        }

        fn add(
            &mut self,
            interval: u64,
            f: impl FnMut(&mut TestHost) -> TimerAction + 'static,
        ) -> super::TimerId {
            let now = self.now;
            self.timers.schedule(Box::new(f), interval, now).unwrap()
        }

        fn tick(&mut self) -> Tick {
            TimerQueue::advance(self, MAX_WAIT)
        }
    }

    impl Host for TestHost {
        fn timers(&mut self) -> &mut TimerQueue<Self> {
            &mut self.timers
        }

        fn now_ms(&self) -> u64 {
            self.now
        }

        fn is_stopped(&self) -> bool {
            self.stopped
        }
    }

    #[test]
    fn test_one_shot_fires_once_and_leaves_queue() {
        let mut host = TestHost::new();
        let id = host.add(0, |h| {
            h.log.push("once");
            TimerAction::Remove
        });

        assert_eq!(host.tick().fired, 1);
        assert!(!host.timers.contains(id));
        assert_eq!(host.tick().fired, 0);
        assert_eq!(host.log, ["once"]);
    }

    #[test]
    fn test_zero_interval_keep_fires_every_scan() {
        let mut host = TestHost::new();
        host.add(0, |h| {
            h.log.push("tick");
            TimerAction::Keep
        });

        for _ in 0..3 {
            let tick = host.tick();
            assert_eq!(tick.fired, 1);
            assert_eq!(tick.wait_ms, MAX_WAIT, "an every-tick task does not shorten the wait");
        }
        assert_eq!(host.log.len(), 3);
    }

    #[test]
    fn test_same_tick_fires_in_reverse_registration_order() {
        let mut host = TestHost::new();
        host.add(10, |h| {
            h.log.push("A");
            TimerAction::Remove
        });
        host.add(10, |h| {
            h.log.push("B");
            TimerAction::Remove
        });
        host.add(10, |h| {
            h.log.push("C");
            TimerAction::Remove
        });

        assert_eq!(host.tick().fired, 0);
        host.now += 10;
        assert_eq!(host.tick().fired, 3);
        assert_eq!(host.log, ["C", "B", "A"]);
    }

    #[test]
    fn test_stall_is_coalesced_into_one_fire() {
        let mut host = TestHost::new();
        let id = host.add(50, |h| {
            h.log.push("p");
            TimerAction::Keep
        });

        host.now += 300;
        let tick = host.tick();

        assert_eq!(tick.fired, 1, "missed periods must collapse into one fire");
        let when = host.timers.due_at(id).unwrap();
        assert!(when > host.now);
        assert_eq!(when, 1_350);
        assert_eq!(tick.wait_ms, 50);
    }

    #[test]
    fn test_wait_is_min_positive_delta_capped() {
        let mut host = TestHost::new();
        host.add(2_000, |_| TimerAction::Keep);
        assert_eq!(host.tick().wait_ms, MAX_WAIT);

        host.add(120, |_| TimerAction::Keep);
        host.add(80, |_| TimerAction::Keep);
        let tick = host.tick();
        assert_eq!(tick.fired, 0);
        assert_eq!(tick.wait_ms, 80);
    }

    #[test]
    fn test_slow_callback_shortens_next_wait() {
        let mut host = TestHost::new();
        let id = host.add(50, |h| {
            h.now += 30;
            TimerAction::Keep
        });

        host.now += 50;
        let tick = host.tick();

        assert_eq!(tick.fired, 1);
        assert_eq!(host.timers.due_at(id), Some(1_100));
        assert_eq!(tick.wait_ms, 20, "time spent in the callback must not be slept again");
    }

    #[test]
    fn test_slow_callback_pulls_in_other_timers() {
        let mut host = TestHost::new();
        host.add(100, |_| TimerAction::Keep);
        host.add(0, |h| {
            h.now += 60;
            TimerAction::Remove
        });

        let tick = host.tick();
        assert_eq!(tick.fired, 1);
        assert_eq!(tick.wait_ms, 40);
    }

    #[test]
    fn test_timer_added_during_scan_waits_for_next_scan() {
        let mut host = TestHost::new();
        host.add(0, |h| {
            h.log.push("outer");
            h.add(0, |h| {
                h.log.push("inner");
                TimerAction::Remove
            });
            TimerAction::Remove
        });

        let tick = host.tick();
        assert_eq!(tick.fired, 1);
        assert_eq!(tick.wait_ms, 0, "a freshly added due timer must not be slept past");
        assert_eq!(host.log, ["outer"]);

        assert_eq!(host.tick().fired, 1);
        assert_eq!(host.log, ["outer", "inner"]);
        assert!(host.timers.is_empty());
    }

    #[test]
    fn test_removal_mid_scan_keeps_older_timers() {
        let mut host = TestHost::new();
        host.add(0, |h| {
            h.log.push("old");
            TimerAction::Keep
        });
        host.add(0, |h| {
            h.log.push("new");
            TimerAction::Remove
        });

        assert_eq!(host.tick().fired, 2);
        assert_eq!(host.timers.len(), 1);
        assert_eq!(host.log, ["new", "old"]);
    }

    #[test]
    fn test_stop_halts_dispatch_mid_scan() {
        let mut host = TestHost::new();
        host.add(0, |h| {
            h.log.push("never");
            TimerAction::Remove
        });
        host.add(0, |h| {
            h.log.push("stopper");
            h.stopped = true;
            TimerAction::Remove
        });

        assert_eq!(host.tick().fired, 1);
        assert_eq!(host.log, ["stopper"]);
        assert_eq!(host.timers.len(), 1);
    }

    #[test]
    fn test_clear_reports_dropped_count() {
        let mut host = TestHost::new();
        host.add(10, |_| TimerAction::Keep);
        host.add(20, |_| TimerAction::Keep);

        assert_eq!(host.timers.clear(), 2);
        assert!(host.timers.is_empty());
    }
}
