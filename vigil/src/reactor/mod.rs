//! Reactor core and event handling.
//!
//! This module implements the reactor: a single-threaded loop that
//! alternates between running due timers and waiting for descriptor
//! readiness. It is made of:
//! - the timer queue, which decides what is due and how long to sleep,
//! - the poll backend (`epoll`, `kqueue` or `select`), chosen at build
//!   time and hidden behind one interface,
//! - the driver, which owns both and dispatches into user callbacks.

mod builder;
mod core;
mod event;
mod io;
mod poller;
mod timer;

pub use self::builder::{DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_WAIT, ReactorBuilder, Termination};
pub use self::core::{IdleAction, IoHandler, Reactor};
pub use self::poller::common::Mode;
pub use self::timer::{TimerAction, TimerId};
