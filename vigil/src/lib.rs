//! # Vigil
//!
//! **Vigil** is a minimal, embeddable reactor: a single-threaded event loop
//! that multiplexes two kinds of work on top of the best readiness mechanism
//! the platform offers:
//!
//! - **Timers**, one-shot or periodic, scheduled in milliseconds,
//! - **Descriptor readiness**, delivered to one shared read handler and one
//!   shared write handler.
//!
//! The poll backend is chosen at build time: edge-triggered `epoll` on
//! Linux, `kqueue` on macOS and the BSDs, and a `select(2)` descriptor-set
//! scan everywhere else. The `select` feature forces the scan on any unix
//! target. Backend resources are only created when the first descriptor is
//! registered.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use vigil::{Reactor, TimerAction};
//!
//! let mut reactor = Reactor::new();
//! let mut ticks = 0;
//!
//! reactor
//!     .add_timer(Duration::from_millis(10), move |_| {
//!         ticks += 1;
//!         if ticks == 3 {
//!             TimerAction::Remove
//!         } else {
//!             TimerAction::Keep
//!         }
//!     })
//!     .unwrap();
//!
//! // Returns once no timer is left.
//! reactor.run();
//! ```
//!
//! ## Scheduling rules
//!
//! - Within one iteration every due timer runs before any I/O is dispatched.
//! - Timers due on the same tick run most recently registered first.
//! - A periodic timer that missed several periods fires once, then skips
//!   ahead past the current time.
//! - By default [`Reactor::run`] returns as soon as no timer is pending, even
//!   if descriptors are registered; see [`Termination`].
//!
//! ## Logging
//!
//! Vigil reports backend setup, registrations and loop transitions through
//! [`tracing`]. It never installs a subscriber.

#[cfg(not(unix))]
compile_error!("vigil needs a unix target (epoll, kqueue or select).");

mod error;
mod reactor;
mod utils;

pub mod time;

pub use error::{Error, Result};
pub use reactor::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_WAIT, IdleAction, IoHandler, Mode, Reactor,
    ReactorBuilder, Termination, TimerAction, TimerId,
};
