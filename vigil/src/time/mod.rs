//! Time sources.
//!
//! The reactor schedules everything in whole milliseconds read from a
//! [`Clock`]. [`MonotonicClock`] is used unless the builder is given
//! another one; [`ManualClock`] lets tests and simulations drive time
//! by hand.

mod clock;

#[doc(inline)]
pub use clock::{Clock, ManualClock, MonotonicClock};
