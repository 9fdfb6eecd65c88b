//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the reactor.
//! In particular, it exposes a generational [`Slab`] arena that stores
//! timer events behind stable keys.

mod slab;

pub(crate) use slab::{Key, Slab};
