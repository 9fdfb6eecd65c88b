//! Platform-specific I/O poller abstraction.
//!
//! This module provides a unified interface over the readiness
//! mechanisms the reactor can sit on:
//!
//! - `epoll` (edge-triggered) on Linux and Android,
//! - `kqueue` on macOS, iOS and the BSDs,
//! - a `select(2)` descriptor-set scan everywhere else.
//!
//! The concrete implementation is selected at compile time. Enabling
//! the `select` feature forces the descriptor-set scan on every unix
//! target. All three implement [`Backend`], so nothing above this
//! module depends on which one was chosen.

pub(crate) mod common;

pub(crate) use common::Backend;

#[cfg(any(target_os = "linux", target_os = "android"))]
#[cfg_attr(feature = "select", allow(dead_code))]
mod epoll;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
#[cfg_attr(feature = "select", allow(dead_code))]
mod kqueue;

// Always built on unix so the fallback stays tested on every platform.
#[cfg_attr(
    all(
        not(feature = "select"),
        any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd",
            target_os = "dragonfly"
        )
    ),
    allow(dead_code)
)]
pub(crate) mod select;

#[cfg(all(not(feature = "select"), any(target_os = "linux", target_os = "android")))]
pub(crate) type Poller = epoll::EpollPoller;

#[cfg(all(
    not(feature = "select"),
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    )
))]
pub(crate) type Poller = kqueue::KqueuePoller;

#[cfg(any(
    feature = "select",
    not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))
))]
pub(crate) type Poller = select::SelectPoller;
