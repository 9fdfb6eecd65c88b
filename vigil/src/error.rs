use std::io;
use std::os::fd::RawFd;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned synchronously by reactor registration calls.
///
/// Nothing is reported asynchronously from inside [`Reactor::run`]:
/// failures during a backend wait are logged and the iteration
/// degrades to a plain sleep.
///
/// [`Reactor::run`]: crate::Reactor::run
#[derive(Debug, Error)]
pub enum Error {
    /// A descriptor was negative or outside what the backend can watch.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Storage for a timer event or a descriptor registration could not
    /// be allocated.
    #[error("out of memory")]
    OutOfMemory,

    /// The native add/modify/delete call, or creation of the native
    /// handle itself, failed.
    #[error("backend registration failed for descriptor {fd}: {source}")]
    BackendRegistration {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}
