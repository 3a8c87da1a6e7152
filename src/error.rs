use std::io;
use thiserror::Error;

/// Startup faults.
///
/// Everything here is an environment or configuration problem observed
/// before the dispatch loop starts; the process treats them as fatal
/// rather than attempting recovery. Runtime conditions (a broken
/// connection, a saturated pool, a rejected accept) are not errors and
/// never surface through this type.
#[derive(Debug, Error)]
pub enum Error {
    /// Creating or configuring the listening socket failed.
    #[error("failed to create listening socket: {0}")]
    Socket(#[source] io::Error),

    /// Binding the wildcard address failed.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Marking the socket as listening failed.
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),

    /// Spawning the worker pool failed.
    #[error("failed to construct worker pool: {0}")]
    Pool(#[source] io::Error),
}
