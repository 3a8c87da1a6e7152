use std::os::fd::RawFd;

/// Readiness interest for a registered file descriptor.
///
/// `oneshot` selects edge-triggered, single-fire delivery: after one
/// event the descriptor stays silent until it is explicitly re-armed.
/// Client sockets are always registered this way so a connection is
/// never handled by the dispatcher and a worker at the same time.
#[derive(Clone, Copy)]
pub(crate) struct Interest {
    pub(crate) read: bool,
    pub(crate) write: bool,
    pub(crate) oneshot: bool,
}

impl Interest {
    /// Persistent, level-triggered read interest (listener, signal
    /// channel).
    pub(crate) fn listen() -> Self {
        Self {
            read: true,
            write: false,
            oneshot: false,
        }
    }

    /// Single-fire read interest for a client socket.
    pub(crate) fn client_read() -> Self {
        Self {
            read: true,
            write: false,
            oneshot: true,
        }
    }

    /// Single-fire write interest for a client socket.
    pub(crate) fn client_write() -> Self {
        Self {
            read: false,
            write: true,
            oneshot: true,
        }
    }
}

/// Cheap handle to the epoll instance.
///
/// Registration and re-arming only need the epoll file descriptor, so
/// the handle can be cloned into worker-owned connection objects while
/// the poller itself stays with the dispatcher.
#[derive(Clone, Copy)]
pub struct PollerHandle(pub(crate) RawFd);
