//! The per-connection protocol contract and the state shared with it.

use crate::reactor::poller::PollerHandle;
use crate::reactor::poller::common::Interest;

use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Reactor-owned state handed to every connection.
///
/// This is the explicit aggregate behind what admission control needs:
/// the multiplexer handle (for re-arming single-fire interest and for
/// deregistration on close) and the live-connection counter. It is
/// constructed once before the loop starts and shared by reference.
pub struct Shared {
    poller: PollerHandle,
    live: AtomicUsize,
}

impl Shared {
    pub(crate) fn new(poller: PollerHandle) -> Self {
        Self {
            poller,
            live: AtomicUsize::new(0),
        }
    }

    /// Number of currently open connections.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Records a newly opened connection. Called from `init`.
    pub fn connection_opened(&self) {
        self.live.fetch_add(1, Ordering::AcqRel);
    }

    /// Records a closed connection. Called from `close`.
    pub fn connection_closed(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }

    /// Re-arms single-fire read interest for `fd`.
    pub fn rearm_readable(&self, fd: RawFd) {
        self.poller.rearm(fd, Interest::client_read());
    }

    /// Re-arms single-fire write interest for `fd`.
    pub fn rearm_writable(&self, fd: RawFd) {
        self.poller.rearm(fd, Interest::client_write());
    }

    /// Removes `fd` from the multiplexer.
    pub fn deregister(&self, fd: RawFd) {
        self.poller.deregister(fd);
    }
}

/// A protocol session owned by one table slot.
///
/// The dispatcher drives `read` and `write` from readiness events; a
/// pool worker runs `process` after a successful read. Single-fire
/// interest guarantees the two never overlap, so implementations see
/// strictly sequential calls.
///
/// Contract:
/// - `init` is called on accept, possibly re-initializing a slot whose
///   previous occupant has closed; it must reset all session state and
///   call [`Shared::connection_opened`].
/// - `read` drains the socket without blocking and returns `false` when
///   the session is broken (EOF, error); the dispatcher then closes
///   it. Returning `true` hands the session to the worker pool.
/// - `process` runs on a worker thread; when it wants to emit a
///   response it re-arms write interest through [`Shared`]. It must not
///   touch the reactor's timer list or connection table.
/// - `write` flushes buffered output without blocking and returns
///   `false` when the session is broken. Any follow-up re-arming is the
///   implementation's own responsibility.
/// - `close` releases the descriptor, deregisters it and calls
///   [`Shared::connection_closed`]; calling it twice must be harmless.
pub trait Connection: Send + 'static {
    /// Binds this session to a freshly accepted descriptor.
    fn init(&mut self, fd: RawFd, peer: SocketAddr, shared: Arc<Shared>);

    /// Drains readable data. `false` means the session is broken.
    fn read(&mut self) -> bool;

    /// Flushes writable data. `false` means the session is broken.
    fn write(&mut self) -> bool;

    /// Worker-side request processing.
    fn process(&mut self);

    /// Releases the descriptor. Idempotent.
    fn close(&mut self);

    /// Whether the session currently owns a descriptor.
    fn is_open(&self) -> bool;
}
