use std::os::fd::RawFd;

/// An I/O event reported by the poller.
///
/// An `Event` carries readiness information for one registered file
/// descriptor for one poll batch; it is produced by the poller,
/// consumed by the dispatcher, and never retained.
///
/// Hangup and error conditions are folded into `hangup` because the
/// dispatcher treats them identically: close the connection, remove
/// its timer. `readable` and `writable` carry only the plain
/// readiness bits.
pub(crate) struct Event {
    /// File descriptor the event fired for.
    ///
    /// The descriptor value is the token: the connection table is
    /// positional.
    pub(crate) fd: RawFd,

    /// The descriptor is readable.
    pub(crate) readable: bool,

    /// The descriptor is writable.
    pub(crate) writable: bool,

    /// The peer hung up, or the descriptor is in an error state.
    pub(crate) hangup: bool,
}
