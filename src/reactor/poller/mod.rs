//! Readiness-multiplexing backend.
//!
//! The poller is used by the dispatcher to:
//! - wait for I/O readiness events,
//! - arm client descriptors edge-triggered and single-fire,
//! - surface signal-channel readability like any other event.
//!
//! The dispatcher relies on POSIX signal delivery and `epoll`
//! single-fire semantics, so only a Linux backend exists.

pub(crate) mod common;
pub(crate) mod unix;

pub use common::PollerHandle;

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(target_os = "linux")]
pub(crate) type Poller = epoll::EpollPoller;
