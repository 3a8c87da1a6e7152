//! Linux `epoll`-based poller.
//!
//! This module owns the readiness-multiplexing context used by the
//! dispatcher.
//!
//! Responsibilities:
//! - Register file descriptors with read/write interests
//! - Arm client sockets edge-triggered and single-fire
//! - Block waiting for I/O readiness
//! - Translate raw epoll bits into [`Event`] records
//!
//! The dispatcher is the only caller of [`EpollPoller::poll`]; worker
//! threads re-arm interest through the cloned [`PollerHandle`].

use super::common::{Interest, PollerHandle};
use crate::reactor::event::Event;
use crate::reactor::poller::unix::sys_close;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLET, EPOLLHUP,
    EPOLLIN, EPOLLONESHOT, EPOLLOUT, EPOLLRDHUP, epoll_create1, epoll_ctl, epoll_event,
    epoll_wait,
};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Translates an [`Interest`] into epoll flag bits.
fn interest_flags(interest: Interest) -> u32 {
    let mut flags = 0;

    if interest.read {
        flags |= EPOLLIN;
    }
    if interest.write {
        flags |= EPOLLOUT;
    }
    if interest.oneshot {
        flags |= EPOLLET | EPOLLONESHOT | EPOLLRDHUP;
    }

    flags as u32
}

impl PollerHandle {
    /// Registers a file descriptor with the poller.
    ///
    /// The descriptor value doubles as the event token, matching the
    /// positional connection table.
    pub(crate) fn register(&self, fd: RawFd, interest: Interest) {
        let mut event = epoll_event {
            events: interest_flags(interest),
            u64: fd as u64,
        };

        let rc = unsafe { epoll_ctl(self.0, EPOLL_CTL_ADD, fd, &mut event) };
        debug_assert_eq!(rc, 0);
    }

    /// Re-arms a single-fire descriptor so it can deliver again.
    pub(crate) fn rearm(&self, fd: RawFd, interest: Interest) {
        let mut event = epoll_event {
            events: interest_flags(interest),
            u64: fd as u64,
        };

        let rc = unsafe { epoll_ctl(self.0, EPOLL_CTL_MOD, fd, &mut event) };
        debug_assert_eq!(rc, 0);
    }

    /// Removes a file descriptor from the poller.
    pub(crate) fn deregister(&self, fd: RawFd) {
        unsafe {
            epoll_ctl(self.0, EPOLL_CTL_DEL, fd, std::ptr::null_mut());
        }
    }
}

/// Linux `epoll` poller.
///
/// Owns the epoll instance and a reusable event buffer. Registration
/// goes through [`PollerHandle`], which can be cloned freely; polling
/// needs `&mut self` and therefore stays with the dispatcher thread.
pub(crate) struct EpollPoller {
    /// Epoll file descriptor.
    epoll: RawFd,

    /// Reusable buffer for epoll events.
    events: Vec<epoll_event>,
}

impl EpollPoller {
    /// Creates a new `EpollPoller`.
    ///
    /// A failure to create the epoll instance is a startup/environment
    /// fault and aborts the process.
    pub(crate) fn new() -> Self {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        assert!(epoll >= 0, "epoll_create1 failed");

        Self {
            epoll,
            events: Vec::with_capacity(64),
        }
    }

    /// Returns a cheap registration handle to this poller.
    pub(crate) fn handle(&self) -> PollerHandle {
        PollerHandle(self.epoll)
    }

    /// Polls for I/O readiness events.
    ///
    /// Blocks until at least one descriptor becomes ready or the
    /// optional timeout expires. An interrupted wait (`EINTR`) returns
    /// normally with an empty batch; the signal that caused it is
    /// observed through the signal channel on the next wake.
    pub(crate) fn poll(
        &mut self,
        events: &mut Vec<Event>,
        timeout: Option<Duration>,
    ) -> io::Result<()> {
        let timeout_ms = timeout.map(|t| t.as_millis() as i32).unwrap_or(-1);

        events.clear();

        unsafe {
            self.events.set_len(self.events.capacity());
        }

        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                self.events.capacity() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            unsafe {
                self.events.set_len(0);
            }

            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        unsafe {
            self.events.set_len(n as usize);
        }

        for ev in &self.events {
            let fd = ev.u64 as RawFd;

            let hangup = ev.events & ((EPOLLRDHUP | EPOLLHUP | EPOLLERR) as u32) != 0;
            let readable = ev.events & (EPOLLIN as u32) != 0;
            let writable = ev.events & (EPOLLOUT as u32) != 0;

            events.push(Event {
                fd,
                readable,
                writable,
                hangup,
            });
        }

        Ok(())
    }
}

impl Drop for EpollPoller {
    /// Releases the multiplexing context.
    fn drop(&mut self) {
        sys_close(self.epoll);
    }
}
