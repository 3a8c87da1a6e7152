//! OS-signal-to-event bridge.
//!
//! Arbitrary logic cannot run safely inside a signal handler, so the
//! handler's only action is to write the numeric signal identifier as
//! a single byte into the non-blocking write end of a socketpair,
//! preserving the interrupted code's `errno`. The dispatcher monitors
//! the read end like any other descriptor, which sequences signal
//! effects into the same single-threaded control flow as all I/O.

use crate::reactor::poller::unix::{sys_close, sys_set_nonblocking};

use libc::c_int;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use std::{mem, ptr};

/// Byte tag for the eviction tick.
pub(crate) const TICK: u8 = libc::SIGALRM as u8;

/// Byte tag for graceful shutdown.
pub(crate) const SHUTDOWN: u8 = libc::SIGTERM as u8;

/// Write end of the signal channel, published for handler context.
///
/// The handler runs with no argument channel of its own, so the one
/// descriptor it needs lives in a process global. Everything else
/// about the channel is owned by the reactor.
static NOTIFY_FD: AtomicI32 = AtomicI32::new(-1);

/// The installed handler: forward the signal number and nothing else.
///
/// Must never block and must touch no shared state other than the
/// channel write. `errno` is saved and restored around the write.
extern "C" fn forward(sig: c_int) {
    let fd = NOTIFY_FD.load(Ordering::Relaxed);
    if fd < 0 {
        return;
    }

    unsafe {
        let errno = ptr::read(libc::__errno_location());

        let byte = sig as u8;
        libc::send(fd, &byte as *const u8 as *const _, 1, 0);

        ptr::write(libc::__errno_location(), errno);
    }
}

/// The unnamed byte pipe between handler context and the dispatcher.
///
/// The write end is non-blocking and only ever touched by the handler
/// (or a [`shutdown tag`](crate::ReactorHandle) injected through the
/// same framing); the read end is drained only by the dispatcher.
pub(crate) struct SignalChannel {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl SignalChannel {
    /// Creates the channel and publishes the write end for handlers.
    ///
    /// A failure to create the socketpair is a startup/environment
    /// fault and aborts the process.
    pub(crate) fn new() -> Self {
        let mut fds: [c_int; 2] = [0; 2];
        let rc = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
        assert!(rc != -1, "socketpair failed");

        let [read_fd, write_fd] = fds;

        let rc = sys_set_nonblocking(read_fd).and(sys_set_nonblocking(write_fd));
        assert!(rc.is_ok(), "failed to set signal channel non-blocking");

        NOTIFY_FD.store(write_fd, Ordering::Release);

        Self { read_fd, write_fd }
    }

    /// The monitored read end.
    pub(crate) fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    /// The write end, for injecting tags from outside handler context.
    pub(crate) fn write_fd(&self) -> RawFd {
        self.write_fd
    }

    /// Drains every pending byte without blocking, invoking `tag` for
    /// each. Empty and failed reads are ignored.
    pub(crate) fn drain(&self, mut tag: impl FnMut(u8)) {
        let mut buf = [0u8; 64];

        loop {
            let n = unsafe {
                libc::recv(
                    self.read_fd,
                    buf.as_mut_ptr() as *mut _,
                    buf.len(),
                    0,
                )
            };

            if n <= 0 {
                break;
            }

            for &byte in &buf[..n as usize] {
                tag(byte);
            }
        }
    }
}

impl Drop for SignalChannel {
    fn drop(&mut self) {
        NOTIFY_FD.store(-1, Ordering::Release);
        sys_close(self.write_fd);
        sys_close(self.read_fd);
    }
}

/// Injects one tag byte through the channel's write end.
///
/// Same framing as a real signal; used by [`crate::ReactorHandle`].
/// Errors are ignored: a closed channel means the loop has already
/// exited.
pub(crate) fn notify(write_fd: RawFd, byte: u8) {
    unsafe {
        libc::send(write_fd, &byte as *const u8 as *const _, 1, 0);
    }
}

/// Routes `sig` through the bridge.
///
/// `SA_RESTART` keeps interrupted syscalls transparent elsewhere in
/// the process; the full mask keeps the handler from being re-entered.
/// An installation failure is a startup fault and aborts the process.
pub(crate) fn install(sig: c_int) {
    let mut sa: libc::sigaction = unsafe { mem::zeroed() };
    sa.sa_sigaction = forward as libc::sighandler_t;
    sa.sa_flags = libc::SA_RESTART;
    unsafe {
        libc::sigfillset(&mut sa.sa_mask);
    }

    let rc = unsafe { libc::sigaction(sig, &sa, ptr::null_mut()) };
    assert!(rc != -1, "sigaction failed");
}

/// Ignores `sig` process-wide.
///
/// Used for `SIGPIPE`, so a write to a half-closed peer surfaces as
/// `EPIPE` on that one connection instead of killing the process.
pub(crate) fn ignore(sig: c_int) {
    let mut sa: libc::sigaction = unsafe { mem::zeroed() };
    sa.sa_sigaction = libc::SIG_IGN;
    unsafe {
        libc::sigfillset(&mut sa.sa_mask);
    }

    let rc = unsafe { libc::sigaction(sig, &sa, ptr::null_mut()) };
    assert!(rc != -1, "sigaction failed");
}

/// Arms the one-shot eviction tick.
///
/// The underlying interval timer fires `SIGALRM` once; the sweep path
/// re-arms it after every expiry pass, continuously regenerating the
/// tick for the lifetime of the loop.
pub(crate) fn arm_tick(interval: Duration) {
    let timer = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval {
            tv_sec: interval.as_secs() as libc::time_t,
            tv_usec: interval.subsec_micros() as libc::suseconds_t,
        },
    };

    unsafe {
        libc::setitimer(libc::ITIMER_REAL, &timer, ptr::null_mut());
    }
}

/// Disarms the eviction tick. Called during teardown.
pub(crate) fn disarm_tick() {
    let timer: libc::itimerval = unsafe { mem::zeroed() };

    unsafe {
        libc::setitimer(libc::ITIMER_REAL, &timer, ptr::null_mut());
    }
}
