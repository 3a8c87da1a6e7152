//! A keep-alive echo session.
//!
//! `EchoConn` is the reference [`Connection`] implementation: it reads
//! a request until the socket would block, a worker stages the bytes
//! back into the output buffer and arms write interest, and the next
//! writable event flushes them and re-arms for the next request.

use crate::conn::{Connection, Shared};
use crate::reactor::poller::unix::{sys_close, sys_read, sys_write};

use std::io;
use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::sync::Arc;

/// One echo session, living in a connection-table slot.
pub struct EchoConn {
    /// Owned descriptor, `-1` while closed.
    fd: RawFd,

    peer: Option<SocketAddr>,
    shared: Option<Arc<Shared>>,

    /// Bytes read from the peer, pending processing.
    in_buffer: Vec<u8>,

    /// Bytes staged for the peer, pending flush.
    out_buffer: Vec<u8>,
}

impl Default for EchoConn {
    fn default() -> Self {
        Self {
            fd: -1,
            peer: None,
            shared: None,
            in_buffer: Vec::new(),
            out_buffer: Vec::new(),
        }
    }
}

impl EchoConn {
    /// The peer address, while the session is bound.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn shared(&self) -> &Shared {
        // Set by `init` before the dispatcher ever routes an event here.
        self.shared.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl Connection for EchoConn {
    fn init(&mut self, fd: RawFd, peer: SocketAddr, shared: Arc<Shared>) {
        self.fd = fd;
        self.peer = Some(peer);
        self.in_buffer.clear();
        self.out_buffer.clear();

        shared.connection_opened();
        self.shared = Some(shared);
    }

    /// Reads until the socket would block.
    ///
    /// Returns `false` on EOF or a hard error; the dispatcher closes
    /// the session in response.
    fn read(&mut self) -> bool {
        let mut temp = [0u8; 1024];

        loop {
            let n = sys_read(self.fd, &mut temp);

            match n {
                1.. => {
                    self.in_buffer.extend_from_slice(&temp[..n as usize]);
                }
                0 => {
                    return false;
                }
                _ => {
                    let err = io::Error::last_os_error();

                    if err.kind() == io::ErrorKind::WouldBlock {
                        break;
                    } else {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Flushes staged output.
    ///
    /// On a partial flush the session re-arms write interest itself; on
    /// completion it re-arms read interest for the next request.
    fn write(&mut self) -> bool {
        while !self.out_buffer.is_empty() {
            let n = sys_write(self.fd, &self.out_buffer);

            if n > 0 {
                self.out_buffer.drain(..n as usize);
            } else {
                let err = io::Error::last_os_error();

                if err.kind() == io::ErrorKind::WouldBlock {
                    self.shared().rearm_writable(self.fd);
                    return true;
                }
                return false;
            }
        }

        self.shared().rearm_readable(self.fd);
        true
    }

    /// Stages the echoed request and asks for a writable event.
    fn process(&mut self) {
        if !self.is_open() {
            return;
        }

        let request = std::mem::take(&mut self.in_buffer);
        self.out_buffer.extend_from_slice(&request);
        self.shared().rearm_writable(self.fd);
    }

    fn close(&mut self) {
        if self.fd < 0 {
            return;
        }

        let fd = self.fd;
        self.fd = -1;

        if let Some(shared) = &self.shared {
            shared.deregister(fd);
            shared.connection_closed();
        }
        sys_close(fd);
    }

    fn is_open(&self) -> bool {
        self.fd >= 0
    }
}
