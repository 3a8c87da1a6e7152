use crate::error::Error;
use crate::reactor::poller::unix::{
    socketaddr_to_storage, sys_accept, sys_bind, sys_close, sys_listen, sys_set_reuseaddr,
    sys_sockname, sys_socket,
};

use libc::AF_INET;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::fd::RawFd;

/// The non-blocking listening socket.
///
/// Bound to the wildcard address on the configured port with
/// `SO_REUSEADDR` enabled. Port `0` asks the OS for an ephemeral port;
/// [`Listener::local_addr`] reports the one actually bound.
pub(crate) struct Listener {
    /// File descriptor of the listening socket.
    fd: RawFd,
}

impl Listener {
    /// Binds the listener.
    ///
    /// This:
    /// - creates a non-blocking socket,
    /// - enables `SO_REUSEADDR`,
    /// - binds the wildcard address,
    /// - starts listening with the given backlog.
    pub(crate) fn bind(port: u16, backlog: i32) -> Result<Self, Error> {
        let fd = sys_socket(AF_INET).map_err(Error::Socket)?;

        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let (storage, len) = socketaddr_to_storage(&addr);

        let result = sys_set_reuseaddr(fd)
            .map_err(Error::Socket)
            .and_then(|()| sys_bind(fd, &storage, len).map_err(|source| Error::Bind { port, source }))
            .and_then(|()| sys_listen(fd, backlog).map_err(Error::Listen));

        if let Err(e) = result {
            sys_close(fd);
            return Err(e);
        }

        Ok(Self { fd })
    }

    /// Accepts one pending connection.
    ///
    /// The returned socket is already non-blocking. `WouldBlock` means
    /// the pending queue is drained.
    pub(crate) fn accept(&self) -> io::Result<(RawFd, SocketAddr)> {
        sys_accept(self.fd)
    }

    /// Returns the local socket address of this listener.
    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        sys_sockname(self.fd)
    }

    /// The raw listening descriptor, for poller registration and event
    /// classification.
    pub(crate) fn raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Listener {
    /// Closes the listening socket.
    fn drop(&mut self) {
        sys_close(self.fd);
    }
}
