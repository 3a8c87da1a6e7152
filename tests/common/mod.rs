use limen::{Config, EchoConn, Reactor, ReactorHandle};

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

/// Starts a reactor on an ephemeral port and runs it on its own
/// thread.
///
/// One server per test process: signal handlers and the interval timer
/// are process-wide.
pub fn start(config: Config) -> (SocketAddr, ReactorHandle, JoinHandle<()>) {
    let mut reactor = Reactor::<EchoConn>::bind(config).expect("failed to set up reactor");
    let addr = reactor.local_addr().expect("no listening address");
    let handle = reactor.handle();

    let thread = std::thread::spawn(move || {
        reactor.run().expect("reactor loop failed");
    });

    (addr, handle, thread)
}

/// Connects to the server over loopback with sane timeouts.
pub fn connect(addr: SocketAddr) -> TcpStream {
    let target = SocketAddr::from(([127, 0, 0, 1], addr.port()));
    let stream = TcpStream::connect(target).expect("failed to connect");

    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .expect("failed to set read timeout");

    stream
}

/// One request/response round trip.
pub fn echo_roundtrip(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(payload).expect("failed to send");

    let mut response = vec![0u8; payload.len()];
    stream
        .read_exact(&mut response)
        .expect("failed to read echo");

    assert_eq!(response, payload);
}

/// Reads until EOF, asserting the server closed the connection.
pub fn expect_eof(stream: &mut TcpStream) {
    let mut buf = [0u8; 32];

    loop {
        match stream.read(&mut buf) {
            Ok(0) => return,
            Ok(_) => continue,
            Err(e) => panic!("expected server-side close, got error: {e}"),
        }
    }
}
