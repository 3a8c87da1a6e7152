//! Graceful shutdown through the signal bridge.

mod common;

use limen::Config;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

#[test]
fn shutdown_request_stops_the_loop() {
    let (addr, handle, server) = common::start(Config::new(0));

    // A connection may be mid-session when shutdown arrives; the loop
    // still exits after at most the current batch.
    let mut stream = common::connect(addr);
    common::echo_roundtrip(&mut stream, b"last words");

    handle.shutdown();
    server.join().expect("reactor thread panicked");

    // The listener is gone once the loop has exited.
    thread::sleep(Duration::from_millis(100));
    let refused = TcpStream::connect_timeout(
        &std::net::SocketAddr::from(([127, 0, 0, 1], addr.port())),
        Duration::from_millis(500),
    );
    assert!(refused.is_err(), "listener should be closed after shutdown");
}
