//! End-to-end request cycle: read, worker hand-off, write, re-arm.

mod common;

use limen::Config;
use std::thread;
use std::time::Duration;

#[test]
fn echoes_requests_and_frees_slots_on_disconnect() {
    let (addr, handle, server) = common::start(Config::new(0));

    // Keep-alive: several round trips over one connection.
    let mut stream = common::connect(addr);
    common::echo_roundtrip(&mut stream, b"hello");
    common::echo_roundtrip(&mut stream, b"again");
    common::echo_roundtrip(&mut stream, &[0xAB; 2048]);

    // One byte, then disconnect: the server must notice the hangup
    // and tear the slot down without faulting.
    let mut brief = common::connect(addr);
    common::echo_roundtrip(&mut brief, b"x");
    drop(brief);

    thread::sleep(Duration::from_millis(200));

    // The loop is still healthy after the teardown.
    let mut after = common::connect(addr);
    common::echo_roundtrip(&mut after, b"still alive");

    handle.shutdown();
    server.join().expect("reactor thread panicked");
}
