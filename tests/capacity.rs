//! Admission control: accepts beyond the live-connection bound are
//! closed immediately, with no effect on established connections.

mod common;

use limen::Config;
use std::thread;
use std::time::Duration;

#[test]
fn saturated_table_drops_new_accepts_and_recovers_after_close() {
    let (addr, handle, server) = common::start(Config::new(0).max_connections(2));

    // Fill the table. A round trip guarantees each connection is fully
    // admitted before the next connect.
    let mut first = common::connect(addr);
    common::echo_roundtrip(&mut first, b"one");
    let mut second = common::connect(addr);
    common::echo_roundtrip(&mut second, b"two");

    // Beyond capacity: closed at accept time.
    let mut rejected = common::connect(addr);
    common::expect_eof(&mut rejected);

    // The established connections are untouched by the drop.
    common::echo_roundtrip(&mut first, b"still one");
    common::echo_roundtrip(&mut second, b"still two");

    // Closing one frees its slot and decrements the live count, so
    // the next accept is admitted again.
    drop(first);
    thread::sleep(Duration::from_millis(200));

    let mut third = common::connect(addr);
    common::echo_roundtrip(&mut third, b"three");

    handle.shutdown();
    server.join().expect("reactor thread panicked");
}
