//! Idle connections are evicted by the timer sweep; active ones are
//! not.

mod common;

use limen::Config;
use std::time::{Duration, Instant};

#[test]
fn idle_connection_is_evicted_while_active_one_survives() {
    let tick = Duration::from_millis(100);
    let (addr, handle, server) = common::start(Config::new(0).tick(tick));

    let mut idle = common::connect(addr);
    let mut active = common::connect(addr);

    // Activity on one connection must keep refreshing its deadline
    // well past the idle connection's eviction.
    let started = Instant::now();
    while started.elapsed() < Duration::from_millis(900) {
        common::echo_roundtrip(&mut active, b"ping");
        std::thread::sleep(Duration::from_millis(100));
    }

    // The idle peer sent nothing for ~9 ticks (deadline is 3), so the
    // sweep must have closed it by now.
    common::expect_eof(&mut idle);

    // The active peer is still usable.
    common::echo_roundtrip(&mut active, b"ping");

    handle.shutdown();
    server.join().expect("reactor thread panicked");
}
