//! Reactor core and event handling.
//!
//! This module implements the server's reactor:
//! - the single-threaded poll-and-dispatch loop,
//! - the signal bridge that turns OS signals into readable events,
//! - the sorted timer list driving idle-connection eviction,
//! - the positional connection table with admission control.
//!
//! Everything here mutates on exactly one thread; worker threads see
//! only connection objects and the cloned poller handle.

mod core;
mod event;
mod signal;
mod table;
mod timer;

pub(crate) mod poller;

pub use self::core::{Reactor, ReactorHandle};
