//! # Limen
//!
//! **Limen** is a single-process, event-driven TCP server front end.
//! It multiplexes many concurrent client connections over one epoll
//! instance, hands completed reads to a bounded worker pool, and
//! evicts idle connections on a timeout.
//!
//! The crate is built around three pieces:
//!
//! - A **reactor** running the single blocking poll-and-dispatch loop:
//!   the only thread that mutates the timer list and the connection
//!   table, so neither needs a lock.
//! - A **signal bridge** that turns OS signals (`SIGALRM` ticks,
//!   `SIGTERM` shutdown) into ordinary readable events on a dedicated
//!   descriptor, sequencing them with all other I/O.
//! - A **sorted timer list** with constant-time removal and
//!   forward-only refresh, so idle-connection eviction never pays for
//!   a full re-sort.
//!
//! Client descriptors are armed edge-triggered and single-fire: after
//! an event fires, the descriptor stays silent until re-armed, which
//! hands ownership of a connection back and forth between the
//! dispatcher and a pool worker without locking or races.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use limen::{Config, EchoConn, Reactor};
//!
//! let config = Config::new(9001).max_connections(1024);
//! let mut reactor = Reactor::<EchoConn>::bind(config)?;
//!
//! reactor.run()?;
//! ```
//!
//! Protocol behavior lives behind the [`Connection`] trait; the
//! bundled [`EchoConn`] is a keep-alive echo session exercising the
//! full read → worker → write → re-arm cycle.

mod config;
mod conn;
mod echo;
mod error;
mod net;
mod pool;
mod reactor;
mod utils;

pub use config::Config;
pub use conn::{Connection, Shared};
pub use echo::EchoConn;
pub use error::Error;
pub use pool::Pool;
pub use reactor::{Reactor, ReactorHandle};
