use crate::config::Config;
use crate::conn::{Connection, Shared};
use crate::error::Error;
use crate::net::listener::Listener;
use crate::pool::Pool;
use crate::reactor::event::Event;
use crate::reactor::poller::Poller;
use crate::reactor::poller::common::Interest;
use crate::reactor::poller::unix::sys_close;
use crate::reactor::signal::{self, SignalChannel};
use crate::reactor::table::{ConnHandle, ConnTable};
use crate::reactor::timer::TimerList;

use std::io;
use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{mem, process};

use tracing::{debug, info, trace};

/// The reactor.
///
/// One `Reactor` owns everything the dispatch loop touches: the
/// readiness-multiplexing context, the listening socket, the signal
/// channel, the timer list, the connection table and the worker pool.
/// Exactly one thread runs [`Reactor::run`]; that thread is the sole
/// mutator of the timer list and the table, so neither needs a lock.
pub struct Reactor<C: Connection + Default> {
    /// First field: dropped first, so workers drain before the state
    /// they might still reference below is torn down.
    pool: Pool<C>,

    poller: Poller,
    listener: Listener,
    signals: SignalChannel,
    timers: TimerList,
    table: ConnTable<C>,

    /// State shared with connection objects (multiplexer handle,
    /// live-connection counter).
    shared: Arc<Shared>,

    /// Reusable buffer for one poll batch.
    events: Vec<Event>,

    max_connections: usize,
    idle_timeout: Duration,
    tick: Duration,

    /// Set by a bridged shutdown signal; checked once per iteration.
    stop: bool,

    /// Set by a bridged tick; expiry runs after the I/O batch.
    timers_due: bool,
}

/// A handle for requesting shutdown from outside the loop.
///
/// `shutdown` injects the shutdown tag through the signal channel's
/// write end, the same one-byte framing a real termination signal
/// uses, so the request is sequenced with all other events.
#[derive(Clone)]
pub struct ReactorHandle {
    notify: RawFd,
}

impl ReactorHandle {
    /// Asks the loop to exit after at most the current event batch.
    pub fn shutdown(&self) {
        signal::notify(self.notify, signal::SHUTDOWN);
    }
}

impl<C: Connection + Default> Reactor<C> {
    /// Sets up the full reactor: worker pool, listener, multiplexer,
    /// signal bridge, timer list and connection table.
    ///
    /// `SIGPIPE` is ignored and `SIGALRM`/`SIGTERM` are routed through
    /// the bridge as part of setup. Multiplexer and signal-channel
    /// creation abort on failure; socket and pool failures are
    /// returned.
    pub fn bind(config: Config) -> Result<Self, Error> {
        signal::ignore(libc::SIGPIPE);

        let pool = Pool::new(config.workers, config.pool_capacity).map_err(Error::Pool)?;
        let listener = Listener::bind(config.port, config.backlog)?;

        let poller = Poller::new();
        let signals = SignalChannel::new();

        let handle = poller.handle();
        handle.register(listener.raw_fd(), Interest::listen());
        handle.register(signals.read_fd(), Interest::listen());

        signal::install(libc::SIGALRM);
        signal::install(libc::SIGTERM);

        Ok(Self {
            pool,
            poller,
            listener,
            signals,
            timers: TimerList::new(),
            table: ConnTable::new(config.max_fds),
            shared: Arc::new(Shared::new(handle)),
            events: Vec::new(),
            max_connections: config.max_connections,
            idle_timeout: config.idle_timeout(),
            tick: config.tick,
            stop: false,
            timers_due: false,
        })
    }

    /// The address the listener actually bound.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a shutdown handle for this reactor.
    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            notify: self.signals.write_fd(),
        }
    }

    /// Runs the poll-and-dispatch loop until a shutdown signal.
    ///
    /// The poll call is the only blocking point and blocks
    /// indefinitely; every socket operation issued from here is
    /// non-blocking. Deferred timer expiry runs after each batch:
    /// I/O is always serviced ahead of eviction in the same wake.
    pub fn run(&mut self) -> io::Result<()> {
        signal::arm_tick(self.tick);
        info!(pid = process::id(), "reactor loop started");

        while !self.stop {
            self.poller.poll(&mut self.events, None)?;

            let events = mem::take(&mut self.events);
            for event in &events {
                self.dispatch(event);
            }
            self.events = events;

            if self.timers_due {
                self.timers_due = false;
                self.expire_idle();
            }
        }

        signal::disarm_tick();
        info!("reactor loop stopped");

        Ok(())
    }

    /// Routes one readiness event by descriptor identity and bits.
    fn dispatch(&mut self, event: &Event) {
        if event.fd == self.listener.raw_fd() {
            if event.readable {
                self.accept_pending();
            }
        } else if event.fd == self.signals.read_fd() {
            if event.readable {
                self.drain_signals();
            }
        } else if event.hangup {
            self.close_connection(event.fd);
        } else if event.readable {
            self.connection_readable(event.fd);
        } else if event.writable {
            self.connection_writable(event.fd);
        }
    }

    /// Drains the pending-connection queue until it would block.
    fn accept_pending(&mut self) {
        loop {
            let (fd, peer) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    // Transient fault: skip this event, keep the loop
                    // alive.
                    debug!(error = %e, "accept failed");
                    break;
                }
            };

            if self.shared.live() >= self.max_connections || !self.table.covers(fd) {
                // Admission control: close immediately, no slot, no
                // timer, no registration.
                trace!(fd, live = self.shared.live(), "at capacity, dropping connection");
                sys_close(fd);
                continue;
            }

            let (generation, conn) = self.table.open(fd);
            conn.lock().unwrap().init(fd, peer, self.shared.clone());

            self.poller.handle().register(fd, Interest::client_read());

            let expiry = Instant::now() + self.idle_timeout;
            let timer = self.timers.add(expiry, ConnHandle { fd, generation });
            self.table.attach_timer(fd, timer);

            debug!(fd, %peer, "connection accepted");
        }
    }

    /// Empties the signal channel, folding tags into the loop flags.
    ///
    /// Tags are deferred on purpose: the tick only marks timers as
    /// due, and expiry runs after the I/O batch.
    fn drain_signals(&mut self) {
        let mut due = self.timers_due;
        let mut stop = self.stop;

        self.signals.drain(|byte| match byte {
            signal::TICK => due = true,
            signal::SHUTDOWN => stop = true,
            _ => {}
        });

        self.timers_due = due;
        self.stop = stop;
    }

    /// A connection became readable with no error bits.
    fn connection_readable(&mut self, fd: RawFd) {
        let Some(conn) = self.table.conn(fd) else {
            return;
        };

        if !conn.lock().unwrap().read() {
            self.close_connection(fd);
            return;
        }

        // Activity pushes the eviction deadline forward.
        if let Some(timer) = self.table.timer(fd) {
            self.timers.refresh(timer, Instant::now() + self.idle_timeout);
        }

        if !self.pool.append(conn) {
            // Saturated pool: drop and close rather than stall the
            // dispatcher.
            debug!(fd, "worker pool saturated, dropping connection");
            self.close_connection(fd);
        }
    }

    /// A connection became writable.
    fn connection_writable(&mut self, fd: RawFd) {
        let Some(conn) = self.table.conn(fd) else {
            return;
        };

        if !conn.lock().unwrap().write() {
            self.close_connection(fd);
        }
    }

    /// Closes a connection and removes its timer.
    ///
    /// Idempotent: a slot already closed in this batch (however many
    /// readiness bits fired for it) is left alone.
    fn close_connection(&mut self, fd: RawFd) {
        let Some((conn, timer)) = self.table.close(fd) else {
            return;
        };

        if let Some(timer) = timer {
            self.timers.remove(timer);
        }

        conn.lock().unwrap().close();
        debug!(fd, "connection closed");
    }

    /// Sweeps expired timers and re-arms the tick.
    fn expire_idle(&mut self) {
        let now = Instant::now();

        let mut expired = Vec::new();
        self.timers.sweep(now, |conn| expired.push(conn));

        for handle in expired {
            // The generation guard skips slots reused since the timer
            // was created.
            if self.table.matches(handle) {
                info!(fd = handle.fd, "evicting idle connection");
                self.close_connection(handle.fd);
            }
        }

        debug!(remaining = self.timers.len(), "sweep complete");
        signal::arm_tick(self.tick);
    }
}
