//! Bounded worker pool.
//!
//! A fixed set of worker threads consumes connections handed off by
//! the dispatcher after a successful read. The queue is bounded:
//! [`Pool::append`] reports saturation instead of growing without
//! limit, and the dispatcher decides what to do with the refusal.
//!
//! Workers only ever touch the connection object they dequeued, never
//! the timer list or the connection table. Completion is communicated
//! back solely by the connection re-arming its own interest.

use crate::conn::Connection;

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::{mem, thread};

/// State shared between the pool handle and its workers.
struct Inner<C> {
    /// Pending connections awaiting a worker.
    queue: Mutex<VecDeque<Arc<Mutex<C>>>>,

    /// Wakes parked workers when work arrives or shutdown begins.
    available: Condvar,

    /// Set once; workers drain the queue and exit.
    shutdown: AtomicBool,

    /// Maximum number of queued connections.
    capacity: usize,
}

/// A bounded pool of worker threads.
///
/// Dropping the pool initiates shutdown: the queue is drained by the
/// workers, then every thread is joined. No in-flight task is
/// cancelled.
pub struct Pool<C: Connection> {
    inner: Arc<Inner<C>>,
    workers: Vec<JoinHandle<()>>,
}

impl<C: Connection> Pool<C> {
    /// Spawns `workers` threads behind a queue of at most `capacity`
    /// pending connections.
    ///
    /// Thread spawning can fail under resource exhaustion; the error
    /// is returned so the caller can refuse to start.
    pub fn new(workers: usize, capacity: usize) -> io::Result<Self> {
        assert!(workers > 0, "workers must be > 0");
        assert!(capacity > 0, "capacity must be > 0");

        let inner = Arc::new(Inner {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            capacity,
        });

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let inner = inner.clone();

            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || run_worker(&inner))?;

            handles.push(handle);
        }

        Ok(Self {
            inner,
            workers: handles,
        })
    }

    /// Hands a connection to the pool.
    ///
    /// Returns `false` when the queue is full, a backpressure signal
    /// rather than an error. The connection is not enqueued in that
    /// case.
    pub fn append(&self, conn: Arc<Mutex<C>>) -> bool {
        let mut queue = self.inner.queue.lock().unwrap();

        if queue.len() >= self.inner.capacity {
            return false;
        }

        queue.push_back(conn);
        drop(queue);

        self.inner.available.notify_one();
        true
    }

    /// Number of connections currently queued.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }
}

impl<C: Connection> Drop for Pool<C> {
    /// Drains the queue and joins every worker.
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.available.notify_all();

        for handle in mem::take(&mut self.workers) {
            let _ = handle.join();
        }
    }
}

/// The worker loop: dequeue, process, repeat.
///
/// On shutdown the remaining queue is drained before the thread exits,
/// so no accepted hand-off is silently dropped.
fn run_worker<C: Connection>(inner: &Inner<C>) {
    loop {
        let mut queue = inner.queue.lock().unwrap();

        while queue.is_empty() && !inner.shutdown.load(Ordering::Acquire) {
            queue = inner.available.wait(queue).unwrap();
        }

        let Some(conn) = queue.pop_front() else {
            // Empty queue with shutdown set: nothing left to drain.
            return;
        };
        drop(queue);

        conn.lock().unwrap().process();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::Shared;
    use std::net::SocketAddr;
    use std::os::fd::RawFd;
    use std::sync::mpsc;
    use std::time::Duration;

    /// A connection whose `process` blocks until released, so tests
    /// can hold a worker busy deterministically.
    struct GatedConn {
        started: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
        processed: Arc<AtomicBool>,
    }

    impl Connection for GatedConn {
        fn init(&mut self, _fd: RawFd, _peer: SocketAddr, _shared: Arc<Shared>) {}

        fn read(&mut self) -> bool {
            true
        }

        fn write(&mut self) -> bool {
            true
        }

        fn process(&mut self) {
            let _ = self.started.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(5));
            self.processed.store(true, Ordering::Release);
        }

        fn close(&mut self) {}

        fn is_open(&self) -> bool {
            true
        }
    }

    fn gated() -> (
        Arc<Mutex<GatedConn>>,
        mpsc::Receiver<()>,
        mpsc::Sender<()>,
        Arc<AtomicBool>,
    ) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let processed = Arc::new(AtomicBool::new(false));

        let conn = Arc::new(Mutex::new(GatedConn {
            started: started_tx,
            release: release_rx,
            processed: processed.clone(),
        }));

        (conn, started_rx, release_tx, processed)
    }

    #[test]
    fn append_fails_only_when_queue_is_full() {
        let pool: Pool<GatedConn> = Pool::new(1, 1).unwrap();

        let (busy, busy_started, busy_release, _) = gated();
        let (queued, _queued_started, queued_release, _) = gated();
        let (rejected, _rejected_started, _rejected_release, _) = gated();

        // Occupy the single worker, then fill the single queue slot.
        assert!(pool.append(busy));
        busy_started
            .recv_timeout(Duration::from_secs(5))
            .expect("worker never picked up the first connection");

        assert!(pool.append(queued));
        assert!(!pool.append(rejected));

        busy_release.send(()).unwrap();
        queued_release.send(()).unwrap();
    }

    #[test]
    fn shutdown_drains_queued_connections() {
        let (first, first_started, first_release, first_processed) = gated();
        let (second, _second_started, second_release, second_processed) = gated();

        let pool: Pool<GatedConn> = Pool::new(1, 8).unwrap();

        assert!(pool.append(first));
        first_started
            .recv_timeout(Duration::from_secs(5))
            .expect("worker never started");
        assert!(pool.append(second));

        first_release.send(()).unwrap();
        second_release.send(()).unwrap();
        drop(pool);

        assert!(first_processed.load(Ordering::Acquire));
        assert!(second_processed.load(Ordering::Acquire));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let result = std::panic::catch_unwind(|| Pool::<GatedConn>::new(0, 1));
        assert!(result.is_err());
    }
}
