use std::time::Duration;

/// Reactor configuration.
///
/// `Config` uses builder-style setters so callers only name what they
/// change.
///
/// # Examples
///
/// ```rust,ignore
/// let config = Config::new(9001)
///     .max_connections(1024)
///     .tick(Duration::from_secs(5));
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// TCP port to listen on; `0` asks the OS for an ephemeral port.
    pub(crate) port: u16,

    /// Admission bound: live connections beyond this are dropped at
    /// accept time.
    pub(crate) max_connections: usize,

    /// Descriptor-space bound: size of the positional connection
    /// table.
    pub(crate) max_fds: usize,

    /// Eviction tick. A connection idle past three ticks is evicted by
    /// the next sweep.
    pub(crate) tick: Duration,

    /// Listen backlog.
    pub(crate) backlog: i32,

    /// Worker threads in the pool.
    pub(crate) workers: usize,

    /// Bound on connections queued for the pool.
    pub(crate) pool_capacity: usize,
}

impl Config {
    /// Creates a configuration for `port` with defaults everywhere
    /// else.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            max_connections: 65536,
            max_fds: 65536,
            tick: Duration::from_secs(5),
            backlog: 5,
            workers: 8,
            pool_capacity: 10000,
        }
    }

    /// Sets the admission bound.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn max_connections(mut self, n: usize) -> Self {
        assert!(n > 0, "max_connections must be > 0");

        self.max_connections = n;
        self
    }

    /// Sets the descriptor-space bound (slots in the positional
    /// connection table).
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn max_fds(mut self, n: usize) -> Self {
        assert!(n > 0, "max_fds must be > 0");

        self.max_fds = n;
        self
    }

    /// Sets the eviction tick.
    ///
    /// # Panics
    ///
    /// Panics if the tick is zero.
    pub fn tick(mut self, tick: Duration) -> Self {
        assert!(!tick.is_zero(), "tick must be non-zero");

        self.tick = tick;
        self
    }

    /// Sets the listen backlog.
    ///
    /// # Panics
    ///
    /// Panics if `backlog <= 0`.
    pub fn backlog(mut self, backlog: i32) -> Self {
        assert!(backlog > 0, "backlog must be > 0");

        self.backlog = backlog;
        self
    }

    /// Sets the number of pool worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn workers(mut self, n: usize) -> Self {
        assert!(n > 0, "workers must be > 0");

        self.workers = n;
        self
    }

    /// Sets the pool queue bound.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn pool_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "pool_capacity must be > 0");

        self.pool_capacity = n;
        self
    }

    /// Idle deadline derived from the tick: three ticks of silence.
    pub(crate) fn idle_timeout(&self) -> Duration {
        3 * self.tick
    }
}
