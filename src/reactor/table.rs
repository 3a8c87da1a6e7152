//! Positional connection table and admission bookkeeping.
//!
//! One slot per possible descriptor value, addressed by the descriptor
//! itself: when the OS hands out a previously closed descriptor again,
//! the accept path re-initializes the same slot in place. The
//! dispatcher thread is the sole mutator.

use crate::conn::Connection;
use crate::reactor::timer::TimerHandle;

use std::os::fd::RawFd;
use std::sync::{Arc, Mutex};

/// Names a table slot at a point in time.
///
/// The generation is bumped on every re-initialization, so a handle
/// taken before a descriptor was reused no longer matches afterwards.
/// Timers hold these instead of references into the table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct ConnHandle {
    pub(crate) fd: RawFd,
    pub(crate) generation: u64,
}

/// One table slot.
struct Slot<C> {
    /// The connection object, shared with pool workers.
    conn: Arc<Mutex<C>>,

    /// Handle to the slot's idle timer, if one is live.
    timer: Option<TimerHandle>,

    /// Bumped on every in-place re-initialization.
    generation: u64,

    /// Whether the slot currently holds a live connection.
    open: bool,
}

/// Fixed-capacity registry of live connections indexed by descriptor.
///
/// Slots are created the first time a descriptor value is seen and
/// re-initialized in place on every later accept of the same value.
pub(crate) struct ConnTable<C> {
    slots: Vec<Option<Slot<C>>>,
}

impl<C: Connection + Default> ConnTable<C> {
    /// Creates a table covering descriptor values `0..capacity`.
    pub(crate) fn new(capacity: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(capacity, || None);

        Self { slots }
    }

    /// Whether `fd` falls inside the table's descriptor space.
    pub(crate) fn covers(&self, fd: RawFd) -> bool {
        fd >= 0 && (fd as usize) < self.slots.len()
    }

    /// Claims the slot for `fd`, re-initializing it in place, and
    /// returns the new generation together with the shared connection
    /// object for the caller to initialize.
    ///
    /// The caller must have admitted the connection first; `fd` must be
    /// inside the table's range.
    pub(crate) fn open(&mut self, fd: RawFd) -> (u64, Arc<Mutex<C>>) {
        let slot = &mut self.slots[fd as usize];

        match slot {
            Some(slot) => {
                slot.generation += 1;
                slot.timer = None;
                slot.open = true;

                (slot.generation, slot.conn.clone())
            }
            None => {
                let conn = Arc::new(Mutex::new(C::default()));
                *slot = Some(Slot {
                    conn: conn.clone(),
                    timer: None,
                    generation: 0,
                    open: true,
                });

                (0, conn)
            }
        }
    }

    /// Records the idle timer guarding `fd`.
    pub(crate) fn attach_timer(&mut self, fd: RawFd, timer: TimerHandle) {
        if let Some(Some(slot)) = self.slots.get_mut(fd as usize) {
            slot.timer = Some(timer);
        }
    }

    /// The shared connection object for `fd`, if the slot is open.
    pub(crate) fn conn(&self, fd: RawFd) -> Option<Arc<Mutex<C>>> {
        match self.slots.get(fd as usize) {
            Some(Some(slot)) if slot.open => Some(slot.conn.clone()),
            _ => None,
        }
    }

    /// The timer handle for `fd`, if the slot is open and has one.
    pub(crate) fn timer(&self, fd: RawFd) -> Option<TimerHandle> {
        match self.slots.get(fd as usize) {
            Some(Some(slot)) if slot.open => slot.timer,
            _ => None,
        }
    }

    /// Whether `handle` still names the current occupant of its slot.
    pub(crate) fn matches(&self, handle: ConnHandle) -> bool {
        match self.slots.get(handle.fd as usize) {
            Some(Some(slot)) => slot.open && slot.generation == handle.generation,
            _ => false,
        }
    }

    /// Marks the slot closed and yields what the dispatcher needs to
    /// finish tearing the connection down.
    ///
    /// Returns `None` when the slot is already closed, making the close
    /// path idempotent no matter how many readiness bits fired for the
    /// descriptor in one wake.
    pub(crate) fn close(&mut self, fd: RawFd) -> Option<(Arc<Mutex<C>>, Option<TimerHandle>)> {
        let slot = match self.slots.get_mut(fd as usize) {
            Some(Some(slot)) if slot.open => slot,
            _ => return None,
        };

        slot.open = false;
        Some((slot.conn.clone(), slot.timer.take()))
    }
}
