//! Sorted idle-timer list.
//!
//! Each live connection owns at most one timer; the list keeps all
//! timers strictly sorted ascending by expiry so a sweep only ever
//! looks at the head. Nodes live in a generation-checked slab, so a
//! handle held after its timer was removed is a safe no-op.

use crate::reactor::table::ConnHandle;
use crate::utils::slab::{Key, Slab};

use std::time::Instant;

/// Handle to a timer node in the list.
pub(crate) type TimerHandle = Key;

/// One idle timer.
///
/// Invariant: a node belongs to exactly one position in the list, and
/// `prev`/`next` always name live nodes.
struct TimerNode {
    /// Absolute deadline after which the connection is evicted.
    expiry: Instant,

    /// The connection this timer guards, by table position and
    /// generation rather than by reference.
    conn: ConnHandle,

    prev: Option<Key>,
    next: Option<Key>,
}

/// Doubly linked timer list, sorted ascending by expiry.
///
/// All mutation happens on the dispatcher thread; the list is built
/// before the loop starts and dropped after it exits.
///
/// Equal expiries keep insertion order: a newly added timer is placed
/// after existing timers with the same deadline, and a refresh never
/// reorders a node relative to equal-expiry neighbors it has not
/// passed.
pub(crate) struct TimerList {
    nodes: Slab<TimerNode>,
    head: Option<Key>,
    tail: Option<Key>,
}

impl TimerList {
    /// Creates an empty list.
    pub(crate) fn new() -> Self {
        Self {
            nodes: Slab::new(64),
            head: None,
            tail: None,
        }
    }

    /// Number of live timers.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Adds a timer and returns its handle.
    ///
    /// The position is found by scanning forward from the head; new
    /// connections carry the latest deadline in the common case, but
    /// correctness does not depend on that.
    pub(crate) fn add(&mut self, expiry: Instant, conn: ConnHandle) -> TimerHandle {
        let key = self.nodes.insert(TimerNode {
            expiry,
            conn,
            prev: None,
            next: None,
        });

        let at = self.position_from(self.head, expiry);
        self.link_before(key, at);

        key
    }

    /// Detaches a timer in constant time via its own links.
    ///
    /// A stale handle (already swept or removed) is a no-op; detaching
    /// twice must not corrupt the list.
    pub(crate) fn remove(&mut self, handle: TimerHandle) -> bool {
        if !self.nodes.contains(handle) {
            return false;
        }

        self.unlink(handle);
        self.nodes.remove(handle);
        true
    }

    /// Pushes a timer's deadline forward and re-sorts it.
    ///
    /// Expiry only ever increases (activity extends the deadline), so
    /// the node is walked **forward** from its current position to its
    /// new slot; it never moves toward the head. This cost bound is a
    /// contract, not an optimization.
    pub(crate) fn refresh(&mut self, handle: TimerHandle, expiry: Instant) {
        let Some(node) = self.nodes.get_mut(handle) else {
            return;
        };

        // Activity never shortens a deadline.
        let expiry = node.expiry.max(expiry);
        node.expiry = expiry;
        let next = node.next;

        // Already in place when nothing later expires sooner.
        let in_place = match next {
            None => true,
            Some(n) => self.node(n).expiry >= expiry,
        };
        if in_place {
            return;
        }

        self.unlink(handle);
        let at = self.position_from(next, expiry);
        self.link_before(handle, at);
    }

    /// Evicts every expired timer from the head of the list.
    ///
    /// Detaches head nodes while their expiry is `<= now`, invoking
    /// `evict` with the guarded connection for each, and stops at the
    /// first timer still in the future. A safe no-op on an empty list.
    pub(crate) fn sweep(&mut self, now: Instant, mut evict: impl FnMut(ConnHandle)) {
        while let Some(head) = self.head {
            let node = self.node(head);
            if node.expiry > now {
                break;
            }

            let conn = node.conn;
            self.unlink(head);
            self.nodes.remove(head);

            evict(conn);
        }
    }

    fn node(&self, key: Key) -> &TimerNode {
        // Links are maintained alongside membership, so a linked key
        // is always live.
        self.nodes.get(key).unwrap_or_else(|| unreachable!())
    }

    /// First node at or after `start` whose expiry is strictly greater
    /// than `expiry`, or `None` for the tail position.
    fn position_from(&self, start: Option<Key>, expiry: Instant) -> Option<Key> {
        let mut cursor = start;

        while let Some(key) = cursor {
            let node = self.node(key);
            if node.expiry > expiry {
                return Some(key);
            }
            cursor = node.next;
        }

        None
    }

    /// Links `key` immediately before `at`, or at the tail when `at`
    /// is `None`.
    fn link_before(&mut self, key: Key, at: Option<Key>) {
        let prev = match at {
            Some(a) => self.node(a).prev,
            None => self.tail,
        };

        {
            let node = self.nodes.get_mut(key).unwrap_or_else(|| unreachable!());
            node.prev = prev;
            node.next = at;
        }

        match prev {
            Some(p) => self.nodes.get_mut(p).unwrap_or_else(|| unreachable!()).next = Some(key),
            None => self.head = Some(key),
        }

        match at {
            Some(a) => self.nodes.get_mut(a).unwrap_or_else(|| unreachable!()).prev = Some(key),
            None => self.tail = Some(key),
        }
    }

    /// Detaches `key` from the chain without freeing its node.
    fn unlink(&mut self, key: Key) {
        let (prev, next) = {
            let node = self.node(key);
            (node.prev, node.next)
        };

        match prev {
            Some(p) => self.nodes.get_mut(p).unwrap_or_else(|| unreachable!()).next = next,
            None => self.head = next,
        }

        match next {
            Some(n) => self.nodes.get_mut(n).unwrap_or_else(|| unreachable!()).prev = prev,
            None => self.tail = prev,
        }

        let node = self.nodes.get_mut(key).unwrap_or_else(|| unreachable!());
        node.prev = None;
        node.next = None;
    }

    /// Expiries in list order, head first.
    #[cfg(test)]
    fn expiries(&self) -> Vec<Instant> {
        let mut out = Vec::new();
        let mut cursor = self.head;

        while let Some(key) = cursor {
            let node = self.node(key);
            out.push(node.expiry);
            cursor = node.next;
        }

        out
    }

    /// Connections in list order, head first.
    #[cfg(test)]
    fn order(&self) -> Vec<ConnHandle> {
        let mut out = Vec::new();
        let mut cursor = self.head;

        while let Some(key) = cursor {
            let node = self.node(key);
            out.push(node.conn);
            cursor = node.next;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn conn(fd: i32) -> ConnHandle {
        ConnHandle { fd, generation: 0 }
    }

    fn assert_sorted(list: &TimerList) {
        let expiries = list.expiries();
        for pair in expiries.windows(2) {
            assert!(pair[0] <= pair[1], "list out of order");
        }
        assert_eq!(expiries.len(), list.len());
    }

    #[test]
    fn add_keeps_ascending_order() {
        let base = Instant::now();
        let mut list = TimerList::new();

        list.add(base + Duration::from_secs(30), conn(3));
        list.add(base + Duration::from_secs(10), conn(1));
        list.add(base + Duration::from_secs(20), conn(2));

        assert_sorted(&list);
        assert_eq!(
            list.expiries(),
            vec![
                base + Duration::from_secs(10),
                base + Duration::from_secs(20),
                base + Duration::from_secs(30),
            ]
        );
    }

    #[test]
    fn equal_expiries_keep_insertion_order() {
        let base = Instant::now();
        let expiry = base + Duration::from_secs(5);
        let mut list = TimerList::new();

        list.add(expiry, conn(1));
        list.add(expiry, conn(2));
        list.add(expiry, conn(3));

        assert_eq!(list.order(), vec![conn(1), conn(2), conn(3)]);
    }

    #[test]
    fn sweep_on_empty_list_is_noop() {
        let mut list = TimerList::new();

        let mut evicted = Vec::new();
        list.sweep(Instant::now(), |c| evicted.push(c));

        assert!(evicted.is_empty());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn sweep_before_head_expiry_evicts_nothing() {
        let base = Instant::now();
        let mut list = TimerList::new();
        list.add(base + Duration::from_secs(60), conn(1));

        let mut evicted = Vec::new();
        list.sweep(base, |c| evicted.push(c));

        assert!(evicted.is_empty());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn sweep_evicts_expired_run_in_order() {
        let base = Instant::now();
        let mut list = TimerList::new();

        list.add(base + Duration::from_secs(1), conn(1));
        list.add(base + Duration::from_secs(2), conn(2));
        list.add(base + Duration::from_secs(60), conn(3));

        let mut evicted = Vec::new();
        list.sweep(base + Duration::from_secs(5), |c| evicted.push(c));

        assert_eq!(evicted, vec![conn(1), conn(2)]);
        assert_eq!(list.len(), 1);
        assert_sorted(&list);
    }

    #[test]
    fn remove_detaches_and_is_idempotent() {
        let base = Instant::now();
        let mut list = TimerList::new();

        let a = list.add(base + Duration::from_secs(1), conn(1));
        list.add(base + Duration::from_secs(2), conn(2));

        assert!(list.remove(a));
        assert!(!list.remove(a));
        assert_eq!(list.len(), 1);
        assert_sorted(&list);
    }

    #[test]
    fn swept_handle_is_safe_to_remove() {
        let base = Instant::now();
        let mut list = TimerList::new();
        let a = list.add(base, conn(1));

        list.sweep(base + Duration::from_secs(1), |_| {});

        assert!(!list.remove(a));
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn refresh_moves_forward_only() {
        let base = Instant::now();
        let mut list = TimerList::new();

        let a = list.add(base + Duration::from_secs(1), conn(1));
        list.add(base + Duration::from_secs(2), conn(2));
        list.add(base + Duration::from_secs(3), conn(3));

        list.refresh(a, base + Duration::from_secs(10));

        assert_sorted(&list);
        assert_eq!(list.order(), vec![conn(2), conn(3), conn(1)]);
    }

    #[test]
    fn refresh_never_decreases_expiry() {
        let base = Instant::now();
        let mut list = TimerList::new();

        let a = list.add(base + Duration::from_secs(30), conn(1));
        list.refresh(a, base + Duration::from_secs(10));

        assert_eq!(list.expiries(), vec![base + Duration::from_secs(30)]);
    }

    #[test]
    fn repeated_refresh_is_monotone_and_sorted() {
        let base = Instant::now();
        let mut list = TimerList::new();

        let a = list.add(base + Duration::from_secs(1), conn(1));
        list.add(base + Duration::from_secs(4), conn(2));
        list.add(base + Duration::from_secs(8), conn(3));

        let mut expected = base + Duration::from_secs(1);
        for step in [3u64, 5, 5, 12, 2] {
            let requested = base + Duration::from_secs(step);
            list.refresh(a, requested);
            expected = expected.max(requested);
            assert_sorted(&list);

            let pos = list.order().iter().position(|c| *c == conn(1)).unwrap();
            assert_eq!(list.expiries()[pos], expected);
        }
    }

    #[test]
    fn refresh_on_stale_handle_is_noop() {
        let base = Instant::now();
        let mut list = TimerList::new();

        let a = list.add(base + Duration::from_secs(1), conn(1));
        list.remove(a);
        list.refresh(a, base + Duration::from_secs(9));

        assert_eq!(list.len(), 0);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(u64),
        Remove(usize),
        Refresh(usize, u64),
        Sweep(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..500).prop_map(Op::Add),
            any::<usize>().prop_map(Op::Remove),
            (any::<usize>(), 0u64..500).prop_map(|(i, ms)| Op::Refresh(i, ms)),
            (0u64..500).prop_map(Op::Sweep),
        ]
    }

    proptest! {
        /// Arbitrary interleavings of the four operations keep the
        /// list strictly sorted and the length consistent with the
        /// number of live handles.
        #[test]
        fn operations_preserve_sort_invariant(ops in prop::collection::vec(op_strategy(), 1..80)) {
            let base = Instant::now();
            let mut list = TimerList::new();
            let mut handles: Vec<TimerHandle> = Vec::new();
            let mut live = 0usize;
            let mut next_fd = 0i32;

            for op in ops {
                match op {
                    Op::Add(ms) => {
                        let h = list.add(base + Duration::from_millis(ms), conn(next_fd));
                        next_fd += 1;
                        handles.push(h);
                        live += 1;
                    }
                    Op::Remove(i) => {
                        if !handles.is_empty() {
                            let h = handles[i % handles.len()];
                            if list.remove(h) {
                                live -= 1;
                            }
                        }
                    }
                    Op::Refresh(i, ms) => {
                        if !handles.is_empty() {
                            let h = handles[i % handles.len()];
                            list.refresh(h, base + Duration::from_millis(ms));
                        }
                    }
                    Op::Sweep(ms) => {
                        let mut evicted = 0;
                        list.sweep(base + Duration::from_millis(ms), |_| evicted += 1);
                        live -= evicted;
                    }
                }

                assert_sorted(&list);
                prop_assert_eq!(list.len(), live);
            }
        }
    }
}
