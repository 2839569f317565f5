//! The runqueue: a red-black tree of runnable processes keyed by
//! virtual runtime, plus the fairness arithmetic that turns niceness
//! into weights and weights into slice budgets.
//!
//! The tree is intrusive but index-based: descriptors carry an
//! [`RbNode`] whose links are slot indices into the process table, so
//! there are no self-referential pointers. The leftmost node is cached
//! so extraction of the most entitled process is O(1) to find.

use crate::param::{MIN_GRAN, NICE_LIMIT, NICE_ZERO_WEIGHT};
use crate::proc::{Proc, ProcId, ProcState};
use crate::sync::Spinlock;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

/// Tree linkage embedded in each process descriptor.
/// Guarded by the runqueue lock, not the process table lock.
#[derive(Copy, Clone, Debug)]
pub struct RbNode {
    pub parent: Option<ProcId>,
    pub left: Option<ProcId>,
    pub right: Option<ProcId>,
    pub color: Color,
}

impl RbNode {
    pub const fn new() -> RbNode {
        RbNode {
            parent: None,
            left: None,
            right: None,
            color: Color::Red,
        }
    }
}

impl Default for RbNode {
    fn default() -> RbNode {
        RbNode::new()
    }
}

/// Scheduling weight for a niceness level: `1024 / 1.25^nice`, rounded
/// down, computed exactly as `(1024 << 2n) / 5^n`. Niceness clamps at
/// [`NICE_LIMIT`]; nice 0 is 1024 and every level up shrinks the share
/// by a quarter.
pub fn calculate_weight(nice: u32) -> u64 {
    let n = nice.min(NICE_LIMIT);
    let num = (NICE_ZERO_WEIGHT as u128) << (2 * n);
    let den = 5u128.pow(n);
    (num / den) as u64
}

/// Should the running process give up the CPU?
///
/// Preempt once the granted slice is used up, or once someone more
/// entitled is waiting and the slice floor has been met. A process that
/// has made no progress at all yields unconditionally so an idle tick
/// never pins the CPU.
pub fn check_preemption(current: &Proc, min_vruntime: Option<&Proc>) -> bool {
    let runtime = current.current_runtime;
    if runtime >= current.max_exec_time && runtime >= MIN_GRAN {
        return true;
    }
    match min_vruntime {
        Some(min)
            if min.state == ProcState::Runnable
                && current.virtual_runtime > min.virtual_runtime =>
        {
            runtime >= MIN_GRAN
        }
        _ => runtime == 0,
    }
}

pub struct RunQueue {
    root: Option<ProcId>,
    /// Cached leftmost node, the next process to run.
    min_vruntime: Option<ProcId>,
    count: usize,
    /// Sum of the weights of every queued process.
    weight: u64,
    /// Interval over which fairness is amortized; stretches with the
    /// queue so no slice drops below the granularity floor.
    period: u64,
    latency: u64,
    capacity: usize,
    /// Guards the tree structure and every descriptor's linkage.
    /// Taken inside the process table lock, never the other way.
    pub lock: Spinlock,
}

impl RunQueue {
    pub fn new(capacity: usize) -> RunQueue {
        let latency = (capacity / 2) as u64;
        RunQueue {
            root: None,
            min_vruntime: None,
            count: 0,
            weight: 0,
            period: latency,
            latency,
            capacity,
            lock: Spinlock::new("tasks"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total_weight(&self) -> u64 {
        self.weight
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn min_vruntime(&self) -> Option<ProcId> {
        self.min_vruntime
    }

    /// Queue a runnable process, deriving its weight from its niceness.
    /// A full tree skips the insert; callers guarantee capacity by
    /// construction, one runqueue slot per descriptor.
    pub fn insert(&mut self, pool: &mut [Proc], id: ProcId) {
        if self.is_full() {
            return;
        }
        debug_assert_eq!(pool[id.0].state, ProcState::Runnable);
        debug_assert!(self.root != Some(id) && pool[id.0].node.parent.is_none());

        let weight = calculate_weight(pool[id.0].nice);
        pool[id.0].proc_weight = weight;

        // Ordinary BST descent; equal keys go right, so ties leave in
        // insertion order.
        let key = pool[id.0].virtual_runtime;
        let mut parent = None;
        let mut link = self.root;
        while let Some(cur) = link {
            parent = Some(cur);
            link = if pool[cur.0].virtual_runtime <= key {
                pool[cur.0].node.right
            } else {
                pool[cur.0].node.left
            };
        }
        pool[id.0].node = RbNode {
            parent,
            left: None,
            right: None,
            color: Color::Red,
        };
        match parent {
            None => self.root = Some(id),
            Some(p) if pool[p.0].virtual_runtime <= key => pool[p.0].node.right = Some(id),
            Some(p) => pool[p.0].node.left = Some(id),
        }

        self.count += 1;
        self.weight += weight;
        self.insert_fixup(pool, id);
        self.min_vruntime = self.leftmost(pool);
    }

    /// Unlink and return the process with the smallest virtual runtime.
    ///
    /// Recomputes the period from the queue length first, then writes
    /// the extracted process's slice budget from its share of the
    /// aggregate weight. If the cached minimum is not runnable the tree
    /// is left untouched; every queued process is runnable by
    /// invariant, so that refusal only guards against corruption.
    pub fn extract_min(&mut self, pool: &mut [Proc]) -> Option<ProcId> {
        if self.is_empty() {
            return None;
        }

        if self.count as u64 > self.latency / MIN_GRAN {
            self.period = self.count as u64 * MIN_GRAN;
        } else {
            self.period = self.latency;
        }

        let found = self.min_vruntime?;
        if pool[found.0].state != ProcState::Runnable {
            return None;
        }

        pool[found.0].max_exec_time = self.period * pool[found.0].proc_weight / self.weight;
        self.remove_min(pool, found);
        self.weight -= pool[found.0].proc_weight;
        self.count -= 1;
        self.min_vruntime = self.leftmost(pool);
        Some(found)
    }

    fn leftmost(&self, pool: &[Proc]) -> Option<ProcId> {
        let mut cur = self.root?;
        while let Some(l) = pool[cur.0].node.left {
            cur = l;
        }
        Some(cur)
    }

    fn color_of(&self, pool: &[Proc], node: Option<ProcId>) -> Color {
        // Absent children count as black leaves.
        node.map_or(Color::Black, |n| pool[n.0].node.color)
    }

    fn rotate_left(&mut self, pool: &mut [Proc], x: ProcId) {
        let y = pool[x.0].node.right.expect("rotate_left");
        pool[x.0].node.right = pool[y.0].node.left;
        if let Some(yl) = pool[y.0].node.left {
            pool[yl.0].node.parent = Some(x);
        }
        let xp = pool[x.0].node.parent;
        pool[y.0].node.parent = xp;
        match xp {
            None => self.root = Some(y),
            Some(p) if pool[p.0].node.left == Some(x) => pool[p.0].node.left = Some(y),
            Some(p) => pool[p.0].node.right = Some(y),
        }
        pool[y.0].node.left = Some(x);
        pool[x.0].node.parent = Some(y);
    }

    fn rotate_right(&mut self, pool: &mut [Proc], x: ProcId) {
        let y = pool[x.0].node.left.expect("rotate_right");
        pool[x.0].node.left = pool[y.0].node.right;
        if let Some(yr) = pool[y.0].node.right {
            pool[yr.0].node.parent = Some(x);
        }
        let xp = pool[x.0].node.parent;
        pool[y.0].node.parent = xp;
        match xp {
            None => self.root = Some(y),
            Some(p) if pool[p.0].node.right == Some(x) => pool[p.0].node.right = Some(y),
            Some(p) => pool[p.0].node.left = Some(y),
        }
        pool[y.0].node.right = Some(x);
        pool[x.0].node.parent = Some(y);
    }

    /// Restore the balance properties around a freshly inserted red
    /// node: recolor while the uncle is red, rotate the node outward if
    /// it landed inside, then rotate the grandparent the other way.
    fn insert_fixup(&mut self, pool: &mut [Proc], mut z: ProcId) {
        while let Some(p) = pool[z.0].node.parent {
            if pool[p.0].node.color != Color::Red {
                break;
            }
            let Some(g) = pool[p.0].node.parent else {
                break;
            };
            if pool[g.0].node.left == Some(p) {
                let uncle = pool[g.0].node.right;
                if self.color_of(pool, uncle) == Color::Red {
                    let u = uncle.expect("red uncle");
                    pool[p.0].node.color = Color::Black;
                    pool[u.0].node.color = Color::Black;
                    pool[g.0].node.color = Color::Red;
                    z = g;
                } else {
                    if pool[p.0].node.right == Some(z) {
                        z = p;
                        self.rotate_left(pool, z);
                    }
                    let p = pool[z.0].node.parent.expect("insert_fixup");
                    let g = pool[p.0].node.parent.expect("insert_fixup");
                    pool[p.0].node.color = Color::Black;
                    pool[g.0].node.color = Color::Red;
                    self.rotate_right(pool, g);
                }
            } else {
                let uncle = pool[g.0].node.left;
                if self.color_of(pool, uncle) == Color::Red {
                    let u = uncle.expect("red uncle");
                    pool[p.0].node.color = Color::Black;
                    pool[u.0].node.color = Color::Black;
                    pool[g.0].node.color = Color::Red;
                    z = g;
                } else {
                    if pool[p.0].node.left == Some(z) {
                        z = p;
                        self.rotate_right(pool, z);
                    }
                    let p = pool[z.0].node.parent.expect("insert_fixup");
                    let g = pool[p.0].node.parent.expect("insert_fixup");
                    pool[p.0].node.color = Color::Black;
                    pool[g.0].node.color = Color::Red;
                    self.rotate_left(pool, g);
                }
            }
        }
        if let Some(r) = self.root {
            pool[r.0].node.color = Color::Black;
        }
    }

    /// Splice out the leftmost node. It has no left child, so its right
    /// child (possibly absent) takes its place; removing a black node
    /// then needs the deletion fixup on the replacement.
    fn remove_min(&mut self, pool: &mut [Proc], t: ProcId) {
        debug_assert!(pool[t.0].node.left.is_none());

        let child = pool[t.0].node.right;
        let parent = pool[t.0].node.parent;
        if let Some(c) = child {
            pool[c.0].node.parent = parent;
        }
        match parent {
            None => self.root = child,
            // The leftmost node is always its parent's left child.
            Some(p) => pool[p.0].node.left = child,
        }

        let removed_black = pool[t.0].node.color == Color::Black;
        pool[t.0].node = RbNode::new();
        if removed_black {
            self.remove_fixup(pool, child, parent);
        }
    }

    /// Deletion rebalance: `x` sits where a black node vanished and is
    /// one black short on every path through it. Both child sides are
    /// handled; the fixup can climb onto either side of a parent.
    fn remove_fixup(
        &mut self,
        pool: &mut [Proc],
        mut x: Option<ProcId>,
        mut parent: Option<ProcId>,
    ) {
        while x != self.root && self.color_of(pool, x) == Color::Black {
            let Some(p) = parent else {
                break;
            };
            if pool[p.0].node.left == x {
                let mut w = pool[p.0].node.right.expect("remove_fixup sibling");
                if pool[w.0].node.color == Color::Red {
                    pool[w.0].node.color = Color::Black;
                    pool[p.0].node.color = Color::Red;
                    self.rotate_left(pool, p);
                    w = pool[p.0].node.right.expect("remove_fixup sibling");
                }
                if self.color_of(pool, pool[w.0].node.left) == Color::Black
                    && self.color_of(pool, pool[w.0].node.right) == Color::Black
                {
                    pool[w.0].node.color = Color::Red;
                    x = Some(p);
                    parent = pool[p.0].node.parent;
                } else {
                    if self.color_of(pool, pool[w.0].node.right) == Color::Black {
                        if let Some(wl) = pool[w.0].node.left {
                            pool[wl.0].node.color = Color::Black;
                        }
                        pool[w.0].node.color = Color::Red;
                        self.rotate_right(pool, w);
                        w = pool[p.0].node.right.expect("remove_fixup sibling");
                    }
                    pool[w.0].node.color = pool[p.0].node.color;
                    pool[p.0].node.color = Color::Black;
                    if let Some(wr) = pool[w.0].node.right {
                        pool[wr.0].node.color = Color::Black;
                    }
                    self.rotate_left(pool, p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let mut w = pool[p.0].node.left.expect("remove_fixup sibling");
                if pool[w.0].node.color == Color::Red {
                    pool[w.0].node.color = Color::Black;
                    pool[p.0].node.color = Color::Red;
                    self.rotate_right(pool, p);
                    w = pool[p.0].node.left.expect("remove_fixup sibling");
                }
                if self.color_of(pool, pool[w.0].node.left) == Color::Black
                    && self.color_of(pool, pool[w.0].node.right) == Color::Black
                {
                    pool[w.0].node.color = Color::Red;
                    x = Some(p);
                    parent = pool[p.0].node.parent;
                } else {
                    if self.color_of(pool, pool[w.0].node.left) == Color::Black {
                        if let Some(wr) = pool[w.0].node.right {
                            pool[wr.0].node.color = Color::Black;
                        }
                        pool[w.0].node.color = Color::Red;
                        self.rotate_left(pool, w);
                        w = pool[p.0].node.left.expect("remove_fixup sibling");
                    }
                    pool[w.0].node.color = pool[p.0].node.color;
                    pool[p.0].node.color = Color::Black;
                    if let Some(wl) = pool[w.0].node.left {
                        pool[wl.0].node.color = Color::Black;
                    }
                    self.rotate_right(pool, p);
                    x = self.root;
                    parent = None;
                }
            }
        }
        if let Some(xn) = x {
            pool[xn.0].node.color = Color::Black;
        }
    }
}

#[cfg(test)]
impl RunQueue {
    /// Walk the whole tree and assert every structural invariant:
    /// search order over virtual runtime, red-black balance, parent
    /// link consistency, and the cached aggregates.
    pub(crate) fn check_invariants(&self, pool: &[Proc]) {
        fn walk(
            pool: &[Proc],
            node: Option<ProcId>,
            parent: Option<ProcId>,
            lo: Option<u64>,
            hi: Option<u64>,
        ) -> (usize, u64, usize) {
            let Some(n) = node else {
                return (0, 0, 1);
            };
            let p = &pool[n.0];
            assert_eq!(p.node.parent, parent, "parent link broken at {:?}", n);
            assert_eq!(p.state, ProcState::Runnable, "non-runnable {:?} queued", n);
            // Equal keys are routed right on insert, but rotations may
            // carry them into a left subtree, so the bounds are weak.
            if let Some(lo) = lo {
                assert!(p.virtual_runtime >= lo, "bst order broken at {:?}", n);
            }
            if let Some(hi) = hi {
                assert!(p.virtual_runtime <= hi, "bst order broken at {:?}", n);
            }
            if p.node.color == Color::Red {
                for child in [p.node.left, p.node.right].into_iter().flatten() {
                    assert_eq!(
                        pool[child.0].node.color,
                        Color::Black,
                        "red-red chain at {:?}",
                        n
                    );
                }
            }
            let (lc, lw, lb) = walk(pool, p.node.left, node, lo, Some(p.virtual_runtime));
            let (rc, rw, rb) = walk(pool, p.node.right, node, Some(p.virtual_runtime), hi);
            assert_eq!(lb, rb, "black height differs under {:?}", n);
            let black = if p.node.color == Color::Black { 1 } else { 0 };
            (lc + rc + 1, lw + rw + p.proc_weight, lb + black)
        }

        if let Some(r) = self.root {
            assert_eq!(pool[r.0].node.color, Color::Black, "red root");
        }
        let (count, weight, _) = walk(pool, self.root, None, None, None);
        assert_eq!(count, self.count, "count does not match traversal");
        assert_eq!(weight, self.weight, "weight does not match traversal");
        assert_eq!(self.min_vruntime, self.leftmost(pool), "stale min cache");
        assert_eq!(self.min_vruntime.is_none(), self.count == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::NPROC;

    fn pool(n: usize) -> Vec<Proc> {
        (0..n)
            .map(|_| {
                let mut p = Proc::new();
                p.state = ProcState::Runnable;
                p
            })
            .collect()
    }

    fn with_vruntimes(keys: &[u64]) -> (RunQueue, Vec<Proc>) {
        let mut procs = pool(keys.len());
        let mut rq = RunQueue::new(keys.len());
        for (i, &key) in keys.iter().enumerate() {
            procs[i].virtual_runtime = key;
            rq.insert(&mut procs, ProcId(i));
            rq.check_invariants(&procs);
        }
        (rq, procs)
    }

    #[test]
    fn weight_of_nice_zero_is_base() {
        assert_eq!(calculate_weight(0), 1024);
        assert_eq!(calculate_weight(1), 819);
        assert_eq!(calculate_weight(2), 655);
    }

    #[test]
    fn weight_shrinks_with_niceness() {
        for nice in 0..25 {
            assert!(
                calculate_weight(nice + 1) < calculate_weight(nice),
                "weight must drop from nice {} to {}",
                nice,
                nice + 1
            );
        }
        for nice in 0..NICE_LIMIT {
            assert!(calculate_weight(nice + 1) <= calculate_weight(nice));
        }
        assert!(calculate_weight(NICE_LIMIT) >= 1);
    }

    #[test]
    fn weight_clamps_above_limit() {
        assert_eq!(calculate_weight(31), calculate_weight(30));
        assert_eq!(calculate_weight(1000), calculate_weight(30));
    }

    #[test]
    fn extract_on_empty_returns_none() {
        let mut procs = pool(4);
        let mut rq = RunQueue::new(4);
        assert!(rq.is_empty());
        assert_eq!(rq.extract_min(&mut procs), None);
    }

    #[test]
    fn insert_on_full_is_skipped() {
        let (mut rq, mut procs) = with_vruntimes(&[1, 2]);
        assert!(rq.is_full());
        let mut extra = Proc::new();
        extra.state = ProcState::Runnable;
        procs.push(extra);
        rq.insert(&mut procs, ProcId(2));
        assert_eq!(rq.count(), 2);
        rq.check_invariants(&procs[..]);
    }

    #[test]
    fn extraction_follows_vruntime_order() {
        let keys = [5, 3, 8, 1, 7, 2, 6, 4];
        let (mut rq, mut procs) = with_vruntimes(&keys);

        let mut seen = Vec::new();
        while let Some(id) = rq.extract_min(&mut procs) {
            seen.push(procs[id.0].virtual_runtime);
            rq.check_invariants(&procs);
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(rq.is_empty());
        assert_eq!(rq.total_weight(), 0);
    }

    #[test]
    fn equal_keys_extract_in_insertion_order() {
        let (mut rq, mut procs) = with_vruntimes(&[7, 7, 7, 7]);
        for expect in 0..4 {
            let id = rq.extract_min(&mut procs).unwrap();
            assert_eq!(id, ProcId(expect));
            rq.check_invariants(&procs);
        }
    }

    #[test]
    fn single_process_gets_the_whole_period() {
        // Pool of 8: latency 4. One nice-0 process owns the period.
        let (mut rq, mut procs) = with_vruntimes(&[0]);
        let mut rq8 = RunQueue::new(8);
        let mut procs8 = pool(8);
        rq8.insert(&mut procs8, ProcId(0));
        assert_eq!(rq8.count(), 1);
        assert_eq!(rq8.total_weight(), 1024);

        let id = rq8.extract_min(&mut procs8).unwrap();
        assert_eq!(id, ProcId(0));
        assert_eq!(rq8.period(), 4);
        assert_eq!(procs8[id.0].max_exec_time, 4);

        // Same numbers fall out of the minimal pool.
        let id = rq.extract_min(&mut procs).unwrap();
        assert_eq!(procs[id.0].max_exec_time, rq.period());
    }

    #[test]
    fn two_equal_processes_split_the_period() {
        let mut procs = pool(8);
        let mut rq = RunQueue::new(8);
        rq.insert(&mut procs, ProcId(0));
        rq.insert(&mut procs, ProcId(1));
        assert_eq!(rq.total_weight(), 2048);

        let id = rq.extract_min(&mut procs).unwrap();
        assert_eq!(id, ProcId(0), "first queued of a tie runs first");
        assert_eq!(rq.period(), 4);
        assert_eq!(procs[id.0].max_exec_time, 2);
    }

    #[test]
    fn period_stretches_with_queue_length() {
        let mut procs = pool(8);
        let mut rq = RunQueue::new(8);
        for i in 0..5 {
            rq.insert(&mut procs, ProcId(i));
        }
        // 5 > latency / min_gran = 2, so the period becomes 5 * 2.
        let id = rq.extract_min(&mut procs).unwrap();
        assert_eq!(rq.period(), 10);
        assert_eq!(procs[id.0].max_exec_time, 10 * 1024 / (5 * 1024));
    }

    #[test]
    fn heavier_process_gets_longer_slice() {
        let mut procs = pool(8);
        procs[1].nice = 10;
        let mut rq = RunQueue::new(8);
        rq.insert(&mut procs, ProcId(0));
        rq.insert(&mut procs, ProcId(1));
        rq.check_invariants(&procs);

        assert_eq!(rq.total_weight(), 1024 + 109);
        let first = rq.extract_min(&mut procs).unwrap();
        assert_eq!(first, ProcId(0));
        assert_eq!(procs[first.0].max_exec_time, 4 * 1024 / (1024 + 109));

        let second = rq.extract_min(&mut procs).unwrap();
        assert_eq!(procs[second.0].max_exec_time, 4 * 109 / 109);
    }

    #[test]
    fn refuses_extraction_when_cached_min_is_not_runnable() {
        let (mut rq, mut procs) = with_vruntimes(&[3, 1, 2]);
        let min = rq.min_vruntime().unwrap();
        procs[min.0].state = ProcState::Sleeping;

        assert_eq!(rq.extract_min(&mut procs), None);
        assert_eq!(rq.count(), 3);

        procs[min.0].state = ProcState::Runnable;
        assert_eq!(rq.extract_min(&mut procs), Some(min));
        rq.check_invariants(&procs);
    }

    #[test]
    fn singleton_insert_extract_is_idempotent() {
        let mut procs = pool(4);
        let mut rq = RunQueue::new(4);
        for _ in 0..10 {
            rq.insert(&mut procs, ProcId(2));
            rq.check_invariants(&procs);
            assert_eq!(rq.count(), 1);
            assert_eq!(rq.min_vruntime(), Some(ProcId(2)));
            assert_eq!(rq.extract_min(&mut procs), Some(ProcId(2)));
            rq.check_invariants(&procs);
            assert!(rq.is_empty());
        }
    }

    #[test]
    fn reinsertion_after_running_reorders() {
        let (mut rq, mut procs) = with_vruntimes(&[0, 0]);
        let first = rq.extract_min(&mut procs).unwrap();
        assert_eq!(first, ProcId(0));

        // The slice it consumed pushes it behind its peer.
        procs[first.0].virtual_runtime += 2;
        rq.insert(&mut procs, first);
        rq.check_invariants(&procs);

        assert_eq!(rq.extract_min(&mut procs), Some(ProcId(1)));
    }

    #[test]
    fn interleaved_churn_keeps_invariants() {
        let mut procs = pool(NPROC);
        let mut rq = RunQueue::new(NPROC);

        // Deterministic pseudo-random keys and operations.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut rand = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        let mut queued: Vec<usize> = Vec::new();
        let mut free: Vec<usize> = (0..NPROC).collect();
        for _ in 0..400 {
            if !free.is_empty() && (queued.is_empty() || rand() % 3 != 0) {
                let slot = free.swap_remove((rand() % free.len() as u64) as usize);
                procs[slot].virtual_runtime = rand() % 50;
                procs[slot].nice = (rand() % 8) as u32;
                rq.insert(&mut procs, ProcId(slot));
                queued.push(slot);
            } else {
                let expected = queued
                    .iter()
                    .map(|&s| procs[s].virtual_runtime)
                    .min()
                    .unwrap();
                let id = rq.extract_min(&mut procs).unwrap();
                assert_eq!(procs[id.0].virtual_runtime, expected);
                queued.retain(|&s| s != id.0);
                free.push(id.0);
            }
            rq.check_invariants(&procs);
        }
    }

    #[test]
    fn preempts_when_slice_is_exhausted() {
        let mut current = Proc::new();
        current.max_exec_time = 2;
        current.current_runtime = 2;
        assert!(check_preemption(&current, None));
    }

    #[test]
    fn holds_cpu_below_granularity_floor() {
        let mut current = Proc::new();
        current.max_exec_time = 1;
        current.current_runtime = 1;
        // Slice exhausted but under the floor; keep running.
        assert!(!check_preemption(&current, None));
    }

    #[test]
    fn yields_to_more_entitled_process_after_floor() {
        let mut current = Proc::new();
        current.virtual_runtime = 10;
        current.max_exec_time = 8;
        let mut min = Proc::new();
        min.state = ProcState::Runnable;
        min.virtual_runtime = 4;

        current.current_runtime = 1;
        assert!(!check_preemption(&current, Some(&min)));
        current.current_runtime = 2;
        assert!(check_preemption(&current, Some(&min)));
    }

    #[test]
    fn idle_tick_with_no_progress_yields() {
        let mut current = Proc::new();
        current.max_exec_time = 4;
        current.current_runtime = 0;
        assert!(check_preemption(&current, None));
        current.current_runtime = 1;
        assert!(!check_preemption(&current, None));
    }

    #[test]
    fn preemption_is_monotone_in_runtime_against_waiting_minimum() {
        let mut current = Proc::new();
        current.virtual_runtime = 10;
        current.max_exec_time = 6;
        let mut min = Proc::new();
        min.state = ProcState::Runnable;
        min.virtual_runtime = 1;

        let mut fired = false;
        for runtime in 0..20 {
            current.current_runtime = runtime;
            let now = check_preemption(&current, Some(&min));
            assert!(!fired || now, "decision flipped back at runtime {}", runtime);
            fired = now;
        }
        assert!(fired);
    }
}
