//! Priority-ordered run queue with O(1) relink and O(n) sorted insert.
//!
//! Nodes form a doubly-linked chain sorted by the process priority value
//! (then affinity popcount on ties) from `top` (next to run) to `bottom`.
//! Every public operation leaves the chain sorted, the cached length equal to
//! the number of reachable nodes, and at most one entry per task identity.
//!
//! The chain is a live scheduling structure, not a static index: the run-step
//! re-prioritizes entries in place from the callback's self-reported
//! outstanding work. `renice` and the run-step relocate nodes by unlink +
//! sorted relink, reusing the allocation, so only `push` and `copy_from` can
//! observe allocation failure.
//!
//! # Safety
//!
//! This is a raw-pointer structure. All nodes are allocated and freed by this
//! module, reachable only through `top`/`bottom`, and freed exactly once (on
//! removal, on `clear`, or on drop). The raw pointers keep `RunQueue` out of
//! `Send`/`Sync`, which matches the single-consumer contract: no internal
//! locking, callers serialize access externally.

use std::alloc::{alloc, dealloc, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::affinity::intersects;
use crate::process::{assert_niceness, Process, RunFn};

/// Outcome vocabulary of [`RunQueue::push`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// Inserted at its sorted position.
    Success,
    /// An entry with the same identity and the same declared state already
    /// exists. No mutation.
    Duplicate,
    /// An entry with the same identity but a different declared state already
    /// exists; one logical task cannot carry two states. No mutation.
    Inconsistent,
    /// Node allocation failed. No mutation.
    AllocationFailed,
}

struct Node<C> {
    process: Process<C>,
    next: Option<NonNull<Node<C>>>,
    prev: Option<NonNull<Node<C>>>,
}

/// Sorted collection of runnable processes for one consumer.
///
/// `top` is the highest-priority entry (lowest sort key). Exclusively owns
/// its nodes and the embedded `Process` copies; never owns whatever the
/// context `C` refers to.
pub struct RunQueue<C> {
    top: Option<NonNull<Node<C>>>,
    bottom: Option<NonNull<Node<C>>>,
    len: u32,
}

// ============================================================================
// Chain primitives (no bounds on C)
// ============================================================================

impl<C> RunQueue<C> {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            top: None,
            bottom: None,
            len: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        let empty = self.top.is_none();

        assert!(empty == self.bottom.is_none());
        assert!(empty == (self.len == 0));

        empty
    }

    /// Number of enqueued processes.
    #[inline]
    pub fn len(&self) -> u32 {
        assert!((self.len == 0) == self.top.is_none());
        assert!((self.len == 0) == self.bottom.is_none());

        self.len
    }

    /// Borrowing iterator over the processes, top to bottom.
    pub fn iter(&self) -> Iter<'_, C> {
        Iter {
            cursor: self.top,
            _queue: PhantomData,
        }
    }

    /// Frees every node and resets to empty.
    pub fn clear(&mut self) {
        let mut cursor = self.top;
        while let Some(node) = cursor {
            // SAFETY: `node` is reachable from `top`, so it is alive and
            // owned by this queue; we read its successor before freeing it.
            cursor = unsafe { node.as_ref().next };
            Self::free_node(node);
        }

        self.top = None;
        self.bottom = None;
        self.len = 0;
    }

    /// Allocates a detached node. Returns `None` instead of aborting when the
    /// allocator fails, so `push`/`copy_from` can surface the failure.
    fn alloc_node(process: Process<C>) -> Option<NonNull<Node<C>>> {
        let layout = Layout::new::<Node<C>>();
        // SAFETY: `Node` holds at least the callback pointer, so the layout
        // has non-zero size.
        let raw = unsafe { alloc(layout) }.cast::<Node<C>>();
        let node = NonNull::new(raw)?;
        // SAFETY: `node` points to freshly allocated storage with the layout
        // of `Node<C>`.
        unsafe {
            node.as_ptr().write(Node {
                process,
                next: None,
                prev: None,
            });
        }
        Some(node)
    }

    /// Frees an unlinked node.
    fn free_node(node: NonNull<Node<C>>) {
        // SAFETY: every node comes from `alloc_node` with this exact layout
        // and is freed exactly once; dropping the `Node` in place first keeps
        // this correct for any context type.
        unsafe {
            node.as_ptr().drop_in_place();
            dealloc(node.as_ptr().cast(), Layout::new::<Node<C>>());
        }
    }

    /// Splices a node out of the chain without freeing it. The node comes
    /// back detached (`prev`/`next` cleared).
    fn unlink(&mut self, mut node: NonNull<Node<C>>) {
        // SAFETY: the caller passes a node reachable from `top`; its
        // neighbors (if any) are equally alive and owned by this queue.
        unsafe {
            let (prev, next) = (node.as_ref().prev, node.as_ref().next);
            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.top = next,
            }
            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.bottom = prev,
            }
            node.as_mut().prev = None;
            node.as_mut().next = None;
        }
        self.len -= 1;

        assert!((self.len == 0) == self.top.is_none());
    }

    /// Appends a detached node at the bottom. Used by `copy_from`, where the
    /// source order is already sorted.
    fn append_node(&mut self, mut node: NonNull<Node<C>>) {
        // SAFETY: `node` is detached and owned; `bottom` (if any) is alive.
        unsafe {
            node.as_mut().prev = self.bottom;
            node.as_mut().next = None;
            match self.bottom {
                Some(mut b) => b.as_mut().next = Some(node),
                None => self.top = Some(node),
            }
        }
        self.bottom = Some(node);
        self.len += 1;
    }
}

// ============================================================================
// Scheduler operations
// ============================================================================

impl<C: Copy + PartialEq> RunQueue<C> {
    /// Inserts a process at its sorted position.
    ///
    /// A non-empty queue is first scanned for an entry with the same
    /// `(callback, context)` identity: an exact match on the declared state
    /// is rejected as [`PushResult::Duplicate`], a mismatch as
    /// [`PushResult::Inconsistent`]. Either rejection leaves the queue
    /// untouched, as does [`PushResult::AllocationFailed`].
    ///
    /// # Panics
    /// Panics if `process.niceness` is outside the valid range. Records built
    /// through [`Process::new`] cannot trip this.
    pub fn push(&mut self, process: Process<C>) -> PushResult {
        assert_niceness(process.niceness);

        if !self.is_empty() {
            if let Some(rejection) = self.check_conflicts(&process) {
                return rejection;
            }
        }

        let Some(node) = Self::alloc_node(process) else {
            return PushResult::AllocationFailed;
        };
        self.link_sorted(node);
        PushResult::Success
    }

    /// Changes the niceness of the task named by `(callback, context)` and
    /// relocates it to the position the new weight dictates.
    ///
    /// Returns `false` if no such task is enqueued. The node allocation is
    /// reused, so a hit cannot fail.
    ///
    /// # Panics
    /// Panics if `niceness` is outside the valid range.
    pub fn renice(&mut self, callback: RunFn<C>, context: C, niceness: u32) -> bool {
        assert_niceness(niceness);

        let Some(mut node) = self.find_task(callback, context) else {
            return false;
        };
        self.unlink(node);
        // SAFETY: `node` is detached but still owned by this queue; we hold
        // the only live pointer to it.
        unsafe {
            node.as_mut().process.niceness = niceness;
        }
        self.link_sorted(node);
        true
    }

    /// Returns the highest-priority process whose mask intersects the filter,
    /// without removing it.
    pub fn peek_top(&self, cpu_mask: u16) -> Option<&Process<C>> {
        self.find_affine(cpu_mask).map(|node| {
            // SAFETY: the node is owned by this queue and outlives the
            // returned borrow, which keeps `&self` alive.
            unsafe { &(*node.as_ptr()).process }
        })
    }

    /// Removes and returns the highest-priority process whose mask intersects
    /// the filter.
    pub fn pop_top(&mut self, cpu_mask: u16) -> Option<Process<C>> {
        let node = self.find_affine(cpu_mask)?;
        // SAFETY: reachable node, alive until `free_node` below.
        let process = unsafe { node.as_ref().process };
        self.unlink(node);
        Self::free_node(node);
        Some(process)
    }

    /// Executes one scheduling quantum.
    ///
    /// Selects the same node [`Self::peek_top`] would, grants it `run_time`
    /// via its callback, and re-prioritizes from the callback's self-report:
    /// `0` retires the process (returns 0); a nonzero report sets the new
    /// remaining time to `remaining_time - run_time + report` when prior
    /// backlog exceeded the quantum, or to the report alone otherwise (the
    /// backlog-reset policy), relinks the node at its new position, and
    /// returns the new remaining time.
    ///
    /// Returns 0 without side effects when nothing matches the filter.
    pub fn run_top(&mut self, cpu_mask: u16, run_time: u32) -> u32 {
        let Some(mut node) = self.find_affine(cpu_mask) else {
            return 0;
        };

        // Copy the fields out so no borrow of the chain is held across the
        // callback. The callback only sees its own context; it has no path
        // back into this queue while `&mut self` is held.
        let (callback, context, remaining_time) = {
            // SAFETY: reachable node, alive for the whole call.
            let process = unsafe { &node.as_ref().process };
            (process.callback, process.context, process.remaining_time)
        };

        let reported = callback(run_time, context);
        if reported == 0 {
            self.unlink(node);
            Self::free_node(node);
            return 0;
        }

        let new_remaining = if remaining_time > run_time {
            (remaining_time - run_time).saturating_add(reported)
        } else {
            reported
        };

        self.unlink(node);
        // SAFETY: detached node, sole live pointer held here.
        unsafe {
            node.as_mut().process.remaining_time = new_remaining;
        }
        self.link_sorted(node);
        new_remaining
    }

    /// Replaces this queue's contents with a deep copy of `source`.
    ///
    /// The clone chain is built first; on allocation failure it is discarded
    /// wholesale and `false` is returned with the destination untouched. On
    /// success the old contents are freed and the clone installed, preserving
    /// the source's values and order. The two queues share no nodes
    /// afterwards.
    pub fn copy_from(&mut self, source: &RunQueue<C>) -> bool {
        let mut fresh = RunQueue::new();
        for process in source.iter() {
            let Some(clone) = Self::alloc_node(*process) else {
                // `fresh` drops here, freeing the partial chain.
                return false;
            };
            // Source order is already sorted; append preserves it.
            fresh.append_node(clone);
        }

        // Assignment drops the old contents.
        *self = fresh;
        true
    }

    /// Scans top to bottom for the entry naming the given task.
    fn find_task(&self, callback: RunFn<C>, context: C) -> Option<NonNull<Node<C>>> {
        let mut cursor = self.top;
        while let Some(node) = cursor {
            // SAFETY: nodes reachable from `top` are alive and owned here.
            let current = unsafe { node.as_ref() };
            if current.process.is_task(callback, context) {
                return Some(node);
            }
            cursor = current.next;
        }
        None
    }

    /// Scans top to bottom for the first entry whose mask intersects the
    /// filter. First hit is the highest-priority compatible process.
    fn find_affine(&self, cpu_mask: u16) -> Option<NonNull<Node<C>>> {
        let mut cursor = self.top;
        while let Some(node) = cursor {
            // SAFETY: nodes reachable from `top` are alive and owned here.
            let current = unsafe { node.as_ref() };
            if intersects(current.process.cpu_mask, cpu_mask) {
                return Some(node);
            }
            cursor = current.next;
        }
        None
    }

    /// Classifies an incoming process against the enqueued entry with the
    /// same identity, if any. `None` means no conflict: proceed to insert.
    fn check_conflicts(&self, process: &Process<C>) -> Option<PushResult> {
        let node = self.find_task(process.callback, process.context)?;
        // SAFETY: `find_task` only returns reachable nodes.
        let queued = unsafe { &node.as_ref().process };
        if queued.same_declared_state(process) {
            Some(PushResult::Duplicate)
        } else {
            Some(PushResult::Inconsistent)
        }
    }

    /// Links a detached node at its sorted position: immediately before the
    /// first entry it strictly precedes, else at the bottom. Strict
    /// comparison keeps insertion stable relative to existing order.
    fn link_sorted(&mut self, mut node: NonNull<Node<C>>) {
        // SAFETY: `node` is detached and owned; copying the process out
        // avoids holding a borrow while relinking.
        let process = unsafe { node.as_ref().process };

        let mut cursor = self.top;
        while let Some(mut queued) = cursor {
            // SAFETY: reachable nodes are alive; `prev` of a reachable node
            // is either None or equally reachable.
            unsafe {
                if process.runs_before(&queued.as_ref().process) {
                    let prev = queued.as_ref().prev;
                    node.as_mut().next = Some(queued);
                    node.as_mut().prev = prev;
                    queued.as_mut().prev = Some(node);
                    match prev {
                        Some(mut p) => p.as_mut().next = Some(node),
                        None => self.top = Some(node),
                    }
                    self.len += 1;
                    return;
                }
                cursor = queued.as_ref().next;
            }
        }

        // Nothing sorts after the node (or the queue is empty): append.
        self.append_node(node);
    }
}

impl<C> Default for RunQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Drop for RunQueue<C> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<C: fmt::Debug> fmt::Debug for RunQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator returned by [`RunQueue::iter`].
pub struct Iter<'a, C> {
    cursor: Option<NonNull<Node<C>>>,
    _queue: PhantomData<&'a RunQueue<C>>,
}

impl<'a, C> Iterator for Iter<'a, C> {
    type Item = &'a Process<C>;

    fn next(&mut self) -> Option<&'a Process<C>> {
        let node = self.cursor?;
        // SAFETY: the `'a` borrow of the queue keeps every reachable node
        // alive and unmutated for the iterator's lifetime.
        let current = unsafe { &*node.as_ptr() };
        self.cursor = current.next;
        Some(&current.process)
    }
}
