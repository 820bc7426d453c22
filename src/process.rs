//! The schedulable unit: a callback, its opaque context, and scheduling state.
//!
//! # Identity
//!
//! Two processes are "the same logical task" when they share the
//! `(callback, context)` pair. The queue enforces at most one entry per
//! identity; identity comparison uses the callback's address
//! ([`std::ptr::fn_addr_eq`]) and the context's `PartialEq`.
//!
//! # Ordering
//!
//! The primary sort key is the priority value `niceness * remaining_time` as
//! a widened `u64` product (no overflow loss); lower runs sooner. Ties fall
//! back to the affinity popcount, fewer allowed processors first. A strict
//! tie on both keys keeps the incumbent first, so insertion is stable.

use std::ptr;

use crate::affinity::cpu_count;

/// Lower bound of the valid niceness range (inclusive).
pub const NICENESS_MIN: u32 = 10;

/// Upper bound of the valid niceness range (inclusive).
pub const NICENESS_MAX: u32 = 49;

/// The unit of work a process carries.
///
/// Invoked as `callback(quantum_budget, context)`. Returns `0` when the
/// process has completed, or a nonzero figure meaning "this much work remains
/// or is newly requested". The call is synchronous; bounding its duration is
/// the caller's contract, not the queue's.
pub type RunFn<C> = fn(run_time: u32, context: C) -> u32;

/// A runnable work item.
///
/// `C` is an opaque caller-supplied context type. The queue copies it and
/// compares it for identity but never interprets it; whatever it refers to
/// must stay valid for as long as the process remains enqueued.
#[derive(Clone, Copy, Debug)]
pub struct Process<C> {
    pub callback: RunFn<C>,
    pub context: C,
    /// Scheduling weight in `[NICENESS_MIN, NICENESS_MAX]`; lower is more
    /// favorable.
    pub niceness: u32,
    /// Claimed outstanding work, in the same units as the run-step quantum.
    pub remaining_time: u32,
    /// Allowed logical processors, one bit each.
    pub cpu_mask: u16,
}

impl<C> Process<C> {
    /// Creates a process record.
    ///
    /// # Panics
    /// Panics if `niceness` is outside `[NICENESS_MIN, NICENESS_MAX]`. An
    /// out-of-range niceness is a caller bug, not a runtime condition.
    pub fn new(
        callback: RunFn<C>,
        context: C,
        niceness: u32,
        remaining_time: u32,
        cpu_mask: u16,
    ) -> Self {
        assert_niceness(niceness);
        Self {
            callback,
            context,
            niceness,
            remaining_time,
            cpu_mask,
        }
    }

    /// The primary sort key: `niceness * remaining_time`, widened to `u64`.
    #[inline]
    pub fn priority(&self) -> u64 {
        u64::from(self.niceness) * u64::from(self.remaining_time)
    }

    /// Returns `true` if `self` must be scheduled ahead of `queued`.
    ///
    /// Strict comparison: equal priority and equal popcount returns `false`,
    /// which keeps already-queued entries first on ties.
    #[inline]
    pub(crate) fn runs_before(&self, queued: &Self) -> bool {
        let lhs = self.priority();
        let rhs = queued.priority();
        if lhs == rhs {
            return cpu_count(self.cpu_mask) < cpu_count(queued.cpu_mask);
        }
        lhs < rhs
    }
}

impl<C: Copy + PartialEq> Process<C> {
    /// Returns `true` if this entry names the given logical task.
    #[inline]
    pub fn is_task(&self, callback: RunFn<C>, context: C) -> bool {
        ptr::fn_addr_eq(self.callback, callback) && self.context == context
    }

    /// Returns `true` if `other` declares the same scheduling state
    /// (niceness, remaining time, affinity). Used to tell a duplicate push
    /// from an inconsistent one.
    #[inline]
    pub(crate) fn same_declared_state(&self, other: &Self) -> bool {
        self.niceness == other.niceness
            && self.remaining_time == other.remaining_time
            && self.cpu_mask == other.cpu_mask
    }
}

/// Fail-fast niceness range check shared by `push`, `renice`, and the
/// constructor.
#[inline]
pub(crate) fn assert_niceness(niceness: u32) {
    assert!(
        (NICENESS_MIN..=NICENESS_MAX).contains(&niceness),
        "niceness {niceness} outside [{NICENESS_MIN}, {NICENESS_MAX}]"
    );
}
