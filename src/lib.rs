//! Priority run queue for a cooperative, single-consumer scheduler.
//!
//! ## Scope
//! This crate is the dispatch core only: a priority-ordered collection of
//! runnable processes with conflict-checked insertion, priority adjustment,
//! affinity-aware selection, and a run-step that grants one quantum and
//! re-prioritizes from the callback's self-report. Timer wiring, actual CPU
//! dispatch, and process creation live outside it.
//!
//! ## Key invariants
//! - The chain is sorted by `niceness * remaining_time` (wide product), with
//!   affinity popcount breaking ties; the top entry is next to run.
//! - At most one entry per `(callback, context)` identity.
//! - Cached length always equals the number of reachable nodes.
//! - Failed operations (rejected push, allocation failure, failed copy) leave
//!   the queue exactly as it was.
//!
//! ## Execution model
//! Single-threaded, synchronous, non-reentrant. No internal locking, no
//! atomics; the raw-pointer chain keeps [`RunQueue`] out of `Send`/`Sync`.
//! Callbacks run synchronously inside [`RunQueue::run_top`] and report
//! outstanding work; `0` retires the process. Cooperative, not preemptive:
//! re-prioritization comes purely from that self-report plus niceness.
//!
//! ## Notable entry points
//! - [`RunQueue`]: the ordered collection and all scheduler operations.
//! - [`Process`]: the schedulable record; `C` is the caller's opaque context.
//! - [`PushResult`]: the complete outcome vocabulary of insertion.

pub mod affinity;
pub mod process;
pub mod queue;

#[cfg(any(test, feature = "sim-harness"))]
pub mod sim;

pub use affinity::{cpu_count, intersects, CPU_MASK_MAX, CPU_MASK_WIDTH};
pub use process::{Process, RunFn, NICENESS_MAX, NICENESS_MIN};
pub use queue::{Iter, PushResult, RunQueue};
