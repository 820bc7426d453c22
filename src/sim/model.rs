//! Naive reference model of the run queue.
//!
//! A plain `Vec` kept sorted by linear scan, implementing the exact same
//! observable semantics as [`crate::RunQueue`] (stable sorted insert,
//! identity conflicts, affinity search, backlog-reset run policy) with none
//! of its pointer machinery. The runner drives both in lockstep and fails on
//! the first divergence.

use crate::affinity::intersects;
use crate::process::{Process, RunFn};
use crate::queue::PushResult;

/// Vec-backed model queue. Deliberately simple: correctness over speed.
#[derive(Clone, Debug, Default)]
pub struct ModelQueue<C> {
    entries: Vec<Process<C>>,
}

impl<C: Copy + PartialEq> ModelQueue<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Process<C>] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn push(&mut self, process: Process<C>) -> PushResult {
        if let Some(queued) = self
            .entries
            .iter()
            .find(|q| q.is_task(process.callback, process.context))
        {
            return if queued.same_declared_state(&process) {
                PushResult::Duplicate
            } else {
                PushResult::Inconsistent
            };
        }
        self.insert_sorted(process);
        PushResult::Success
    }

    pub fn renice(&mut self, callback: RunFn<C>, context: C, niceness: u32) -> bool {
        let Some(at) = self.entries.iter().position(|q| q.is_task(callback, context)) else {
            return false;
        };
        let mut process = self.entries.remove(at);
        process.niceness = niceness;
        self.insert_sorted(process);
        true
    }

    pub fn peek_top(&self, cpu_mask: u16) -> Option<&Process<C>> {
        self.entries
            .iter()
            .find(|q| intersects(q.cpu_mask, cpu_mask))
    }

    pub fn pop_top(&mut self, cpu_mask: u16) -> Option<Process<C>> {
        let at = self
            .entries
            .iter()
            .position(|q| intersects(q.cpu_mask, cpu_mask))?;
        Some(self.entries.remove(at))
    }

    pub fn run_top(&mut self, cpu_mask: u16, run_time: u32) -> u32 {
        let Some(at) = self
            .entries
            .iter()
            .position(|q| intersects(q.cpu_mask, cpu_mask))
        else {
            return 0;
        };

        let process = self.entries[at];
        let reported = (process.callback)(run_time, process.context);
        if reported == 0 {
            self.entries.remove(at);
            return 0;
        }

        let new_remaining = if process.remaining_time > run_time {
            (process.remaining_time - run_time).saturating_add(reported)
        } else {
            reported
        };

        let mut process = self.entries.remove(at);
        process.remaining_time = new_remaining;
        self.insert_sorted(process);
        new_remaining
    }

    /// Stable sorted insert: before the first entry the candidate strictly
    /// precedes, else at the end.
    fn insert_sorted(&mut self, process: Process<C>) {
        let at = self
            .entries
            .iter()
            .position(|q| process.runs_before(q))
            .unwrap_or(self.entries.len());
        self.entries.insert(at, process);
    }
}
