//! Seeded random-operation runner and divergence oracles.
//!
//! Each step draws one operation from a weighted distribution, applies it to
//! the real queue and to the model, compares the returned values, and then
//! checks the structural invariants: equal contents in equal order, sorted
//! chain, length consistency, identity uniqueness. A persistent shadow queue
//! exercises `copy_from` onto both empty and already-populated destinations.

use std::ptr;

use crate::affinity::cpu_count;
use crate::process::{Process, RunFn, NICENESS_MAX, NICENESS_MIN};
use crate::queue::RunQueue;

use super::model::ModelQueue;
use super::rng::XorShift64;

/// Context type used by the sim: a small opaque task id.
pub type SimContext = usize;

/// Configuration for a sim run.
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Operations per run.
    pub steps: u32,
    /// Distinct context values, so identity collisions actually happen.
    pub contexts: usize,
    /// Upper bound (exclusive) for generated `remaining_time` values.
    pub max_remaining: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            steps: 2_000,
            contexts: 6,
            max_remaining: 50,
        }
    }
}

/// Result of a sim run.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    Ok,
    Failed(FailureReport),
}

/// First divergence between the queue and the model.
#[derive(Clone, Debug)]
pub struct FailureReport {
    pub step: u32,
    pub op: String,
    pub message: String,
}

// Callback behaviors the sim mixes; the model invokes the same functions, so
// both sides always observe the same self-report.
fn cb_complete(_run_time: u32, _context: SimContext) -> u32 {
    0
}

fn cb_halve(run_time: u32, _context: SimContext) -> u32 {
    run_time / 2
}

fn cb_stubborn(_run_time: u32, _context: SimContext) -> u32 {
    9
}

fn cb_grow(run_time: u32, _context: SimContext) -> u32 {
    run_time.saturating_add(3)
}

const CALLBACKS: [RunFn<SimContext>; 4] = [cb_complete, cb_halve, cb_stubborn, cb_grow];

/// Drives one seeded op stream against queue and model.
pub struct SimRunner {
    cfg: SimConfig,
    rng: XorShift64,
    queue: RunQueue<SimContext>,
    model: ModelQueue<SimContext>,
    /// Persistent `copy_from` destination; starts empty, then keeps whatever
    /// the previous copy left, so later copies overwrite live contents.
    shadow: RunQueue<SimContext>,
}

impl SimRunner {
    pub fn new(cfg: SimConfig, seed: u64) -> Self {
        Self {
            cfg,
            rng: XorShift64::new(seed),
            queue: RunQueue::new(),
            model: ModelQueue::new(),
            shadow: RunQueue::new(),
        }
    }

    pub fn run(mut self) -> RunOutcome {
        for step in 0..self.cfg.steps {
            let outcome = match self.apply() {
                Ok(op) => self.check().map_err(|message| (op, message)),
                Err(failure) => Err(failure),
            };
            if let Err((op, message)) = outcome {
                return RunOutcome::Failed(FailureReport { step, op, message });
            }
        }
        RunOutcome::Ok
    }

    /// Applies one random op to both sides. `Err` carries the op description
    /// and the divergence in the returned values.
    fn apply(&mut self) -> Result<String, (String, String)> {
        let roll = self.rng.next_u32(100);

        if roll < 40 {
            let process = self.random_process();
            let op = format!(
                "push(ctx={}, nice={}, rem={}, mask={:#06x})",
                process.context, process.niceness, process.remaining_time, process.cpu_mask
            );
            let got = self.queue.push(process);
            let want = self.model.push(process);
            expect_eq(op, format!("{got:?}"), format!("{want:?}"))
        } else if roll < 65 {
            let cpu_mask = self.random_mask();
            let run_time = self.rng.next_u32(self.cfg.max_remaining.max(1));
            let op = format!("run_top(mask={cpu_mask:#06x}, run_time={run_time})");
            let got = self.queue.run_top(cpu_mask, run_time);
            let want = self.model.run_top(cpu_mask, run_time);
            expect_eq(op, got.to_string(), want.to_string())
        } else if roll < 75 {
            let cpu_mask = self.random_mask();
            let op = format!("pop_top(mask={cpu_mask:#06x})");
            let got = self.queue.pop_top(cpu_mask);
            let want = self.model.pop_top(cpu_mask);
            expect_eq(
                op,
                format!("{:?}", got.map(describe)),
                format!("{:?}", want.map(describe)),
            )
        } else if roll < 85 {
            let callback = CALLBACKS[self.rng.next_u32(CALLBACKS.len() as u32) as usize];
            let context = self.rng.next_u32(self.cfg.contexts as u32) as usize;
            let niceness = NICENESS_MIN + self.rng.next_u32(NICENESS_MAX - NICENESS_MIN + 1);
            let op = format!("renice(ctx={context}, nice={niceness})");
            let got = self.queue.renice(callback, context, niceness);
            let want = self.model.renice(callback, context, niceness);
            expect_eq(op, got.to_string(), want.to_string())
        } else if roll < 93 {
            let cpu_mask = self.random_mask();
            let op = format!("peek_top(mask={cpu_mask:#06x})");
            let got = self.queue.peek_top(cpu_mask).copied();
            let want = self.model.peek_top(cpu_mask).copied();
            expect_eq(
                op,
                format!("{:?}", got.map(describe)),
                format!("{:?}", want.map(describe)),
            )
        } else if roll < 98 {
            let op = "copy_from(shadow <- queue)".to_string();
            // Never fails outside real allocator exhaustion; on success the
            // shadow must mirror the model exactly.
            if !self.shadow.copy_from(&self.queue) {
                return Err((op, "copy_from reported allocation failure".to_string()));
            }
            if let Err(message) = compare(&self.shadow, &self.model) {
                return Err((op, format!("shadow diverged after copy: {message}")));
            }
            Ok(op)
        } else {
            self.queue.clear();
            self.model.clear();
            Ok("clear()".to_string())
        }
    }

    /// Structural oracles, run after every successful op.
    fn check(&self) -> Result<(), String> {
        compare(&self.queue, &self.model)?;
        check_sorted(&self.queue)?;
        check_identity_unique(&self.queue)?;
        Ok(())
    }

    fn random_process(&mut self) -> Process<SimContext> {
        let callback = CALLBACKS[self.rng.next_u32(CALLBACKS.len() as u32) as usize];
        let context = self.rng.next_u32(self.cfg.contexts as u32) as usize;
        let niceness = NICENESS_MIN + self.rng.next_u32(NICENESS_MAX - NICENESS_MIN + 1);
        let remaining_time = self.rng.next_u32(self.cfg.max_remaining.max(1));
        let cpu_mask = self.random_mask();
        Process::new(callback, context, niceness, remaining_time, cpu_mask)
    }

    /// Mostly narrow masks (collisions and misses), occasionally zero.
    fn random_mask(&mut self) -> u16 {
        if self.rng.chance(1, 20) {
            return 0;
        }
        if self.rng.chance(1, 4) {
            return 1 << self.rng.next_u32(16);
        }
        self.rng.next_u32(0x1_0000) as u16
    }
}

fn expect_eq(op: String, got: String, want: String) -> Result<String, (String, String)> {
    if got == want {
        return Ok(op);
    }
    let message = format!("return value diverged: queue={got}, model={want}");
    Err((op, message))
}

fn describe(p: Process<SimContext>) -> (usize, u32, u32, u16) {
    (p.context, p.niceness, p.remaining_time, p.cpu_mask)
}

/// Entry-by-entry comparison, including callback identity.
fn compare(queue: &RunQueue<SimContext>, model: &ModelQueue<SimContext>) -> Result<(), String> {
    if queue.len() != model.len() {
        return Err(format!(
            "length diverged: queue={}, model={}",
            queue.len(),
            model.len()
        ));
    }
    for (at, (got, want)) in queue.iter().zip(model.entries().iter()).enumerate() {
        let same = ptr::fn_addr_eq(got.callback, want.callback)
            && got.context == want.context
            && got.niceness == want.niceness
            && got.remaining_time == want.remaining_time
            && got.cpu_mask == want.cpu_mask;
        if !same {
            return Err(format!(
                "entry {at} diverged: queue={:?}, model={:?}",
                describe(*got),
                describe(*want)
            ));
        }
    }
    Ok(())
}

/// Non-decreasing priority, popcount tie-break, top to bottom.
fn check_sorted(queue: &RunQueue<SimContext>) -> Result<(), String> {
    let entries: Vec<_> = queue.iter().collect();
    for (at, pair) in entries.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let ordered = a.priority() < b.priority()
            || (a.priority() == b.priority() && cpu_count(a.cpu_mask) <= cpu_count(b.cpu_mask));
        if !ordered {
            return Err(format!(
                "sort invariant broken between entries {at} and {}: {:?} then {:?}",
                at + 1,
                describe(*a),
                describe(*b)
            ));
        }
    }
    Ok(())
}

/// At most one entry per `(callback, context)` pair.
fn check_identity_unique(queue: &RunQueue<SimContext>) -> Result<(), String> {
    let entries: Vec<_> = queue.iter().collect();
    for (at, a) in entries.iter().enumerate() {
        for b in entries.iter().skip(at + 1) {
            if ptr::fn_addr_eq(a.callback, b.callback) && a.context == b.context {
                return Err(format!(
                    "identity duplicated: {:?} and {:?}",
                    describe(**a),
                    describe(**b)
                ));
            }
        }
    }
    Ok(())
}
