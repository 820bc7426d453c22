//! Properties of insertion: sort order, stability, and identity conflicts.
//!
//! The oracle is an independently written stable insert over a `Vec`; the
//! queue must agree with it on contents and order for every push sequence.

use proptest::collection::vec;
use proptest::prelude::*;

use runq_rs::{cpu_count, Process, PushResult, RunQueue, NICENESS_MAX, NICENESS_MIN};

type Ctx = usize;

fn cb_zero(_run_time: u32, _context: Ctx) -> u32 {
    0
}

fn cb_one(_run_time: u32, _context: Ctx) -> u32 {
    1
}

fn cb_two(_run_time: u32, _context: Ctx) -> u32 {
    2
}

const CALLBACKS: [fn(u32, Ctx) -> u32; 3] = [cb_zero, cb_one, cb_two];

/// Generator-friendly process description; `cb` indexes `CALLBACKS`.
#[derive(Clone, Copy, Debug)]
pub struct Entry {
    pub cb: usize,
    pub context: Ctx,
    pub niceness: u32,
    pub remaining_time: u32,
    pub cpu_mask: u16,
}

impl Entry {
    pub fn build(self) -> Process<Ctx> {
        Process::new(
            CALLBACKS[self.cb],
            self.context,
            self.niceness,
            self.remaining_time,
            self.cpu_mask,
        )
    }

    pub fn identity(&self) -> (usize, Ctx) {
        (self.cb, self.context)
    }

    pub fn priority(&self) -> u64 {
        u64::from(self.niceness) * u64::from(self.remaining_time)
    }

    pub fn sort_key(&self) -> (u64, u16) {
        (self.priority(), cpu_count(self.cpu_mask))
    }
}

/// Stable sorted insert: before the first entry the candidate strictly
/// precedes (priority, then popcount), else at the end.
pub fn stable_insert(model: &mut Vec<Entry>, entry: Entry) {
    let at = model
        .iter()
        .position(|q| entry.sort_key() < q.sort_key())
        .unwrap_or(model.len());
    model.insert(at, entry);
}

pub fn entry_strategy() -> impl Strategy<Value = Entry> {
    (
        0..CALLBACKS.len(),
        0..5usize,
        NICENESS_MIN..=NICENESS_MAX,
        0..60u32,
        any::<u16>(),
    )
        .prop_map(|(cb, context, niceness, remaining_time, cpu_mask)| Entry {
            cb,
            context,
            niceness,
            remaining_time,
            cpu_mask,
        })
}

/// Reference semantics for a push sequence: stable sorted insert with
/// duplicate/inconsistent rejection. Returns the accepted entries in order.
pub fn model_push_all(pushes: &[Entry]) -> (Vec<Entry>, Vec<PushResult>) {
    let mut accepted: Vec<Entry> = Vec::new();
    let mut results = Vec::with_capacity(pushes.len());

    for &push in pushes {
        if let Some(queued) = accepted.iter().find(|q| q.identity() == push.identity()) {
            results.push(
                if (queued.niceness, queued.remaining_time, queued.cpu_mask)
                    == (push.niceness, push.remaining_time, push.cpu_mask)
                {
                    PushResult::Duplicate
                } else {
                    PushResult::Inconsistent
                },
            );
            continue;
        }
        stable_insert(&mut accepted, push);
        results.push(PushResult::Success);
    }

    (accepted, results)
}

pub fn assert_matches_model(queue: &RunQueue<Ctx>, model: &[Entry]) {
    assert_eq!(queue.len() as usize, model.len());
    for (got, want) in queue.iter().zip(model.iter()) {
        assert_eq!(got.context, want.context);
        assert_eq!(got.niceness, want.niceness);
        assert_eq!(got.remaining_time, want.remaining_time);
        assert_eq!(got.cpu_mask, want.cpu_mask);
    }
}

proptest! {
    /// Contents and order agree with the reference insert for any sequence,
    /// and each push reports the same outcome the reference predicts.
    #[test]
    fn push_sequence_matches_reference(pushes in vec(entry_strategy(), 0..40)) {
        let mut queue = RunQueue::new();
        let (model, expected) = model_push_all(&pushes);

        for (push, want) in pushes.iter().zip(expected.iter()) {
            prop_assert_eq!(queue.push(push.build()), *want);
        }
        assert_matches_model(&queue, &model);
    }

    /// The chain is non-decreasing in (priority, popcount) top to bottom.
    #[test]
    fn chain_is_always_sorted(pushes in vec(entry_strategy(), 0..40)) {
        let mut queue = RunQueue::new();
        for push in &pushes {
            let _ = queue.push(push.build());
        }

        let entries: Vec<_> = queue.iter().collect();
        for pair in entries.windows(2) {
            let a = (pair[0].priority(), cpu_count(pair[0].cpu_mask));
            let b = (pair[1].priority(), cpu_count(pair[1].cpu_mask));
            prop_assert!(a <= b, "unsorted neighbors: {:?} then {:?}", a, b);
        }
    }

    /// No identity ever appears twice, no matter how pushes collide.
    #[test]
    fn identities_stay_unique(pushes in vec(entry_strategy(), 0..60)) {
        let mut queue = RunQueue::new();
        for push in &pushes {
            let _ = queue.push(push.build());
        }

        let entries: Vec<_> = queue.iter().collect();
        for (at, a) in entries.iter().enumerate() {
            for b in entries.iter().skip(at + 1) {
                let same = (a.callback as usize, a.context) == (b.callback as usize, b.context);
                prop_assert!(!same, "identity enqueued twice: context {}", a.context);
            }
        }
    }

    /// Affinity search returns the first compatible entry in sort order, and
    /// exactly when one exists.
    #[test]
    fn affinity_search_is_first_match(
        pushes in vec(entry_strategy(), 0..40),
        filter in any::<u16>(),
    ) {
        let mut queue = RunQueue::new();
        let (model, _) = model_push_all(&pushes);
        for push in &pushes {
            let _ = queue.push(push.build());
        }

        let want = model.iter().find(|q| q.cpu_mask & filter != 0);
        let got = queue.peek_top(filter);
        prop_assert_eq!(got.is_some(), want.is_some());
        if let (Some(got), Some(want)) = (got, want) {
            prop_assert_eq!(got.context, want.context);
            prop_assert_eq!(got.cpu_mask, want.cpu_mask);
        }

        // pop returns the same entry and shrinks the queue by one.
        let before = queue.len();
        let popped = queue.pop_top(filter);
        prop_assert_eq!(popped.is_some(), want.is_some());
        if let (Some(popped), Some(want)) = (popped, want) {
            prop_assert_eq!(popped.context, want.context);
            prop_assert_eq!(queue.len(), before - 1);
        }
    }
}
