//! Properties of mutation under churn: renice, the run-step policy, and
//! copy independence, each checked against the reference insert model from
//! `run_queue_order`.

use proptest::collection::vec;
use proptest::prelude::*;

use runq_rs::{RunQueue, CPU_MASK_MAX, NICENESS_MAX, NICENESS_MIN};

use crate::run_queue_order::{
    assert_matches_model, model_push_all, entry_strategy, stable_insert, Entry,
};

proptest! {
    /// `renice` behaves exactly like remove + stable re-insert with the new
    /// weight, and reports a hit iff the identity is enqueued.
    #[test]
    fn renice_agrees_with_reference(
        pushes in vec(entry_strategy(), 0..30),
        target in entry_strategy(),
        new_niceness in NICENESS_MIN..=NICENESS_MAX,
    ) {
        let mut queue = RunQueue::new();
        let (mut model, _) = model_push_all(&pushes);
        for push in &pushes {
            let _ = queue.push(push.build());
        }

        let built = target.build();
        let found = queue.renice(built.callback, built.context, new_niceness);

        let at = model.iter().position(|q| q.identity() == target.identity());
        prop_assert_eq!(found, at.is_some());
        if let Some(at) = at {
            let mut entry = model.remove(at);
            entry.niceness = new_niceness;
            stable_insert(&mut model, entry);
        }
        assert_matches_model(&queue, &model);
    }

    /// The run-step implements the quantum-accounting policy: retire on a
    /// zero report; otherwise subtract-then-add when backlog exceeded the
    /// quantum, full replace when it did not, then re-sort.
    #[test]
    fn run_top_agrees_with_reference(
        pushes in vec(entry_strategy(), 0..30),
        filter in any::<u16>(),
        run_time in 0..80u32,
    ) {
        let mut queue = RunQueue::new();
        let (mut model, _) = model_push_all(&pushes);
        for push in &pushes {
            let _ = queue.push(push.build());
        }

        let returned = queue.run_top(filter, run_time);

        let at = model.iter().position(|q| q.cpu_mask & filter != 0);
        match at {
            None => {
                prop_assert_eq!(returned, 0);
            }
            Some(at) => {
                // The fixture callbacks ignore their inputs and report their
                // own index, so the self-report is just `cb`.
                let report = model[at].cb as u32;
                if report == 0 {
                    model.remove(at);
                    prop_assert_eq!(returned, 0);
                } else {
                    let mut entry = model.remove(at);
                    entry.remaining_time = if entry.remaining_time > run_time {
                        entry.remaining_time - run_time + report
                    } else {
                        report
                    };
                    stable_insert(&mut model, entry);
                    prop_assert_eq!(returned, entry.remaining_time);
                }
            }
        }
        assert_matches_model(&queue, &model);
    }

    /// A copy matches the source, and draining the copy leaves the source
    /// untouched.
    #[test]
    fn copy_is_deep_and_independent(pushes in vec(entry_strategy(), 0..30)) {
        let mut source = RunQueue::new();
        let (model, _) = model_push_all(&pushes);
        for push in &pushes {
            let _ = source.push(push.build());
        }

        let mut dest = RunQueue::new();
        prop_assert!(dest.copy_from(&source));
        assert_matches_model(&dest, &model);

        while dest.pop_top(CPU_MASK_MAX).is_some() {}
        assert_matches_model(&source, &model);
    }
}
