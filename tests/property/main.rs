//! Property-based tests for the run queue's structural invariants.
//!
//! Run with: `cargo test --test property`

mod run_queue_churn;
mod run_queue_order;
