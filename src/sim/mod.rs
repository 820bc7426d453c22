//! Run-queue simulation harness.
//!
//! Deterministic random-operation streams applied in lockstep to the real
//! [`crate::RunQueue`] and a naive reference model, with structural invariant
//! checks after every step. Compiled for tests and behind the `sim-harness`
//! feature; never part of the production API.

pub mod model;
pub mod rng;
pub mod runner;

pub use model::ModelQueue;
pub use rng::XorShift64;
pub use runner::{FailureReport, RunOutcome, SimConfig, SimRunner};
