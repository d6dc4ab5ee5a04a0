//! Scalar fitness from raw model outputs
//!
//! `fitness = aggregate(objectives) + p · Σ violation^k`. Model failures
//! and non-finite results collapse to [`FAILURE_SENTINEL`].
//!
//! [`FAILURE_SENTINEL`]: fastuav_common::FAILURE_SENTINEL

mod aggregation;
mod evaluator;
mod penalty;

pub use self::aggregation::ObjectiveAggregator;
pub use self::evaluator::{Evaluation, FitnessEvaluator};
pub use self::penalty::{ConstraintPenalty, ViolationReport};
