//! # FastUAV Common
//!
//! Shared problem types, errors, and constants for the FastUAV
//! derivative-free sizing optimizer.
//!
//! ## Core Types
//!
//! - [`DesignVariable`]: named, bounded, possibly vector-valued design input
//! - [`Objective`]: named model output to minimize, with a relative weight
//! - [`Constraint`]: lower/upper/equality bound on a named model output
//! - [`Candidate`]/[`Population`]: one generation's sampled designs and results
//!
//! ## Errors
//!
//! - [`SetupError`]: fatal, raised before the first generation
//! - [`EvaluationFailure`]: recoverable, absorbed into a sentinel fitness
//! - [`EngineError`]: fatal, raised by the evolution engine mid-run

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{EngineError, EvaluationFailure, Result, SetupError, SizingError};
pub use types::{
    candidate::{Candidate, Population},
    constraint::{Constraint, ConstraintKind},
    design_variable::DesignVariable,
    objective::Objective,
    NamedValues,
};

/// FastUAV version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fitness assigned to a candidate whose evaluation failed.
///
/// Large enough that a failed candidate is never selected, small enough to
/// stay finite through the engine's ranking and logging.
pub const FAILURE_SENTINEL: f64 = 1.0e30;

/// Bound magnitude marking an inactive constraint component.
pub const UNBOUNDED: f64 = 1.0e30;
