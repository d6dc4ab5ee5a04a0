//! # FastUAV CMA-ES
//!
//! Evolution engine interface and a native Covariance Matrix Adaptation
//! Evolution Strategy for the FastUAV optimizer.
//!
//! ## Ask / Tell
//!
//! ```text
//! configure(x0, σ0, bounds, seed)
//! loop {
//!     X = ask()            // λ candidate vectors
//!     f = evaluate(X)      // outside the engine
//!     tell(X, f)           // update mean, paths, C, σ
//!     if !stop().is_empty() { break }
//! }
//! (x*, f*) = result()
//! ```
//!
//! The driver only sees [`EvolutionEngine`]; [`CmaEs`] is one
//! implementation of it.
//!
//! ## References
//!
//! - Hansen (2016): The CMA Evolution Strategy: A Tutorial

pub mod engine;
pub mod strategy;
pub mod termination;

pub use engine::{EngineResult, EngineSettings, EvolutionEngine, StopSet};
pub use strategy::{CmaEs, CmaEsOptions};
pub use termination::StopCriterion;

/// Default tolerance on the fitness range
pub const DEFAULT_TOL_FUN: f64 = 1e-11;

/// Default tolerance on the search distribution's standard deviations
pub const DEFAULT_TOL_X: f64 = 1e-11;

/// Default limit on the covariance condition number
pub const DEFAULT_CONDITION_LIMIT: f64 = 1e14;
