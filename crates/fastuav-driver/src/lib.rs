//! # FastUAV Driver
//!
//! Constrained derivative-free optimization of UAV sizing models.
//!
//! ## Pipeline
//!
//! ```text
//! named design ──codec──▶ x ──engine.ask──▶ population
//!                                              │
//!                  scheduler (W workers) ◀─────┘
//!                         │ model → objectives, constraints
//!                         ▼
//!             fitness = aggregate + p · Σ violation^k
//!                         │
//!        engine.tell ◀────┘ ──▶ stop exchange across ranks
//! ```
//!
//! ## Components
//!
//! - [`VariableVectorCodec`]: named design values ↔ flat bounded vector
//! - [`FitnessEvaluator`]: model outputs → finite scalar fitness
//! - [`PopulationBatchScheduler`]: population evaluation over a worker pool
//! - [`ConvergenceCoordinator`]: collective stop decision
//! - [`OptimizationLoop`]: INIT → GENERATION* → DONE

pub mod codec;
pub mod config;
pub mod convergence;
pub mod fitness;
pub mod model;
pub mod optimizer;
pub mod record;
pub mod scheduler;

pub use codec::VariableVectorCodec;
pub use config::{ObjectiveSettings, OptimizerConfig, ParallelSettings, PenaltySettings};
pub use convergence::{ConvergenceCoordinator, StopBallot, StopDecision};
pub use fitness::{Evaluation, FitnessEvaluator};
pub use model::{FnModel, ModelEvaluator, ModelOutputs};
pub use optimizer::{OptimizationLoop, OptimizationProblem, OptimizationReport};
pub use record::{
    EvaluationRecord, JsonLinesRecordSink, MemoryRecordSink, RecordSink, RecordStage,
    TracingRecordSink,
};
pub use scheduler::PopulationBatchScheduler;

/// Default initial step size
pub const DEFAULT_SIGMA0: f64 = 0.1;

/// Default penalty coefficient
pub const DEFAULT_PENALTY_PARAMETER: f64 = 10.0;

/// Default generations between progress lines
pub const DEFAULT_DISPLAY_INTERVAL: u64 = 20;
