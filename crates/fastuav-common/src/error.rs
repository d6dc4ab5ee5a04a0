//! Error types for the FastUAV optimizer
//!
//! Three categories with different propagation rules:
//! setup errors fail fast, evaluation failures are absorbed into data,
//! engine errors abort an in-progress run.

use thiserror::Error;

/// Result type alias using SizingError
pub type Result<T> = std::result::Result<T, SizingError>;

/// Unified error type for optimizer operations
#[derive(Debug, Error)]
pub enum SizingError {
    // Configuration-time errors
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    // Evolution engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // Record sink errors
    #[error("Record error: {0}")]
    Record(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fatal errors detected before any generation runs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    #[error("Dimension mismatch for {name}: expected {expected}, got {actual}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown design variable: {0}")]
    UnknownVariable(String),

    #[error("Missing value for design variable: {0}")]
    MissingVariable(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("No design variable declared")]
    NoDesignVariable,

    #[error("No objective declared")]
    NoObjective,

    #[error("Invalid bounds for {name}[{index}]: lower {lower} > upper {upper}")]
    InvalidBounds {
        name: String,
        index: usize,
        lower: f64,
        upper: f64,
    },

    #[error("Objective weight names no declared objective: {0}")]
    UnknownObjectiveWeight(String),

    #[error("No weight given for objective: {0}")]
    MissingObjectiveWeight(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(
        "Concurrency group of {group} is not evenly divisible by {procs_per_model} processors per model"
    )]
    UnevenWorkerPool { group: usize, procs_per_model: usize },
}

impl SetupError {
    /// Shorthand for an invalid configuration parameter
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        SetupError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by an evolution engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Engine used before configure()")]
    NotConfigured,

    #[error("Invalid engine settings: {0}")]
    InvalidSettings(String),

    #[error("Population size mismatch: expected {expected}, got {actual}")]
    PopulationMismatch { expected: usize, actual: usize },

    #[error("Candidate {index} has dimension {actual}, expected {expected}")]
    CandidateDimension {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite fitness for candidate {index}: {value}")]
    NonFiniteFitness { index: usize, value: f64 },

    #[error("Numerical failure: {0}")]
    Numerical(String),
}

/// Recoverable failure raised by a model evaluation.
///
/// Never escapes the fitness evaluator: the candidate gets the failure
/// sentinel instead.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Model evaluation failed: {reason}")]
pub struct EvaluationFailure {
    pub reason: String,
}

impl EvaluationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

// Implement From for common external error types
impl From<serde_json::Error> for SizingError {
    fn from(err: serde_json::Error) -> Self {
        SizingError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SizingError {
    fn from(err: std::io::Error) -> Self {
        SizingError::Record(err.to_string())
    }
}

impl From<anyhow::Error> for SizingError {
    fn from(err: anyhow::Error) -> Self {
        SizingError::Internal(err.to_string())
    }
}
