//! Candidate and Population - one generation's designs and results

use super::NamedValues;
use crate::FAILURE_SENTINEL;
use serde::{Deserialize, Serialize};

/// One design vector sampled in a generation, with its evaluation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Flat design vector
    pub x: Vec<f64>,
    /// Generation that sampled this candidate (1-based)
    pub generation: u64,
    /// Scalar minimized by the engine: objective + penalty
    pub fitness: f64,
    /// Aggregated objective before the penalty
    pub objective: f64,
    /// Raw objective outputs of the model
    pub objectives: NamedValues,
    /// Raw constraint outputs of the model
    pub constraints: NamedValues,
    /// Σ violation^k over all active constraint components
    pub violation: f64,
    /// Evaluation succeeded and no constraint is violated
    pub feasible: bool,
    /// Evaluation failed and fitness is the sentinel
    pub failed: bool,
}

impl Candidate {
    /// A freshly sampled, not yet evaluated candidate
    pub fn new(x: Vec<f64>, generation: u64) -> Self {
        Self {
            x,
            generation,
            fitness: FAILURE_SENTINEL,
            objective: FAILURE_SENTINEL,
            objectives: NamedValues::new(),
            constraints: NamedValues::new(),
            violation: 0.0,
            feasible: false,
            failed: false,
        }
    }
}

/// All candidates of exactly one generation, in engine order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub generation: u64,
    pub candidates: Vec<Candidate>,
}

impl Population {
    pub fn new(generation: u64, candidates: Vec<Candidate>) -> Self {
        Self {
            generation,
            candidates,
        }
    }

    /// Fitness values, index-aligned with the candidates
    pub fn fitness(&self) -> Vec<f64> {
        self.candidates.iter().map(|c| c.fitness).collect()
    }

    /// Candidate with the lowest fitness
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates
            .iter()
            .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    /// Number of candidates whose evaluation failed
    pub fn failed_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.failed).count()
    }

    /// Number of feasible candidates
    pub fn feasible_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.feasible).count()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
