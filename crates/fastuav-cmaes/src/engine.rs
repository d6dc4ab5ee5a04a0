//! Evolution engine interface

use fastuav_common::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Names of the stopping criteria an engine currently considers satisfied
pub type StopSet = BTreeSet<String>;

/// Settings applied by [`EvolutionEngine::configure`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Initial mean of the search distribution
    pub initial: Vec<f64>,
    /// Initial step size
    pub sigma0: f64,
    /// Lower box bound per component
    pub lower: Vec<f64>,
    /// Upper box bound per component
    pub upper: Vec<f64>,
    /// Random seed; replicas configured with the same seed stay in lockstep
    pub seed: u64,
}

impl EngineSettings {
    /// Check lengths, bound ordering and step size
    pub fn validate(&self) -> Result<(), EngineError> {
        let n = self.initial.len();
        if n == 0 {
            return Err(EngineError::InvalidSettings(
                "initial vector is empty".to_string(),
            ));
        }
        if self.lower.len() != n || self.upper.len() != n {
            return Err(EngineError::InvalidSettings(format!(
                "bounds have {} and {} components, initial vector has {}",
                self.lower.len(),
                self.upper.len(),
                n
            )));
        }
        if !(self.sigma0.is_finite() && self.sigma0 > 0.0) {
            return Err(EngineError::InvalidSettings(format!(
                "sigma0 must be positive and finite, got {}",
                self.sigma0
            )));
        }
        if let Some(i) = (0..n).find(|&i| self.lower[i] > self.upper[i]) {
            return Err(EngineError::InvalidSettings(format!(
                "lower bound {} exceeds upper bound {} at index {}",
                self.lower[i], self.upper[i], i
            )));
        }
        if let Some(i) = self.initial.iter().position(|v| !v.is_finite()) {
            return Err(EngineError::InvalidSettings(format!(
                "initial value at index {} is not finite",
                i
            )));
        }
        Ok(())
    }

    /// Dimension of the search space
    pub fn dimension(&self) -> usize {
        self.initial.len()
    }
}

/// Best solution seen so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    /// Best design vector
    pub best: Vec<f64>,
    /// Fitness of the best design vector
    pub fitness: f64,
    /// Number of fitness values told to the engine
    pub evaluations: u64,
    /// Number of completed generations
    pub iterations: u64,
}

/// Population-based search engine driven through ask/tell.
///
/// Implementations must be deterministic for a given seed: the optimizer
/// runs one replica per worker rank and relies on all replicas producing
/// the same candidates.
pub trait EvolutionEngine: Send {
    /// Reset the engine to the given start point, bounds and seed
    fn configure(&mut self, settings: EngineSettings) -> Result<(), EngineError>;

    /// Sample the next generation's candidate vectors
    fn ask(&mut self) -> Result<Vec<Vec<f64>>, EngineError>;

    /// Update the search state with fitness values index-aligned with `candidates`
    fn tell(&mut self, candidates: &[Vec<f64>], fitness: &[f64]) -> Result<(), EngineError>;

    /// Stopping criteria currently satisfied; empty while the search continues
    fn stop(&self) -> StopSet;

    /// Best vector and fitness found so far
    fn result(&self) -> Result<EngineResult, EngineError>;
}
