//! Objective - named model output to minimize

use serde::{Deserialize, Serialize};

/// Default relative weight of an objective
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A model output minimized by the optimizer.
///
/// Vector-valued objectives contribute the mean of their components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    /// Output name as reported by the model
    pub name: String,
    /// Number of components
    pub size: usize,
    /// Relative weight in multi-objective aggregation
    pub weight: f64,
}

impl Objective {
    /// Scalar objective with the default weight
    pub fn new(name: impl Into<String>) -> Self {
        Self::vector(name, 1)
    }

    /// Vector objective with the default weight
    pub fn vector(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            weight: DEFAULT_WEIGHT,
        }
    }

    /// Set the relative weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}
