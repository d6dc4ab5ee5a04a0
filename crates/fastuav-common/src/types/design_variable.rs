//! DesignVariable - named, bounded optimizer input

use crate::error::SetupError;
use serde::{Deserialize, Serialize};

/// A named design input occupying `size` contiguous slots of the flat vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignVariable {
    /// Variable name, unique within a problem
    pub name: String,
    /// Lower bound per component
    pub lower: Vec<f64>,
    /// Upper bound per component
    pub upper: Vec<f64>,
}

impl DesignVariable {
    /// Create a vector-valued variable with per-component bounds
    pub fn new(
        name: impl Into<String>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    ) -> Result<Self, SetupError> {
        let name = name.into();
        if lower.is_empty() {
            return Err(SetupError::DimensionMismatch {
                name,
                expected: 1,
                actual: 0,
            });
        }
        if lower.len() != upper.len() {
            return Err(SetupError::DimensionMismatch {
                name,
                expected: lower.len(),
                actual: upper.len(),
            });
        }
        for (index, (&lo, &up)) in lower.iter().zip(upper.iter()).enumerate() {
            if lo.is_nan() || up.is_nan() || lo > up {
                return Err(SetupError::InvalidBounds {
                    name,
                    index,
                    lower: lo,
                    upper: up,
                });
            }
        }
        Ok(Self { name, lower, upper })
    }

    /// Create a scalar variable
    pub fn scalar(name: impl Into<String>, lower: f64, upper: f64) -> Result<Self, SetupError> {
        Self::new(name, vec![lower], vec![upper])
    }

    /// Create a vector variable sharing one bound pair across all components
    pub fn uniform(
        name: impl Into<String>,
        size: usize,
        lower: f64,
        upper: f64,
    ) -> Result<Self, SetupError> {
        Self::new(name, vec![lower; size], vec![upper; size])
    }

    /// Number of components
    pub fn size(&self) -> usize {
        self.lower.len()
    }
}
