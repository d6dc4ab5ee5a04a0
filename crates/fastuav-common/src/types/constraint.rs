//! Constraint - bound on a named model output
//!
//! All kinds share the `g ≤ 0 is feasible` convention once converted to a
//! violation: the violation is zero when satisfied and grows with the
//! distance to the bound otherwise.

use crate::UNBOUNDED;
use serde::{Deserialize, Serialize};

/// Which side of the bound is feasible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// value ≥ bound
    Lower,
    /// value ≤ bound
    Upper,
    /// value = bound
    Equals,
}

/// Bound on a model output, one bound per component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Output name as reported by the model
    pub name: String,
    /// Constraint kind
    pub kind: ConstraintKind,
    /// Bound per component; `±UNBOUNDED` disables a component
    pub bound: Vec<f64>,
}

impl Constraint {
    pub fn new(name: impl Into<String>, kind: ConstraintKind, bound: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind,
            bound,
        }
    }

    /// Scalar `value ≥ bound`
    pub fn lower(name: impl Into<String>, bound: f64) -> Self {
        Self::new(name, ConstraintKind::Lower, vec![bound])
    }

    /// Scalar `value ≤ bound`
    pub fn upper(name: impl Into<String>, bound: f64) -> Self {
        Self::new(name, ConstraintKind::Upper, vec![bound])
    }

    /// Scalar `value = target`
    pub fn equals(name: impl Into<String>, target: f64) -> Self {
        Self::new(name, ConstraintKind::Equals, vec![target])
    }

    /// Number of components
    pub fn size(&self) -> usize {
        self.bound.len()
    }

    /// Whether component `index` takes part in the penalty
    pub fn is_active(&self, index: usize) -> bool {
        self.bound
            .get(index)
            .map(|b| b.abs() < UNBOUNDED)
            .unwrap_or(false)
    }

    /// Violation of one component, zero when satisfied or inactive
    pub fn component_violation(&self, index: usize, value: f64) -> f64 {
        if !self.is_active(index) {
            return 0.0;
        }
        let bound = self.bound[index];
        match self.kind {
            ConstraintKind::Lower => (bound - value).max(0.0),
            ConstraintKind::Upper => (value - bound).max(0.0),
            ConstraintKind::Equals => (value - bound).abs(),
        }
    }
}
