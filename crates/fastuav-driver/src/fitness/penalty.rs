//! Exterior penalty on constraint violations

use fastuav_common::{Constraint, EvaluationFailure, NamedValues, SetupError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Violation of one model run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationReport {
    /// Σ violation^k over active components
    pub penalized: f64,
    /// Σ violation over active components
    pub raw: f64,
}

impl ViolationReport {
    pub fn is_feasible(&self) -> bool {
        self.raw == 0.0
    }
}

/// `p · Σ violation^k` over every active constraint component
#[derive(Debug, Clone)]
pub struct ConstraintPenalty {
    constraints: Vec<Constraint>,
    parameter: f64,
    exponent: f64,
}

impl ConstraintPenalty {
    pub fn new(
        constraints: Vec<Constraint>,
        parameter: f64,
        exponent: f64,
    ) -> Result<Self, SetupError> {
        let mut seen = HashSet::new();
        for c in &constraints {
            if !seen.insert(c.name.as_str()) {
                return Err(SetupError::DuplicateName(c.name.clone()));
            }
            if c.size() == 0 || c.bound.iter().any(|b| b.is_nan()) {
                return Err(SetupError::invalid(
                    &c.name,
                    "constraint needs at least one non-NaN bound",
                ));
            }
        }
        Ok(Self {
            constraints,
            parameter,
            exponent,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.parameter > 0.0
    }

    /// Measure the violation of one model run
    pub fn assess(&self, outputs: &NamedValues) -> Result<ViolationReport, EvaluationFailure> {
        let mut report = ViolationReport::default();
        for constraint in &self.constraints {
            let values = outputs.get(&constraint.name).ok_or_else(|| {
                EvaluationFailure::new(format!("missing constraint output '{}'", constraint.name))
            })?;
            if values.len() != constraint.size() {
                return Err(EvaluationFailure::new(format!(
                    "constraint '{}' has {} components, expected {}",
                    constraint.name,
                    values.len(),
                    constraint.size()
                )));
            }
            for (i, value) in values.iter().enumerate() {
                let v = constraint.component_violation(i, *value);
                report.raw += v;
                report.penalized += v.powf(self.exponent);
            }
        }
        Ok(report)
    }

    /// Best-effort [`assess`](Self::assess) for reporting only.
    ///
    /// `None` when a constraint output is missing, mis-sized or non-finite.
    pub fn inspect(&self, outputs: &NamedValues) -> Option<ViolationReport> {
        let readable = self.constraints.iter().all(|c| {
            outputs
                .get(&c.name)
                .is_some_and(|values| values.iter().all(|v| v.is_finite()))
        });
        if readable {
            self.assess(outputs).ok()
        } else {
            None
        }
    }

    /// Penalty term added to the aggregated objective
    pub fn penalty(&self, report: &ViolationReport) -> f64 {
        if self.is_enabled() {
            self.parameter * report.penalized
        } else {
            0.0
        }
    }
}
