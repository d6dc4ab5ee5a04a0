//! Fitness evaluation of one candidate

use super::{ConstraintPenalty, ObjectiveAggregator};
use crate::codec::VariableVectorCodec;
use crate::config::OptimizerConfig;
use crate::model::{ModelEvaluator, ModelOutputs};
use fastuav_common::{
    Candidate, Constraint, EvaluationFailure, NamedValues, Objective, SetupError,
    FAILURE_SENTINEL,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Outcome of evaluating one design vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Scalar minimized by the engine; always finite
    pub fitness: f64,
    /// Aggregated objective before penalty
    pub objective: f64,
    pub objectives: NamedValues,
    pub constraints: NamedValues,
    /// Σ violation^k
    pub violation: f64,
    pub feasible: bool,
    pub failed: bool,
}

impl Evaluation {
    /// Sentinel outcome for a failed model run
    pub fn failure() -> Self {
        Self {
            fitness: FAILURE_SENTINEL,
            objective: FAILURE_SENTINEL,
            objectives: NamedValues::new(),
            constraints: NamedValues::new(),
            violation: 0.0,
            feasible: false,
            failed: true,
        }
    }

    /// Raw model outputs, absent when the run failed
    pub fn outputs(&self) -> Option<ModelOutputs> {
        (!self.failed).then(|| ModelOutputs {
            objectives: self.objectives.clone(),
            constraints: self.constraints.clone(),
        })
    }

    /// Attach the evaluation to its design vector
    pub fn into_candidate(self, x: Vec<f64>, generation: u64) -> Candidate {
        Candidate {
            x,
            generation,
            fitness: self.fitness,
            objective: self.objective,
            objectives: self.objectives,
            constraints: self.constraints,
            violation: self.violation,
            feasible: self.feasible,
            failed: self.failed,
        }
    }
}

/// Turns a design vector into a finite scalar fitness.
///
/// Shared unchanged by the sequential and concurrent evaluation paths.
/// Never fails: every recoverable problem yields [`Evaluation::failure`].
#[derive(Clone)]
pub struct FitnessEvaluator {
    codec: Arc<VariableVectorCodec>,
    model: Arc<dyn ModelEvaluator>,
    aggregator: ObjectiveAggregator,
    penalty: ConstraintPenalty,
}

impl FitnessEvaluator {
    pub fn new(
        codec: Arc<VariableVectorCodec>,
        model: Arc<dyn ModelEvaluator>,
        objectives: &[Objective],
        constraints: Vec<Constraint>,
        config: &OptimizerConfig,
    ) -> Result<Self, SetupError> {
        let aggregator = ObjectiveAggregator::new(
            objectives,
            &config.objectives.weights,
            config.objectives.exponent,
        )?;
        let penalty = ConstraintPenalty::new(
            constraints,
            config.penalty.parameter,
            config.penalty.exponent,
        )?;
        Ok(Self {
            codec,
            model,
            aggregator,
            penalty,
        })
    }

    /// Evaluate one design vector
    pub fn evaluate(&self, x: &[f64]) -> Evaluation {
        match self.try_evaluate(x) {
            Ok(evaluation) => evaluation,
            Err(failure) => {
                warn!(reason = %failure.reason, "Candidate evaluation failed");
                Evaluation::failure()
            }
        }
    }

    fn try_evaluate(&self, x: &[f64]) -> Result<Evaluation, EvaluationFailure> {
        let design = self
            .codec
            .decode(x)
            .map_err(|e| EvaluationFailure::new(e.to_string()))?;
        let outputs = self.model.evaluate(&design)?;

        if let Some(name) = first_non_finite(&outputs.objectives) {
            return Err(EvaluationFailure::new(format!(
                "non-finite objective output '{name}'"
            )));
        }
        let objective = self.aggregator.aggregate(&outputs.objectives)?;

        let (fitness, violation, feasible) = if self.penalty.is_enabled() {
            if let Some(name) = first_non_finite(&outputs.constraints) {
                return Err(EvaluationFailure::new(format!(
                    "non-finite constraint output '{name}'"
                )));
            }
            let report = self.penalty.assess(&outputs.constraints)?;
            (
                objective + self.penalty.penalty(&report),
                report.penalized,
                report.is_feasible(),
            )
        } else {
            // Constraints are reported only; unreadable ones count as infeasible
            match self.penalty.inspect(&outputs.constraints) {
                Some(report) => (objective, report.penalized, report.is_feasible()),
                None => (objective, 0.0, false),
            }
        };

        if !fitness.is_finite() {
            return Err(EvaluationFailure::new(format!("non-finite fitness {fitness}")));
        }

        Ok(Evaluation {
            fitness,
            objective,
            objectives: outputs.objectives,
            constraints: outputs.constraints,
            violation,
            feasible,
            failed: false,
        })
    }
}

fn first_non_finite(values: &NamedValues) -> Option<&str> {
    values
        .iter()
        .find(|(_, v)| v.iter().any(|x| !x.is_finite()))
        .map(|(name, _)| name.as_str())
}
