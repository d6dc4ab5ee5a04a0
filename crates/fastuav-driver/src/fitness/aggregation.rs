//! Weighted multi-objective aggregation

use fastuav_common::{EvaluationFailure, NamedValues, Objective, SetupError};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
struct WeightedObjective {
    name: String,
    size: usize,
    weight: f64,
}

/// Collapses the declared objectives into one scalar
#[derive(Debug, Clone)]
pub struct ObjectiveAggregator {
    terms: Vec<WeightedObjective>,
    exponent: f64,
    identity: bool,
}

impl ObjectiveAggregator {
    /// Resolve weights and validate the declaration.
    ///
    /// A non-empty `overrides` map replaces every declared weight and must
    /// name exactly the declared objectives.
    pub fn new(
        objectives: &[Objective],
        overrides: &BTreeMap<String, f64>,
        exponent: f64,
    ) -> Result<Self, SetupError> {
        if objectives.is_empty() {
            return Err(SetupError::NoObjective);
        }

        let mut seen = HashSet::new();
        for obj in objectives {
            if !seen.insert(obj.name.as_str()) {
                return Err(SetupError::DuplicateName(obj.name.clone()));
            }
            if obj.size == 0 {
                return Err(SetupError::invalid(&obj.name, "objective size must be at least 1"));
            }
        }
        if let Some(unknown) = overrides.keys().find(|k| !seen.contains(k.as_str())) {
            return Err(SetupError::UnknownObjectiveWeight(unknown.clone()));
        }

        let mut weights = Vec::with_capacity(objectives.len());
        for obj in objectives {
            let weight = if overrides.is_empty() {
                obj.weight
            } else {
                *overrides
                    .get(&obj.name)
                    .ok_or_else(|| SetupError::MissingObjectiveWeight(obj.name.clone()))?
            };
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(SetupError::invalid(
                    &obj.name,
                    "objective weight must be finite and non-negative",
                ));
            }
            weights.push(weight);
        }

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(SetupError::invalid(
                "objectives.weights",
                "total weight must be positive",
            ));
        }

        let terms = objectives
            .iter()
            .zip(weights)
            .map(|(obj, w)| WeightedObjective {
                name: obj.name.clone(),
                size: obj.size,
                weight: w / total,
            })
            .collect();

        Ok(Self {
            terms,
            exponent,
            identity: objectives.len() == 1 && objectives[0].size == 1,
        })
    }

    /// Normalized weight of an objective
    pub fn weight(&self, name: &str) -> Option<f64> {
        self.terms.iter().find(|t| t.name == name).map(|t| t.weight)
    }

    /// Aggregate the objective outputs of one model run
    pub fn aggregate(&self, outputs: &NamedValues) -> Result<f64, EvaluationFailure> {
        let mut weighted = 0.0;
        for term in &self.terms {
            let values = outputs.get(&term.name).ok_or_else(|| {
                EvaluationFailure::new(format!("missing objective output '{}'", term.name))
            })?;
            if values.len() != term.size {
                return Err(EvaluationFailure::new(format!(
                    "objective '{}' has {} components, expected {}",
                    term.name,
                    values.len(),
                    term.size
                )));
            }
            if self.identity {
                return Ok(values[0]);
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            weighted += term.weight * mean;
        }
        Ok(weighted.powf(self.exponent))
    }
}
