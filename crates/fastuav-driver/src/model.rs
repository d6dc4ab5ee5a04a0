//! Sizing model interface

use fastuav_common::{EvaluationFailure, NamedValues};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// Raw outputs of one model run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOutputs {
    pub objectives: NamedValues,
    pub constraints: NamedValues,
}

impl ModelOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scalar objective output
    pub fn objective(mut self, name: impl Into<String>, value: f64) -> Self {
        self.objectives.insert(name.into(), vec![value]);
        self
    }

    /// Add a scalar constraint output
    pub fn constraint(mut self, name: impl Into<String>, value: f64) -> Self {
        self.constraints.insert(name.into(), vec![value]);
        self
    }

    /// Add a vector-valued constraint output
    pub fn constraint_vec(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.constraints.insert(name.into(), values);
        self
    }
}

/// A black-box sizing model.
///
/// Implementations must be safe to call concurrently from several workers;
/// each call is independent and may block.
#[cfg_attr(test, automock)]
pub trait ModelEvaluator: Send + Sync {
    /// Run the model at one named design point
    fn evaluate(&self, design: &NamedValues) -> Result<ModelOutputs, EvaluationFailure>;
}

/// Adapts a closure into a [`ModelEvaluator`]
pub struct FnModel<F>(pub F);

impl<F> ModelEvaluator for FnModel<F>
where
    F: Fn(&NamedValues) -> Result<ModelOutputs, EvaluationFailure> + Send + Sync,
{
    fn evaluate(&self, design: &NamedValues) -> Result<ModelOutputs, EvaluationFailure> {
        (self.0)(design)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_model_delegates() {
        let model = FnModel(|design: &NamedValues| {
            let x = design["x"][0];
            Ok(ModelOutputs::new().objective("f", x * x).constraint("g", x))
        });
        let design: NamedValues = [("x".to_string(), vec![3.0])].into_iter().collect();
        let out = model.evaluate(&design).unwrap();
        assert_eq!(out.objectives["f"], vec![9.0]);
        assert_eq!(out.constraints["g"], vec![3.0]);
    }

    #[test]
    fn test_mock_failure() {
        let mut mock = MockModelEvaluator::new();
        mock.expect_evaluate()
            .returning(|_| Err(EvaluationFailure::new("solver diverged")));
        let err = mock.evaluate(&NamedValues::new()).unwrap_err();
        assert_eq!(err.reason, "solver diverged");
    }
}
