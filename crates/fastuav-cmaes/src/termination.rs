//! Stopping criteria names

use std::fmt;

/// Stopping criteria reported by [`crate::CmaEs`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StopCriterion {
    /// Generation budget reached
    MaxIter,
    /// Evaluation budget reached
    MaxFevals,
    /// Target fitness reached
    FTarget,
    /// Fitness range over recent generations below tolerance
    TolFun,
    /// Search distribution collapsed below tolerance
    TolX,
    /// Covariance matrix ill-conditioned
    ConditionCov,
}

impl StopCriterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopCriterion::MaxIter => "maxiter",
            StopCriterion::MaxFevals => "maxfevals",
            StopCriterion::FTarget => "ftarget",
            StopCriterion::TolFun => "tolfun",
            StopCriterion::TolX => "tolx",
            StopCriterion::ConditionCov => "conditioncov",
        }
    }
}

impl fmt::Display for StopCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
