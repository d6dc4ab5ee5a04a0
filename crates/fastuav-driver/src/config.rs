//! Optimizer configuration

use anyhow::Result;
use fastuav_common::SetupError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Legacy seed variable honored for compatibility with older run scripts
pub const LEGACY_SEED_VAR: &str = "CMAESDriver_seed";

/// Derivative-free optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Initial step size of the search distribution
    pub sigma0: f64,
    /// Constraint penalty settings
    pub penalty: PenaltySettings,
    /// Multi-objective aggregation settings
    pub objectives: ObjectiveSettings,
    /// Worker pool settings
    pub parallel: ParallelSettings,
    /// Fixed seed; drawn at random when absent
    pub seed: Option<u64>,
    /// Generations between two progress lines
    pub display_interval: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            sigma0: crate::DEFAULT_SIGMA0,
            penalty: PenaltySettings::default(),
            objectives: ObjectiveSettings::default(),
            parallel: ParallelSettings::default(),
            seed: None,
            display_interval: crate::DEFAULT_DISPLAY_INTERVAL,
        }
    }
}

impl OptimizerConfig {
    /// Load configuration from `.env` and `FASTUAV_*` environment variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Some(v) = env_parse("FASTUAV_SIGMA0") {
            cfg.sigma0 = v;
        }
        if let Some(v) = env_parse("FASTUAV_DISPLAY_INTERVAL") {
            cfg.display_interval = v;
        }

        // Legacy name first, prefixed variable wins
        if let Some(v) = env_parse(LEGACY_SEED_VAR) {
            cfg.seed = Some(v);
        }
        if let Some(v) = env_parse("FASTUAV_SEED") {
            cfg.seed = Some(v);
        }

        // Penalty settings
        if let Some(v) = env_parse("FASTUAV_PENALTY_PARAMETER") {
            cfg.penalty.parameter = v;
        }
        if let Some(v) = env_parse("FASTUAV_PENALTY_EXPONENT") {
            cfg.penalty.exponent = v;
        }

        // Objective settings
        if let Ok(val) = std::env::var("FASTUAV_OBJECTIVE_WEIGHTS") {
            cfg.objectives.weights = parse_weights(&val)?;
        }
        if let Some(v) = env_parse("FASTUAV_OBJECTIVE_EXPONENT") {
            cfg.objectives.exponent = v;
        }

        // Parallel settings
        if let Ok(val) = std::env::var("FASTUAV_RUN_PARALLEL") {
            cfg.parallel.run_parallel = matches!(val.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = env_parse("FASTUAV_PROCS_PER_MODEL") {
            cfg.parallel.procs_per_model = v;
        }
        if let Some(v) = env_parse("FASTUAV_CONCURRENCY_GROUP") {
            cfg.parallel.concurrency_group = v;
        }

        Ok(cfg)
    }

    /// Reject values the optimizer cannot run with
    pub fn validate(&self) -> std::result::Result<(), SetupError> {
        if !(self.sigma0.is_finite() && self.sigma0 > 0.0) {
            return Err(SetupError::invalid("sigma0", "must be finite and positive"));
        }
        if !(self.penalty.parameter.is_finite() && self.penalty.parameter >= 0.0) {
            return Err(SetupError::invalid(
                "penalty.parameter",
                "must be finite and non-negative",
            ));
        }
        if !(self.penalty.exponent.is_finite() && self.penalty.exponent > 0.0) {
            return Err(SetupError::invalid(
                "penalty.exponent",
                "must be finite and positive",
            ));
        }
        if !(self.objectives.exponent.is_finite() && self.objectives.exponent > 0.0) {
            return Err(SetupError::invalid(
                "objectives.exponent",
                "must be finite and positive",
            ));
        }
        for (name, weight) in &self.objectives.weights {
            if !(weight.is_finite() && *weight >= 0.0) {
                return Err(SetupError::invalid(
                    &format!("objectives.weights.{name}"),
                    "must be finite and non-negative",
                ));
            }
        }
        if self.display_interval == 0 {
            return Err(SetupError::invalid("display_interval", "must be at least 1"));
        }
        self.worker_count().map(|_| ())
    }

    /// Number of concurrent model evaluations
    pub fn worker_count(&self) -> std::result::Result<usize, SetupError> {
        self.parallel.worker_count()
    }
}

/// Exterior penalty applied to constraint violations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltySettings {
    /// Penalty coefficient `p`; zero disables the penalty term
    pub parameter: f64,
    /// Exponent `k` applied to each component violation
    pub exponent: f64,
}

impl Default for PenaltySettings {
    fn default() -> Self {
        Self {
            parameter: crate::DEFAULT_PENALTY_PARAMETER,
            exponent: 1.0,
        }
    }
}

/// Aggregation of several objectives into one scalar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveSettings {
    /// Per-objective weights; empty keeps the declared weights
    pub weights: BTreeMap<String, f64>,
    /// Exponent `a` applied to the weighted mean
    pub exponent: f64,
}

impl Default for ObjectiveSettings {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            exponent: 1.0,
        }
    }
}

/// Worker pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelSettings {
    /// Evaluate candidates concurrently
    pub run_parallel: bool,
    /// Processors consumed by one model evaluation
    pub procs_per_model: usize,
    /// Processors available to the run
    pub concurrency_group: usize,
}

impl Default for ParallelSettings {
    fn default() -> Self {
        Self {
            run_parallel: false,
            procs_per_model: 1,
            concurrency_group: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl ParallelSettings {
    /// `concurrency_group / procs_per_model`, which must divide evenly
    pub fn worker_count(&self) -> std::result::Result<usize, SetupError> {
        if !self.run_parallel {
            return Ok(1);
        }
        if self.procs_per_model == 0 {
            return Err(SetupError::invalid("procs_per_model", "must be at least 1"));
        }
        if self.concurrency_group == 0 {
            return Err(SetupError::invalid(
                "concurrency_group",
                "must be at least 1",
            ));
        }
        if self.concurrency_group % self.procs_per_model != 0 {
            return Err(SetupError::UnevenWorkerPool {
                group: self.concurrency_group,
                procs_per_model: self.procs_per_model,
            });
        }
        Ok(self.concurrency_group / self.procs_per_model)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse `name=weight` pairs separated by commas
fn parse_weights(raw: &str) -> Result<BTreeMap<String, f64>> {
    let mut weights = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected name=weight, got '{pair}'"))?;
        let weight: f64 = value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid weight for '{}': {e}", name.trim()))?;
        weights.insert(name.trim().to_string(), weight);
    }
    Ok(weights)
}
