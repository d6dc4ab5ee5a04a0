//! CMA-ES: Covariance Matrix Adaptation Evolution Strategy
//!
//! Full-covariance (μ/μ_w, λ)-CMA-ES with cumulative step-size adaptation.
//! Candidates are clamped into the box bounds when sampled and the update
//! learns from the clamped vectors handed back to `tell`.
//!
//! # Example
//!
//! ```
//! use fastuav_cmaes::{CmaEs, EngineSettings, EvolutionEngine};
//!
//! let mut cma = CmaEs::default();
//! cma.configure(EngineSettings {
//!     initial: vec![3.0; 4],
//!     sigma0: 1.0,
//!     lower: vec![-10.0; 4],
//!     upper: vec![10.0; 4],
//!     seed: 42,
//! })
//! .unwrap();
//!
//! while cma.stop().is_empty() {
//!     let candidates = cma.ask().unwrap();
//!     let fitness: Vec<f64> = candidates
//!         .iter()
//!         .map(|x| x.iter().map(|xi| xi * xi).sum())
//!         .collect();
//!     cma.tell(&candidates, &fitness).unwrap();
//! }
//! assert!(cma.result().unwrap().fitness < 1e-8);
//! ```

use super::covariance::Covariance;
use super::parameters::StrategyParameters;
use crate::engine::{EngineResult, EngineSettings, EvolutionEngine, StopSet};
use crate::termination::StopCriterion;
use crate::{DEFAULT_CONDITION_LIMIT, DEFAULT_TOL_FUN, DEFAULT_TOL_X};
use fastuav_common::EngineError;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// CMA-ES options independent of the problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmaEsOptions {
    /// Population size; `4 + ⌊3 ln n⌋` when unset
    pub population_size: Option<usize>,
    /// Generation budget; `100 + 150 (n + 3)² / √λ` when unset
    pub max_iterations: Option<u64>,
    /// Evaluation budget
    pub max_evaluations: Option<u64>,
    /// Stop once the best fitness is at or below this value
    pub target_fitness: Option<f64>,
    /// Tolerance on the fitness range
    pub tol_fun: f64,
    /// Tolerance on the distribution's standard deviations
    pub tol_x: f64,
    /// Limit on the covariance condition number
    pub condition_limit: f64,
}

impl Default for CmaEsOptions {
    fn default() -> Self {
        Self {
            population_size: None,
            max_iterations: None,
            max_evaluations: None,
            target_fitness: None,
            tol_fun: DEFAULT_TOL_FUN,
            tol_x: DEFAULT_TOL_X,
            condition_limit: DEFAULT_CONDITION_LIMIT,
        }
    }
}

/// Search state, present once configured
#[derive(Debug, Clone)]
struct SearchState {
    params: StrategyParameters,
    lower: Vec<f64>,
    upper: Vec<f64>,
    rng: StdRng,
    mean: DVector<f64>,
    sigma: f64,
    p_sigma: DVector<f64>,
    p_c: DVector<f64>,
    cov: Covariance,
    generation: u64,
    evaluations: u64,
    eigen_evaluations: u64,
    max_iterations: u64,
    /// Sorted fitness of the last told generation
    last_fitness: Vec<f64>,
    /// Best fitness of recent generations
    best_history: VecDeque<f64>,
    best: Option<(Vec<f64>, f64)>,
}

/// CMA-ES optimizer
#[derive(Debug, Clone, Default)]
pub struct CmaEs {
    options: CmaEsOptions,
    state: Option<SearchState>,
}

impl CmaEs {
    /// Create with the given options; call `configure` before `ask`
    pub fn new(options: CmaEsOptions) -> Self {
        Self {
            options,
            state: None,
        }
    }

    /// Population size, known once configured
    pub fn population_size(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.params.lambda)
    }

    /// Current step size, known once configured
    pub fn sigma(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma)
    }

    /// Current mean of the search distribution
    pub fn mean(&self) -> Option<Vec<f64>> {
        self.state.as_ref().map(|s| s.mean.iter().copied().collect())
    }

    fn state_mut(&mut self) -> Result<&mut SearchState, EngineError> {
        self.state.as_mut().ok_or(EngineError::NotConfigured)
    }
}

impl SearchState {
    fn clamp(&self, x: &mut DVector<f64>) {
        for i in 0..x.len() {
            x[i] = x[i].clamp(self.lower[i], self.upper[i]);
        }
    }

    fn sample(&mut self) -> Vec<f64> {
        let n = self.params.n;
        let z = DVector::from_iterator(n, (0..n).map(|_| self.rng.sample::<f64, _>(StandardNormal)));
        let mut x = &self.mean + self.cov.transform(&z) * self.sigma;
        self.clamp(&mut x);
        x.iter().copied().collect()
    }

    fn validate_generation(
        &self,
        candidates: &[Vec<f64>],
        fitness: &[f64],
    ) -> Result<(), EngineError> {
        let lambda = self.params.lambda;
        if candidates.len() != lambda {
            return Err(EngineError::PopulationMismatch {
                expected: lambda,
                actual: candidates.len(),
            });
        }
        if fitness.len() != lambda {
            return Err(EngineError::PopulationMismatch {
                expected: lambda,
                actual: fitness.len(),
            });
        }
        if let Some((index, x)) = candidates
            .iter()
            .enumerate()
            .find(|(_, x)| x.len() != self.params.n)
        {
            return Err(EngineError::CandidateDimension {
                index,
                expected: self.params.n,
                actual: x.len(),
            });
        }
        if let Some((index, &value)) = fitness.iter().enumerate().find(|(_, f)| !f.is_finite()) {
            return Err(EngineError::NonFiniteFitness { index, value });
        }
        Ok(())
    }

    #[allow(clippy::needless_range_loop)]
    fn update(&mut self, candidates: &[Vec<f64>], fitness: &[f64]) -> Result<(), EngineError> {
        let params = self.params.clone();
        let n = params.n;

        // Sort by fitness (minimization); ties keep sampling order
        let mut order: Vec<usize> = (0..fitness.len()).collect();
        order.sort_by(|&a, &b| fitness[a].total_cmp(&fitness[b]));

        self.generation += 1;
        self.evaluations += fitness.len() as u64;

        let best_index = order[0];
        let gen_best = fitness[best_index];
        if self.best.as_ref().map_or(true, |(_, f)| gen_best < *f) {
            self.best = Some((candidates[best_index].clone(), gen_best));
        }
        self.last_fitness = order.iter().map(|&i| fitness[i]).collect();
        self.best_history.push_back(gen_best);
        while self.best_history.len() > params.history_length() {
            self.best_history.pop_front();
        }

        // Update mean
        let old_mean = self.mean.clone();
        let mut mean = DVector::zeros(n);
        for (rank, &idx) in order.iter().take(params.mu).enumerate() {
            mean += DVector::from_column_slice(&candidates[idx]) * params.weights[rank];
        }
        self.mean = mean;

        // Evolution paths
        let y_w = (&self.mean - &old_mean) / self.sigma;
        let z_w = self.cov.whiten(&y_w);
        self.p_sigma = &self.p_sigma * (1.0 - params.c_sigma)
            + z_w * (params.c_sigma * (2.0 - params.c_sigma) * params.mu_eff).sqrt();

        let p_sigma_norm = self.p_sigma.norm();
        let decay = 1.0 - (1.0 - params.c_sigma).powf(2.0 * self.generation as f64);
        let h_sigma = if p_sigma_norm / decay.sqrt() / params.chi_n < 1.4 + 2.0 / (n as f64 + 1.0)
        {
            1.0
        } else {
            0.0
        };

        self.p_c = &self.p_c * (1.0 - params.c_c)
            + &y_w * (h_sigma * (params.c_c * (2.0 - params.c_c) * params.mu_eff).sqrt());

        // Covariance update
        let steps: Vec<(f64, DVector<f64>)> = order
            .iter()
            .take(params.mu)
            .enumerate()
            .map(|(rank, &idx)| {
                let y = (DVector::from_column_slice(&candidates[idx]) - &old_mean) / self.sigma;
                (params.weights[rank], y)
            })
            .collect();
        let delta_h = (1.0 - h_sigma) * params.c_c * (2.0 - params.c_c);
        let c_decay = 1.0 - params.c_1 - params.c_mu + params.c_1 * delta_h;
        self.cov
            .adapt(c_decay, params.c_1, &self.p_c, params.c_mu, &steps);

        // Step-size update
        let exponent = (params.c_sigma / params.d_sigma) * (p_sigma_norm / params.chi_n - 1.0);
        self.sigma *= exponent.min(1.0).exp();
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(EngineError::Numerical(format!(
                "step size degenerated to {}",
                self.sigma
            )));
        }

        if (self.evaluations - self.eigen_evaluations) as f64 >= params.lazy_gap() {
            self.cov.update_eigensystem()?;
            self.eigen_evaluations = self.evaluations;
        }

        trace!(
            generation = self.generation,
            sigma = self.sigma,
            best = gen_best,
            "CMA-ES state updated"
        );
        Ok(())
    }

    fn stop_criteria(&self, options: &CmaEsOptions) -> Vec<StopCriterion> {
        let mut reasons = Vec::new();
        if self.generation == 0 {
            return reasons;
        }
        if self.generation >= self.max_iterations {
            reasons.push(StopCriterion::MaxIter);
        }
        if let Some(max) = options.max_evaluations {
            if self.evaluations >= max {
                reasons.push(StopCriterion::MaxFevals);
            }
        }
        if let (Some(target), Some((_, best))) = (options.target_fitness, self.best.as_ref()) {
            if *best <= target {
                reasons.push(StopCriterion::FTarget);
            }
        }
        if self.best_history.len() >= self.params.history_length() {
            let (lo, hi) = self
                .best_history
                .iter()
                .chain(self.last_fitness.iter())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| {
                    (lo.min(f), hi.max(f))
                });
            if hi - lo < options.tol_fun {
                reasons.push(StopCriterion::TolFun);
            }
        }
        let max_path = self.p_c.amax();
        let max_std = self.cov.diagonal().map(|c| c.max(0.0).sqrt()).max();
        if self.sigma * max_path.max(max_std) < options.tol_x {
            reasons.push(StopCriterion::TolX);
        }
        if self.cov.condition_number() > options.condition_limit {
            reasons.push(StopCriterion::ConditionCov);
        }
        reasons
    }
}

impl EvolutionEngine for CmaEs {
    fn configure(&mut self, settings: EngineSettings) -> Result<(), EngineError> {
        settings.validate()?;
        let n = settings.dimension();
        let params = StrategyParameters::new(n, self.options.population_size);
        let max_iterations = self
            .options
            .max_iterations
            .unwrap_or_else(|| params.default_max_iterations());

        debug!(
            dimension = n,
            lambda = params.lambda,
            mu = params.mu,
            sigma0 = settings.sigma0,
            seed = settings.seed,
            max_iterations,
            "CMA-ES configured"
        );

        self.state = Some(SearchState {
            lower: settings.lower,
            upper: settings.upper,
            rng: StdRng::seed_from_u64(settings.seed),
            mean: DVector::from_vec(settings.initial),
            sigma: settings.sigma0,
            p_sigma: DVector::zeros(n),
            p_c: DVector::zeros(n),
            cov: Covariance::identity(n),
            generation: 0,
            evaluations: 0,
            eigen_evaluations: 0,
            max_iterations,
            last_fitness: Vec::new(),
            best_history: VecDeque::new(),
            best: None,
            params,
        });
        Ok(())
    }

    fn ask(&mut self) -> Result<Vec<Vec<f64>>, EngineError> {
        let state = self.state_mut()?;
        let lambda = state.params.lambda;
        Ok((0..lambda).map(|_| state.sample()).collect())
    }

    fn tell(&mut self, candidates: &[Vec<f64>], fitness: &[f64]) -> Result<(), EngineError> {
        let state = self.state_mut()?;
        state.validate_generation(candidates, fitness)?;
        state.update(candidates, fitness)
    }

    fn stop(&self) -> StopSet {
        match &self.state {
            Some(state) => state
                .stop_criteria(&self.options)
                .into_iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            None => StopSet::new(),
        }
    }

    fn result(&self) -> Result<EngineResult, EngineError> {
        let state = self.state.as_ref().ok_or(EngineError::NotConfigured)?;
        let (best, fitness) = match &state.best {
            Some((x, f)) => (x.clone(), *f),
            None => (state.mean.iter().copied().collect(), f64::INFINITY),
        };
        Ok(EngineResult {
            best,
            fitness,
            evaluations: state.evaluations,
            iterations: state.generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(n: usize, x0: f64, seed: u64) -> EngineSettings {
        EngineSettings {
            initial: vec![x0; n],
            sigma0: 1.0,
            lower: vec![-10.0; n],
            upper: vec![10.0; n],
            seed,
        }
    }

    fn run<F: Fn(&[f64]) -> f64>(cma: &mut CmaEs, objective: F) -> StopSet {
        loop {
            let candidates = cma.ask().unwrap();
            let fitness: Vec<f64> = candidates.iter().map(|x| objective(x)).collect();
            cma.tell(&candidates, &fitness).unwrap();
            let stop = cma.stop();
            if !stop.is_empty() {
                return stop;
            }
        }
    }

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|xi| xi * xi).sum()
    }

    fn rosenbrock(x: &[f64]) -> f64 {
        x.windows(2)
            .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
            .sum()
    }

    #[test]
    fn test_requires_configure() {
        let mut cma = CmaEs::default();
        assert_eq!(cma.ask().unwrap_err(), EngineError::NotConfigured);
        assert!(cma.result().is_err());
        assert!(cma.stop().is_empty());
    }

    #[test]
    fn test_sphere_converges() {
        let mut cma = CmaEs::default();
        cma.configure(settings(5, 3.0, 42)).unwrap();
        let stop = run(&mut cma, sphere);

        let result = cma.result().unwrap();
        assert!(result.fitness < 1e-8, "fitness {}", result.fitness);
        assert!(!stop.contains("maxiter"));
        assert_eq!(result.evaluations, result.iterations * 8);
    }

    #[test]
    fn test_rosenbrock_2d_converges() {
        let mut cma = CmaEs::default();
        cma.configure(settings(2, -1.0, 3)).unwrap();
        run(&mut cma, rosenbrock);

        let result = cma.result().unwrap();
        assert!(result.fitness < 1e-6, "fitness {}", result.fitness);
        assert!((result.best[0] - 1.0).abs() < 1e-2);
        assert!((result.best[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_same_seed_same_candidates() {
        let mut a = CmaEs::default();
        let mut b = CmaEs::default();
        a.configure(settings(3, 1.0, 11)).unwrap();
        b.configure(settings(3, 1.0, 11)).unwrap();

        for _ in 0..5 {
            let xa = a.ask().unwrap();
            let xb = b.ask().unwrap();
            assert_eq!(xa, xb);
            let f: Vec<f64> = xa.iter().map(|x| sphere(x)).collect();
            a.tell(&xa, &f).unwrap();
            b.tell(&xb, &f).unwrap();
        }
        assert_eq!(a.sigma(), b.sigma());
        assert_eq!(a.mean(), b.mean());
    }

    #[test]
    fn test_population_size() {
        let mut cma = CmaEs::default();
        assert_eq!(cma.population_size(), None);
        cma.configure(settings(5, 1.0, 2)).unwrap();
        assert_eq!(cma.population_size(), Some(8));
        assert_eq!(cma.ask().unwrap().len(), 8);

        let mut cma = CmaEs::new(CmaEsOptions {
            population_size: Some(12),
            ..Default::default()
        });
        cma.configure(settings(5, 1.0, 2)).unwrap();
        assert_eq!(cma.population_size(), Some(12));
        assert_eq!(cma.ask().unwrap().len(), 12);
    }

    #[test]
    fn test_candidates_clamped_to_bounds() {
        let mut cma = CmaEs::default();
        cma.configure(EngineSettings {
            initial: vec![0.9, 0.9],
            sigma0: 5.0,
            lower: vec![0.0, 0.0],
            upper: vec![1.0, 1.0],
            seed: 5,
        })
        .unwrap();

        for x in cma.ask().unwrap() {
            assert!(x.iter().all(|&xi| (0.0..=1.0).contains(&xi)));
        }
    }

    #[test]
    fn test_tell_rejects_bad_generation() {
        let mut cma = CmaEs::default();
        cma.configure(settings(2, 0.0, 1)).unwrap();
        let candidates = cma.ask().unwrap();

        let short = cma.tell(&candidates[1..], &[1.0; 5]).unwrap_err();
        assert!(matches!(short, EngineError::PopulationMismatch { expected: 6, .. }));

        let mut fitness = vec![1.0; 6];
        fitness[2] = f64::NAN;
        let nan = cma.tell(&candidates, &fitness).unwrap_err();
        assert!(matches!(nan, EngineError::NonFiniteFitness { index: 2, .. }));

        let mut wrong_dim = candidates.clone();
        wrong_dim[4].push(0.0);
        let dim = cma.tell(&wrong_dim, &[1.0; 6]).unwrap_err();
        assert!(matches!(dim, EngineError::CandidateDimension { index: 4, .. }));
    }

    #[test]
    fn test_max_iterations_and_target() {
        let mut cma = CmaEs::new(CmaEsOptions {
            max_iterations: Some(3),
            ..CmaEsOptions::default()
        });
        cma.configure(settings(2, 3.0, 9)).unwrap();
        let stop = run(&mut cma, sphere);
        assert!(stop.contains("maxiter"));
        assert_eq!(cma.result().unwrap().iterations, 3);

        let mut cma = CmaEs::new(CmaEsOptions {
            target_fitness: Some(1e30),
            ..CmaEsOptions::default()
        });
        cma.configure(settings(2, 3.0, 9)).unwrap();
        let stop = run(&mut cma, sphere);
        assert!(stop.contains("ftarget"));
        assert_eq!(cma.result().unwrap().iterations, 1);
    }

    #[test]
    fn test_constant_fitness_stops_on_tolfun() {
        let mut cma = CmaEs::default();
        cma.configure(settings(2, 0.0, 2)).unwrap();
        let stop = run(&mut cma, |_| 1.0e30);
        assert!(stop.contains("tolfun"));
    }

    proptest::proptest! {
        #[test]
        fn ask_stays_inside_bounds(
            seed in proptest::prelude::any::<u64>(),
            sigma0 in 0.01..50.0f64,
            x0 in -1.0..1.0f64,
        ) {
            let mut cma = CmaEs::default();
            cma.configure(EngineSettings {
                initial: vec![x0; 3],
                sigma0,
                lower: vec![-1.0; 3],
                upper: vec![1.0; 3],
                seed,
            })
            .unwrap();
            for _ in 0..3 {
                let candidates = cma.ask().unwrap();
                proptest::prop_assert!(candidates
                    .iter()
                    .flatten()
                    .all(|&xi| (-1.0..=1.0).contains(&xi)));
                let fitness: Vec<f64> = candidates.iter().map(|x| sphere(x)).collect();
                cma.tell(&candidates, &fitness).unwrap();
            }
        }
    }
}
