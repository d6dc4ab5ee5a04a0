//! Strategy parameters derived from dimension and population size

/// Selection, recombination and learning-rate constants for one run
#[derive(Debug, Clone)]
pub(crate) struct StrategyParameters {
    /// Problem dimension
    pub n: usize,
    /// Population size (lambda)
    pub lambda: usize,
    /// Number of parents (mu)
    pub mu: usize,
    /// Recombination weights, positive and summing to 1
    pub weights: Vec<f64>,
    /// Variance effective selection mass
    pub mu_eff: f64,
    /// Learning rate of the step-size path
    pub c_sigma: f64,
    /// Damping for sigma
    pub d_sigma: f64,
    /// Learning rate of the covariance path
    pub c_c: f64,
    /// Rank-one learning rate
    pub c_1: f64,
    /// Rank-mu learning rate
    pub c_mu: f64,
    /// E||N(0, I)||
    pub chi_n: f64,
}

impl StrategyParameters {
    pub fn new(n: usize, lambda: Option<usize>) -> Self {
        let n_f = n as f64;
        let lambda = lambda
            .unwrap_or_else(|| 4 + (3.0 * n_f.ln()).floor() as usize)
            .max(2);
        let mu = (lambda / 2).max(1);

        // Recombination weights (log-linear)
        let raw: Vec<f64> = (0..mu)
            .map(|i| ((lambda as f64 + 1.0) / 2.0).ln() - ((i + 1) as f64).ln())
            .collect();
        let sum: f64 = raw.iter().sum();
        let weights: Vec<f64> = if sum > 0.0 {
            raw.iter().map(|w| w / sum).collect()
        } else {
            vec![1.0 / mu as f64; mu]
        };
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_sigma = (mu_eff + 2.0) / (n_f + mu_eff + 5.0);
        let d_sigma =
            1.0 + 2.0 * (((mu_eff - 1.0) / (n_f + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let c_c = (4.0 + mu_eff / n_f) / (n_f + 4.0 + 2.0 * mu_eff / n_f);
        let c_1 = 2.0 / ((n_f + 1.3).powi(2) + mu_eff);
        let c_mu = (2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((n_f + 2.0).powi(2) + mu_eff))
            .min(1.0 - c_1)
            .max(0.0);
        let chi_n = n_f.sqrt() * (1.0 - 1.0 / (4.0 * n_f) + 1.0 / (21.0 * n_f * n_f));

        Self {
            n,
            lambda,
            mu,
            weights,
            mu_eff,
            c_sigma,
            d_sigma,
            c_c,
            c_1,
            c_mu,
            chi_n,
        }
    }

    /// Evaluations between two eigendecompositions of C
    pub fn lazy_gap(&self) -> f64 {
        self.lambda as f64 / (self.c_1 + self.c_mu) / self.n as f64 / 10.0
    }

    /// Default generation budget: `100 + 150 (n + 3)² / √λ`
    pub fn default_max_iterations(&self) -> u64 {
        let n_f = self.n as f64;
        (100.0 + 150.0 * (n_f + 3.0).powi(2) / (self.lambda as f64).sqrt()).round() as u64
    }

    /// Generations of best-fitness history inspected by `tolfun`
    pub fn history_length(&self) -> usize {
        10 + (30.0 * self.n as f64 / self.lambda as f64).ceil() as usize
    }
}
