//! Full covariance matrix with a cached eigendecomposition
//!
//! `C = B · diag(d²) · Bᵀ`. Sampling uses `B · (d ⊙ z)`, the step-size path
//! uses `C^{-1/2} = B · diag(1/d) · Bᵀ`.

use fastuav_common::EngineError;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Smallest eigenvalue kept when C loses positive definiteness numerically
const MIN_EIGENVALUE: f64 = 1e-20;

#[derive(Debug, Clone)]
pub(crate) struct Covariance {
    c: DMatrix<f64>,
    b: DMatrix<f64>,
    d: DVector<f64>,
    inv_sqrt: DMatrix<f64>,
}

impl Covariance {
    pub fn identity(n: usize) -> Self {
        Self {
            c: DMatrix::identity(n, n),
            b: DMatrix::identity(n, n),
            d: DVector::from_element(n, 1.0),
            inv_sqrt: DMatrix::identity(n, n),
        }
    }

    /// Recompute B, d and C^{-1/2} from the current C
    pub fn update_eigensystem(&mut self) -> Result<(), EngineError> {
        // Enforce symmetry
        let symmetric = (&self.c + self.c.transpose()) * 0.5;
        if symmetric.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::Numerical(
                "covariance matrix has non-finite entries".to_string(),
            ));
        }
        self.c = symmetric;

        let eigen = SymmetricEigen::new(self.c.clone());
        self.d = eigen.eigenvalues.map(|ev| ev.max(MIN_EIGENVALUE).sqrt());
        self.b = eigen.eigenvectors;

        let inv_d = DMatrix::from_diagonal(&self.d.map(|d| 1.0 / d));
        self.inv_sqrt = &self.b * inv_d * self.b.transpose();
        Ok(())
    }

    /// Map a standard normal vector to N(0, C)
    pub fn transform(&self, z: &DVector<f64>) -> DVector<f64> {
        &self.b * self.d.component_mul(z)
    }

    /// C^{-1/2} · y
    pub fn whiten(&self, y: &DVector<f64>) -> DVector<f64> {
        &self.inv_sqrt * y
    }

    /// Rank-one plus rank-mu update.
    ///
    /// `C ← decay · C + c_1 · p_c p_cᵀ + c_mu · Σ w_k y_k y_kᵀ`
    pub fn adapt(
        &mut self,
        decay: f64,
        c_1: f64,
        p_c: &DVector<f64>,
        c_mu: f64,
        steps: &[(f64, DVector<f64>)],
    ) {
        self.c *= decay;
        self.c += p_c * p_c.transpose() * c_1;
        for (weight, y) in steps {
            self.c += y * y.transpose() * (c_mu * weight);
        }
    }

    /// Diagonal of C
    pub fn diagonal(&self) -> DVector<f64> {
        self.c.diagonal()
    }

    /// Ratio of largest to smallest eigenvalue at the last decomposition
    pub fn condition_number(&self) -> f64 {
        let max = self.d.max();
        let min = self.d.min();
        (max / min).powi(2)
    }
}
