//! Gaussian noise models used to whiten residuals and Jacobians.
//!
//! A noise model of dimension `n` maps an unwhitened residual `e` to `W·e` where
//! `WᵀW` is the information matrix, so the factor error becomes `½‖W·e‖²`.
//!
//! | Model        | Parameters                | Whitening            |
//! |--------------|---------------------------|----------------------|
//! | `Gaussian`   | square-root information R | R·e                  |
//! | `Diagonal`   | sigmas σᵢ                 | eᵢ/σᵢ                |
//! | `Isotropic`  | one sigma σ               | e/σ                  |
//! | `Unit`       | -                         | e                    |
//! | `Constrained`| sigmas σᵢ ≥ 0, penalty μᵢ | eᵢ if σᵢ = 0 else eᵢ/σᵢ |

use crate::core::{CoreError, CoreResult};
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;
use std::sync::Arc;

/// Default penalty weight for hard constraints.
pub const DEFAULT_CONSTRAINT_MU: f64 = 1000.0;

/// Common interface of all noise models.
pub trait NoiseModel: Debug + Send + Sync {
    /// Dimension of the residuals this model whitens.
    fn dim(&self) -> usize;

    /// Whiten a residual vector.
    fn whiten(&self, v: &DVector<f64>) -> DVector<f64>;

    /// Whiten every column of a Jacobian.
    fn whiten_matrix(&self, h: &DMatrix<f64>) -> DMatrix<f64>;

    /// Squared Mahalanobis distance of a residual.
    fn distance(&self, v: &DVector<f64>) -> f64 {
        self.whiten(v).norm_squared()
    }

    /// Whether some dimensions are hard constraints.
    fn is_constrained(&self) -> bool {
        false
    }

    /// Downcast to a constrained model.
    fn as_constrained(&self) -> Option<&Constrained> {
        None
    }
}

/// Shared, immutable noise model handle.
pub type SharedNoiseModel = Arc<dyn NoiseModel>;

fn validate_sigmas(sigmas: &DVector<f64>, allow_zero: bool) -> CoreResult<()> {
    if sigmas.is_empty() {
        return Err(CoreError::InvalidInput(
            "Noise model needs at least one sigma".to_string(),
        ));
    }
    let valid = |s: f64| s.is_finite() && (s > 0.0 || (allow_zero && s == 0.0));
    if let Some(bad) = sigmas.iter().find(|s| !valid(**s)) {
        return Err(CoreError::InvalidInput(format!(
            "Invalid noise sigma {bad}"
        )));
    }
    Ok(())
}

/// Full Gaussian model given by its square-root information matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    sqrt_information: DMatrix<f64>,
}

impl Gaussian {
    /// Build from a square-root information matrix R (RᵀR = Σ⁻¹).
    pub fn from_sqrt_information(sqrt_information: DMatrix<f64>) -> CoreResult<Self> {
        if !sqrt_information.is_square() || sqrt_information.nrows() == 0 {
            return Err(CoreError::InvalidInput(format!(
                "Square-root information must be square and non-empty, got {}x{}",
                sqrt_information.nrows(),
                sqrt_information.ncols()
            )));
        }
        Ok(Gaussian { sqrt_information })
    }

    /// Build from a covariance matrix Σ.
    pub fn from_covariance(covariance: &DMatrix<f64>) -> CoreResult<Self> {
        if !covariance.is_square() || covariance.nrows() == 0 {
            return Err(CoreError::InvalidInput(
                "Covariance must be square and non-empty".to_string(),
            ));
        }
        let information = covariance
            .clone()
            .try_inverse()
            .ok_or_else(|| CoreError::InvalidInput("Covariance is singular".to_string()))?;
        let cholesky = information.cholesky().ok_or_else(|| {
            CoreError::InvalidInput("Covariance is not positive definite".to_string())
        })?;
        // Σ⁻¹ = L·Lᵀ, so R = Lᵀ
        Self::from_sqrt_information(cholesky.l().transpose())
    }

    pub fn sqrt_information(&self) -> &DMatrix<f64> {
        &self.sqrt_information
    }
}

impl NoiseModel for Gaussian {
    fn dim(&self) -> usize {
        self.sqrt_information.nrows()
    }

    fn whiten(&self, v: &DVector<f64>) -> DVector<f64> {
        &self.sqrt_information * v
    }

    fn whiten_matrix(&self, h: &DMatrix<f64>) -> DMatrix<f64> {
        &self.sqrt_information * h
    }
}

/// Independent noise per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagonal {
    sigmas: DVector<f64>,
}

impl Diagonal {
    pub fn from_sigmas(sigmas: DVector<f64>) -> CoreResult<Self> {
        validate_sigmas(&sigmas, false)?;
        Ok(Diagonal { sigmas })
    }

    pub fn from_variances(variances: DVector<f64>) -> CoreResult<Self> {
        Self::from_sigmas(variances.map(f64::sqrt))
    }

    pub fn sigmas(&self) -> &DVector<f64> {
        &self.sigmas
    }
}

impl NoiseModel for Diagonal {
    fn dim(&self) -> usize {
        self.sigmas.len()
    }

    fn whiten(&self, v: &DVector<f64>) -> DVector<f64> {
        v.component_div(&self.sigmas)
    }

    fn whiten_matrix(&self, h: &DMatrix<f64>) -> DMatrix<f64> {
        let mut whitened = h.clone();
        for (i, sigma) in self.sigmas.iter().enumerate() {
            whitened.row_mut(i).unscale_mut(*sigma);
        }
        whitened
    }
}

/// Same sigma in every dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Isotropic {
    dim: usize,
    sigma: f64,
}

impl Isotropic {
    pub fn from_sigma(dim: usize, sigma: f64) -> CoreResult<Self> {
        validate_sigmas(&DVector::from_element(dim, sigma), false)?;
        Ok(Isotropic { dim, sigma })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl NoiseModel for Isotropic {
    fn dim(&self) -> usize {
        self.dim
    }

    fn whiten(&self, v: &DVector<f64>) -> DVector<f64> {
        v / self.sigma
    }

    fn whiten_matrix(&self, h: &DMatrix<f64>) -> DMatrix<f64> {
        h / self.sigma
    }
}

/// Identity whitening.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    dim: usize,
}

impl Unit {
    pub fn new(dim: usize) -> CoreResult<Self> {
        if dim == 0 {
            return Err(CoreError::InvalidInput(
                "Unit noise model needs a positive dimension".to_string(),
            ));
        }
        Ok(Unit { dim })
    }
}

impl NoiseModel for Unit {
    fn dim(&self) -> usize {
        self.dim
    }

    fn whiten(&self, v: &DVector<f64>) -> DVector<f64> {
        v.clone()
    }

    fn whiten_matrix(&self, h: &DMatrix<f64>) -> DMatrix<f64> {
        h.clone()
    }
}

/// Diagonal model where a zero sigma marks a hard constraint.
///
/// Constrained rows are left unscaled by whitening and enter the distance with the
/// penalty weight `mu`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constrained {
    sigmas: DVector<f64>,
    mu: DVector<f64>,
}

impl Constrained {
    /// Mixed model with the default penalty in every dimension.
    pub fn from_sigmas(sigmas: DVector<f64>) -> CoreResult<Self> {
        let mu = DVector::from_element(sigmas.len(), DEFAULT_CONSTRAINT_MU);
        Self::from_sigmas_and_mu(sigmas, mu)
    }

    /// Mixed model with explicit per-dimension penalties.
    pub fn from_sigmas_and_mu(sigmas: DVector<f64>, mu: DVector<f64>) -> CoreResult<Self> {
        validate_sigmas(&sigmas, true)?;
        if mu.len() != sigmas.len() {
            return Err(CoreError::InvalidInput(format!(
                "Constrained model has {} sigmas but {} penalties",
                sigmas.len(),
                mu.len()
            )));
        }
        Ok(Constrained { sigmas, mu })
    }

    /// Fully constrained model of the given dimension.
    pub fn all(dim: usize) -> CoreResult<Self> {
        Self::from_sigmas(DVector::zeros(dim))
    }

    pub fn sigmas(&self) -> &DVector<f64> {
        &self.sigmas
    }

    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    /// Whether dimension `i` is a hard constraint.
    pub fn is_hard(&self, i: usize) -> bool {
        self.sigmas[i] == 0.0
    }

    /// Same hard-constraint mask with unit sigmas elsewhere.
    pub fn unit(&self) -> Constrained {
        let sigmas = self.sigmas.map(|s| if s == 0.0 { 0.0 } else { 1.0 });
        Constrained {
            sigmas,
            mu: self.mu.clone(),
        }
    }

    fn row_scale(&self, i: usize) -> f64 {
        if self.is_hard(i) {
            1.0
        } else {
            1.0 / self.sigmas[i]
        }
    }
}

impl NoiseModel for Constrained {
    fn dim(&self) -> usize {
        self.sigmas.len()
    }

    fn whiten(&self, v: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(v.len(), |i, _| v[i] * self.row_scale(i))
    }

    fn whiten_matrix(&self, h: &DMatrix<f64>) -> DMatrix<f64> {
        let mut whitened = h.clone();
        for i in 0..self.sigmas.len() {
            whitened.row_mut(i).scale_mut(self.row_scale(i));
        }
        whitened
    }

    fn distance(&self, v: &DVector<f64>) -> f64 {
        let whitened = self.whiten(v);
        whitened
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if self.is_hard(i) {
                    self.mu[i] * c * c
                } else {
                    c * c
                }
            })
            .sum()
    }

    fn is_constrained(&self) -> bool {
        true
    }

    fn as_constrained(&self) -> Option<&Constrained> {
        Some(self)
    }
}
