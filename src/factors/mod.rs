//! Nonlinear factors and their linearizations.
//!
//! A factor connects a set of variables (its keys) through a residual function. The
//! optimizer minimizes
//!
//! ```text
//! Σᵢ ½‖Wᵢ·eᵢ(x)‖²
//! ```
//!
//! where `eᵢ` is the unwhitened error of factor `i` and `Wᵢ` the whitening of its noise
//! model. Each nonlinear factor can be linearized into a [`JacobianFactor`]:
//! the per-key Jacobian blocks of `eᵢ` and the right-hand side `-eᵢ(x)`.
//!
//! # Factor Types
//! - [`ExpressionFactor`]: residual `z.local_coordinates(h(x))` for any expression `h`
//! - [`JacobianFactor`]: the linear factor produced by linearization

pub mod expression_factor;
pub mod jacobian_factor;

pub use expression_factor::ExpressionFactor;
pub use jacobian_factor::JacobianFactor;

use crate::core::CoreResult;
use crate::core::noise_model::SharedNoiseModel;
use crate::core::values::{Key, Values};
use nalgebra::{DMatrix, DVector};

/// A nonlinear factor with a Gaussian noise model.
pub trait NoiseModelFactor: Send + Sync {
    /// Variable keys, in Jacobian block order.
    fn keys(&self) -> &[Key];

    /// Residual dimension.
    fn dim(&self) -> usize;

    fn noise_model(&self) -> &SharedNoiseModel;

    /// Error before whitening.
    ///
    /// When `jacobians` is given it must hold one matrix per key; each is resized to
    /// `dim() × dim(key)` and filled with the derivative of the error.
    fn unwhitened_error(
        &self,
        values: &Values,
        jacobians: Option<&mut [DMatrix<f64>]>,
    ) -> CoreResult<DVector<f64>>;

    /// Linear factor at `values`.
    fn linearize(&self, values: &Values) -> CoreResult<JacobianFactor>;

    /// Number of keys.
    fn size(&self) -> usize {
        self.keys().len()
    }

    /// Error after whitening by the noise model.
    fn whitened_error(&self, values: &Values) -> CoreResult<DVector<f64>> {
        Ok(self.noise_model().whiten(&self.unwhitened_error(values, None)?))
    }

    /// ½ of the noise-model distance of the unwhitened error.
    fn error(&self, values: &Values) -> CoreResult<f64> {
        Ok(0.5 * self.noise_model().distance(&self.unwhitened_error(values, None)?))
    }
}
