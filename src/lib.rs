//! # lie-factors
//!
//! The Sim(3) similarity group and expression-based factors for nonlinear least squares.
//!
//! - [`manifold`]: SO(3), SE(3), Sim(3) and Rⁿ with exponential/logarithm maps,
//!   adjoints and analytic Jacobians
//! - [`expression`]: differentiable expression trees over named variables
//! - [`factors`]: [`ExpressionFactor`] and its linearization into a [`JacobianFactor`]
//! - [`core`]: variable assignments and Gaussian noise models
//! - [`linalg`]: block-structured storage for linear systems

pub mod core;
pub mod error;
pub mod expression;
pub mod factors;
pub mod linalg;
#[cfg(feature = "logging")]
pub mod logger;
pub mod manifold;

pub use core::noise_model::{
    Constrained, Diagonal, Gaussian, Isotropic, NoiseModel, SharedNoiseModel, Unit,
};
pub use core::values::{Key, Values};
pub use error::{LieFactorsError, LieFactorsResult};
pub use expression::{Expression, JacobianMap};
pub use factors::{ExpressionFactor, JacobianFactor, NoiseModelFactor};
#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::{LieGroup, Tangent};
pub use manifold::sim3::{Sim3, Sim3Tangent};
