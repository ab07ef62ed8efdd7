//! Manifold representations for optimization on non-Euclidean spaces.
//!
//! This module provides the Lie groups used as variables and measurements:
//! - **Sim(3)**: Similarity transformations (rotation, translation, uniform scale)
//! - **SE(3)**: Rigid body transformations
//! - **SO(3)**: Rotations
//! - **Rⁿ**: Euclidean vectors (points, generic vector measurements)
//!
//! Lie group M,° | size   | dim | X ∈ M                   | Constraint      | Exp(T)             | Comp. | Action
//! ------------- | ------ | --- | ----------------------- | --------------- | ------------------ | ----- | ------
//! n-D vector    | Rⁿ,+   | n   | v ∈ Rⁿ                  | -               | v = exp(v)         | v₁+v₂ | v + x
//! Rotation      | SO(3),.| 3   | R                       | RᵀR = I         | R = exp([θ]x)      | R₁R₂  | Rx
//! Rigid motion  | SE(3),.| 6   | M = [R t; 0 1]          | RᵀR = I         | Exp([v̂])           | M₁M₂  | Rx+t
//! Similarity    | Sim(3),| 7   | M = [R t; 0 s⁻¹]        | RᵀR = I, s > 0  | Exp([v̂])           | M₁M₂  | sRx+t
//!
//! Every group exposes a chart at the origin: `exp`/`log` map between the group and its
//! tangent space, and the provided `retract`/`local_coordinates` methods apply that chart
//! around an arbitrary base element. Factors use `local_coordinates` to turn a predicted
//! value and a measurement into a residual vector.

use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, Vector3};
use std::fmt::Debug;
use thiserror::Error;

pub mod rn;
pub mod se3;
pub mod sim3;
pub mod so3;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Invalid tangent vector dimension
    #[error("Invalid tangent dimension: expected {expected}, got {actual}")]
    InvalidTangentDimension { expected: usize, actual: usize },

    /// Numerical instability in computation
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Invalid manifold element
    #[error("Invalid manifold element: {0}")]
    InvalidElement(String),
}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Core trait for Lie group operations.
///
/// Provides group composition, inversion, the logarithmic map and the adjoint, plus
/// chart-based plus/minus built on top of them. Elements are immutable values: every
/// operation returns a new element.
///
/// The tangent dimension is `Self::TangentVector::DIM` for fixed-size groups. Groups with a
/// runtime dimension (Rⁿ) override [`LieGroup::tangent_dim`].
pub trait LieGroup: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// The tangent space vector type
    type TangentVector: Tangent<Self>;

    /// The Jacobian / adjoint matrix type
    type JacobianMatrix: JacobianStorage;

    /// Associated Lie algebra type (matrix form of a tangent vector)
    type LieAlgebra: Clone + Debug + PartialEq;

    /// Compute the inverse g⁻¹ such that g ∘ g⁻¹ = e.
    ///
    /// # Arguments
    /// * `jacobian` - Optional Jacobian ∂(g⁻¹)/∂g, which is -Ad(g)
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self;

    /// Compose this element with another (group multiplication g₁ ∘ g₂).
    ///
    /// Jacobians are taken under right perturbations of both operands and of the result.
    ///
    /// # Arguments
    /// * `other` - The right operand for composition
    /// * `jacobian_self` - Optional Jacobian ∂(g₁ ∘ g₂)/∂g₁ = Ad(g₂⁻¹)
    /// * `jacobian_other` - Optional Jacobian ∂(g₁ ∘ g₂)/∂g₂ = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// Logarithmic map from the group to its tangent space, log(g)^∨.
    fn log(&self) -> Self::TangentVector;

    /// Adjoint matrix Ad(g).
    fn adjoint(&self) -> Self::JacobianMatrix;

    /// Generate a random element (useful for testing and initialization).
    fn random() -> Self;

    /// Normalize/project the element to the manifold.
    fn normalize(&mut self);

    /// Check if the element is approximately on the manifold.
    fn is_valid(&self, tolerance: f64) -> bool;

    /// Check if the element is approximately equal to another element.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool;

    /// Right plus operation: g ⊞ φ = g ∘ exp(φ^∧).
    fn right_plus(&self, tangent: &Self::TangentVector) -> Self {
        self.compose(&tangent.exp(), None, None)
    }

    /// Right minus operation: g₁ ⊟ g₂ = log(g₂⁻¹ ∘ g₁)^∨.
    fn right_minus(&self, other: &Self) -> Self::TangentVector {
        other.inverse(None).compose(self, None, None).log()
    }

    /// Convenience method for right_plus. Equivalent to g ⊞ φ.
    fn plus(&self, tangent: &Self::TangentVector) -> Self {
        self.right_plus(tangent)
    }

    /// Convenience method for right_minus. Equivalent to g₁ ⊟ g₂.
    fn minus(&self, other: &Self) -> Self::TangentVector {
        self.right_minus(other)
    }

    /// Compute g₁⁻¹ ∘ g₂ (relative transformation).
    fn between(&self, other: &Self) -> Self {
        self.inverse(None).compose(other, None, None)
    }

    /// Dimension of the tangent space for this element.
    ///
    /// Returns `Self::TangentVector::DIM` which works for fixed-size manifolds.
    fn tangent_dim(&self) -> usize {
        Self::TangentVector::DIM
    }

    /// Apply a dense tangent-space update around this element: `self ⊞ delta`.
    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self> {
        let expected = self.tangent_dim();
        if delta.len() != expected {
            return Err(ManifoldError::InvalidTangentDimension {
                expected,
                actual: delta.len(),
            });
        }
        Ok(self.right_plus(&Self::TangentVector::from_vector(delta)))
    }

    /// Local coordinates of `other` in the chart centred at `self`: `other ⊟ self`.
    ///
    /// This is the residual convention used by factors: `z.local_coordinates(h(x))`.
    fn local_coordinates(&self, other: &Self) -> DVector<f64> {
        other.right_minus(self).to_vector()
    }
}

/// Storage for Jacobian and adjoint matrices.
///
/// Fixed-size groups use nalgebra static matrices; Rⁿ uses a dynamic matrix.
pub trait JacobianStorage: Clone + Debug + PartialEq {
    /// Placeholder to pass as an output argument. Operations overwrite it entirely.
    fn zeroed() -> Self;

    fn to_dmatrix(&self) -> DMatrix<f64>;
}

impl<const R: usize, const C: usize> JacobianStorage for SMatrix<f64, R, C> {
    fn zeroed() -> Self {
        Self::zeros()
    }

    fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_column_slice(R, C, self.as_slice())
    }
}

impl JacobianStorage for DMatrix<f64> {
    fn zeroed() -> Self {
        DMatrix::zeros(0, 0)
    }

    fn to_dmatrix(&self) -> DMatrix<f64> {
        self.clone()
    }
}

/// Trait for Lie algebra operations.
///
/// # Type Parameters
///
/// - `Group`: The associated Lie group type
pub trait Tangent<Group: LieGroup>: Clone + Debug + PartialEq {
    /// Dimension of the tangent space (0 for runtime-sized spaces)
    const DIM: usize;

    /// Exponential map to the Lie group: exp(φ^∧).
    fn exp(&self) -> Group;

    /// Hat operator: φ^∧ (vector to matrix).
    fn hat(&self) -> Group::LieAlgebra;

    /// Zero tangent vector.
    fn zero() -> Self;

    /// Random tangent vector (useful for testing).
    fn random() -> Self;

    /// Check if the tangent vector is approximately zero.
    fn is_zero(&self, tolerance: f64) -> bool;

    /// Check if the tangent vector is approximately equal to another tangent vector.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool;

    /// Dense vector form of the tangent coordinates.
    fn to_vector(&self) -> DVector<f64>;

    /// Build a tangent vector from dense coordinates.
    ///
    /// The caller guarantees `data.len() == DIM` for fixed-size spaces.
    fn from_vector(data: &DVector<f64>) -> Self;
}

/// Skew-symmetric (cross-product) matrix of a 3-vector: `skew(v) * w == v × w`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}
