//! Sim(3) - Similarity Transformations in 3D
//!
//! This module implements the Similarity group Sim(3), which represents
//! transformations including rotation, translation, and uniform scaling in 3D space.
//!
//! Sim(3) elements are stored as (R, t, s) and follow the group law of the
//! homogeneous representation
//!
//! ```text
//! T = [ R   t  ]
//!     [ 0  1/s ]
//! ```
//!
//! so that `compose` multiplies these matrices. The point action and the 4x4
//! `matrix()` form use the affine similarity map p ↦ s·R·p + t.
//!
//! Sim(3) tangent elements are represented as [ω(3), u(3), λ(1)] = 7 components:
//! - ω: rotation generator (axis-angle)
//! - u: translation generator
//! - λ: logarithmic scale, ln(s)
//!
//! # References
//! - Ethan Eade: "Lie Groups for Computer Vision" - https://www.ethaneade.com/lie.pdf

use crate::manifold::se3::SE3;
use crate::manifold::{
    LieGroup, ManifoldError, ManifoldResult, Tangent, skew,
    so3::{SO3, SO3Tangent},
};
use nalgebra::{DVector, Matrix3, Matrix4, SMatrix, SVector, UnitQuaternion, Vector3};
use std::{
    fmt,
    fmt::{Display, Formatter},
    ops::Mul,
};
use tracing::warn;

/// 7-dimensional tangent coordinates.
pub type Vector7<T> = SVector<T, 7>;
/// 7x7 matrix (adjoint, tangent Jacobians).
pub type Matrix7<T> = SMatrix<T, 7, 7>;
/// Jacobian of a transformed point with respect to the Sim(3) tangent.
pub type Matrix3x7<T> = SMatrix<T, 3, 7>;

/// Below this θ², the trigonometric coefficients Y, Z, W use their Taylor series.
const THETA_SQUARED_SERIES_THRESHOLD: f64 = 1e-4;

/// Below this |λ|, the coefficients A, β, μ use their Taylor series.
const LAMBDA_SERIES_THRESHOLD: f64 = 1e-2;

/// Sim(3) group element representing similarity transformations in 3D.
///
/// Represented as (rotation, translation, scale) with scale > 0.
#[derive(Clone, Debug, PartialEq)]
pub struct Sim3 {
    /// Rotation part as SO(3) element
    rotation: SO3,
    /// Translation part as Vector3
    translation: Vector3<f64>,
    /// Scale factor (positive real number)
    scale: f64,
}

impl Display for Sim3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let t = self.translation;
        let q = self.rotation.quaternion();
        write!(
            f,
            "Sim3(translation: [{:.4}, {:.4}, {:.4}], scale: {:.4}, rotation: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, self.scale, q.w, q.i, q.j, q.k
        )
    }
}

impl Default for Sim3 {
    fn default() -> Self {
        Sim3::identity()
    }
}

/// Sim(3) tangent space element, stored as [ω, u, λ].
#[derive(Clone, Debug, PartialEq)]
pub struct Sim3Tangent {
    /// Internal data: [ω_x, ω_y, ω_z, u_x, u_y, u_z, λ]
    data: Vector7<f64>,
}

impl Display for Sim3Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let omega = self.omega();
        let u = self.u();
        write!(
            f,
            "sim3(omega: [{:.4}, {:.4}, {:.4}], u: [{:.4}, {:.4}, {:.4}], lambda: {:.4})",
            omega.x,
            omega.y,
            omega.z,
            u.x,
            u.y,
            u.z,
            self.lambda()
        )
    }
}

impl Sim3 {
    /// Degrees of freedom - dimension of the tangent space
    pub const DOF: usize = 7;

    /// Get the identity element of the group.
    pub fn identity() -> Self {
        Sim3 {
            rotation: SO3::identity(),
            translation: Vector3::zeros(),
            scale: 1.0,
        }
    }

    /// Create a new Sim(3) element from translation, rotation, and scale.
    ///
    /// # Panics
    /// Panics if `scale` is not strictly positive.
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>, scale: f64) -> Self {
        Self::from_components(translation, SO3::new(rotation), scale)
    }

    /// Create Sim(3) from components.
    ///
    /// # Panics
    /// Panics if `scale` is not strictly positive.
    pub fn from_components(translation: Vector3<f64>, rotation: SO3, scale: f64) -> Self {
        assert!(scale > 0.0, "Scale must be positive");
        Sim3 {
            rotation,
            translation,
            scale,
        }
    }

    /// Fallible constructor: rejects non-positive or non-finite scales.
    pub fn try_new(rotation: SO3, translation: Vector3<f64>, scale: f64) -> ManifoldResult<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ManifoldError::InvalidElement(format!(
                "Sim3 scale must be positive and finite, got {scale}"
            )));
        }
        Ok(Sim3 {
            rotation,
            translation,
            scale,
        })
    }

    /// Create Sim(3) from a 3x3 rotation matrix, a translation and a scale.
    ///
    /// # Panics
    /// Panics if `scale` is not strictly positive.
    pub fn from_rotation_matrix(
        rotation: &Matrix3<f64>,
        translation: Vector3<f64>,
        scale: f64,
    ) -> Self {
        Self::from_components(translation, SO3::from_rotation_matrix(rotation), scale)
    }

    /// Pure scaling: (I, 0, s).
    ///
    /// # Panics
    /// Panics if `scale` is not strictly positive.
    pub fn from_scale(scale: f64) -> Self {
        Self::from_components(Vector3::zeros(), SO3::identity(), scale)
    }

    /// Get the translation part as a Vector3.
    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    /// Get the scale factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Get the rotation part as SO3.
    pub fn rotation_so3(&self) -> SO3 {
        self.rotation.clone()
    }

    /// Get the rotation part as a 3x3 matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.rotation_matrix()
    }

    /// 4x4 homogeneous matrix of the affine map: [[s·R, t], [0, 0, 0, 1]].
    pub fn matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(self.scale * self.rotation_matrix()));
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Transform a point: s·R·p + t.
    ///
    /// # Arguments
    /// * `point` - Point to transform
    /// * `jacobian_self` - Optional 3x7 Jacobian [s·R·[-p]ₓ | R | R·p] in [ω, u, λ] order
    /// * `jacobian_point` - Optional 3x3 Jacobian s·R
    ///
    /// The ω and u columns are the derivatives under the right perturbation
    /// x·Exp(δ). The λ column is R·p.
    pub fn transform_from(
        &self,
        point: &Vector3<f64>,
        jacobian_self: Option<&mut Matrix3x7<f64>>,
        jacobian_point: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        let rotation_matrix = self.rotation_matrix();
        let rotated = self.rotation.act(point, None, None);

        if let Some(jac_self) = jacobian_self {
            jac_self
                .fixed_view_mut::<3, 3>(0, 0)
                .copy_from(&(self.scale * rotation_matrix * skew(&-point)));
            jac_self
                .fixed_view_mut::<3, 3>(0, 3)
                .copy_from(&rotation_matrix);
            jac_self.fixed_view_mut::<3, 1>(0, 6).copy_from(&rotated);
        }

        if let Some(jac_point) = jacobian_point {
            *jac_point = self.scale * rotation_matrix;
        }

        self.scale * rotated + self.translation
    }

    /// 7x7 adjoint representation.
    ///
    /// ```text
    /// [ s·R   s·[t]ₓ·R   -s·t ]
    /// [  0        R        0  ]
    /// [  0        0        1  ]
    /// ```
    pub fn adjoint_map(&self) -> Matrix7<f64> {
        let rotation_matrix = self.rotation_matrix();
        let mut adjoint = Matrix7::zeros();

        adjoint
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(self.scale * rotation_matrix));
        adjoint
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(self.scale * skew(&self.translation) * rotation_matrix));
        adjoint
            .fixed_view_mut::<3, 1>(0, 6)
            .copy_from(&(-self.scale * self.translation));
        adjoint
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&rotation_matrix);
        adjoint[(6, 6)] = 1.0;

        adjoint
    }

    /// Logarithmic map: ω = Log(R), λ = ln(s), u = V⁻¹·t.
    pub fn logmap(sim: &Sim3) -> Sim3Tangent {
        let omega = sim.rotation.log().coeffs();
        let lambda = sim.scale.ln();
        let v = v_matrix(&omega, lambda);

        let u = match v.lu().solve(&sim.translation) {
            Some(u) => u,
            None => {
                warn!(
                    lambda,
                    theta = omega.norm(),
                    "Sim3 logmap: V is singular, using the translation as generator"
                );
                sim.translation
            }
        };

        Sim3Tangent::new(omega, u, lambda)
    }

    /// Exponential map: R = Exp(ω), t = V·u, s = exp(λ).
    pub fn expmap(tangent: &Sim3Tangent) -> Sim3 {
        let omega = tangent.omega();
        let lambda = tangent.lambda();
        let v = v_matrix(&omega, lambda);

        Sim3 {
            rotation: SO3Tangent::new(omega).exp(),
            translation: v * tangent.u(),
            scale: lambda.exp(),
        }
    }

    /// Chart at the origin: identical to [`Sim3::expmap`].
    pub fn retract_origin(tangent: &Sim3Tangent) -> Sim3 {
        Self::expmap(tangent)
    }

    /// Inverse chart at the origin: identical to [`Sim3::logmap`].
    pub fn local_origin(sim: &Sim3) -> Sim3Tangent {
        Self::logmap(sim)
    }

    /// Lossy projection to a rigid pose: (R, s·t).
    pub fn to_se3(&self) -> SE3 {
        SE3::from_translation_so3(self.scale * self.translation, self.rotation.clone())
    }

    /// Approximate equality: rotation elementwise and translation componentwise within
    /// `tolerance`, scale strictly within the band |s - s'| < `tolerance`.
    pub fn equals(&self, other: &Sim3, tolerance: f64) -> bool {
        self.rotation.equals(&other.rotation, tolerance)
            && (self.translation - other.translation)
                .iter()
                .all(|d| d.abs() <= tolerance)
            && (self.scale - other.scale).abs() < tolerance
    }

    /// Adjoint of the group law in [ω, u, λ] order: x·Exp(ξ)·x⁻¹ = Exp(Ad·ξ).
    ///
    /// ```text
    /// [    R       0     0  ]
    /// [ s·[t]ₓ·R  s·R  -s·t ]
    /// [    0       0     1  ]
    /// ```
    fn tangent_adjoint(&self) -> Matrix7<f64> {
        let rotation_matrix = self.rotation_matrix();
        let mut adjoint = Matrix7::zeros();

        adjoint
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_matrix);
        adjoint
            .fixed_view_mut::<3, 3>(3, 0)
            .copy_from(&(self.scale * skew(&self.translation) * rotation_matrix));
        adjoint
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&(self.scale * rotation_matrix));
        adjoint
            .fixed_view_mut::<3, 1>(3, 6)
            .copy_from(&(-self.scale * self.translation));
        adjoint[(6, 6)] = 1.0;

        adjoint
    }
}

/// V = A·I + B·[ω]ₓ + C·[ω]ₓ², the translation block of Exp([ω, u, λ]).
fn v_matrix(omega: &Vector3<f64>, lambda: f64) -> Matrix3<f64> {
    let theta_squared = omega.norm_squared();
    let lambda_squared = lambda * lambda;

    let (y, z, w) = if theta_squared < THETA_SQUARED_SERIES_THRESHOLD {
        let t2 = theta_squared;
        let t4 = t2 * t2;
        let t6 = t4 * t2;
        (
            0.5 - t2 / 24.0 + t4 / 720.0 - t6 / 40320.0,
            1.0 / 6.0 - t2 / 120.0 + t4 / 5040.0 - t6 / 362880.0,
            1.0 / 24.0 - t2 / 720.0 + t4 / 40320.0 - t6 / 3628800.0,
        )
    } else {
        let theta = theta_squared.sqrt();
        let x = theta.sin() / theta;
        let y = (1.0 - theta.cos()) / theta_squared;
        (y, (1.0 - x) / theta_squared, (0.5 - y) / theta_squared)
    };

    let (a, beta, mu) = if lambda.abs() < LAMBDA_SERIES_THRESHOLD {
        let l2 = lambda_squared;
        let l3 = l2 * lambda;
        let l4 = l2 * l2;
        (
            1.0 - lambda / 2.0 + l2 / 6.0 - l3 / 24.0 + l4 / 120.0,
            0.5 - lambda / 6.0 + l2 / 24.0 - l3 / 120.0 + l4 / 720.0,
            1.0 / 6.0 - lambda / 24.0 + l2 / 120.0 - l3 / 720.0 + l4 / 5040.0,
        )
    } else {
        let exp_neg = (-lambda).exp();
        (
            -(-lambda).exp_m1() / lambda,
            (exp_neg - 1.0 + lambda) / lambda_squared,
            (1.0 - lambda + 0.5 * lambda_squared - exp_neg) / (lambda_squared * lambda),
        )
    };

    let denominator = lambda_squared + theta_squared;
    let alpha = if denominator > 0.0 {
        lambda_squared / denominator
    } else {
        0.0
    };
    let gamma = y - lambda * z;
    let upsilon = z - lambda * w;

    let b = alpha * (beta - gamma) + gamma;
    let c = alpha * (mu - upsilon) + upsilon;

    let omega_skew = skew(omega);
    Matrix3::identity() * a + omega_skew * b + omega_skew * omega_skew * c
}

impl Mul<&Sim3> for &Sim3 {
    type Output = Sim3;

    fn mul(self, rhs: &Sim3) -> Sim3 {
        self.compose(rhs, None, None)
    }
}

impl Mul for Sim3 {
    type Output = Sim3;

    fn mul(self, rhs: Sim3) -> Sim3 {
        self.compose(&rhs, None, None)
    }
}

impl Mul<&Vector3<f64>> for &Sim3 {
    type Output = Vector3<f64>;

    fn mul(self, point: &Vector3<f64>) -> Vector3<f64> {
        self.transform_from(point, None, None)
    }
}

impl From<&Sim3> for SE3 {
    fn from(sim: &Sim3) -> Self {
        sim.to_se3()
    }
}

impl LieGroup for Sim3 {
    type TangentVector = Sim3Tangent;
    type JacobianMatrix = Matrix7<f64>;
    type LieAlgebra = Matrix4<f64>;

    /// (R⁻¹, R⁻¹·(-s·t), 1/s)
    ///
    /// J = -Ad(x) in [ω, u, λ] order.
    fn inverse(&self, jacobian: Option<&mut Matrix7<f64>>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.tangent_adjoint();
        }
        let rotation_inv = self.rotation.inverse(None);
        let translation_inv = rotation_inv.act(&(-self.scale * self.translation), None, None);
        Sim3 {
            rotation: rotation_inv,
            translation: translation_inv,
            scale: 1.0 / self.scale,
        }
    }

    /// (R₁R₂, t₁/s₂ + R₁t₂, s₁s₂)
    ///
    /// J_self = Ad(x₂⁻¹), J_other = I.
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Matrix7<f64>>,
        jacobian_other: Option<&mut Matrix7<f64>>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).tangent_adjoint();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix7::identity();
        }
        Sim3 {
            rotation: self.rotation.compose(&other.rotation, None, None),
            translation: self.translation / other.scale
                + self.rotation.act(&other.translation, None, None),
            scale: self.scale * other.scale,
        }
    }

    fn log(&self) -> Sim3Tangent {
        Sim3::logmap(self)
    }

    fn adjoint(&self) -> Matrix7<f64> {
        self.adjoint_map()
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();

        let translation = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        let scale = rng.random_range(0.5..2.0);
        Sim3::from_components(translation, SO3::random(), scale)
    }

    fn normalize(&mut self) {
        self.rotation.normalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        self.rotation.is_valid(tolerance)
            && self.scale.is_finite()
            && self.scale > 0.0
            && self.translation.iter().all(|x| x.is_finite())
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.equals(other, tolerance)
    }
}

impl Sim3Tangent {
    /// Create a tangent vector from its rotation, translation and log-scale generators.
    pub fn new(omega: Vector3<f64>, u: Vector3<f64>, lambda: f64) -> Self {
        let mut data = Vector7::zeros();
        data.fixed_rows_mut::<3>(0).copy_from(&omega);
        data.fixed_rows_mut::<3>(3).copy_from(&u);
        data[6] = lambda;
        Sim3Tangent { data }
    }

    /// Rotation generator ω.
    pub fn omega(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    /// Translation generator u.
    pub fn u(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }

    /// Log-scale generator λ.
    pub fn lambda(&self) -> f64 {
        self.data[6]
    }

    /// Coefficients as a fixed-size vector.
    pub fn coeffs(&self) -> Vector7<f64> {
        self.data
    }
}

impl From<Vector7<f64>> for Sim3Tangent {
    fn from(data: Vector7<f64>) -> Self {
        Sim3Tangent { data }
    }
}

impl Tangent<Sim3> for Sim3Tangent {
    const DIM: usize = 7;

    fn exp(&self) -> Sim3 {
        Sim3::expmap(self)
    }

    /// [ [ω]ₓ  u ]
    /// [  0   -λ ]
    fn hat(&self) -> Matrix4<f64> {
        let mut lie_alg = Matrix4::zeros();
        lie_alg
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&skew(&self.omega()));
        lie_alg.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.u());
        lie_alg[(3, 3)] = -self.lambda();
        lie_alg
    }

    fn zero() -> Self {
        Sim3Tangent {
            data: Vector7::zeros(),
        }
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        Sim3Tangent {
            data: Vector7::from_fn(|_, _| rng.random_range(-0.5..0.5)),
        }
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.data - other.data).norm() < tolerance
    }

    fn to_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }

    fn from_vector(data: &DVector<f64>) -> Self {
        Sim3Tangent {
            data: Vector7::from_column_slice(&data.as_slice()[..7]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    const TOLERANCE: f64 = 1e-9;

    fn sample() -> Sim3 {
        Sim3::from_components(
            Vector3::new(0.4, -1.2, 2.5),
            SO3::from_euler_angles(0.3, -0.2, 0.9),
            1.7,
        )
    }

    /// Homogeneous matrix of the group law, [R t; 0 1/s].
    fn group_matrix(sim: &Sim3) -> Matrix4<f64> {
        let mut m = Matrix4::zeros();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&sim.rotation_matrix());
        m.fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&sim.translation());
        m[(3, 3)] = 1.0 / sim.scale();
        m
    }

    #[test]
    fn test_sim3_identity() {
        let sim = Sim3::identity();
        assert_eq!(sim.translation(), Vector3::zeros());
        assert_eq!(sim.scale(), 1.0);
        assert!(sim.rotation_so3().equals(&SO3::identity(), 0.0));
        assert_eq!(Sim3::default(), sim);
    }

    #[test]
    fn test_sim3_matrix_scenario() {
        let sim = Sim3::from_components(Vector3::new(1.0, 2.0, 3.0), SO3::identity(), 2.0);
        let expected = Matrix4::new(
            2.0, 0.0, 0.0, 1.0, //
            0.0, 2.0, 0.0, 2.0, //
            0.0, 0.0, 2.0, 3.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        assert_eq!(sim.matrix(), expected);
        assert_eq!(
            sim.transform_from(&Vector3::zeros(), None, None),
            Vector3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    #[should_panic(expected = "Scale must be positive")]
    fn test_sim3_new_zero_scale_panics() {
        Sim3::new(Vector3::zeros(), UnitQuaternion::identity(), 0.0);
    }

    #[test]
    fn test_sim3_try_new_rejects_invalid_scale() {
        assert!(matches!(
            Sim3::try_new(SO3::identity(), Vector3::zeros(), 0.0),
            Err(ManifoldError::InvalidElement(_))
        ));
        assert!(Sim3::try_new(SO3::identity(), Vector3::zeros(), -1.0).is_err());
        assert!(Sim3::try_new(SO3::identity(), Vector3::zeros(), f64::NAN).is_err());
        assert!(Sim3::try_new(SO3::identity(), Vector3::zeros(), 0.5).is_ok());
    }

    #[test]
    fn test_sim3_inverse_involution() {
        for _ in 0..20 {
            let sim = Sim3::random();
            let inv = sim.inverse(None);
            assert!(inv.inverse(None).equals(&sim, TOLERANCE));
            assert!((&sim * &inv).equals(&Sim3::identity(), TOLERANCE));
            assert!((&inv * &sim).equals(&Sim3::identity(), TOLERANCE));
        }
    }

    #[test]
    fn test_sim3_compose_associative() {
        for _ in 0..20 {
            let (x, y, z) = (Sim3::random(), Sim3::random(), Sim3::random());
            let left = &(&x * &y) * &z;
            let right = &x * &(&y * &z);
            assert!(left.equals(&right, TOLERANCE));
        }
    }

    #[test]
    fn test_sim3_identity_laws() {
        let sim = sample();
        assert!((&sim * &Sim3::identity()).equals(&sim, TOLERANCE));
        assert!((&Sim3::identity() * &sim).equals(&sim, TOLERANCE));
    }

    #[test]
    fn test_sim3_compose_matches_group_matrix() {
        let a = sample();
        let b = Sim3::random();
        let product = group_matrix(&(&a * &b));
        assert!((product - group_matrix(&a) * group_matrix(&b)).norm() < TOLERANCE);
        assert!(((&a * &b).scale() - a.scale() * b.scale()).abs() < TOLERANCE);
    }

    #[test]
    fn test_sim3_exp_log_roundtrip() {
        for _ in 0..20 {
            let tangent = Sim3Tangent::random();
            let recovered = Sim3::logmap(&Sim3::expmap(&tangent));
            assert!(tangent.is_approx(&recovered, TOLERANCE));
        }
    }

    #[test]
    fn test_sim3_log_exp_roundtrip() {
        let sim = Sim3::from_components(
            Vector3::new(0.1, -0.05, 0.2),
            SO3::from_euler_angles(0.05, 0.02, -0.04),
            1.03,
        );
        assert!(Sim3::expmap(&Sim3::logmap(&sim)).equals(&sim, TOLERANCE));

        for _ in 0..20 {
            let sim = Sim3::random();
            assert!(sim.log().exp().equals(&sim, 1e-8));
        }
    }

    #[test]
    fn test_sim3_expmap_matches_matrix_exponential() {
        let tangents = [
            Sim3Tangent::new(Vector3::new(0.3, -0.6, 0.2), Vector3::new(1.0, 0.5, -0.7), 0.4),
            Sim3Tangent::new(Vector3::new(1.2, 0.4, -0.9), Vector3::new(-0.3, 2.0, 0.1), -0.8),
            Sim3Tangent::new(Vector3::new(0.001, 0.0, 0.002), Vector3::new(0.5, 0.5, 0.5), 0.003),
        ];
        for tangent in &tangents {
            let expected = tangent.hat().exp();
            let actual = group_matrix(&Sim3::expmap(tangent));
            assert!(
                (actual - expected).norm() < 1e-9,
                "expmap mismatch for {tangent}"
            );
        }
    }

    #[test]
    fn test_sim3_expmap_degenerate_generators_are_finite() {
        let u = Vector3::new(1.0, -2.0, 0.5);
        let cases = [
            Sim3Tangent::new(Vector3::zeros(), u, 0.0),
            Sim3Tangent::new(Vector3::zeros(), u, 0.7),
            Sim3Tangent::new(Vector3::new(0.2, 0.1, -0.3), u, 0.0),
        ];
        for tangent in &cases {
            let sim = Sim3::expmap(tangent);
            assert!(sim.is_valid(1e-12), "non-finite expmap for {tangent}");
            assert!(Sim3::logmap(&sim).is_approx(tangent, TOLERANCE));
        }

        // θ = 0, λ = 0 is a pure translation
        let pure = Sim3::expmap(&cases[0]);
        assert!((pure.translation() - u).norm() < TOLERANCE);
        assert_eq!(pure.scale(), 1.0);
    }

    #[test]
    fn test_sim3_series_accurate_at_thresholds() {
        let u = Vector3::new(0.3, 0.2, -0.1);
        let omega = Vector3::new(0.2, -0.1, 0.2);
        let mut tangents = Vec::new();

        // Either side of |λ| = 1e-2, with and without rotation
        for lambda in [0.99e-2, 1.01e-2, -0.99e-2, -1.01e-2] {
            tangents.push(Sim3Tangent::new(Vector3::zeros(), u, lambda));
            tangents.push(Sim3Tangent::new(omega, u, lambda));
        }
        // Either side of θ² = 1e-4
        for theta in [0.99e-2, 1.01e-2] {
            tangents.push(Sim3Tangent::new(Vector3::new(theta, 0.0, 0.0), u, 0.5));
            tangents.push(Sim3Tangent::new(Vector3::new(0.0, theta, 0.0), u, 0.0));
        }

        for tangent in &tangents {
            let expected = tangent.hat().exp();
            let actual = group_matrix(&Sim3::expmap(tangent));
            assert!(
                (actual - expected).norm() < 1e-10,
                "series mismatch for {tangent}"
            );
            assert!(Sim3::logmap(&Sim3::expmap(tangent)).is_approx(tangent, 1e-10));
        }
    }

    #[test]
    fn test_sim3_tangent_adjoint_conjugation() {
        for _ in 0..10 {
            let sim = Sim3::random();
            let tangent = Sim3Tangent::random();
            let lhs = &(&sim * &tangent.exp()) * &sim.inverse(None);
            let rhs = Sim3Tangent::from(sim.tangent_adjoint() * tangent.coeffs()).exp();
            assert!(lhs.equals(&rhs, 1e-9));
        }
    }

    #[test]
    fn test_sim3_compose_inverse_jacobians() {
        let a = sample();
        let b = Sim3::from_components(
            Vector3::new(-0.8, 0.3, 1.1),
            SO3::from_euler_angles(-0.4, 0.1, 0.6),
            0.6,
        );
        let mut j_a = Matrix7::zeros();
        let mut j_b = Matrix7::zeros();
        let mut j_inv = Matrix7::zeros();
        let ab = a.compose(&b, Some(&mut j_a), Some(&mut j_b));
        let a_inv = a.inverse(Some(&mut j_inv));
        assert_eq!(j_b, Matrix7::identity());

        let eps = 1e-6;
        for i in 0..7 {
            let mut delta = Vector7::zeros();
            delta[i] = eps;
            let plus = Sim3Tangent::from(delta);
            let minus = Sim3Tangent::from(-delta);

            let numeric = (ab.local_coordinates(&(&a.right_plus(&plus) * &b))
                - ab.local_coordinates(&(&a.right_plus(&minus) * &b)))
                / (2.0 * eps);
            let column = DVector::from_iterator(7, j_a.column(i).iter().copied());
            assert!((numeric - column).norm() < 1e-6, "compose column {i}");

            let numeric = (a_inv.local_coordinates(&a.right_plus(&plus).inverse(None))
                - a_inv.local_coordinates(&a.right_plus(&minus).inverse(None)))
                / (2.0 * eps);
            let column = DVector::from_iterator(7, j_inv.column(i).iter().copied());
            assert!((numeric - column).norm() < 1e-6, "inverse column {i}");
        }
    }

    #[test]
    fn test_sim3_transform_from_matches_matrix() {
        let sim = sample();
        for _ in 0..10 {
            let p = Vector3::new(
                rand::random::<f64>() * 4.0 - 2.0,
                rand::random::<f64>() * 4.0 - 2.0,
                rand::random::<f64>() * 4.0 - 2.0,
            );
            let homogeneous = sim.matrix() * Vector4::new(p.x, p.y, p.z, 1.0);
            let transformed = &sim * &p;
            assert!((transformed - homogeneous.fixed_rows::<3>(0)).norm() < TOLERANCE);
        }
    }

    #[test]
    fn test_sim3_transform_from_jacobians() {
        let sim = sample();
        let p = Vector3::new(0.7, -0.3, 1.9);
        let mut h_self = Matrix3x7::zeros();
        let mut h_point = Matrix3::zeros();
        sim.transform_from(&p, Some(&mut h_self), Some(&mut h_point));

        let eps = 1e-6;
        for i in 0..3 {
            let mut dp = Vector3::zeros();
            dp[i] = eps;
            let numeric = (&sim * &(p + dp) - &sim * &(p - dp)) / (2.0 * eps);
            assert!((numeric - h_point.column(i)).norm() < 1e-7);
        }

        // Rotation and translation columns match the right perturbation x·Exp(δ)
        for i in 0..6 {
            let mut delta = Vector7::zeros();
            delta[i] = eps;
            let plus = sim.right_plus(&Sim3Tangent::from(delta));
            let minus = sim.right_plus(&Sim3Tangent::from(-delta));
            let numeric = (&plus * &p - &minus * &p) / (2.0 * eps);
            assert!((numeric - h_self.column(i)).norm() < 1e-6, "column {i}");
        }

        let rotated = sim.rotation_matrix() * p;
        assert!((h_self.column(6) - rotated).norm() < TOLERANCE);
    }

    #[test]
    fn test_sim3_adjoint_map_layout() {
        let sim = sample();
        let adjoint = sim.adjoint_map();
        let r = sim.rotation_matrix();
        let s = sim.scale();
        let t = sim.translation();

        assert!((adjoint.fixed_view::<3, 3>(0, 0) - s * r).norm() < TOLERANCE);
        assert!((adjoint.fixed_view::<3, 3>(0, 3) - s * skew(&t) * r).norm() < TOLERANCE);
        assert!((adjoint.fixed_view::<3, 1>(0, 6) + s * t).norm() < TOLERANCE);
        assert!((adjoint.fixed_view::<3, 3>(3, 3) - r).norm() < TOLERANCE);
        assert_eq!(adjoint.fixed_view::<3, 3>(3, 0).norm(), 0.0);
        assert_eq!(adjoint.fixed_view::<3, 1>(3, 6).norm(), 0.0);
        assert_eq!(adjoint.row(6).iter().sum::<f64>(), 1.0);
        assert_eq!(adjoint[(6, 6)], 1.0);
    }

    #[test]
    fn test_sim3_tiny_scale_inverse_is_finite() {
        let sim = Sim3::from_components(Vector3::new(3.0, -1.0, 2.0), SO3::random(), 1e-12);
        let inv = sim.inverse(None);
        assert!(inv.is_valid(1e-9));
        assert!((inv.scale() - 1e12).abs() < 1.0);
    }

    #[test]
    fn test_sim3_to_se3() {
        let sim = sample();
        let se3 = sim.to_se3();
        assert!((se3.translation() - sim.scale() * sim.translation()).norm() < TOLERANCE);
        assert!(se3.rotation_so3().equals(&sim.rotation_so3(), TOLERANCE));
        assert_eq!(SE3::from(&sim), se3);
    }

    #[test]
    fn test_sim3_equals_tolerance_band() {
        let sim = sample();
        let shifted = Sim3::from_components(
            sim.translation() + Vector3::new(1e-6, 0.0, 0.0),
            sim.rotation_so3(),
            sim.scale() + 1e-6,
        );
        assert!(sim.equals(&shifted, 1e-5));
        assert!(!sim.equals(&shifted, 1e-7));
        assert_ne!(sim, shifted);
    }

    #[test]
    fn test_sim3_from_scale_and_rotation_matrix() {
        let scaled = Sim3::from_scale(3.0);
        assert_eq!(
            scaled.transform_from(&Vector3::new(1.0, 1.0, 1.0), None, None),
            Vector3::new(3.0, 3.0, 3.0)
        );

        let r = SO3::from_euler_angles(0.1, 0.2, 0.3).rotation_matrix();
        let sim = Sim3::from_rotation_matrix(&r, Vector3::new(1.0, 0.0, 0.0), 0.5);
        assert!((sim.rotation_matrix() - r).norm() < 1e-12);
    }

    #[test]
    fn test_sim3_local_coordinates_chart() {
        let base = sample();
        let delta = DVector::from_vec(vec![0.01, -0.02, 0.03, 0.1, 0.0, -0.1, 0.05]);
        let moved = base.retract(&delta).unwrap();
        let recovered = base.local_coordinates(&moved);
        assert!((recovered - delta).norm() < TOLERANCE);
        assert!(base.retract(&DVector::zeros(6)).is_err());
        assert_eq!(base.tangent_dim(), 7);
    }

    #[test]
    fn test_sim3_origin_chart_aliases() {
        let tangent = Sim3Tangent::new(Vector3::new(0.1, 0.2, 0.3), Vector3::new(1.0, 0.0, 0.0), 0.2);
        assert_eq!(Sim3::retract_origin(&tangent), Sim3::expmap(&tangent));
        let sim = sample();
        assert_eq!(Sim3::local_origin(&sim), Sim3::logmap(&sim));
    }

    #[test]
    fn test_sim3_display() {
        let sim = Sim3::from_components(Vector3::new(1.0, 2.0, 3.0), SO3::identity(), 2.0);
        assert_eq!(
            sim.to_string(),
            "Sim3(translation: [1.0000, 2.0000, 3.0000], scale: 2.0000, rotation: [w: 1.0000, x: 0.0000, y: 0.0000, z: 0.0000])"
        );
    }
}
