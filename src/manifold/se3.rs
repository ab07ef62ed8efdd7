//! SE(3) - Special Euclidean Group in 3D
//!
//! This module implements the Special Euclidean group SE(3), which represents
//! rigid body transformations in 3D space (rotation + translation). It is the
//! target of the lossy Sim(3) → SE(3) projection.
//!
//! SE(3) elements are represented as a combination of SO(3) rotation and Vector3 translation.
//! SE(3) tangent elements are represented as [rho(3), theta(3)] = 6 components,
//! where rho is the translational component and theta is the rotational component.

use crate::manifold::so3::{SO3, SO3Tangent};
use crate::manifold::{LieGroup, Tangent};
use nalgebra::{DVector, Matrix3, Matrix4, Matrix6, UnitQuaternion, Vector3, Vector6};
use std::fmt;

/// SE(3) group element representing rigid body transformations in 3D.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3 {
    /// Rotation part as SO(3) element
    rotation: SO3,
    /// Translation part as Vector3
    translation: Vector3<f64>,
}

impl fmt::Display for SE3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation;
        let q = self.rotation.quaternion();
        write!(
            f,
            "SE3(translation: [{:.4}, {:.4}, {:.4}], rotation: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

/// SE(3) tangent space element, stored as [rho, theta].
#[derive(Clone, Debug, PartialEq)]
pub struct SE3Tangent {
    /// Internal data: [rho_x, rho_y, rho_z, theta_x, theta_y, theta_z]
    data: Vector6<f64>,
}

impl fmt::Display for SE3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rho = self.rho();
        let theta = self.theta();
        write!(
            f,
            "se3(rho: [{:.4}, {:.4}, {:.4}], theta: [{:.4}, {:.4}, {:.4}])",
            rho.x, rho.y, rho.z, theta.x, theta.y, theta.z
        )
    }
}

impl Default for SE3 {
    fn default() -> Self {
        SE3::identity()
    }
}

impl SE3 {
    /// Create a new SE3 element from translation and rotation.
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        SE3 {
            rotation: SO3::new(rotation),
            translation,
        }
    }

    /// Identity transformation.
    pub fn identity() -> Self {
        SE3 {
            rotation: SO3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Create SE3 from translation components and Euler angles.
    pub fn from_translation_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        let translation = Vector3::new(x, y, z);
        let rotation = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
        Self::new(translation, rotation)
    }

    /// Create SE3 from SO3 and Vector3 components.
    pub fn from_translation_so3(translation: Vector3<f64>, rotation: SO3) -> Self {
        SE3 {
            rotation,
            translation,
        }
    }

    /// Get the translation part as a Vector3.
    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    /// Get the rotation part as SO3.
    pub fn rotation_so3(&self) -> SO3 {
        self.rotation.clone()
    }

    /// Get the rotation part as a 3x3 matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.rotation_matrix()
    }

    /// Get the transformation matrix (4x4 homogeneous matrix).
    pub fn matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.rotation_matrix());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Transform a point: R·p + t.
    pub fn transform_from(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.act(point, None, None) + self.translation
    }
}

impl LieGroup for SE3 {
    type TangentVector = SE3Tangent;
    type JacobianMatrix = Matrix6<f64>;
    type LieAlgebra = Matrix4<f64>;

    /// M⁻¹ = [Rᵀ  -Rᵀt; 0 1], with J = -Ad(M)
    fn inverse(&self, jacobian: Option<&mut Matrix6<f64>>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        let rotation_inv = self.rotation.inverse(None);
        let translation_inv = -rotation_inv.act(&self.translation, None, None);
        SE3::from_translation_so3(translation_inv, rotation_inv)
    }

    /// M₁M₂ = [R₁R₂  R₁t₂ + t₁; 0 1]
    ///
    /// J_self = Ad(M₂⁻¹), J_other = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Matrix6<f64>>,
        jacobian_other: Option<&mut Matrix6<f64>>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).adjoint();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix6::identity();
        }
        let rotation = self.rotation.compose(&other.rotation, None, None);
        let translation = self.rotation.act(&other.translation, None, None) + self.translation;
        SE3::from_translation_so3(translation, rotation)
    }

    /// τ = [ρ; θ] with θ = Log(R) and ρ = J_l⁻¹(θ)·t
    fn log(&self) -> SE3Tangent {
        let theta = self.rotation.log();
        let rho = theta.left_jacobian_inv() * self.translation;
        SE3Tangent::new(rho, theta.coeffs())
    }

    /// Ad(M) = [R  [t]ₓR; 0 R]
    fn adjoint(&self) -> Matrix6<f64> {
        let rotation_matrix = self.rotation_matrix();
        let mut adjoint_matrix = Matrix6::zeros();
        adjoint_matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_matrix);
        adjoint_matrix
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&rotation_matrix);
        let top_right = SO3Tangent::new(self.translation).hat() * rotation_matrix;
        adjoint_matrix
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&top_right);
        adjoint_matrix
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();

        let translation = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        SE3::from_translation_so3(translation, SO3::random())
    }

    fn normalize(&mut self) {
        self.rotation.normalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        self.rotation.is_valid(tolerance) && self.translation.iter().all(|x| x.is_finite())
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.right_minus(other).is_zero(tolerance)
    }
}

impl SE3Tangent {
    /// Create a new SE3Tangent from rho (translational) and theta (rotational) components.
    pub fn new(rho: Vector3<f64>, theta: Vector3<f64>) -> Self {
        let mut data = Vector6::zeros();
        data.fixed_rows_mut::<3>(0).copy_from(&rho);
        data.fixed_rows_mut::<3>(3).copy_from(&theta);
        SE3Tangent { data }
    }

    /// Get the rho (translational) part.
    pub fn rho(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    /// Get the theta (rotational) part.
    pub fn theta(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }
}

impl Tangent<SE3> for SE3Tangent {
    const DIM: usize = 6;

    /// M = exp(τ) = [Exp(θ)  J_l(θ)ρ; 0 1]
    fn exp(&self) -> SE3 {
        let theta = SO3Tangent::new(self.theta());
        let translation = theta.left_jacobian() * self.rho();
        SE3::from_translation_so3(translation, theta.exp())
    }

    /// [θ]ₓ in the top-left block, ρ in the last column.
    fn hat(&self) -> Matrix4<f64> {
        let mut lie_alg = Matrix4::zeros();
        lie_alg
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&SO3Tangent::new(self.theta()).hat());
        lie_alg.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.rho());
        lie_alg
    }

    fn zero() -> Self {
        SE3Tangent::new(Vector3::zeros(), Vector3::zeros())
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        SE3Tangent {
            data: Vector6::from_fn(|_, _| rng.random_range(-0.5..0.5)),
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
        SE3Tangent {
            data: Vector6::from_column_slice(&data.as_slice()[..6]),
        }
    }
}
