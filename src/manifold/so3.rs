//! SO(3) - Special Orthogonal Group in 3D
//!
//! This module implements the Special Orthogonal group SO(3), which represents
//! rotations in 3D space.
//!
//! SO(3) elements are represented using nalgebra's UnitQuaternion internally.
//! SO(3) tangent elements are represented as axis-angle vectors in R³,
//! where the direction gives the axis of rotation and the magnitude gives the angle.

use crate::manifold::{LieGroup, Tangent, skew};
use nalgebra::{DVector, Matrix3, Quaternion, Rotation3, Unit, UnitQuaternion, Vector3};
use std::fmt;

/// SO(3) group element representing rotations in 3D.
///
/// Internally represented using nalgebra's UnitQuaternion<f64> for efficient rotations.
#[derive(Clone, Debug, PartialEq)]
pub struct SO3 {
    /// Internal representation as a unit quaternion
    quaternion: UnitQuaternion<f64>,
}

impl fmt::Display for SO3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "SO3(quaternion: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            q.w, q.i, q.j, q.k
        )
    }
}

/// SO(3) tangent space element representing elements in the Lie algebra so(3).
///
/// Internally represented as axis-angle vectors in R³ where:
/// - Direction: axis of rotation (unit vector)
/// - Magnitude: angle of rotation (radians)
#[derive(Clone, Debug, PartialEq)]
pub struct SO3Tangent {
    /// Internal data: axis-angle vector [θx, θy, θz]
    data: Vector3<f64>,
}

impl fmt::Display for SO3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "so3(axis-angle: [{:.4}, {:.4}, {:.4}])",
            self.data.x, self.data.y, self.data.z
        )
    }
}

impl SO3 {
    /// Create a new SO(3) element from a unit quaternion.
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Get the identity rotation.
    pub fn identity() -> Self {
        SO3 {
            quaternion: UnitQuaternion::identity(),
        }
    }

    /// Create SO(3) from Euler angles (roll, pitch, yaw).
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    /// Create SO(3) from axis-angle representation.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        let unit_axis = Unit::new_normalize(*axis);
        SO3::new(UnitQuaternion::from_axis_angle(&unit_axis, angle))
    }

    /// Create SO(3) from a 3x3 rotation matrix.
    ///
    /// The matrix is assumed orthonormal; it is re-orthonormalized through the
    /// quaternion conversion.
    pub fn from_rotation_matrix(matrix: &Matrix3<f64>) -> Self {
        let rotation = Rotation3::from_matrix_unchecked(*matrix);
        SO3::new(UnitQuaternion::from_rotation_matrix(&rotation))
    }

    /// Get the quaternion representation.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    /// Get the rotation matrix (3x3).
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    /// Rotate a vector: R·v.
    ///
    /// # Arguments
    /// * `vector` - Vector to rotate
    /// * `jacobian_self` - Optional Jacobian ∂(R·v)/∂R = -R·[v]ₓ
    /// * `jacobian_vector` - Optional Jacobian ∂(R·v)/∂v = R
    pub fn act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Matrix3<f64>>,
        jacobian_vector: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        let result = self.quaternion * vector;

        if let Some(jac_self) = jacobian_self {
            *jac_self = -self.rotation_matrix() * skew(vector);
        }

        if let Some(jac_vector) = jacobian_vector {
            *jac_vector = self.rotation_matrix();
        }

        result
    }

    /// Elementwise matrix comparison with absolute tolerance.
    pub fn equals(&self, other: &SO3, tolerance: f64) -> bool {
        (self.rotation_matrix() - other.rotation_matrix())
            .iter()
            .all(|d| d.abs() <= tolerance)
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;
    type JacobianMatrix = Matrix3<f64>;
    type LieAlgebra = Matrix3<f64>;

    /// R⁻¹ = Rᵀ, for quaternions: q⁻¹ = q*
    ///
    /// J = -R
    fn inverse(&self, jacobian: Option<&mut Matrix3<f64>>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.rotation_matrix();
        }
        SO3 {
            quaternion: self.quaternion.inverse(),
        }
    }

    /// J_self = R₂ᵀ, J_other = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Matrix3<f64>>,
        jacobian_other: Option<&mut Matrix3<f64>>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.rotation_matrix().transpose();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }
        SO3 {
            quaternion: self.quaternion * other.quaternion,
        }
    }

    /// θu = Log(q) = (2 / ||v||) * v * arctan(||v||, w) ∈ R³
    ///
    /// The returned angle lies in [0, π].
    fn log(&self) -> SO3Tangent {
        let q = self.quaternion.quaternion();
        let sin_angle_squared = q.i * q.i + q.j * q.j + q.k * q.k;

        let log_coeff = if sin_angle_squared > f64::EPSILON {
            let sin_angle = sin_angle_squared.sqrt();
            let cos_angle = q.w;

            // q and -q encode the same rotation; pick the representative with angle <= π
            let two_angle = 2.0
                * if cos_angle < 0.0 {
                    f64::atan2(-sin_angle, -cos_angle)
                } else {
                    f64::atan2(sin_angle, cos_angle)
                };

            two_angle / sin_angle
        } else {
            // Small-angle approximation
            2.0 * q.w.signum()
        };

        SO3Tangent::new(Vector3::new(
            q.i * log_coeff,
            q.j * log_coeff,
            q.k * log_coeff,
        ))
    }

    fn adjoint(&self) -> Matrix3<f64> {
        self.rotation_matrix()
    }

    fn random() -> Self {
        SO3 {
            quaternion: UnitQuaternion::from_scaled_axis(Vector3::new(
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
            )),
        }
    }

    fn normalize(&mut self) {
        self.quaternion.renormalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        let q = self.quaternion.quaternion();
        (q.norm() - 1.0).abs() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.right_minus(other).is_zero(tolerance)
    }
}

impl SO3Tangent {
    /// Create a new SO3Tangent from axis-angle vector.
    pub fn new(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent { data: axis_angle }
    }

    /// Get the axis-angle vector.
    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }

    /// Get the angle of rotation.
    pub fn angle(&self) -> f64 {
        self.data.norm()
    }

    /// Left Jacobian of the exponential map.
    ///
    /// J_l(θ) = I + (1 - cos θ)/θ² [θ]ₓ + (θ - sin θ)/θ³ [θ]ₓ²
    pub fn left_jacobian(&self) -> Matrix3<f64> {
        let angle_squared = self.data.norm_squared();
        let tangent_skew = skew(&self.data);

        if angle_squared <= f64::EPSILON {
            Matrix3::identity() + 0.5 * tangent_skew
        } else {
            let theta = angle_squared.sqrt();
            Matrix3::identity()
                + (1.0 - theta.cos()) / angle_squared * tangent_skew
                + (theta - theta.sin()) / (angle_squared * theta) * tangent_skew * tangent_skew
        }
    }

    /// Inverse of the left Jacobian.
    ///
    /// J_l⁻¹(θ) = I - ½[θ]ₓ + (1/θ² - (1 + cos θ)/(2θ sin θ)) [θ]ₓ²
    pub fn left_jacobian_inv(&self) -> Matrix3<f64> {
        let angle_squared = self.data.norm_squared();
        let tangent_skew = skew(&self.data);

        if angle_squared <= f64::EPSILON {
            Matrix3::identity() - 0.5 * tangent_skew
        } else {
            let theta = angle_squared.sqrt();
            Matrix3::identity() - 0.5 * tangent_skew
                + (1.0 / angle_squared - (1.0 + theta.cos()) / (2.0 * theta * theta.sin()))
                    * tangent_skew
                    * tangent_skew
        }
    }
}

impl Tangent<SO3> for SO3Tangent {
    const DIM: usize = 3;

    /// q = Exp(θu) = cos(θ/2) + u sin(θ/2) ∈ H
    fn exp(&self) -> SO3 {
        let theta_squared = self.data.norm_squared();

        let quaternion = if theta_squared > f64::EPSILON {
            UnitQuaternion::from_scaled_axis(self.data)
        } else {
            UnitQuaternion::from_quaternion(Quaternion::new(
                1.0,
                self.data.x / 2.0,
                self.data.y / 2.0,
                self.data.z / 2.0,
            ))
        };

        SO3 { quaternion }
    }

    /// [θ]ₓ = [0 -θz θy; θz 0 -θx; -θy θx 0]
    fn hat(&self) -> Matrix3<f64> {
        skew(&self.data)
    }

    fn zero() -> Self {
        SO3Tangent::new(Vector3::zeros())
    }

    fn random() -> Self {
        SO3Tangent::new(Vector3::new(
            rand::random::<f64>() * 0.2 - 0.1,
            rand::random::<f64>() * 0.2 - 0.1,
            rand::random::<f64>() * 0.2 - 0.1,
        ))
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
        SO3Tangent::new(Vector3::new(data[0], data[1], data[2]))
    }
}
