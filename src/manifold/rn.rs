//! Rn - n-dimensional Euclidean Space
//!
//! This module implements the n-dimensional Euclidean space Rⁿ with vector addition
//! as the group operation. It is the value type of points and generic vector
//! measurements.
//!
//! Rⁿ elements are represented using nalgebra's DVector<f64> for dynamic sizing.
//! Rⁿ tangent elements are also represented as DVector<f64> since the tangent space
//! is isomorphic to the manifold itself.

use crate::manifold::{LieGroup, Tangent};
use nalgebra::{DMatrix, DVector, Vector3};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// Rⁿ group element representing n-dimensional Euclidean vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct Rn {
    /// Internal representation as a dynamic vector
    data: DVector<f64>,
}

impl Display for Rn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Rn(dim: {}, data: [", self.data.len())?;
        for (i, val) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.4}", val)?;
        }
        write!(f, "])")
    }
}

impl From<DVector<f64>> for Rn {
    fn from(data: DVector<f64>) -> Self {
        Rn::new(data)
    }
}

impl From<Vector3<f64>> for Rn {
    fn from(point: Vector3<f64>) -> Self {
        Rn::from_slice(point.as_slice())
    }
}

impl From<Rn> for DVector<f64> {
    fn from(rn: Rn) -> Self {
        rn.data
    }
}

/// Rⁿ tangent space element.
#[derive(Clone, Debug, PartialEq)]
pub struct RnTangent {
    /// Internal data: n-dimensional vector
    data: DVector<f64>,
}

impl Rn {
    /// Create a new Rⁿ element from a vector.
    pub fn new(data: DVector<f64>) -> Self {
        Rn { data }
    }

    /// Create Rⁿ from a slice.
    pub fn from_slice(slice: &[f64]) -> Self {
        Rn::new(DVector::from_row_slice(slice))
    }

    /// Create Rⁿ from owned components.
    pub fn from_vec(components: Vec<f64>) -> Self {
        Rn::new(DVector::from_vec(components))
    }

    /// Zero vector of the given dimension.
    pub fn zeros(dim: usize) -> Self {
        Rn::new(DVector::zeros(dim))
    }

    /// Get the underlying vector.
    pub fn data(&self) -> &DVector<f64> {
        &self.data
    }

    /// Get the dimension of the space.
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    /// View a 3-dimensional element as a point.
    ///
    /// # Panics
    /// Panics if the element is not 3-dimensional.
    pub fn to_point3(&self) -> Vector3<f64> {
        assert_eq!(self.data.len(), 3, "Rn element is not a 3D point");
        Vector3::new(self.data[0], self.data[1], self.data[2])
    }
}

impl LieGroup for Rn {
    type TangentVector = RnTangent;
    type JacobianMatrix = DMatrix<f64>;
    type LieAlgebra = DMatrix<f64>;

    /// For Euclidean space with addition: -v, with J = -I
    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self {
        if let Some(jac) = jacobian {
            let dim = self.data.len();
            *jac = -DMatrix::identity(dim, dim);
        }
        Rn::new(-&self.data)
    }

    /// For Euclidean space: v₁ + v₂, with both Jacobians I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self {
        assert_eq!(
            self.data.len(),
            other.data.len(),
            "Rn elements must have the same dimension for composition"
        );
        let dim = self.data.len();
        if let Some(jac_self) = jacobian_self {
            *jac_self = DMatrix::identity(dim, dim);
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = DMatrix::identity(dim, dim);
        }
        Rn::new(&self.data + &other.data)
    }

    /// For Euclidean space, log is identity: log(v) = v
    fn log(&self) -> RnTangent {
        RnTangent::new(self.data.clone())
    }

    /// For Euclidean space (abelian group), adjoint is identity.
    fn adjoint(&self) -> DMatrix<f64> {
        let dim = self.data.len();
        DMatrix::identity(dim, dim)
    }

    fn random() -> Self {
        let data = DVector::from_fn(3, |_, _| rand::random::<f64>() * 10.0 - 5.0);
        Rn::new(data)
    }

    fn normalize(&mut self) {}

    /// All finite vectors are valid in Euclidean space
    fn is_valid(&self, _tolerance: f64) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.data.len() == other.data.len() && (&self.data - &other.data).norm() < tolerance
    }

    /// v ⊞ δ = v + δ
    fn right_plus(&self, tangent: &RnTangent) -> Self {
        assert_eq!(
            self.data.len(),
            tangent.data.len(),
            "Rn element and tangent must have the same dimension"
        );
        Rn::new(&self.data + &tangent.data)
    }

    /// v₁ ⊟ v₂ = v₁ - v₂
    fn right_minus(&self, other: &Self) -> RnTangent {
        assert_eq!(
            self.data.len(),
            other.data.len(),
            "Rn elements must have the same dimension"
        );
        RnTangent::new(&self.data - &other.data)
    }

    fn tangent_dim(&self) -> usize {
        self.data.len()
    }
}

impl RnTangent {
    /// Create a new tangent vector.
    pub fn new(data: DVector<f64>) -> Self {
        RnTangent { data }
    }

    /// Get the underlying vector.
    pub fn data(&self) -> &DVector<f64> {
        &self.data
    }
}

impl Tangent<Rn> for RnTangent {
    // Runtime-sized; see `Rn::tangent_dim`
    const DIM: usize = 0;

    fn exp(&self) -> Rn {
        Rn::new(self.data.clone())
    }

    /// Rⁿ is abelian; its algebra element is the column vector itself.
    fn hat(&self) -> DMatrix<f64> {
        DMatrix::from_column_slice(self.data.len(), 1, self.data.as_slice())
    }

    fn zero() -> Self {
        RnTangent::new(DVector::zeros(3))
    }

    fn random() -> Self {
        RnTangent::new(DVector::from_fn(3, |_, _| rand::random::<f64>() * 2.0 - 1.0))
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.data.len() == other.data.len() && (&self.data - &other.data).norm() < tolerance
    }

    fn to_vector(&self) -> DVector<f64> {
        self.data.clone()
    }

    fn from_vector(data: &DVector<f64>) -> Self {
        RnTangent::new(data.clone())
    }
}
