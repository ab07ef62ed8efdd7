//! Expression tree nodes.
//!
//! - [`Leaf`]: reads one variable; its derivative is the identity.
//! - [`Constant`]: a fixed value with no derivatives.
//! - [`TransformFrom`]: applies a Sim(3) expression to a point expression.
//! - [`Compose`]: group composition of two expressions of the same type.
//! - [`Unary`] / [`Binary`]: user functions that report their own local Jacobians.

use crate::core::values::{Key, ValueType, Values};
use crate::core::{CoreError, CoreResult};
use crate::expression::{Expression, Partials, chain};
use crate::manifold::sim3::{Matrix3x7, Sim3};
use crate::manifold::{JacobianStorage, LieGroup, Tangent, rn::Rn};
use nalgebra::{DMatrix, Matrix3};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Variable lookup.
pub struct Leaf<T> {
    key: Key,
    dim: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ValueType> Leaf<T> {
    /// Leaf for a fixed-size manifold type.
    ///
    /// # Panics
    /// Panics for runtime-sized types such as `Rn`; use [`Leaf::with_dimension`].
    pub fn new(key: impl Into<Key>) -> Self {
        let dim = <T::TangentVector as Tangent<T>>::DIM;
        assert!(
            dim > 0,
            "{} has a runtime dimension, use Leaf::with_dimension",
            T::TYPE_NAME
        );
        Self::with_dimension(key, dim)
    }

    /// Leaf with an explicit tangent dimension.
    pub fn with_dimension(key: impl Into<Key>, dim: usize) -> Self {
        Leaf {
            key: key.into(),
            dim,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T> fmt::Debug for Leaf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf")
            .field("key", &self.key)
            .field("dim", &self.dim)
            .finish()
    }
}

impl<T: ValueType> Expression<T> for Leaf<T> {
    fn keys_and_dims(&self, out: &mut BTreeMap<Key, usize>) {
        out.insert(self.key.clone(), self.dim);
    }

    fn evaluate(&self, values: &Values, derivatives: bool) -> CoreResult<(T, Partials)> {
        let value = values.at::<T>(&self.key)?.clone();
        if !derivatives {
            return Ok((value, Vec::new()));
        }

        let actual = value.tangent_dim();
        if actual != self.dim {
            return Err(CoreError::DimensionMismatch(format!(
                "Variable '{}' has dimension {actual}, expression expects {}",
                self.key, self.dim
            ))
            .log());
        }
        Ok((value, vec![(self.key.clone(), DMatrix::identity(actual, actual))]))
    }
}

/// Fixed value.
#[derive(Debug, Clone)]
pub struct Constant<T> {
    value: T,
}

impl<T: LieGroup> Constant<T> {
    pub fn new(value: T) -> Self {
        Constant { value }
    }
}

impl<T: LieGroup> Expression<T> for Constant<T> {
    fn keys_and_dims(&self, _out: &mut BTreeMap<Key, usize>) {}

    fn evaluate(&self, _values: &Values, _derivatives: bool) -> CoreResult<(T, Partials)> {
        Ok((self.value.clone(), Vec::new()))
    }
}

/// s·R·p + t for a Sim(3) expression and a 3D point expression.
#[derive(Debug, Clone)]
pub struct TransformFrom {
    sim: Arc<dyn Expression<Sim3>>,
    point: Arc<dyn Expression<Rn>>,
}

impl TransformFrom {
    pub fn new(sim: Arc<dyn Expression<Sim3>>, point: Arc<dyn Expression<Rn>>) -> Self {
        TransformFrom { sim, point }
    }
}

impl Expression<Rn> for TransformFrom {
    fn keys_and_dims(&self, out: &mut BTreeMap<Key, usize>) {
        self.sim.keys_and_dims(out);
        self.point.keys_and_dims(out);
    }

    fn evaluate(&self, values: &Values, derivatives: bool) -> CoreResult<(Rn, Partials)> {
        let (sim, sim_partials) = self.sim.evaluate(values, derivatives)?;
        let (point, point_partials) = self.point.evaluate(values, derivatives)?;
        if point.dim() != 3 {
            return Err(CoreError::DimensionMismatch(format!(
                "TransformFrom expects a 3D point, got dimension {}",
                point.dim()
            ))
            .log());
        }
        let p = point.to_point3();

        if !derivatives {
            return Ok((Rn::from(sim.transform_from(&p, None, None)), Vec::new()));
        }

        let mut h_sim = Matrix3x7::zeros();
        let mut h_point = Matrix3::zeros();
        let transformed = sim.transform_from(&p, Some(&mut h_sim), Some(&mut h_point));

        let mut partials = chain(
            &DMatrix::from_column_slice(3, 7, h_sim.as_slice()),
            sim_partials,
        );
        partials.extend(chain(
            &DMatrix::from_column_slice(3, 3, h_point.as_slice()),
            point_partials,
        ));
        Ok((Rn::from(transformed), partials))
    }
}

/// Group composition a ∘ b.
///
/// Local Jacobians come from [`LieGroup::compose`]: Ad(b⁻¹) for `a` and the identity
/// for `b`.
#[derive(Debug, Clone)]
pub struct Compose<T: LieGroup> {
    lhs: Arc<dyn Expression<T>>,
    rhs: Arc<dyn Expression<T>>,
}

/// Composition of two Sim(3) expressions.
pub type SimCompose = Compose<Sim3>;

impl<T: LieGroup> Compose<T> {
    pub fn new(lhs: Arc<dyn Expression<T>>, rhs: Arc<dyn Expression<T>>) -> Self {
        Compose { lhs, rhs }
    }
}

impl<T: LieGroup> Expression<T> for Compose<T> {
    fn keys_and_dims(&self, out: &mut BTreeMap<Key, usize>) {
        self.lhs.keys_and_dims(out);
        self.rhs.keys_and_dims(out);
    }

    fn evaluate(&self, values: &Values, derivatives: bool) -> CoreResult<(T, Partials)> {
        let (a, a_partials) = self.lhs.evaluate(values, derivatives)?;
        let (b, b_partials) = self.rhs.evaluate(values, derivatives)?;
        if !derivatives {
            return Ok((a.compose(&b, None, None), Vec::new()));
        }

        let mut h_a = T::JacobianMatrix::zeroed();
        let mut h_b = T::JacobianMatrix::zeroed();
        let composed = a.compose(&b, Some(&mut h_a), Some(&mut h_b));

        let mut partials = chain(&h_a.to_dmatrix(), a_partials);
        partials.extend(chain(&h_b.to_dmatrix(), b_partials));
        Ok((composed, partials))
    }
}

/// Function of one sub-expression.
///
/// The function receives the input value and, when derivatives are needed, a matrix
/// to overwrite with ∂output/∂input (`dim(T)` × `dim(A)`).
pub type UnaryFn<A, T> = dyn Fn(&A, Option<&mut DMatrix<f64>>) -> T + Send + Sync;

/// Function of two sub-expressions with their local Jacobians.
pub type BinaryFn<A, B, T> =
    dyn Fn(&A, &B, Option<&mut DMatrix<f64>>, Option<&mut DMatrix<f64>>) -> T + Send + Sync;

pub struct Unary<A: LieGroup, T: LieGroup> {
    input: Arc<dyn Expression<A>>,
    function: Arc<UnaryFn<A, T>>,
}

impl<A: LieGroup, T: LieGroup> Unary<A, T> {
    pub fn new(function: Arc<UnaryFn<A, T>>, input: Arc<dyn Expression<A>>) -> Self {
        Unary { input, function }
    }
}

impl<A: LieGroup, T: LieGroup> fmt::Debug for Unary<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unary")
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl<A: LieGroup, T: LieGroup> Expression<T> for Unary<A, T> {
    fn keys_and_dims(&self, out: &mut BTreeMap<Key, usize>) {
        self.input.keys_and_dims(out);
    }

    fn evaluate(&self, values: &Values, derivatives: bool) -> CoreResult<(T, Partials)> {
        let (a, a_partials) = self.input.evaluate(values, derivatives)?;
        if !derivatives {
            return Ok(((self.function)(&a, None), Vec::new()));
        }

        let mut h = DMatrix::zeros(0, 0);
        let value = (self.function)(&a, Some(&mut h));
        Ok((value, chain(&h, a_partials)))
    }
}

pub struct Binary<A: LieGroup, B: LieGroup, T: LieGroup> {
    lhs: Arc<dyn Expression<A>>,
    rhs: Arc<dyn Expression<B>>,
    function: Arc<BinaryFn<A, B, T>>,
}

impl<A: LieGroup, B: LieGroup, T: LieGroup> Binary<A, B, T> {
    pub fn new(
        function: Arc<BinaryFn<A, B, T>>,
        lhs: Arc<dyn Expression<A>>,
        rhs: Arc<dyn Expression<B>>,
    ) -> Self {
        Binary { lhs, rhs, function }
    }
}

impl<A: LieGroup, B: LieGroup, T: LieGroup> fmt::Debug for Binary<A, B, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binary")
            .field("lhs", &self.lhs)
            .field("rhs", &self.rhs)
            .finish_non_exhaustive()
    }
}

impl<A: LieGroup, B: LieGroup, T: LieGroup> Expression<T> for Binary<A, B, T> {
    fn keys_and_dims(&self, out: &mut BTreeMap<Key, usize>) {
        self.lhs.keys_and_dims(out);
        self.rhs.keys_and_dims(out);
    }

    fn evaluate(&self, values: &Values, derivatives: bool) -> CoreResult<(T, Partials)> {
        let (a, a_partials) = self.lhs.evaluate(values, derivatives)?;
        let (b, b_partials) = self.rhs.evaluate(values, derivatives)?;
        if !derivatives {
            return Ok(((self.function)(&a, &b, None, None), Vec::new()));
        }

        let mut h_a = DMatrix::zeros(0, 0);
        let mut h_b = DMatrix::zeros(0, 0);
        let value = (self.function)(&a, &b, Some(&mut h_a), Some(&mut h_b));
        let mut partials = chain(&h_a, a_partials);
        partials.extend(chain(&h_b, b_partials));
        Ok((value, partials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::JacobianMap;
    use crate::manifold::so3::SO3;
    use nalgebra::{DVector, Vector3};

    fn sample_values() -> Values {
        let mut values = Values::new();
        values.insert(
            "x",
            Sim3::from_components(
                Vector3::new(0.5, -0.2, 1.0),
                SO3::from_euler_angles(0.1, 0.2, -0.3),
                1.5,
            ),
        );
        values.insert(
            "y",
            Sim3::from_components(
                Vector3::new(-1.0, 0.3, 0.2),
                SO3::from_euler_angles(-0.4, 0.1, 0.6),
                0.8,
            ),
        );
        values.insert("p", Rn::from(Vector3::new(1.0, 2.0, -1.0)));
        values
    }

    #[test]
    fn test_leaf_identity_partial() {
        let leaf = Leaf::<Sim3>::new("x");
        let (value, partials) = leaf.evaluate(&sample_values(), true).unwrap();
        assert_eq!(value.scale(), 1.5);
        assert_eq!(partials.len(), 1);
        assert_eq!(partials[0].0, "x");
        assert_eq!(partials[0].1, DMatrix::identity(7, 7));
    }

    #[test]
    #[should_panic(expected = "runtime dimension")]
    fn test_leaf_rn_needs_dimension() {
        let _ = Leaf::<Rn>::new("p");
    }

    #[test]
    fn test_leaf_errors() {
        let values = sample_values();
        assert!(matches!(
            Leaf::<Sim3>::new("missing").value(&values),
            Err(CoreError::Variable(_))
        ));
        assert!(matches!(
            Leaf::<Rn>::with_dimension("p", 2).evaluate(&values, true),
            Err(CoreError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_constant_has_no_keys() {
        let constant = Constant::new(Sim3::from_scale(3.0));
        assert!(constant.keys().is_empty());
        let (value, partials) = constant.evaluate(&Values::new(), true).unwrap();
        assert_eq!(value.scale(), 3.0);
        assert!(partials.is_empty());
    }

    #[test]
    fn test_transform_from_partials() {
        let values = sample_values();
        let expr = TransformFrom::new(
            Arc::new(Leaf::<Sim3>::new("x")),
            Arc::new(Leaf::<Rn>::with_dimension("p", 3)),
        );
        assert_eq!(expr.keys(), vec!["p".to_string(), "x".to_string()]);
        assert_eq!(expr.dimensions(), vec![3, 7]);

        let (value, partials) = expr.evaluate(&values, true).unwrap();
        let sim = values.at::<Sim3>("x").unwrap();
        let p = values.at::<Rn>("p").unwrap().to_point3();
        let mut h_sim = Matrix3x7::zeros();
        let mut h_point = Matrix3::zeros();
        let expected = sim.transform_from(&p, Some(&mut h_sim), Some(&mut h_point));

        assert!((value.to_point3() - expected).norm() < 1e-12);
        let by_key: BTreeMap<_, _> = partials.into_iter().collect();
        assert!((&by_key["x"] - DMatrix::from_column_slice(3, 7, h_sim.as_slice())).norm() < 1e-12);
        assert!((&by_key["p"] - DMatrix::from_column_slice(3, 3, h_point.as_slice())).norm() < 1e-12);
    }

    #[test]
    fn test_transform_from_rejects_non_3d_point() {
        let mut values = sample_values();
        values.insert("q", Rn::from_vec(vec![1.0, 2.0]));
        let expr = TransformFrom::new(
            Arc::new(Leaf::<Sim3>::new("x")),
            Arc::new(Leaf::<Rn>::with_dimension("q", 2)),
        );
        assert!(matches!(
            expr.value(&values),
            Err(CoreError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_sim_compose_first_order() {
        let values = sample_values();
        let expr = SimCompose::new(
            Arc::new(Leaf::<Sim3>::new("x")),
            Arc::new(Leaf::<Sim3>::new("y")),
        );
        let (composed, partials) = expr.evaluate(&values, true).unwrap();
        let by_key: BTreeMap<_, _> = partials.into_iter().collect();

        let x = values.at::<Sim3>("x").unwrap();
        let y = values.at::<Sim3>("y").unwrap();
        let delta = DVector::from_vec(vec![1e-5, -2e-5, 1e-5, 3e-5, 0.0, -1e-5, 2e-5]);

        // (x ⊞ δ)·y ≈ (x·y) ⊞ (Hₓ δ)
        let moved = &x.retract(&delta).unwrap() * y;
        let predicted = composed.retract(&(&by_key["x"] * &delta)).unwrap();
        assert!(moved.local_coordinates(&predicted).norm() < 1e-8);

        let moved = x * &y.retract(&delta).unwrap();
        let predicted = composed.retract(&(&by_key["y"] * &delta)).unwrap();
        assert!(moved.local_coordinates(&predicted).norm() < 1e-8);
    }

    #[test]
    fn test_compose_rhs_jacobian_is_identity() {
        // ∂(a·b)/∂b is the identity, independent of how large a's translation or scale is
        let mut values = sample_values();
        values.insert(
            "y",
            Sim3::from_components(
                Vector3::new(1.0e4, -2.0e3, 5.0e3),
                SO3::from_euler_angles(0.7, -0.2, 1.1),
                50.0,
            ),
        );
        let lhs = Sim3::from_components(
            Vector3::new(-3.0e3, 8.0e3, 1.0e4),
            SO3::from_euler_angles(-0.5, 0.3, 0.2),
            40.0,
        );
        let expr = SimCompose::new(Arc::new(Constant::new(lhs)), Arc::new(Leaf::<Sim3>::new("y")));
        let (_, partials) = expr.evaluate(&values, true).unwrap();
        assert_eq!(partials.len(), 1);
        assert_eq!(partials[0].1, DMatrix::<f64>::identity(7, 7));
    }

    #[test]
    fn test_compose_generic_over_groups() {
        let mut values = Values::new();
        values.insert("a", Rn::from_vec(vec![1.0, 2.0]));
        values.insert("b", Rn::from_vec(vec![-0.5, 4.0]));
        let expr = Compose::<Rn>::new(
            Arc::new(Leaf::<Rn>::with_dimension("a", 2)),
            Arc::new(Leaf::<Rn>::with_dimension("b", 2)),
        );
        let (sum, partials) = expr.evaluate(&values, true).unwrap();
        assert_eq!(sum.data(), &DVector::from_vec(vec![0.5, 6.0]));
        for (_, partial) in &partials {
            assert_eq!(partial, &DMatrix::<f64>::identity(2, 2));
        }
    }

    #[test]
    fn test_unary_chain_rule() {
        let values = sample_values();
        let double: Arc<UnaryFn<Rn, Rn>> = Arc::new(|p: &Rn, h: Option<&mut DMatrix<f64>>| {
            if let Some(h) = h {
                *h = DMatrix::identity(p.dim(), p.dim()) * 2.0;
            }
            Rn::new(p.data() * 2.0)
        });
        let expr = Unary::new(double, Arc::new(Leaf::<Rn>::with_dimension("p", 3)));

        let mut block = DMatrix::zeros(3, 3);
        let value = {
            let mut jacobians = JacobianMap::new();
            jacobians.insert("p", block.columns_mut(0, 3));
            expr.value_with_jacobians(&values, &mut jacobians).unwrap()
        };
        assert_eq!(value.to_point3(), Vector3::new(2.0, 4.0, -2.0));
        assert_eq!(block, DMatrix::identity(3, 3) * 2.0);
    }

    #[test]
    fn test_binary_repeated_key_accumulates() {
        let values = sample_values();
        let add: Arc<BinaryFn<Rn, Rn, Rn>> = Arc::new(
            |a: &Rn, b: &Rn, ha: Option<&mut DMatrix<f64>>, hb: Option<&mut DMatrix<f64>>| {
                a.compose(b, ha, hb)
            },
        );
        let leaf: Arc<dyn Expression<Rn>> = Arc::new(Leaf::<Rn>::with_dimension("p", 3));
        let expr = Binary::new(add, leaf.clone(), leaf);
        assert_eq!(expr.keys(), vec!["p".to_string()]);

        let mut block = DMatrix::zeros(3, 3);
        {
            let mut jacobians = JacobianMap::new();
            jacobians.insert("p", block.columns_mut(0, 3));
            expr.value_with_jacobians(&values, &mut jacobians).unwrap();
        }
        assert_eq!(block, DMatrix::identity(3, 3) * 2.0);
    }

    #[test]
    fn test_value_matches_value_with_jacobians() {
        let values = sample_values();
        let expr = SimCompose::new(
            Arc::new(Leaf::<Sim3>::new("x")),
            Arc::new(Leaf::<Sim3>::new("y")),
        );
        let plain = expr.value(&values).unwrap();
        let (with_partials, _) = expr.evaluate(&values, true).unwrap();
        assert_eq!(plain, with_partials);
        assert!(plain.log().to_vector().iter().all(|v| v.is_finite()));
    }
}
