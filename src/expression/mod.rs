//! Differentiable expressions over named variables.
//!
//! An [`Expression<T>`] computes a value of manifold type `T` from a [`Values`]
//! assignment, and optionally the partial derivatives of that value with respect to
//! every variable it reads. Derivatives are taken in the tangent spaces: the block for
//! key `k` has `dim(T)` rows and `dim(k)` columns.
//!
//! Expressions are trees of nodes. Leaves read variables, constants inject fixed
//! values, and function nodes combine sub-expressions with the chain rule. Internally
//! each node propagates forward-mode partials as a list of `(key, matrix)` pairs; the
//! public entry point [`Expression::value_with_jacobians`] adds those partials into
//! caller-provided blocks held by a [`JacobianMap`].
//!
//! ```
//! use std::sync::Arc;
//! use lie_factors::core::values::Values;
//! use lie_factors::expression::{Expression, Leaf, TransformFrom};
//! use lie_factors::manifold::{rn::Rn, sim3::Sim3};
//! use nalgebra::Vector3;
//!
//! let pose: Arc<dyn Expression<Sim3>> = Arc::new(Leaf::<Sim3>::new("x"));
//! let point: Arc<dyn Expression<Rn>> = Arc::new(Leaf::<Rn>::with_dimension("p", 3));
//! let transformed = TransformFrom::new(pose, point);
//! assert_eq!(transformed.keys(), vec!["p".to_string(), "x".to_string()]);
//! assert_eq!(transformed.dimensions(), vec![3, 7]);
//!
//! let mut values = Values::new();
//! values.insert("x", Sim3::from_scale(2.0));
//! values.insert("p", Rn::from(Vector3::new(1.0, 0.0, 0.0)));
//! let value = transformed.value(&values).unwrap();
//! assert_eq!(value.to_point3(), Vector3::new(2.0, 0.0, 0.0));
//! ```

pub mod nodes;

pub use nodes::{Binary, BinaryFn, Compose, Constant, Leaf, SimCompose, TransformFrom, Unary, UnaryFn};

use crate::core::CoreResult;
use crate::core::values::{Key, Values};
use crate::manifold::LieGroup;
use nalgebra::{DMatrix, DMatrixViewMut};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Forward-mode partial derivatives of a node's output, one entry per key occurrence.
///
/// A key reached through several branches appears several times; consumers add the
/// entries up.
pub type Partials = Vec<(Key, DMatrix<f64>)>;

/// Mutable Jacobian blocks keyed by variable, borrowed for one evaluation.
#[derive(Debug, Default)]
pub struct JacobianMap<'a> {
    blocks: BTreeMap<Key, DMatrixViewMut<'a, f64>>,
}

impl<'a> JacobianMap<'a> {
    pub fn new() -> Self {
        JacobianMap {
            blocks: BTreeMap::new(),
        }
    }

    /// Register the output block for `key`.
    pub fn insert(&mut self, key: impl Into<Key>, block: DMatrixViewMut<'a, f64>) {
        self.blocks.insert(key.into(), block);
    }

    pub fn get(&self, key: &str) -> Option<&DMatrixViewMut<'a, f64>> {
        self.blocks.get(key)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Add `partial` into the block of `key`. Keys without a block are skipped.
    ///
    /// # Panics
    /// Panics if the block shape differs from the partial's shape.
    pub fn accumulate(&mut self, key: &str, partial: &DMatrix<f64>) {
        if let Some(block) = self.blocks.get_mut(key) {
            assert_eq!(
                block.shape(),
                partial.shape(),
                "Jacobian block for '{key}' has the wrong shape"
            );
            *block += partial;
        }
    }
}

/// A differentiable computation producing a value of type `T`.
pub trait Expression<T: LieGroup>: Debug + Send + Sync {
    /// Collect every key this expression reads, with its tangent dimension.
    fn keys_and_dims(&self, out: &mut BTreeMap<Key, usize>);

    /// Evaluate the value and, when `derivatives` is set, its forward-mode partials.
    fn evaluate(&self, values: &Values, derivatives: bool) -> CoreResult<(T, Partials)>;

    /// Keys in sorted order; this order defines the Jacobian block order.
    fn keys(&self) -> Vec<Key> {
        let mut map = BTreeMap::new();
        self.keys_and_dims(&mut map);
        map.into_keys().collect()
    }

    /// Tangent dimensions aligned with [`Expression::keys`].
    fn dimensions(&self) -> Vec<usize> {
        let mut map = BTreeMap::new();
        self.keys_and_dims(&mut map);
        map.into_values().collect()
    }

    /// Value only.
    fn value(&self, values: &Values) -> CoreResult<T> {
        self.evaluate(values, false).map(|(value, _)| value)
    }

    /// Value, adding the partial derivative for each key into its block in `jacobians`.
    fn value_with_jacobians(&self, values: &Values, jacobians: &mut JacobianMap) -> CoreResult<T> {
        let (value, partials) = self.evaluate(values, true)?;
        for (key, partial) in &partials {
            jacobians.accumulate(key, partial);
        }
        Ok(value)
    }
}

/// Propagate input partials through a local Jacobian `h` (∂output/∂input).
pub(crate) fn chain(h: &DMatrix<f64>, partials: Partials) -> Partials {
    partials
        .into_iter()
        .map(|(key, partial)| {
            assert_eq!(
                h.ncols(),
                partial.nrows(),
                "Local Jacobian does not match the input dimension of '{key}'"
            );
            (key, h * partial)
        })
        .collect()
}
