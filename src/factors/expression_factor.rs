//! Factor built from a measurement and an expression predicting it.
//!
//! The unwhitened error is the measurement's local coordinates of the prediction,
//! `z.local_coordinates(h(x))`:
//! - Sim(3): `Logmap(z⁻¹ · h(x))`
//! - Rⁿ: `h(x) - z`
//!
//! The Jacobian blocks are the expression's derivatives of `h(x)` in its tangent
//! space, one block per key in sorted key order.

use crate::core::noise_model::{Constrained, SharedNoiseModel};
use crate::core::values::{Key, Values};
use crate::core::{CoreError, CoreResult};
use crate::expression::{Expression, JacobianMap};
use crate::factors::{JacobianFactor, NoiseModelFactor};
use crate::linalg::VerticalBlockMatrix;
use crate::manifold::LieGroup;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ExpressionFactor<T: LieGroup> {
    noise_model: SharedNoiseModel,
    measurement: T,
    expression: Arc<dyn Expression<T>>,
    keys: Vec<Key>,
    dims: Vec<usize>,
}

impl<T: LieGroup> ExpressionFactor<T> {
    /// Create a factor for `measurement` predicted by `expression`.
    ///
    /// Fails with [`CoreError::InvalidInput`] when the noise model is missing or its
    /// dimension differs from the tangent dimension of the measurement.
    pub fn new(
        noise_model: Option<SharedNoiseModel>,
        measurement: T,
        expression: Arc<dyn Expression<T>>,
    ) -> CoreResult<Self> {
        let noise_model = noise_model.ok_or_else(|| {
            CoreError::InvalidInput("ExpressionFactor: no NoiseModel.".to_string()).log()
        })?;
        if noise_model.dim() != measurement.tangent_dim() {
            return Err(CoreError::InvalidInput(
                "ExpressionFactor was created with a NoiseModel of incorrect dimension."
                    .to_string(),
            )
            .log());
        }

        let mut keys_and_dims = BTreeMap::new();
        expression.keys_and_dims(&mut keys_and_dims);
        let (keys, dims) = keys_and_dims.into_iter().unzip();

        Ok(ExpressionFactor {
            noise_model,
            measurement,
            expression,
            keys,
            dims,
        })
    }

    pub fn measurement(&self) -> &T {
        &self.measurement
    }

    pub fn expression(&self) -> &Arc<dyn Expression<T>> {
        &self.expression
    }

    /// Tangent dimension of each key, aligned with `keys()`.
    pub fn dimensions(&self) -> &[usize] {
        &self.dims
    }

    fn residual(&self, predicted: &T) -> CoreResult<DVector<f64>> {
        if predicted.tangent_dim() != self.dim() {
            return Err(CoreError::DimensionMismatch(format!(
                "Expression produced a value of dimension {}, measurement has {}",
                predicted.tangent_dim(),
                self.dim()
            ))
            .log());
        }
        Ok(self.measurement.local_coordinates(predicted))
    }
}

impl<T: LieGroup> NoiseModelFactor for ExpressionFactor<T> {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self) -> usize {
        self.measurement.tangent_dim()
    }

    fn noise_model(&self) -> &SharedNoiseModel {
        &self.noise_model
    }

    /// # Panics
    /// Panics if `jacobians` does not hold exactly one matrix per key.
    fn unwhitened_error(
        &self,
        values: &Values,
        jacobians: Option<&mut [DMatrix<f64>]>,
    ) -> CoreResult<DVector<f64>> {
        let predicted = match jacobians {
            Some(h) => {
                assert_eq!(
                    h.len(),
                    self.keys.len(),
                    "Expected one Jacobian matrix per key"
                );
                let rows = self.dim();
                let mut blocks = JacobianMap::new();
                for ((hi, key), &dim) in h.iter_mut().zip(&self.keys).zip(&self.dims) {
                    *hi = DMatrix::zeros(rows, dim);
                    blocks.insert(key.clone(), hi.columns_mut(0, dim));
                }
                self.expression.value_with_jacobians(values, &mut blocks)?
            }
            None => self.expression.value(values)?,
        };

        self.residual(&predicted)
    }

    fn linearize(&self, values: &Values) -> CoreResult<JacobianFactor> {
        let rows = self.dim();
        let mut ab = VerticalBlockMatrix::new(&self.dims, rows, true);

        let predicted = {
            let mut blocks = JacobianMap::new();
            for (key, view) in self.keys.iter().zip(ab.split_blocks_mut()) {
                blocks.insert(key.clone(), view);
            }
            self.expression.value_with_jacobians(values, &mut blocks)?
        };

        let error = self.residual(&predicted)?;
        ab.block_mut(self.keys.len()).column_mut(0).copy_from(&(-error));

        debug!(
            keys = self.keys.len(),
            rows,
            cols = ab.cols(),
            "Linearized ExpressionFactor"
        );

        // Whitening is left to the solver; only hard constraints survive at the linear level
        let model = self.noise_model.as_constrained().map(Constrained::unit);

        JacobianFactor::new(self.keys.clone(), ab, model).map_err(|e| {
            CoreError::FactorLinearization("Invalid linear system layout".to_string())
                .log_with_source(e)
        })
    }
}
