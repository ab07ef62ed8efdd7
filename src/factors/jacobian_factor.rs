//! Linear factor `½‖A·δ - b‖²` over a set of keys.
//!
//! The system `[A | b]` is stored in one [`VerticalBlockMatrix`]: one column block per
//! key followed by a single right-hand-side column.

use crate::core::noise_model::{Constrained, NoiseModel};
use crate::core::values::Key;
use crate::linalg::{LinAlgError, LinAlgResult, VerticalBlockMatrix};
use nalgebra::{DMatrix, DMatrixView, DVector};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor {
    keys: Vec<Key>,
    ab: VerticalBlockMatrix,
    model: Option<Constrained>,
}

impl JacobianFactor {
    /// Build from keys and an `[A | b]` block matrix with one block per key plus `b`.
    pub fn new(
        keys: Vec<Key>,
        ab: VerticalBlockMatrix,
        model: Option<Constrained>,
    ) -> LinAlgResult<Self> {
        if ab.n_blocks() != keys.len() + 1 || ab.block_width(keys.len()) != 1 {
            return Err(LinAlgError::DimensionMismatch(format!(
                "{} keys need {} blocks ending in a single rhs column, got {} blocks",
                keys.len(),
                keys.len() + 1,
                ab.n_blocks()
            ))
            .log());
        }
        match &model {
            Some(model) if model.dim() != ab.rows() => {
                return Err(LinAlgError::DimensionMismatch(format!(
                    "Noise model dimension {} does not match {} rows",
                    model.dim(),
                    ab.rows()
                ))
                .log());
            }
            _ => {}
        }

        Ok(JacobianFactor { keys, ab, model })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn rows(&self) -> usize {
        self.ab.rows()
    }

    /// Jacobian block of the `i`-th key.
    pub fn a_block(&self, i: usize) -> DMatrixView<'_, f64> {
        assert!(i < self.keys.len(), "Key index {i} out of range");
        self.ab.block(i)
    }

    /// Right-hand side `b`.
    pub fn rhs(&self) -> DVector<f64> {
        self.ab.block(self.keys.len()).column(0).into_owned()
    }

    /// Noise model carried at the linear level, only set for constrained factors.
    pub fn model(&self) -> Option<&Constrained> {
        self.model.as_ref()
    }

    /// The underlying block matrix.
    pub fn ab(&self) -> &VerticalBlockMatrix {
        &self.ab
    }

    /// Dense `[A | b]`.
    pub fn jacobian(&self) -> DMatrix<f64> {
        self.ab.matrix().clone()
    }

    /// `½‖A·δ - b‖²`, using the constrained distance when a model is present.
    pub fn error(&self, delta: &HashMap<Key, DVector<f64>>) -> LinAlgResult<f64> {
        let mut residual = -self.rhs();
        for (i, key) in self.keys.iter().enumerate() {
            let step = delta
                .get(key)
                .ok_or_else(|| LinAlgError::MissingBlock(format!("No update for key '{key}'")))?;
            let block = self.ab.block(i);
            if step.len() != block.ncols() {
                return Err(LinAlgError::DimensionMismatch(format!(
                    "Update for '{key}' has length {}, expected {}",
                    step.len(),
                    block.ncols()
                )));
            }
            residual += block * step;
        }

        Ok(match &self.model {
            Some(model) => 0.5 * model.distance(&residual),
            None => 0.5 * residual.norm_squared(),
        })
    }
}
