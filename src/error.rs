//! Error types for the lie-factors library
//!
//! Each module reports failures through its own `thiserror` enum ([`CoreError`],
//! [`LinAlgError`], [`ManifoldError`]). [`LieFactorsError`] wraps them for callers
//! that mix operations from several modules and want a single `?`-compatible type.

use crate::{core::CoreError, linalg::LinAlgError, manifold::ManifoldError};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the lie-factors library
pub type LieFactorsResult<T> = Result<T, LieFactorsError>;

/// Top-level error type wrapping the module errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LieFactorsError {
    /// Values, noise models and nonlinear factors
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Block matrices and linear factors
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),

    /// Group operations and charts
    #[error(transparent)]
    Manifold(#[from] ManifoldError),
}

impl LieFactorsError {
    /// Full error chain, one error per line.
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {err}"));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Single-line variant of [`LieFactorsError::chain`].
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}
