//! Linear algebra containers for linearized factors.
//!
//! This module provides:
//! - `VerticalBlockMatrix`: one contiguous dense matrix split into column blocks,
//!   one block per variable plus an optional right-hand-side column
//! - `LinAlgError`: errors raised while assembling linear systems

pub mod block_matrix;

pub use block_matrix::VerticalBlockMatrix;

use thiserror::Error;
use tracing::error;

/// Linear algebra specific error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinAlgError {
    /// Block layout does not match the data it is combined with
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A vector required for a block was not supplied
    #[error("Missing block: {0}")]
    MissingBlock(String),
}

impl LinAlgError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// factor.error(&delta).map_err(|e| e.log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;
