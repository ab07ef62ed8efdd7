//! Core building blocks shared by expressions and factors
//!
//! This module contains:
//! - Variable assignments (`Values`) keyed by string names
//! - Noise models used to whiten residuals
//! - The module error type `CoreError`

pub mod noise_model;
pub mod values;

use thiserror::Error;
use tracing::error;

/// Core module error types for variables, noise models and factors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Variable lookup or update failed
    #[error("Variable error: {0}")]
    Variable(String),

    /// Factor linearization failed
    #[error("Factor linearization failed: {0}")]
    FactorLinearization(String),

    /// Dimension mismatch between residual/Jacobian/variables
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid input parameter or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// values.at::<Sim3>("x1").map_err(|e| e.log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the underlying error that caused it
    ///
    /// # Example
    /// ```ignore
    /// value.retract(delta).map_err(|e| {
    ///     CoreError::Variable(format!("Failed to retract '{key}'")).log_with_source(e)
    /// })?;
    /// ```
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for core module operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_display() {
        let error = CoreError::InvalidInput("ExpressionFactor: no NoiseModel.".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid input: ExpressionFactor: no NoiseModel."
        );
    }

    #[test]
    fn test_core_error_log_returns_self() {
        let error = CoreError::Variable("x1 not found".to_string());
        assert_eq!(error.clone().log(), error);
        assert_eq!(error.clone().log_with_source("lookup"), error);
    }
}
