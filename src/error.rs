//! Error type for the estimator and the Monte Carlo sampler.
//!
//! Every variant is a precondition violation on data or configuration.
//! None of them is transient, so callers should never retry.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FrontierError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrontierError {
    /// Not enough complete rows to compute returns or a covariance matrix.
    #[error("Insufficient data for {context}: need at least {required} rows, got {available}")]
    InsufficientData {
        context: &'static str,
        required: usize,
        available: usize,
    },

    /// A vector or matrix does not match the asset count.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Portfolio volatility is exactly zero, so the Sharpe ratio is undefined.
    #[error("Degenerate volatility: annualized volatility is 0 ({context})")]
    DegenerateVolatility { context: String },

    #[error("Cannot select an optimal portfolio from an empty result set")]
    EmptyResultSet,

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl FrontierError {
    pub fn insufficient_data(context: &'static str, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            context,
            required,
            available,
        }
    }

    pub fn dimension_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }

    pub fn degenerate_volatility(context: impl Into<String>) -> Self {
        Self::DegenerateVolatility {
            context: context.into(),
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failed_precondition() {
        let err = FrontierError::insufficient_data("daily returns", 2, 1);
        assert_eq!(
            err.to_string(),
            "Insufficient data for daily returns: need at least 2 rows, got 1"
        );

        let err = FrontierError::dimension_mismatch("portfolio weights", 4, 3);
        assert!(err.to_string().contains("expected 4, got 3"));

        let err = FrontierError::invalid_configuration("num_portfolios must be >= 1");
        assert!(err.to_string().starts_with("Invalid configuration"));
    }

    #[test]
    fn test_converts_into_anyhow() {
        fn fails() -> anyhow::Result<()> {
            let selected: Result<()> = Err(FrontierError::EmptyResultSet);
            selected?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(err.downcast_ref::<FrontierError>().is_some());
    }
}
