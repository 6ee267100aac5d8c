// =============================================================================
// Analysis errors
// =============================================================================
//
// Every core operation (indicators, forecast, summary, tool dispatch) returns
// `Result<T, AnalysisError>`. The error carries the offending parameter or the
// data shortfall; turning it into user-facing text is the caller's job.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Provider returned an empty or missing series for the ticker.
    #[error("no data found for ticker '{ticker}'")]
    NoDataFound { ticker: String },

    /// Fewer data points than the computation requires.
    #[error("insufficient history for {operation}: need {required} points, got {available}")]
    InsufficientHistory {
        operation: &'static str,
        required: usize,
        available: usize,
    },

    /// A caller-supplied or configured parameter is out of range.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The numerical fit broke down (singular system, non-finite objective).
    #[error("computation failed during {stage}: {reason}")]
    ComputationFailure { stage: &'static str, reason: String },

    /// Transport or decoding failure talking to the market-data provider.
    #[error("market data provider error: {0}")]
    Provider(String),
}

impl AnalysisError {
    /// Stable machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoDataFound { .. } => "no_data_found",
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::ComputationFailure { .. } => "computation_failure",
            Self::Provider(_) => "provider_error",
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let cases = [
            (AnalysisError::NoDataFound { ticker: "X".into() }, "no_data_found"),
            (
                AnalysisError::InsufficientHistory {
                    operation: "forecast",
                    required: 100,
                    available: 3,
                },
                "insufficient_history",
            ),
            (AnalysisError::invalid("window", "must be positive"), "invalid_parameter"),
            (
                AnalysisError::ComputationFailure {
                    stage: "trend fit",
                    reason: "singular".into(),
                },
                "computation_failure",
            ),
            (AnalysisError::Provider("timeout".into()), "provider_error"),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn message_names_offending_parameter() {
        let err = AnalysisError::invalid("window", "must be positive, got 0");
        assert_eq!(err.to_string(), "invalid parameter 'window': must be positive, got 0");

        let err = AnalysisError::InsufficientHistory {
            operation: "forecast",
            required: 100,
            available: 42,
        };
        assert!(err.to_string().contains("need 100 points, got 42"));
    }
}
