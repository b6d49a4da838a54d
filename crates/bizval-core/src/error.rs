use thiserror::Error;

#[derive(Debug, Error)]
pub enum BizValError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Numeric overflow in {context}")]
    NumericOverflow { context: String },

    #[error("Model fit failed for {model}: {reason}")]
    ModelFit { model: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: f64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Broad failure category, used by callers to pick a response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Parameters outside their documented domain. Nothing was computed.
    Validation,
    /// Numerically degenerate configuration found mid-calculation.
    Computation,
    /// A statistical fit could not be completed.
    ModelFit,
    Serialization,
}

impl BizValError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BizValError::InvalidInput { .. } | BizValError::InsufficientData(_) => {
                ErrorKind::Validation
            }
            BizValError::FinancialImpossibility(_)
            | BizValError::DivisionByZero { .. }
            | BizValError::NumericOverflow { .. } => ErrorKind::Computation,
            BizValError::ModelFit { .. } | BizValError::ConvergenceFailure { .. } => {
                ErrorKind::ModelFit
            }
            BizValError::SerializationError(_) => ErrorKind::Serialization,
        }
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        BizValError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Computation => "computation",
            ErrorKind::ModelFit => "model_fit",
            ErrorKind::Serialization => "serialization",
        })
    }
}

impl From<serde_json::Error> for BizValError {
    fn from(e: serde_json::Error) -> Self {
        BizValError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            BizValError::invalid("risk_score", "out of range").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BizValError::DivisionByZero {
                context: "capitalization rate".into()
            }
            .kind(),
            ErrorKind::Computation
        );
        assert_eq!(
            BizValError::ModelFit {
                model: "ARIMA(1,1,1)".into(),
                reason: "singular".into()
            }
            .kind(),
            ErrorKind::ModelFit
        );
    }

    #[test]
    fn test_invalid_input_message() {
        let err = BizValError::invalid("wacc", "must be positive");
        assert_eq!(err.to_string(), "Invalid input: wacc: must be positive");
        assert_eq!(err.kind().to_string(), "validation");
    }
}
