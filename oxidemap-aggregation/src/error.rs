// oxidemap-aggregation/src/error.rs
// Error types for expression construction and rendering

use thiserror::Error;

/// Errors produced while building or rendering aggregation expressions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// Malformed construction input (empty field name, zero divisor,
    /// illegal exclusion target). Raised by builders before any rendering
    /// is attempted.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A field name matched nothing in the entire resolution context chain.
    #[error("Unresolved field reference: {0}")]
    UnresolvedReference(String),

    /// An operand configuration the builders should have made impossible
    /// was observed at render time. This is a construction bug, not user
    /// error.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AggregationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AggregationError::InvalidArgument("divisor must not be zero".to_string());
        assert_eq!(err.to_string(), "Invalid argument: divisor must not be zero");

        let err = AggregationError::UnresolvedReference("missing".to_string());
        assert_eq!(err.to_string(), "Unresolved field reference: missing");

        let err = AggregationError::TypeMismatch("$eq expects 2 operands".to_string());
        assert_eq!(err.to_string(), "Type mismatch: $eq expects 2 operands");
    }
}
