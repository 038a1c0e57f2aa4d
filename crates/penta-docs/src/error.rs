//! Errors raised while building the schema document.

use thiserror::Error;

/// Errors that can occur during documentation generation.
#[derive(Debug, Error)]
pub enum DocsError {
    /// Failed to convert between the document and JSON.
    #[error("Failed to serialize OpenAPI document: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A field type could not be described.
    #[error("Failed to convert schema: {reason}")]
    SchemaConversionError {
        /// The reason for the conversion failure.
        reason: String,
    },

    /// An operation cannot be placed in the document.
    #[error("Invalid operation '{operation_id}': {reason}")]
    InvalidOperation {
        /// The operation ID that is invalid.
        operation_id: String,
        /// The reason the operation is invalid.
        reason: String,
    },
}

/// Result type for documentation operations.
pub type DocsResult<T> = Result<T, DocsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_error() {
        let err: DocsError = serde_json::from_str::<String>("invalid")
            .unwrap_err()
            .into();
        assert!(matches!(err, DocsError::SerializationError(_)));
        assert!(err.to_string().contains("serialize"));
    }

    #[test]
    fn test_invalid_operation_error() {
        let err = DocsError::InvalidOperation {
            operation_id: "get_user".to_string(),
            reason: "method CONNECT cannot be documented".to_string(),
        };
        assert!(err.to_string().contains("get_user"));
        assert!(err.to_string().contains("CONNECT"));
    }
}
