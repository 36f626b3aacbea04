//! Error taxonomy for the mock-serving runtime.
//!
//! Only the dispatcher and the HTTP adapter translate these into
//! client-visible payloads; every other component reports typed errors
//! upward. Best-effort paths (replay cache, notifications, analytics)
//! swallow their failures and log instead of surfacing them here.

use serde_json::{json, Value};

/// Error types for the request-handling pipeline
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("API not found or inactive")]
    CatalogNotFound,
    #[error("Multiple APIs found with slug '{0}'. Please specify a workspace.")]
    AmbiguousTenant(String),
    #[error("Endpoint not found")]
    EndpointNotFound,
    #[error("No mock response defined")]
    NoResponseDefined,
    #[error("Request validation failed")]
    ValidationFailed { errors: Vec<String> },
    #[error("Proxy request timed out")]
    ProxyTimeout,
    #[error("Proxy request failed: {0}")]
    ProxyFailure(String),
}

impl RuntimeError {
    /// HTTP status code this error maps to at the adapter boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            RuntimeError::CatalogNotFound
            | RuntimeError::EndpointNotFound
            | RuntimeError::NoResponseDefined => 404,
            RuntimeError::AmbiguousTenant(_) | RuntimeError::ValidationFailed { .. } => 400,
            RuntimeError::ProxyTimeout | RuntimeError::ProxyFailure(_) => 502,
        }
    }

    /// Structured client payload. Validation failures carry the itemized
    /// constraint violations; nothing internal leaks beyond the message.
    pub fn to_body(&self) -> Value {
        match self {
            RuntimeError::ValidationFailed { errors } => json!({
                "error": self.to_string(),
                "errors": errors,
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(RuntimeError::CatalogNotFound.status_code(), 404);
        assert_eq!(RuntimeError::EndpointNotFound.status_code(), 404);
        assert_eq!(RuntimeError::NoResponseDefined.status_code(), 404);
        assert_eq!(
            RuntimeError::AmbiguousTenant("orders".to_string()).status_code(),
            400
        );
        assert_eq!(
            RuntimeError::ValidationFailed { errors: vec![] }.status_code(),
            400
        );
        assert_eq!(RuntimeError::ProxyTimeout.status_code(), 502);
        assert_eq!(
            RuntimeError::ProxyFailure("connection refused".to_string()).status_code(),
            502
        );
    }

    #[test]
    fn test_validation_body_carries_errors() {
        let err = RuntimeError::ValidationFailed {
            errors: vec!["body/name: is required".to_string()],
        };
        let body = err.to_body();
        assert_eq!(body["errors"][0], "body/name: is required");
    }

    #[test]
    fn test_plain_body_has_no_errors_list() {
        let body = RuntimeError::EndpointNotFound.to_body();
        assert_eq!(body["error"], "Endpoint not found");
        assert!(body.get("errors").is_none());
    }
}
