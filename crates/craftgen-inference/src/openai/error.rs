//! Mapping of OpenAI-compatible error responses onto craftgen errors.

use craftgen_core::Error;

/// Error classes reported by OpenAI-compatible endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    AuthenticationError,
    RateLimitExceeded,
    ModelNotFound,
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine the error class from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

/// Build the error for a failed call. `wrap` picks the variant for
/// provider-side failures (`Error::Inference` or `Error::Embedding`).
pub fn to_craftgen_error(
    code: OpenAIErrorCode,
    message: &str,
    wrap: fn(String) -> Error,
) -> Error {
    match code {
        OpenAIErrorCode::AuthenticationError => {
            Error::Config(format!("Authentication failed: {}", message))
        }
        OpenAIErrorCode::ModelNotFound => Error::Config(format!("Model not found: {}", message)),
        OpenAIErrorCode::RateLimitExceeded => wrap(format!("Rate limit exceeded: {}", message)),
        OpenAIErrorCode::ContextLengthExceeded => wrap(format!("Context too long: {}", message)),
        OpenAIErrorCode::ServerError => wrap(format!("Server error: {}", message)),
        OpenAIErrorCode::Unknown => wrap(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_status() {
        assert_eq!(
            OpenAIErrorCode::from_response(401, "invalid_api_key"),
            OpenAIErrorCode::AuthenticationError
        );
        assert_eq!(
            OpenAIErrorCode::from_response(429, ""),
            OpenAIErrorCode::RateLimitExceeded
        );
        assert_eq!(
            OpenAIErrorCode::from_response(400, "model_not_found"),
            OpenAIErrorCode::ModelNotFound
        );
        assert_eq!(
            OpenAIErrorCode::from_response(400, "context_length_exceeded"),
            OpenAIErrorCode::ContextLengthExceeded
        );
        assert_eq!(
            OpenAIErrorCode::from_response(503, "overloaded"),
            OpenAIErrorCode::ServerError
        );
        assert_eq!(OpenAIErrorCode::from_response(418, "x"), OpenAIErrorCode::Unknown);
    }

    #[test]
    fn test_retryable() {
        assert!(OpenAIErrorCode::RateLimitExceeded.is_retryable());
        assert!(OpenAIErrorCode::ServerError.is_retryable());
        assert!(!OpenAIErrorCode::AuthenticationError.is_retryable());
    }

    #[test]
    fn test_conversion_uses_wrapper() {
        let err = to_craftgen_error(OpenAIErrorCode::ServerError, "boom", Error::Embedding);
        assert!(matches!(err, Error::Embedding(msg) if msg == "Server error: boom"));

        let err = to_craftgen_error(OpenAIErrorCode::AuthenticationError, "nope", Error::Inference);
        assert!(matches!(err, Error::Config(_)));
    }
}
