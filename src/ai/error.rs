use axum::http::StatusCode;
use thiserror::Error;

/// Failures surfaced by the estimation engine and the model adapter.
#[derive(Debug, Error)]
pub enum AiError {
    /// Caller-supplied data fails a precondition. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Model output could not be read as a JSON object by any strategy.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// Endpoint unreachable, timed out, or answered with a non-success status.
    #[error("model service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("model service returned an empty response")]
    EmptyResponse,
}

impl AiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AiError::MalformedResponse(_)
            | AiError::ServiceUnavailable(_)
            | AiError::EmptyResponse => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Handler-side mapping, same shape as the other `(StatusCode, String)` rejections.
pub fn ai_failure(e: AiError) -> (StatusCode, String) {
    (e.status_code(), e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_is_a_client_error() {
        let (status, msg) = ai_failure(AiError::InvalidInput("no ingredients".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(msg.contains("no ingredients"));
    }

    #[test]
    fn service_failures_map_to_503() {
        assert_eq!(
            AiError::EmptyResponse.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AiError::ServiceUnavailable("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AiError::MalformedResponse("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
