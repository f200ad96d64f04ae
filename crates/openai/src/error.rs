//! Client construction errors and HTTP failure mapping.

use deck_core::OracleError;
use reqwest::StatusCode;
use thiserror::Error;

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Errors raised while building a client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Missing credential: set {0}")]
    MissingCredential(&'static str),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Classify a transport-level failure.
pub(crate) fn map_transport(err: reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout
    } else if err.is_connect() || err.is_request() {
        OracleError::Unavailable(err.to_string())
    } else if err.is_decode() {
        OracleError::InvalidResponse(err.to_string())
    } else {
        OracleError::Unavailable(err.to_string())
    }
}

/// Classify a non-success HTTP status.
///
/// Rate limiting and server errors are worth retrying; any other client
/// error means the request itself was refused.
pub(crate) fn map_status(status: StatusCode, body: &str) -> OracleError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = format!("HTTP {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        OracleError::Unavailable(message)
    } else {
        OracleError::Rejected(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            OracleError::Unavailable(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, ""),
            OracleError::Unavailable(_)
        ));
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, "bad key"),
            OracleError::Rejected(_)
        ));
        assert!(map_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(!map_status(StatusCode::BAD_REQUEST, "").is_retryable());
    }

    #[test]
    fn test_error_body_is_truncated() {
        let body = "x".repeat(2000);
        match map_status(StatusCode::BAD_REQUEST, &body) {
            OracleError::Rejected(message) => assert!(message.len() < 600),
            other => panic!("unexpected {:?}", other),
        }
    }
}
