// Error handling module
// Defines the error taxonomy surfaced by the token manager and request facade

use std::sync::Arc;

use thiserror::Error;

/// Failures raised by the transport while executing a single HTTP call
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection, TLS, timeout or body streaming failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("Elation API error: {status} - {body}")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// HTTP status code, when the server produced a response
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            TransportError::Status { status, .. } => Some(*status),
        }
    }
}

/// Failures of an OAuth2 token exchange (password or refresh grant)
#[derive(Error, Debug)]
pub enum GrantError {
    /// Token endpoint unreachable or answered non-2xx
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Token endpoint answered 2xx with an unusable body
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced to callers of the Elation client
#[derive(Error, Debug)]
pub enum ApiError {
    /// A verb was called before `initialize()` succeeded
    #[error("Client is not initialized: call initialize() before issuing requests")]
    Uninitialized,

    /// The password-grant exchange failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(#[source] GrantError),

    /// The refresh-grant exchange failed; the outcome is shared by every
    /// caller that waited on the same refresh
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] Arc<GrantError>),

    /// The authenticated request itself failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A successful response body could not be decoded
    #[error("Failed to decode response body: {0}")]
    Decode(#[source] reqwest::Error),

    /// Caller-supplied request data could not be turned into a request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_messages() {
        let err = ApiError::Uninitialized;
        assert_eq!(
            err.to_string(),
            "Client is not initialized: call initialize() before issuing requests"
        );

        let err = ApiError::Transport(TransportError::Status {
            status: 404,
            body: "Not found".to_string(),
        });
        assert_eq!(err.to_string(), "Elation API error: 404 - Not found");
    }

    #[test]
    fn test_initialization_failed_message_and_source() {
        let err = ApiError::InitializationFailed(GrantError::Transport(TransportError::Status {
            status: 401,
            body: "invalid_grant".to_string(),
        }));
        assert_eq!(
            err.to_string(),
            "Initialization failed: Elation API error: 401 - invalid_grant"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_refresh_failed_shares_source() {
        let grant = Arc::new(GrantError::InvalidResponse("missing access_token".to_string()));
        let first = ApiError::RefreshFailed(grant.clone());
        let second = ApiError::RefreshFailed(grant);
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(
            first.to_string(),
            "Token refresh failed: Invalid token response: missing access_token"
        );
    }

    #[test]
    fn test_transport_status_accessor() {
        let err = TransportError::Status {
            status: 503,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_config_error_message() {
        let err = ApiError::ConfigError("Missing client id".to_string());
        assert_eq!(err.to_string(), "Configuration error: Missing client id");
    }

    #[test]
    fn test_internal_error_message() {
        let err = ApiError::Internal(anyhow::anyhow!("Something went wrong"));
        assert_eq!(err.to_string(), "Internal error: Something went wrong");
    }
}
