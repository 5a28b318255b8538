//! Client error types

use thiserror::Error;

/// Closed failure taxonomy exposed to presentation code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No response arrived
    NetworkError,
    /// Request shape rejected before it was sent
    ValidationError,
    /// Backend answered with a non-2xx status or an unusable body
    ServerError,
}

/// Client error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Connection refused, timed out or dropped
    #[error("Network error: {0}")]
    Network(String),

    /// Validation error (client-side, nothing was sent)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-2xx response with the optional `{message}` body
    #[error("Server error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    /// 2xx response whose body is not what the contract promises
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::Network(_) => FailureKind::NetworkError,
            ClientError::Validation(_) => FailureKind::ValidationError,
            ClientError::Server { .. } | ClientError::InvalidResponse(_) => {
                FailureKind::ServerError
            }
        }
    }

    /// Message provided by the backend, to be shown verbatim
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Server {
                status: status.as_u16(),
                message: None,
            }
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidResponse(err.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ClientError::Network("refused".into()).kind(),
            FailureKind::NetworkError
        );
        assert_eq!(
            ClientError::Validation("price".into()).kind(),
            FailureKind::ValidationError
        );
        assert_eq!(
            ClientError::InvalidResponse("eof".into()).kind(),
            FailureKind::ServerError
        );
    }

    #[test]
    fn test_server_message_only_for_server_errors() {
        let err = ClientError::Server {
            status: 409,
            message: Some("Станция занята".into()),
        };
        assert_eq!(err.server_message(), Some("Станция занята"));
        assert_eq!(err.to_string(), "Server error (409): Станция занята");

        let err = ClientError::Server {
            status: 502,
            message: None,
        };
        assert_eq!(err.server_message(), None);
        assert_eq!(err.to_string(), "Server error (502): no message");
        assert_eq!(ClientError::Network("x".into()).server_message(), None);
    }
}
