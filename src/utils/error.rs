// src/utils/error.rs

use crate::types::TransportError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type RestoResult<T> = Result<T, RestoError>;

/// Custom error details for additional context
pub type ErrorDetails = HashMap<String, serde_json::Value>;

/// Main error type for the aggregation core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoError {
    pub message: String,
    pub details: Option<Box<ErrorDetails>>,
    pub status: Option<u16>,
    pub error_code: Option<String>,
    pub method: Option<String>,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[default]
    UnknownError,
    ApiError,
    NetworkError,
    TimeoutError,
    AuthenticationError,
    ValidationError,
    ConfigurationError,
    ParseError,
    NotFoundError,
}

impl fmt::Display for RestoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RestoError {}

impl RestoError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            status: None,
            error_code: None,
            method: None,
            kind,
        }
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(Box::new(details));
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    // Convenience constructors for common error types

    pub fn api_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ApiError, message).with_code("API_ERROR")
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
            .with_status(503)
            .with_code("NETWORK_ERROR")
    }

    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimeoutError, message)
            .with_status(504)
            .with_code("TIMEOUT")
    }

    pub fn auth_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationError, message)
            .with_status(401)
            .with_code("AUTH_FAILED")
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
            .with_status(400)
            .with_code("VALIDATION_ERROR")
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationError, message).with_code("CONFIG_ERROR")
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message).with_code("PARSE_ERROR")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFoundError, message)
            .with_status(404)
            .with_code("NOT_FOUND")
    }

    /// Auth rejections force a token clear and exactly one retry.
    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::AuthenticationError
    }

    /// Transient failures are eligible for bounded retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::NetworkError | ErrorKind::TimeoutError)
    }
}

impl From<TransportError> for RestoError {
    fn from(err: TransportError) -> Self {
        match &err {
            TransportError::Http(e) if e.is_timeout() => {
                RestoError::timeout_error(format!("request timed out: {}", e))
            }
            TransportError::Http(e) if e.is_connect() => {
                RestoError::network_error(format!("connection failed: {}", e))
            }
            TransportError::Http(e) => RestoError::network_error(format!("http error: {}", e)),
            TransportError::Url(e) => RestoError::validation_error(format!("invalid url: {}", e)),
        }
    }
}

impl From<serde_json::Error> for RestoError {
    fn from(err: serde_json::Error) -> Self {
        RestoError::parse_error(format!("json error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_builders() {
        let err = RestoError::auth_error("token rejected").with_method("olap");
        assert_eq!(err.kind, ErrorKind::AuthenticationError);
        assert_eq!(err.status, Some(401));
        assert_eq!(err.method.as_deref(), Some("olap"));
        assert!(err.is_auth());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(RestoError::network_error("down").is_transient());
        assert!(RestoError::timeout_error("slow").is_transient());
        assert!(!RestoError::validation_error("bad input").is_transient());
        assert!(!RestoError::auth_error("nope").is_transient());
    }

    #[test]
    fn test_display_is_message() {
        let err = RestoError::parse_error("unreadable payload");
        assert_eq!(err.to_string(), "unreadable payload");
    }
}
