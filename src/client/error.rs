//! Error types for Assemblyline API calls.
//!
//! Every facade method returns [`ClientError`]. HTTP failures carry an
//! [`ApiError`] with the status, the message recovered from the response
//! envelope, and the raw response headers and body.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::auth::CredentialsError;
use crate::model::ApiEnvelope;

/// A non-2xx response from the Assemblyline server.
#[derive(Debug, Clone)]
pub struct ApiError {
    url: String,
    status: StatusCode,
    message: String,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiError {
    /// Builds the failure from a response, extracting the envelope error message.
    ///
    /// The message is `"<status text> : <api_error_message>"`. When the body is
    /// not a valid envelope (or carries no message) the raw body text is used.
    #[must_use]
    pub fn new(url: impl Into<String>, status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        let status_text = status.canonical_reason().unwrap_or("Unknown Status");
        let message = format!("{status_text} : {}", extract_api_error_message(&body));
        Self {
            url: url.into(),
            status,
            message,
            headers,
            body,
        }
    }

    /// Numeric HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Human-readable message: status text plus the server's error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Request URL that produced the failure.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Original response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Original response body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Response body decoded as UTF-8 (lossy).
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} from {}: {}", self.status(), self.url, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Errors returned by [`AssemblylineClient`](crate::AssemblylineClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The call itself was malformed (bad path template, missing credentials,
    /// no runtime). Raised before any network I/O and never retried.
    #[error("invalid client usage: {reason}")]
    Usage {
        /// What was wrong with the call.
        reason: String,
    },

    /// HTTP 401. Triggers a single login-and-retry per logical call.
    #[error("unauthorized: {0}")]
    Unauthorized(Box<ApiError>),

    /// HTTP 4xx other than 401.
    #[error("client error: {0}")]
    ClientStatus(Box<ApiError>),

    /// HTTP 5xx.
    #[error("server error: {0}")]
    ServerStatus(Box<ApiError>),

    /// Any other non-2xx status (1xx, 3xx). Redirects are never followed.
    #[error("unexpected status: {0}")]
    UnexpectedStatus(Box<ApiError>),

    /// Network-level failure (DNS, connection refused, TLS, reset).
    #[error("network error calling {url}: {source}")]
    Transport {
        /// The URL being requested.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request or a body read timed out.
    #[error("timeout calling {url}")]
    Timeout {
        /// The URL being requested.
        url: String,
    },

    /// The success body could not be decoded into the expected payload.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// The URL being requested.
        url: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The success envelope did not contain an `api_response`.
    #[error("response from {url} has no api_response payload")]
    MissingPayload {
        /// The URL being requested.
        url: String,
    },

    /// The request body could not be serialized.
    #[error("failed to encode request body: {source}")]
    Encode {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The response was larger than the configured in-memory buffer limit.
    #[error("response from {url} exceeds the in-memory limit of {limit} bytes")]
    ResponseTooLarge {
        /// The URL being requested.
        url: String,
        /// Configured limit in bytes.
        limit: usize,
    },
}

impl ClientError {
    /// Creates a usage error.
    pub fn usage(reason: impl Into<String>) -> Self {
        Self::Usage {
            reason: reason.into(),
        }
    }

    /// Maps a reqwest error to `Timeout` or `Transport`.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Transport {
                url: url.into(),
                source,
            }
        }
    }

    /// Classifies a non-2xx response by status code.
    pub fn from_status(
        url: impl Into<String>,
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let error = Box::new(ApiError::new(url, status, headers, body));
        match status.as_u16() {
            401 => Self::Unauthorized(error),
            400..=499 => Self::ClientStatus(error),
            500..=599 => Self::ServerStatus(error),
            _ => Self::UnexpectedStatus(error),
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates a response-too-large error.
    pub fn response_too_large(url: impl Into<String>, limit: usize) -> Self {
        Self::ResponseTooLarge {
            url: url.into(),
            limit,
        }
    }

    /// True for HTTP 401, the only failure that triggers a re-login.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// The HTTP failure details, when this error came from a response status.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Unauthorized(error)
            | Self::ClientStatus(error)
            | Self::ServerStatus(error)
            | Self::UnexpectedStatus(error) => Some(error),
            _ => None,
        }
    }

    /// The HTTP status code, when this error came from a response status.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.api_error().map(ApiError::status)
    }
}

impl From<CredentialsError> for ClientError {
    fn from(error: CredentialsError) -> Self {
        Self::usage(error.to_string())
    }
}

/// Reads `api_error_message` from an envelope body, falling back to the raw text.
fn extract_api_error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(body) {
        Ok(envelope) => match envelope.api_error_message {
            Some(message) if !message.is_empty() => message,
            _ => String::from_utf8_lossy(body).into_owned(),
        },
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn envelope_body(message: &str) -> Bytes {
        Bytes::from(format!(
            r#"{{"api_error_message":"{message}","api_response":"","api_server_version":"4.0.0","api_status_code":401}}"#
        ))
    }

    #[test]
    fn test_unauthorized_message_combines_status_text_and_envelope() {
        let error = ClientError::from_status(
            "http://al/api/v4/auth/login/",
            StatusCode::UNAUTHORIZED,
            HeaderMap::new(),
            envelope_body("Invalid apikey"),
        );
        assert!(error.is_unauthorized());
        assert_eq!(error.status(), Some(401));
        let api = error.api_error().unwrap();
        assert_eq!(api.message(), "Unauthorized : Invalid apikey");
        assert!(error.to_string().contains("Invalid apikey"));
    }

    #[test]
    fn test_non_json_body_falls_back_to_raw_text() {
        let error = ClientError::from_status(
            "http://al/x/",
            StatusCode::INTERNAL_SERVER_ERROR,
            HeaderMap::new(),
            Bytes::from_static(b"someException"),
        );
        assert!(matches!(error, ClientError::ServerStatus(_)));
        assert_eq!(
            error.api_error().unwrap().message(),
            "Internal Server Error : someException"
        );
    }

    #[test]
    fn test_classification_by_status_range() {
        let classify = |code: u16| {
            ClientError::from_status(
                "http://al/x/",
                StatusCode::from_u16(code).unwrap(),
                HeaderMap::new(),
                Bytes::new(),
            )
        };
        assert!(matches!(classify(400), ClientError::ClientStatus(_)));
        assert!(matches!(classify(403), ClientError::ClientStatus(_)));
        assert!(matches!(classify(404), ClientError::ClientStatus(_)));
        assert!(matches!(classify(401), ClientError::Unauthorized(_)));
        assert!(matches!(classify(503), ClientError::ServerStatus(_)));
        assert!(matches!(classify(302), ClientError::UnexpectedStatus(_)));
        assert!(!classify(403).is_unauthorized());
    }

    #[test]
    fn test_api_error_keeps_headers_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "abc".parse().unwrap());
        let error = ApiError::new(
            "http://al/x/",
            StatusCode::BAD_REQUEST,
            headers,
            Bytes::from_static(b"raw"),
        );
        assert_eq!(error.headers().get("x-request-id").unwrap(), "abc");
        assert_eq!(error.body(), b"raw");
        assert_eq!(error.body_text(), "raw");
        assert_eq!(error.url(), "http://al/x/");
    }

    #[test]
    fn test_usage_error_display() {
        let error = ClientError::usage("path template does not end with '/'");
        assert!(error.to_string().starts_with("invalid client usage"));
        assert!(error.status().is_none());
    }

    #[test]
    fn test_credentials_error_maps_to_usage() {
        let error: ClientError = CredentialsError::EmptyField {
            method: "apikey",
            field: "apikey",
        }
        .into();
        assert!(matches!(error, ClientError::Usage { .. }));
    }
}
