//! The JSON envelope wrapping every Assemblyline response body.

use serde::Deserialize;

/// `{api_error_message, api_response, api_server_version, api_status_code}`.
///
/// Success and error bodies share this shape. Callers of the client only ever
/// see `api_response` or a typed failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Error text, empty on success.
    pub api_error_message: Option<String>,
    /// The payload. Absent or `null` on some error responses.
    pub api_response: Option<T>,
    /// Version of the Assemblyline server.
    pub api_server_version: Option<String>,
    /// HTTP status code echoed by the server.
    pub api_status_code: Option<u16>,
}

impl<T> ApiEnvelope<T> {
    /// Consumes the envelope and returns the payload.
    pub fn into_response(self) -> Option<T> {
        self.api_response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_decodes_payload_and_metadata() {
        let envelope: ApiEnvelope<bool> = serde_json::from_str(
            r#"{"api_error_message":"","api_response":true,"api_server_version":"4.1.0","api_status_code":200}"#,
        )
        .unwrap();
        assert_eq!(envelope.api_status_code, Some(200));
        assert_eq!(envelope.api_server_version.as_deref(), Some("4.1.0"));
        assert_eq!(envelope.into_response(), Some(true));
    }

    #[test]
    fn test_envelope_tolerates_missing_fields() {
        let envelope: ApiEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"api_error_message":"nope"}"#).unwrap();
        assert_eq!(envelope.api_error_message.as_deref(), Some("nope"));
        assert!(envelope.api_response.is_none());
    }
}
