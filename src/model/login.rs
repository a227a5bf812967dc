//! Payload of `api/v4/auth/login/`.

use serde::{Deserialize, Serialize};

/// A user privilege granted by the login endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Privilege {
    /// Read.
    R,
    /// Write.
    W,
    /// Extended (signature management and similar).
    E,
    /// A privilege this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginResponse {
    /// Privileges of the signed-in user.
    pub privileges: Vec<Privilege>,
    /// Duration of the authenticated session in seconds.
    pub session_duration: u64,
    /// Username of the signed-in user.
    pub username: String,
    /// Roles limit of the signed-in user.
    pub roles_limit: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_decodes_privileges() {
        let login: LoginResponse = serde_json::from_str(
            r#"{"username":"u","session_duration":300,"privileges":["R","W"]}"#,
        )
        .unwrap();
        assert_eq!(login.username, "u");
        assert_eq!(login.session_duration, 300);
        assert_eq!(login.privileges, vec![Privilege::R, Privilege::W]);
        assert!(login.roles_limit.is_empty());
    }

    #[test]
    fn test_unknown_privilege_does_not_fail_decoding() {
        let login: LoginResponse =
            serde_json::from_str(r#"{"username":"u","privileges":["R","X"]}"#).unwrap();
        assert_eq!(login.privileges, vec![Privilege::R, Privilege::Unknown]);
    }
}
