//! Login credentials sent to `api/v4/auth/login/`.
//!
//! Credentials are validated once at construction and never change afterwards.
//! Every (re-)login builds its form body from the same value.

use std::fmt;

use thiserror::Error;

/// Errors raised while constructing [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    /// A required credential field was empty or whitespace.
    #[error("{field} must not be empty for {method} authentication")]
    EmptyField {
        /// Authentication method being configured (`apikey` or `password`).
        method: &'static str,
        /// Name of the empty field.
        field: &'static str,
    },
}

#[derive(Clone, PartialEq, Eq)]
enum Secret {
    ApiKey(String),
    Password(String),
}

/// Username plus either an API key or a password.
///
/// The secret is never printed: the `Debug` output redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    secret: Secret,
}

impl Credentials {
    /// Creates API-key credentials (`user` + `apikey` form fields).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::EmptyField`] if either value is empty.
    pub fn api_key(
        username: impl Into<String>,
        apikey: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let username = require("apikey", "username", username.into())?;
        let apikey = require("apikey", "apikey", apikey.into())?;
        Ok(Self {
            username,
            secret: Secret::ApiKey(apikey),
        })
    }

    /// Creates password credentials (`user` + `password` form fields).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::EmptyField`] if either value is empty.
    pub fn password(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let username = require("password", "username", username.into())?;
        let password = require("password", "password", password.into())?;
        Ok(Self {
            username,
            secret: Secret::Password(password),
        })
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the authentication method label (`apikey` or `password`).
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self.secret {
            Secret::ApiKey(_) => "apikey",
            Secret::Password(_) => "password",
        }
    }

    /// Form fields for the login request body, in wire order.
    #[must_use]
    pub fn form_fields(&self) -> [(&'static str, &str); 2] {
        match &self.secret {
            Secret::ApiKey(key) => [("user", self.username.as_str()), ("apikey", key.as_str())],
            Secret::Password(password) => [
                ("user", self.username.as_str()),
                ("password", password.as_str()),
            ],
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("method", &self.method())
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn require(
    method: &'static str,
    field: &'static str,
    value: String,
) -> Result<String, CredentialsError> {
    if value.trim().is_empty() {
        return Err(CredentialsError::EmptyField { method, field });
    }
    Ok(value)
}
