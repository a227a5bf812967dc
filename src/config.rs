//! Client configuration: defaults, TOML file, environment, explicit overrides.
//!
//! Sources are layered lowest to highest priority:
//!
//! 1. built-in defaults;
//! 2. the TOML file (`$XDG_CONFIG_HOME/assemblyline/config.toml`, falling back
//!    to `$HOME/.config/assemblyline/config.toml`);
//! 3. `ASSEMBLYLINE_URL`, `ASSEMBLYLINE_USER`, `ASSEMBLYLINE_APIKEY` and
//!    `ASSEMBLYLINE_PASSWORD`;
//! 4. whatever the caller overlays last (the CLI passes its flags).
//!
//! ```toml
//! url = "https://assemblyline.example.test"
//! username = "admin"
//! apikey = "devkey:admin"
//! max_in_memory_size = 1048576
//!
//! [proxy]
//! host = "proxy.example.test"
//! port = 3128
//! ```

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::auth::{Credentials, CredentialsError};
use crate::client::{
    AssemblylineClient, ClientError, ClientOptions, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_IN_MEMORY_SIZE,
    DEFAULT_READ_TIMEOUT_SECS, TransportOptions,
};

/// Smallest accepted `max_in_memory_size`.
const MIN_IN_MEMORY_SIZE: usize = 1024;
/// Largest accepted `max_in_memory_size`.
const MAX_IN_MEMORY_SIZE: usize = 2 * 1024 * 1024 * 1024;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A required value was not provided by any source.
    #[error("missing config value `{field}` (set it in the config file, environment or flags)")]
    Missing { field: &'static str },

    /// The credential values were rejected.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

/// How the client logs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// `user` + `apikey`.
    Apikey,
    /// `user` + `password`.
    Password,
}

/// Proxy for all client traffic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    /// `http://<host>:<port>`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Partial configuration as read from one source. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Server base URL.
    pub url: Option<String>,
    pub username: Option<String>,
    /// Explicit login method. Inferred from which secret is set when absent.
    pub auth_method: Option<AuthMethod>,
    pub apikey: Option<String>,
    pub password: Option<String>,
    /// Largest JSON response buffered in memory, in bytes.
    pub max_in_memory_size: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub proxy: Option<ProxyConfig>,
}

impl FileConfig {
    /// Overlays `other` on top of `self`: every value `other` sets wins.
    #[must_use]
    pub fn overlay(self, other: Self) -> Self {
        Self {
            url: other.url.or(self.url),
            username: other.username.or(self.username),
            auth_method: other.auth_method.or(self.auth_method),
            apikey: other.apikey.or(self.apikey),
            password: other.password.or(self.password),
            max_in_memory_size: other.max_in_memory_size.or(self.max_in_memory_size),
            connect_timeout_secs: other.connect_timeout_secs.or(self.connect_timeout_secs),
            read_timeout_secs: other.read_timeout_secs.or(self.read_timeout_secs),
            proxy: other.proxy.or(self.proxy),
        }
    }

    /// Values from the `ASSEMBLYLINE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            url: get("ASSEMBLYLINE_URL"),
            username: get("ASSEMBLYLINE_USER"),
            apikey: get("ASSEMBLYLINE_APIKEY"),
            password: get("ASSEMBLYLINE_PASSWORD"),
            ..Self::default()
        }
    }

    /// Checks the values that are set against their accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.url {
            validate_url(url)?;
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(size) = self.max_in_memory_size
            && !(MIN_IN_MEMORY_SIZE..=MAX_IN_MEMORY_SIZE).contains(&size)
        {
            return Err(ConfigError::Invalid {
                field: "max_in_memory_size",
                value: size.to_string(),
                expected: "range 1024..=2147483648",
            });
        }
        if let Some(proxy) = &self.proxy {
            if proxy.host.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "proxy.host",
                    value: format!("{:?}", proxy.host),
                    expected: "a host name",
                });
            }
            if proxy.port == 0 {
                return Err(ConfigError::Invalid {
                    field: "proxy.port",
                    value: "0".to_string(),
                    expected: "range 1..=65535",
                });
            }
        }
        Ok(())
    }
}

fn validate_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Invalid {
        field: "url",
        value: raw.to_string(),
        expected: "an http:// or https:// URL",
    };
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(())
    } else {
        Err(invalid())
    }
}

fn validate_timeout_secs(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            value: value.to_string(),
            expected: "range 1..=3600",
        });
    }
    Ok(())
}

/// Login material chosen by the configuration.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    ApiKey { username: String, apikey: String },
    Password { username: String, password: String },
}

impl AuthConfig {
    /// Validated credentials for the client.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError`] if a field is empty.
    pub fn credentials(&self) -> Result<Credentials, CredentialsError> {
        match self {
            Self::ApiKey { username, apikey } => Credentials::api_key(username, apikey),
            Self::Password { username, password } => Credentials::password(username, password),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (variant, username) = match self {
            Self::ApiKey { username, .. } => ("ApiKey", username),
            Self::Password { username, .. } => ("Password", username),
        };
        f.debug_struct(variant)
            .field("username", username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Complete, validated client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: String,
    pub proxy: Option<ProxyConfig>,
    pub max_in_memory_size: usize,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub auth: AuthConfig,
}

impl ClientConfig {
    /// Fills defaults into `config`, picks the login method and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the URL, username or secret is
    /// not set, and [`ConfigError::Invalid`] for out-of-range values.
    pub fn resolve(config: FileConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let url = config.url.ok_or(ConfigError::Missing { field: "url" })?;
        let username = config
            .username
            .ok_or(ConfigError::Missing { field: "username" })?;
        let method = match config.auth_method {
            Some(method) => method,
            None if config.apikey.is_some() => AuthMethod::Apikey,
            None if config.password.is_some() => AuthMethod::Password,
            None => {
                return Err(ConfigError::Missing {
                    field: "apikey or password",
                });
            }
        };
        let auth = match method {
            AuthMethod::Apikey => AuthConfig::ApiKey {
                username,
                apikey: config.apikey.ok_or(ConfigError::Missing { field: "apikey" })?,
            },
            AuthMethod::Password => AuthConfig::Password {
                username,
                password: config
                    .password
                    .ok_or(ConfigError::Missing { field: "password" })?,
            },
        };
        auth.credentials()?;

        Ok(Self {
            url,
            proxy: config.proxy,
            max_in_memory_size: config
                .max_in_memory_size
                .unwrap_or(DEFAULT_MAX_IN_MEMORY_SIZE),
            connect_timeout_secs: config
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout_secs: config
                .read_timeout_secs
                .unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
            auth,
        })
    }

    /// Transport and buffering options for [`AssemblylineClient::with_options`].
    ///
    /// [`AssemblylineClient::with_options`]: crate::AssemblylineClient::with_options
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            transport: TransportOptions {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                read_timeout: Duration::from_secs(self.read_timeout_secs),
                proxy: self.proxy.as_ref().map(ProxyConfig::url),
            },
            max_in_memory_size: self.max_in_memory_size,
        }
    }
}

impl AssemblylineClient {
    /// Creates a client from a resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Usage`] if the URL, credentials or proxy are
    /// rejected.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let credentials = config.auth.credentials()?;
        Self::with_options(&config.url, credentials, &config.client_options())
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/assemblyline/config.toml`
/// 2. `$HOME/.config/assemblyline/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("assemblyline")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("assemblyline")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Reads and validates a TOML config file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, is not valid TOML,
/// contains unknown keys or fails validation.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads the config file at the default path, if there is one.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be loaded.
pub fn load_default_file_config() -> Result<Option<FileConfig>, ConfigError> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn parse_config_str(raw: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(raw)
}
