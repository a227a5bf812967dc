//! reqwest client construction.
//!
//! Every client gets the same policy: connect and read timeouts, gzip, the
//! crate User-Agent, and no redirects. An Assemblyline redirect means a path
//! lost its trailing slash, and following it would drop the session cookie.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use crate::user_agent;

use super::error::ClientError;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default read timeout in seconds (per read, not per request).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Network settings for the underlying HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Longest wait for any single read from the server.
    pub read_timeout: Duration,
    /// Proxy URL for all traffic, e.g. `http://proxy:3128`. When unset the
    /// standard proxy environment variables apply.
    pub proxy: Option<String>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            proxy: None,
        }
    }
}

/// Builds the HTTP client for `options`.
///
/// # Errors
///
/// Returns [`ClientError::Usage`] for an invalid proxy URL or when the TLS
/// backend cannot be initialised.
pub(crate) fn build_http_client(options: &TransportOptions) -> Result<Client, ClientError> {
    let explicit_proxy = match options.proxy.as_deref() {
        Some(proxy) => Some(
            Proxy::all(proxy)
                .map_err(|e| ClientError::usage(format!("invalid proxy URL '{proxy}': {e}")))?,
        ),
        None => None,
    };

    match try_build(options, explicit_proxy.clone(), false) {
        Ok(client) => Ok(client),
        Err(BuildFailure::Panic) => {
            // Some sandboxes panic while reading system proxy settings.
            warn!("HTTP client builder panicked while loading system proxy settings; retrying with env-proxy fallback");
            match try_build(options, explicit_proxy, true) {
                Ok(client) => Ok(client),
                Err(BuildFailure::Panic) => Err(ClientError::usage(
                    "HTTP client construction panicked while loading proxy settings",
                )),
                Err(BuildFailure::Build(error)) => Err(ClientError::usage(format!(
                    "HTTP client construction failed: {error}"
                ))),
            }
        }
        Err(BuildFailure::Build(error)) => Err(ClientError::usage(format!(
            "HTTP client construction failed: {error}"
        ))),
    }
}

enum BuildFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build(
    options: &TransportOptions,
    explicit_proxy: Option<Proxy>,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(options);
        if let Some(proxy) = explicit_proxy {
            builder = builder.proxy(proxy);
        } else if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildFailure::Build)
    }))
    .map_err(|_| BuildFailure::Panic)?
}

fn base_builder(options: &TransportOptions) -> ClientBuilder {
    Client::builder()
        .connect_timeout(options.connect_timeout)
        .read_timeout(options.read_timeout)
        .gzip(true)
        .redirect(Policy::none())
        .user_agent(user_agent::default_user_agent())
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
