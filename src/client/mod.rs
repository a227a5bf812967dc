//! Authenticated Assemblyline client.
//!
//! [`AssemblylineClient`] wraps a reqwest client with the Assemblyline session
//! protocol:
//!
//! - the `session` cookie is sent on every request once known, and refreshed
//!   from any response other than a 401 that sets it;
//! - a 401 triggers exactly one login with the stored credentials followed by
//!   one retry of the original request;
//! - every response is unwrapped from the `api_response` envelope, and error
//!   responses become a classified [`ClientError`].
//!
//! Endpoint methods live on the [`AssemblylineApi`] trait. File downloads are
//! exposed separately through [`AssemblylineClient::download_file`], which
//! returns a blocking [`DownloadStream`]. Uploads too large to hold in memory
//! go through [`AssemblylineClient::ingest_stream`] and
//! [`AssemblylineClient::submit_stream`].
//!
//! # Example
//!
//! ```no_run
//! use assemblyline_client::{AssemblylineApi, AssemblylineClient, Credentials};
//!
//! # async fn example() -> Result<(), assemblyline_client::ClientError> {
//! let credentials = Credentials::api_key("admin", "devkey:admin")?;
//! let client = AssemblylineClient::new("https://localhost:443", credentials)?;
//! client.login().await?;
//! let done = client.is_submission_complete("3p9RPMzkoYJ1p4vfdZj6B0").await?;
//! println!("complete: {done}");
//! # Ok(())
//! # }
//! ```

mod api;
mod download;
mod error;
mod executor;
mod paths;
mod session;
mod transport;

use std::error::Error as StdError;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStream;
use reqwest::{Body, Client};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tracing::instrument;
use url::Url;

use crate::auth::Credentials;
use crate::model::{DownloadParams, IngestOptions, IngestResponse, Submission, SubmitOptions};

pub use api::AssemblylineApi;
pub use download::DownloadStream;
pub use error::{ApiError, ClientError};
pub use executor::DEFAULT_MAX_IN_MEMORY_SIZE;
pub use session::SESSION_COOKIE;
pub use transport::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, TransportOptions};

use executor::{ApiRequest, BodyFactory, ClientCore, RequestBody};
use session::SessionStore;

/// Options for [`AssemblylineClient::with_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Network settings.
    pub transport: TransportOptions,
    /// Largest JSON response body buffered in memory, in bytes.
    pub max_in_memory_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            max_in_memory_size: DEFAULT_MAX_IN_MEMORY_SIZE,
        }
    }
}

/// Client for one Assemblyline server and one user session.
///
/// Cloning is cheap and the clone is the same logical client: transport,
/// credentials and session are shared. [`with_bearer_token`] is the exception
/// and starts an independent session.
///
/// [`with_bearer_token`]: AssemblylineClient::with_bearer_token
#[derive(Debug, Clone)]
pub struct AssemblylineClient {
    core: Arc<ClientCore>,
    session: Arc<SessionStore>,
    bearer_token: Option<Arc<str>>,
}

impl AssemblylineClient {
    /// Creates a client with default transport settings.
    ///
    /// No request is sent; the first call (or an explicit
    /// [`login`](AssemblylineApi::login)) establishes the session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Usage`] if `base_url` is not an http(s) URL or
    /// the HTTP client cannot be built.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, ClientError> {
        Self::with_options(base_url, credentials, &ClientOptions::default())
    }

    /// Creates a client with explicit transport settings and size limit.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Usage`] if `base_url` is not an http(s) URL, the
    /// proxy URL is invalid, or the HTTP client cannot be built.
    #[instrument(level = "debug", skip(credentials, options), fields(username = %credentials.username()))]
    pub fn with_options(
        base_url: &str,
        credentials: Credentials,
        options: &ClientOptions,
    ) -> Result<Self, ClientError> {
        let http = transport::build_http_client(&options.transport)?;
        Self::from_parts(base_url, credentials, http, options.max_in_memory_size)
    }

    /// Creates a client on top of an existing reqwest client.
    ///
    /// The caller's client is used as-is; configure redirects off, since
    /// Assemblyline redirects drop the session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Usage`] if `base_url` is not an http(s) URL.
    pub fn with_http_client(
        base_url: &str,
        credentials: Credentials,
        http: Client,
    ) -> Result<Self, ClientError> {
        Self::from_parts(base_url, credentials, http, DEFAULT_MAX_IN_MEMORY_SIZE)
    }

    fn from_parts(
        base_url: &str,
        credentials: Credentials,
        http: Client,
        max_in_memory_size: usize,
    ) -> Result<Self, ClientError> {
        let base_url = paths::normalize_base_url(base_url)?;
        Ok(Self {
            core: Arc::new(ClientCore {
                http,
                base_url,
                credentials,
                max_in_memory_size,
            }),
            session: Arc::new(SessionStore::default()),
            bearer_token: None,
        })
    }

    /// Returns a copy that also sends `Authorization: Bearer <token>`.
    ///
    /// The copy shares transport and credentials but takes a snapshot of the
    /// current session: later session changes on either client do not reach
    /// the other.
    #[must_use]
    pub fn with_bearer_token(&self, token: impl Into<String>) -> Self {
        Self {
            core: Arc::clone(&self.core),
            session: Arc::new(SessionStore::new(self.session.snapshot())),
            bearer_token: Some(Arc::from(token.into())),
        }
    }

    /// The current session value. Empty until the first login.
    #[must_use]
    pub fn session(&self) -> String {
        self.session.snapshot()
    }

    /// The server base URL, always ending with `/`.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.core.base_url
    }

    /// The username requests are authenticated as.
    #[must_use]
    pub fn username(&self) -> &str {
        self.core.credentials.username()
    }

    pub(crate) fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// GETs any endpoint and returns its decoded `api_response`.
    ///
    /// `template` is relative to the base URL and must end with `/`; each
    /// `{placeholder}` is replaced by the next value of `args`. Query pairs
    /// with a `None` value are left out. The usual 401 re-login applies.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Usage`] for a malformed template before any
    /// request is sent, otherwise any error of the call.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        template: &str,
        args: &[&str],
        query: &[(&str, Option<&str>)],
    ) -> Result<T, ClientError> {
        let url = paths::build_url(&self.core.base_url, template, args, query)?;
        self.execute(&ApiRequest::get(url)).await
    }

    /// Starts downloading `sha256` and returns a blocking reader over it.
    ///
    /// The reader is returned immediately. The transfer runs on the current
    /// Tokio runtime, and HTTP failures (including 404 and a second 401)
    /// surface as an error from the first `read`. The underlying
    /// [`ClientError`] is available through [`std::io::Error::get_ref`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Usage`] if `sha256` is empty or this is called
    /// outside a Tokio runtime.
    pub fn download_file(
        &self,
        sha256: &str,
        params: &DownloadParams,
    ) -> Result<DownloadStream, ClientError> {
        let handle = Handle::try_current().map_err(|_| {
            ClientError::usage("download_file must be called from within a Tokio runtime")
        })?;
        let url = paths::build_url(
            &self.core.base_url,
            paths::FILE_DOWNLOAD,
            &[sha256],
            &params.query(),
        )?;
        tracing::debug!(%url, "starting download");
        Ok(download::spawn(self.clone(), ApiRequest::get(url), &handle))
    }

    /// Ingests a file whose content is streamed rather than held in memory.
    ///
    /// `make_stream` is called once per attempt and must yield the whole file
    /// each time, so the upload can be sent again after a 401 re-login.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Usage`] for a blank `filename` before any
    /// request is sent, otherwise any error of the call.
    pub async fn ingest_stream<F, S>(
        &self,
        make_stream: F,
        filename: &str,
        options: &IngestOptions,
    ) -> Result<IngestResponse, ClientError>
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: TryStream + Send + 'static,
        S::Error: Into<Box<dyn StdError + Send + Sync>>,
        Bytes: From<S::Ok>,
    {
        let request = self.streamed_upload(paths::INGEST, make_stream, filename, options)?;
        self.execute(&request).await
    }

    /// Submits a file whose content is streamed rather than held in memory.
    ///
    /// Same replay rules as [`ingest_stream`](Self::ingest_stream).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Usage`] for a blank `filename` before any
    /// request is sent, otherwise any error of the call.
    pub async fn submit_stream<F, S>(
        &self,
        make_stream: F,
        filename: &str,
        options: &SubmitOptions,
    ) -> Result<Submission, ClientError>
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: TryStream + Send + 'static,
        S::Error: Into<Box<dyn StdError + Send + Sync>>,
        Bytes: From<S::Ok>,
    {
        let request = self.streamed_upload(paths::SUBMIT, make_stream, filename, options)?;
        self.execute(&request).await
    }

    fn streamed_upload<F, S, O>(
        &self,
        template: &str,
        make_stream: F,
        filename: &str,
        options: &O,
    ) -> Result<ApiRequest, ClientError>
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: TryStream + Send + 'static,
        S::Error: Into<Box<dyn StdError + Send + Sync>>,
        Bytes: From<S::Ok>,
        O: Serialize,
    {
        if filename.trim().is_empty() {
            return Err(ClientError::usage("binary submissions need a file name"));
        }
        let url = self.url(template, &[])?;
        let json =
            serde_json::to_string(options).map_err(|source| ClientError::Encode { source })?;
        let body = RequestBody::MultipartStream {
            file: BodyFactory::new(move || Body::wrap_stream(make_stream())),
            filename: filename.to_string(),
            json,
        };
        Ok(ApiRequest::post(url, body))
    }

    async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ClientError> {
        self.core
            .execute(&self.session, self.bearer_token(), request)
            .await
    }

    fn url(&self, template: &str, args: &[&str]) -> Result<Url, ClientError> {
        paths::build_url(&self.core.base_url, template, args, &[])
    }
}
