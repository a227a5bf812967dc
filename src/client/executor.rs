//! One logical API call: send, classify, decode, and re-login on 401.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::auth::Credentials;
use crate::model::{ApiEnvelope, LoginResponse};

use super::error::ClientError;
use super::paths;
use super::session::SessionStore;

/// Default cap on a buffered JSON response body.
pub const DEFAULT_MAX_IN_MEMORY_SIZE: usize = 256 * 1024;

const APPLICATION_JSON: &str = "application/json";
const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

/// Request body, kept in a form that can be rebuilt for the retry.
#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    Empty,
    Json(Bytes),
    Form(Vec<(&'static str, String)>),
    Multipart {
        file: Bytes,
        filename: String,
        json: String,
    },
    /// Like `Multipart`, but the file part is produced fresh for each attempt.
    MultipartStream {
        file: BodyFactory,
        filename: String,
        json: String,
    },
}

/// Builds a new upload body on every call.
#[derive(Clone)]
pub(crate) struct BodyFactory(Arc<dyn Fn() -> Body + Send + Sync>);

impl BodyFactory {
    pub(crate) fn new<F>(make: F) -> Self
    where
        F: Fn() -> Body + Send + Sync + 'static,
    {
        Self(Arc::new(make))
    }

    fn body(&self) -> Body {
        (self.0)()
    }
}

impl fmt::Debug for BodyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BodyFactory(..)")
    }
}

impl RequestBody {
    fn login_form(credentials: &Credentials) -> Self {
        Self::Form(
            credentials
                .form_fields()
                .iter()
                .map(|(key, value)| (*key, (*value).to_string()))
                .collect(),
        )
    }

    fn apply(&self, builder: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        Ok(match self {
            Self::Empty => builder,
            Self::Json(bytes) => builder
                .header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON))
                .body(bytes.clone()),
            Self::Form(fields) => builder.form(fields),
            Self::Multipart {
                file,
                filename,
                json,
            } => {
                let length = file.len() as u64;
                let bin = Part::stream_with_length(file.clone(), length);
                builder.multipart(upload_form(bin, filename, json)?)
            }
            Self::MultipartStream {
                file,
                filename,
                json,
            } => builder.multipart(upload_form(Part::stream(file.body()), filename, json)?),
        })
    }
}

/// The `bin` + `json` form the submit and ingest endpoints expect.
fn upload_form(bin: Part, filename: &str, json: &str) -> Result<Form, ClientError> {
    let bin = bin
        .file_name(filename.to_string())
        .mime_str(APPLICATION_OCTET_STREAM)
        .map_err(|e| ClientError::usage(format!("invalid multipart type: {e}")))?;
    Ok(Form::new()
        .part("bin", bin)
        .part("json", Part::text(json.to_string())))
}

/// A fully resolved request. The URL is built before any I/O so a malformed
/// path fails without touching the network.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) body: RequestBody,
}

impl ApiRequest {
    pub(crate) fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: RequestBody::Empty,
        }
    }

    pub(crate) fn post(url: Url, body: RequestBody) -> Self {
        Self {
            method: Method::POST,
            url,
            body,
        }
    }
}

/// State shared by every copy of a client: transport, endpoint and credentials.
#[derive(Debug)]
pub(crate) struct ClientCore {
    pub(crate) http: Client,
    pub(crate) base_url: Url,
    pub(crate) credentials: Credentials,
    pub(crate) max_in_memory_size: usize,
}

impl ClientCore {
    /// Sends one request with the session cookie and optional bearer token.
    ///
    /// Non-2xx responses become classified errors. Every response except a
    /// 401 refreshes the session from its `Set-Cookie` header.
    pub(crate) async fn send(
        &self,
        session: &SessionStore,
        bearer: Option<&str>,
        request: &ApiRequest,
        accept_json: bool,
    ) -> Result<Response, ClientError> {
        let url = request.url.as_str();
        let mut builder = self.http.request(request.method.clone(), request.url.clone());
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder = session.attach(builder);
        if accept_json {
            builder = builder.header(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        }
        builder = request.body.apply(builder)?;

        debug!(method = %request.method, url, "sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::network(url, e))?;

        let status = response.status();
        if status != StatusCode::UNAUTHORIZED && session.capture(&response) {
            debug!(url, "session cookie refreshed");
        }
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = match read_body_limited(response, self.max_in_memory_size, url).await {
                Ok(body) => body,
                Err(error) => {
                    debug!(url, error = %error, "could not read error response body");
                    Bytes::new()
                }
            };
            debug!(url, status = status.as_u16(), "request failed");
            return Err(ClientError::from_status(url, status, headers, body));
        }

        Ok(response)
    }

    /// Sends `request` once and returns the decoded `api_response`.
    pub(crate) async fn attempt_json<T: DeserializeOwned>(
        &self,
        session: &SessionStore,
        bearer: Option<&str>,
        request: &ApiRequest,
    ) -> Result<T, ClientError> {
        let url = request.url.as_str();
        let response = self.send(session, bearer, request, true).await?;
        let body = read_body_limited(response, self.max_in_memory_size, url).await?;
        decode_envelope(url, &body)
    }

    /// Runs `attempt`; on 401, logs in once and runs it one more time.
    ///
    /// Whatever the second attempt (or the login) returns is final.
    pub(crate) async fn retry_unauthorized<T, F, Fut>(
        &self,
        session: &SessionStore,
        bearer: Option<&str>,
        mut attempt: F,
    ) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        match attempt().await {
            Err(error) if error.is_unauthorized() => {
                warn!(error = %error, "request unauthorized; logging in and retrying once");
                self.login(session, bearer).await?;
                attempt().await
            }
            other => other,
        }
    }

    /// A JSON call with the 401 retry policy.
    #[instrument(level = "debug", skip(self, session, bearer, request), fields(method = %request.method, url = %request.url))]
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        session: &SessionStore,
        bearer: Option<&str>,
        request: &ApiRequest,
    ) -> Result<T, ClientError> {
        self.retry_unauthorized(session, bearer, move || {
            self.attempt_json(session, bearer, request)
        })
        .await
    }

    /// Posts the credentials to the login endpoint. Never retried.
    #[instrument(skip(self, session, bearer), fields(username = %self.credentials.username()))]
    pub(crate) async fn login(
        &self,
        session: &SessionStore,
        bearer: Option<&str>,
    ) -> Result<LoginResponse, ClientError> {
        let url = paths::build_url(&self.base_url, paths::LOGIN, &[], &[])?;
        let request = ApiRequest::post(url, RequestBody::login_form(&self.credentials));
        let login: LoginResponse = self.attempt_json(session, bearer, &request).await?;
        info!(
            username = %login.username,
            session_duration = login.session_duration,
            "logged in to Assemblyline"
        );
        Ok(login)
    }
}

/// Reads a response body, failing once it grows past `limit` bytes.
async fn read_body_limited(
    mut response: Response,
    limit: usize,
    url: &str,
) -> Result<Bytes, ClientError> {
    if let Some(length) = response.content_length()
        && length > limit as u64
    {
        return Err(ClientError::response_too_large(url, limit));
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ClientError::network(url, e))?
    {
        if body.len() + chunk.len() > limit {
            return Err(ClientError::response_too_large(url, limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

fn decode_envelope<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T, ClientError> {
    let envelope: ApiEnvelope<T> =
        serde_json::from_slice(body).map_err(|e| ClientError::decode(url, e))?;
    envelope
        .into_response()
        .ok_or_else(|| ClientError::MissingPayload {
            url: url.to_string(),
        })
}
