//! One method per Assemblyline endpoint.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::instrument;

use crate::model::{
    FileInfo, FileResultForService, FileResults, HashSearchOptions, HashSearchResult,
    IngestMessage, IngestRequest, IngestResponse, LoginResponse, ResultBlock, Submission,
    SubmissionFileResults, SubmissionFull, SubmissionSource, SubmissionTree, SubmitRequest,
};

use super::AssemblylineClient;
use super::error::ClientError;
use super::executor::{ApiRequest, RequestBody};
use super::paths;

/// The Assemblyline v4 endpoints.
///
/// Implemented by [`AssemblylineClient`]; the trait exists so callers can
/// hold a `dyn AssemblylineApi` and substitute a test double. Every method
/// except [`login`](Self::login) re-logs in once on 401 and retries.
#[async_trait]
pub trait AssemblylineApi: Send + Sync {
    /// Logs in with the stored credentials and stores the new session.
    async fn login(&self) -> Result<LoginResponse, ClientError>;

    /// Whether the submission has finished processing.
    async fn is_submission_complete(&self, sid: &str) -> Result<bool, ClientError>;

    /// Information about a stored file.
    async fn file_info(&self, sha256: &str) -> Result<FileInfo, ClientError>;

    /// All results for a file.
    async fn file_results(&self, sha256: &str) -> Result<FileResults, ClientError>;

    /// Results of one service for a file.
    async fn file_result_for_service(
        &self,
        sha256: &str,
        service: &str,
    ) -> Result<FileResultForService, ClientError>;

    /// One result by its cache key.
    async fn result(&self, cache_key: &str) -> Result<ResultBlock, ClientError>;

    /// A submission.
    async fn submission(&self, sid: &str) -> Result<Submission, ClientError>;

    /// Results for one file of a submission.
    async fn submission_file_results(
        &self,
        sid: &str,
        sha256: &str,
    ) -> Result<SubmissionFileResults, ClientError>;

    /// A submission with its errors, results and file information resolved.
    async fn submission_full(&self, sid: &str) -> Result<SubmissionFull, ClientError>;

    /// The file tree of a submission.
    async fn submission_tree(&self, sid: &str) -> Result<SubmissionTree, ClientError>;

    /// Queues a file, URL or hash for asynchronous analysis.
    async fn ingest(&self, request: &IngestRequest) -> Result<IngestResponse, ClientError>;

    /// Drains completion messages from a notification queue.
    async fn ingest_message_list(&self, queue: &str) -> Result<Vec<IngestMessage>, ClientError>;

    /// Submits a file, URL or hash and returns the created submission.
    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, ClientError>;

    /// Names of the data sources [`hash_search`](Self::hash_search) can query.
    async fn hash_search_data_sources(&self) -> Result<Vec<String>, ClientError>;

    /// Looks up a hash (MD5, SHA1 or SHA256) across data sources.
    async fn hash_search(
        &self,
        hash: &str,
        options: &HashSearchOptions,
    ) -> Result<BTreeMap<String, HashSearchResult>, ClientError>;
}

#[async_trait]
impl AssemblylineApi for AssemblylineClient {
    async fn login(&self) -> Result<LoginResponse, ClientError> {
        self.core.login(&self.session, self.bearer_token()).await
    }

    #[instrument(skip(self))]
    async fn is_submission_complete(&self, sid: &str) -> Result<bool, ClientError> {
        let url = self.url(paths::SUBMISSION_IS_COMPLETED, &[sid])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip(self))]
    async fn file_info(&self, sha256: &str) -> Result<FileInfo, ClientError> {
        let url = self.url(paths::FILE_INFO, &[sha256])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip(self))]
    async fn file_results(&self, sha256: &str) -> Result<FileResults, ClientError> {
        let url = self.url(paths::FILE_RESULTS, &[sha256])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip(self))]
    async fn file_result_for_service(
        &self,
        sha256: &str,
        service: &str,
    ) -> Result<FileResultForService, ClientError> {
        let url = self.url(paths::FILE_RESULT_FOR_SERVICE, &[sha256, service])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip(self))]
    async fn result(&self, cache_key: &str) -> Result<ResultBlock, ClientError> {
        let url = self.url(paths::RESULT, &[cache_key])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip(self))]
    async fn submission(&self, sid: &str) -> Result<Submission, ClientError> {
        let url = self.url(paths::SUBMISSION, &[sid])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip(self))]
    async fn submission_file_results(
        &self,
        sid: &str,
        sha256: &str,
    ) -> Result<SubmissionFileResults, ClientError> {
        let url = self.url(paths::SUBMISSION_FILE_RESULTS, &[sid, sha256])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip(self))]
    async fn submission_full(&self, sid: &str) -> Result<SubmissionFull, ClientError> {
        let url = self.url(paths::SUBMISSION_FULL, &[sid])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip(self))]
    async fn submission_tree(&self, sid: &str) -> Result<SubmissionTree, ClientError> {
        let url = self.url(paths::SUBMISSION_TREE, &[sid])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip_all)]
    async fn ingest(&self, request: &IngestRequest) -> Result<IngestResponse, ClientError> {
        let url = self.url(paths::INGEST, &[])?;
        let body = submission_body(&request.source, request.metadata_json())?;
        self.execute(&ApiRequest::post(url, body)).await
    }

    #[instrument(skip(self))]
    async fn ingest_message_list(&self, queue: &str) -> Result<Vec<IngestMessage>, ClientError> {
        let url = self.url(paths::INGEST_MESSAGE_LIST, &[queue])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip_all)]
    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, ClientError> {
        let url = self.url(paths::SUBMIT, &[])?;
        let body = submission_body(&request.source, request.metadata_json())?;
        self.execute(&ApiRequest::post(url, body)).await
    }

    async fn hash_search_data_sources(&self) -> Result<Vec<String>, ClientError> {
        let url = self.url(paths::HASH_SEARCH_DATA_SOURCES, &[])?;
        self.execute(&ApiRequest::get(url)).await
    }

    #[instrument(skip(self, options))]
    async fn hash_search(
        &self,
        hash: &str,
        options: &HashSearchOptions,
    ) -> Result<BTreeMap<String, HashSearchResult>, ClientError> {
        let db = options.db_param();
        let max_timeout = options.max_timeout.map(|secs| secs.to_string());
        let url = paths::build_url(
            &self.core.base_url,
            paths::HASH_SEARCH,
            &[hash],
            &[("db", db.as_deref()), ("max_timeout", max_timeout.as_deref())],
        )?;
        self.execute(&ApiRequest::get(url)).await
    }
}

/// JSON body for hash and URL sources, multipart (`bin` + `json`) for bytes.
fn submission_body(
    source: &SubmissionSource,
    metadata: serde_json::Result<String>,
) -> Result<RequestBody, ClientError> {
    if let Some(reason) = source.invalid_reason() {
        return Err(ClientError::usage(reason));
    }
    let json = metadata.map_err(|source| ClientError::Encode { source })?;
    Ok(match source.binary() {
        Some((content, filename)) => RequestBody::Multipart {
            file: content.clone(),
            filename: filename.to_string(),
            json,
        },
        None => RequestBody::Json(Bytes::from(json)),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_source_becomes_json_body() {
        let request = SubmitRequest::sha256("abc");
        let body = submission_body(&request.source, request.metadata_json()).unwrap();
        match body {
            RequestBody::Json(bytes) => assert_eq!(bytes.as_ref(), br#"{"sha256":"abc"}"#),
            other => panic!("expected JSON body, got {other:?}"),
        }
    }

    #[test]
    fn test_binary_source_becomes_multipart_body() {
        let request = IngestRequest::binary(&b"test file"[..], "al_test.txt");
        let body = submission_body(&request.source, request.metadata_json()).unwrap();
        match body {
            RequestBody::Multipart {
                file,
                filename,
                json,
            } => {
                assert_eq!(file.as_ref(), b"test file");
                assert_eq!(filename, "al_test.txt");
                assert_eq!(json, "{}");
            }
            other => panic!("expected multipart body, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_url_is_usage_error() {
        let request = SubmitRequest::url(" ");
        let err = submission_body(&request.source, request.metadata_json()).unwrap_err();
        assert!(matches!(err, ClientError::Usage { .. }), "{err}");
    }
}
