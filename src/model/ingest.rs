//! Request and response types for `ingest/` and `submit/`.
//!
//! Both endpoints take the same kind of input: a file identified by hash, a
//! URL for the server to fetch, or the file bytes themselves. The bytes are
//! sent as a multipart body with a `bin` part and a `json` metadata part;
//! hashes and URLs go as a plain JSON body.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::submission::{SubmissionFile, SubmissionParams};

/// What is being submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionSource {
    /// A file Assemblyline already stores.
    Sha256(String),
    /// A URL for Assemblyline to fetch.
    Url(String),
    /// File content uploaded with the request.
    Binary {
        /// File bytes.
        content: Bytes,
        /// File name sent with the `bin` part.
        filename: String,
    },
}

impl SubmissionSource {
    /// Returns why this source cannot be sent, if it cannot.
    pub(crate) fn invalid_reason(&self) -> Option<&'static str> {
        match self {
            Self::Sha256(hash) if hash.trim().is_empty() => Some("sha256 must not be empty"),
            Self::Url(url) if url.trim().is_empty() => Some("url must not be empty"),
            Self::Binary { filename, .. } if filename.trim().is_empty() => {
                Some("binary submissions need a file name")
            }
            _ => None,
        }
    }

    /// The uploaded bytes and file name, for multipart bodies.
    pub(crate) fn binary(&self) -> Option<(&Bytes, &str)> {
        match self {
            Self::Binary { content, filename } => Some((content, filename.as_str())),
            _ => None,
        }
    }
}

/// Metadata shared by submit and ingest requests. Empty fields are omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SubmitOptions {
    /// File name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Submission metadata.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    /// Submission parameter overrides.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    /// Name of a submission profile configured on the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_profile: Option<String>,
}

/// [`SubmitOptions`] plus the ingest-only fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IngestOptions {
    #[serde(flatten)]
    pub submit: SubmitOptions,
    /// Raise an alert for this ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_alert: Option<bool>,
    /// Queue the completion message is posted to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_queue: Option<String>,
    /// Minimum score for a completion message to be posted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_threshold: Option<u32>,
}

/// Body of `POST api/v4/submit/`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub source: SubmissionSource,
    pub options: SubmitOptions,
}

impl SubmitRequest {
    /// Submits a file already known to the server.
    pub fn sha256(hash: impl Into<String>) -> Self {
        Self::from_source(SubmissionSource::Sha256(hash.into()))
    }

    /// Submits a URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self::from_source(SubmissionSource::Url(url.into()))
    }

    /// Uploads file content.
    pub fn binary(content: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self::from_source(SubmissionSource::Binary {
            content: content.into(),
            filename: filename.into(),
        })
    }

    fn from_source(source: SubmissionSource) -> Self {
        Self {
            source,
            options: SubmitOptions::default(),
        }
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_options(mut self, options: SubmitOptions) -> Self {
        self.options = options;
        self
    }

    /// JSON body for hash/URL sources, or the `json` part for binaries.
    pub(crate) fn metadata_json(&self) -> serde_json::Result<String> {
        encode_metadata(&self.source, &self.options)
    }
}

/// Body of `POST api/v4/ingest/`.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRequest {
    pub source: SubmissionSource,
    pub options: IngestOptions,
}

impl IngestRequest {
    /// Ingests a file already known to the server.
    pub fn sha256(hash: impl Into<String>) -> Self {
        Self::from_source(SubmissionSource::Sha256(hash.into()))
    }

    /// Ingests a URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self::from_source(SubmissionSource::Url(url.into()))
    }

    /// Uploads file content.
    pub fn binary(content: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self::from_source(SubmissionSource::Binary {
            content: content.into(),
            filename: filename.into(),
        })
    }

    fn from_source(source: SubmissionSource) -> Self {
        Self {
            source,
            options: IngestOptions::default(),
        }
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn metadata_json(&self) -> serde_json::Result<String> {
        encode_metadata(&self.source, &self.options)
    }
}

#[derive(Serialize)]
struct WireSubmission<'a, O> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(flatten)]
    options: &'a O,
}

fn encode_metadata<O: Serialize>(
    source: &SubmissionSource,
    options: &O,
) -> serde_json::Result<String> {
    let (sha256, url) = match source {
        SubmissionSource::Sha256(hash) => (Some(hash.as_str()), None),
        SubmissionSource::Url(url) => (None, Some(url.as_str())),
        SubmissionSource::Binary { .. } => (None, None),
    };
    serde_json::to_string(&WireSubmission {
        sha256,
        url,
        options,
    })
}

/// Payload of `ingest/`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestResponse {
    /// ID the completion message will carry.
    pub ingest_id: String,
}

/// Whether the extended scan ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtendedScan {
    Submitted,
    Skipped,
    Incomplete,
    Completed,
    #[serde(other)]
    Unknown,
}

/// Notification settings echoed back in an [`IngestMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    pub queue: Option<String>,
    pub threshold: Option<u32>,
}

/// The submission an [`IngestMessage`] reports on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSubmission {
    pub files: Vec<SubmissionFile>,
    pub metadata: BTreeMap<String, Value>,
    pub notification: Notification,
    pub params: SubmissionParams,
    pub sid: String,
    /// Submission time.
    pub time: Option<DateTime<Utc>>,
}

/// A completion message read from an ingest notification queue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestMessage {
    pub extended_scan: Option<ExtendedScan>,
    /// Failure reason, if ingestion failed.
    pub failure: Option<String>,
    pub ingest_id: String,
    pub ingest_time: Option<DateTime<Utc>>,
    pub retries: u32,
    pub scan_key: Option<String>,
    pub score: i64,
    pub submission: IngestSubmission,
}
