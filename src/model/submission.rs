//! Submission payloads: `submission/...` and `submit/`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::file::{Attack, FileInfo, Heuristic, Tag};
use super::result::{ResultBlock, ServiceError, Signature};

/// Lifecycle state of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionState {
    Failed,
    Submitted,
    Completed,
    #[serde(other)]
    Unknown,
}

/// A file that is part of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionFile {
    pub name: String,
    pub sha256: String,
    pub size: u64,
}

/// Submission timing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Times {
    pub completed: Option<DateTime<Utc>>,
    pub submitted: Option<DateTime<Utc>>,
}

/// Users who voted on the submission.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Verdict {
    pub malicious: Vec<String>,
    pub non_malicious: Vec<String>,
}

/// Service selection block of [`SubmissionParams`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSelection {
    pub excluded: Vec<String>,
    pub rescan: Vec<String>,
    pub resubmit: Vec<String>,
    pub runtime_excluded: Vec<String>,
    pub selected: Vec<String>,
}

/// Parameters a submission was scanned with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionParams {
    pub classification: String,
    pub deep_scan: bool,
    pub description: String,
    pub generate_alert: bool,
    pub groups: Vec<String>,
    pub ignore_cache: bool,
    pub ignore_dynamic_recursion_prevention: bool,
    pub ignore_filtering: bool,
    pub ignore_size: bool,
    pub initial_data: Option<String>,
    pub malicious: bool,
    pub max_extracted: u32,
    pub max_supplementary: u32,
    pub never_drop: bool,
    pub priority: u32,
    pub profile: bool,
    /// Parent submission ID.
    pub psid: Option<String>,
    pub quota_item: bool,
    /// Service name to service-specific parameters.
    pub service_spec: BTreeMap<String, BTreeMap<String, Value>>,
    pub services: ServiceSelection,
    pub submitter: String,
    /// Time to live in days.
    pub ttl: u32,
    #[serde(rename = "type")]
    pub submission_type: String,
}

/// Payload of `submission/{sid}/` and `submit/`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
    pub archive_ts: Option<DateTime<Utc>>,
    pub classification: String,
    pub error_count: u32,
    /// Error keys.
    pub errors: Vec<String>,
    pub expiry_ts: Option<DateTime<Utc>>,
    pub file_count: u32,
    pub files: Vec<SubmissionFile>,
    pub max_score: i64,
    pub metadata: BTreeMap<String, Value>,
    pub params: SubmissionParams,
    /// Result keys, `<sha256>.<service>.<version>.<config>`.
    pub results: Vec<String>,
    pub sid: String,
    pub state: Option<SubmissionState>,
    pub times: Times,
    pub verdict: Verdict,
}

/// Payload of `submission/full/{sid}/`.
///
/// Same as [`Submission`] except that error and result keys are resolved into
/// the records they point to, keys the datastore could not resolve are listed
/// separately, and the file tree is included.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionFull {
    pub archive_ts: Option<DateTime<Utc>>,
    pub classification: String,
    pub error_count: u32,
    /// Error key to error.
    pub errors: BTreeMap<String, ServiceError>,
    pub expiry_ts: Option<DateTime<Utc>>,
    pub file_count: u32,
    /// SHA256 to file information.
    pub file_infos: BTreeMap<String, FileInfo>,
    /// SHA256 of each root to its tree.
    pub file_tree: BTreeMap<String, TreeNode>,
    pub files: Vec<SubmissionFile>,
    pub max_score: i64,
    pub metadata: BTreeMap<String, Value>,
    pub missing_error_keys: Vec<String>,
    pub missing_file_keys: Vec<String>,
    pub missing_result_keys: Vec<String>,
    pub params: SubmissionParams,
    /// Result key to result.
    pub results: BTreeMap<String, ResultBlock>,
    pub sid: String,
    pub state: Option<SubmissionState>,
    pub times: Times,
    pub verdict: Verdict,
}

/// Payload of `submission/tree/{sid}/`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionTree {
    /// Maximum classification of the files in the tree.
    pub classification: String,
    /// Files were hidden because the user may not view them.
    pub filtered: bool,
    /// Some files could not be retrieved while building the tree.
    pub partial: bool,
    /// SHA256 of each root to its tree.
    pub tree: BTreeMap<String, TreeNode>,
}

/// A file in a submission tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeNode {
    /// SHA256 of each child to its subtree.
    pub children: BTreeMap<String, TreeNode>,
    /// Names the file was seen under.
    pub name: Vec<String>,
    pub score: i64,
    pub sha256: String,
    pub size: u64,
    /// This branch repeats elsewhere in the tree and was cut.
    pub truncated: bool,
    #[serde(rename = "type")]
    pub file_type: String,
}

/// Payload of `submission/{sid}/file/{sha256}/`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionFileResults {
    pub attack_matrix: BTreeMap<String, Vec<Attack>>,
    pub errors: Vec<ServiceError>,
    pub file_info: Option<FileInfo>,
    pub heuristics: BTreeMap<String, Vec<Heuristic>>,
    pub metadata: BTreeMap<String, Value>,
    pub results: Vec<ResultBlock>,
    pub signatures: Vec<Signature>,
    pub tags: BTreeMap<String, Vec<Tag>>,
}
