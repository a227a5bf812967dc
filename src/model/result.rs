//! Service results: `result/{cache_key}/` and `file/result/{sha256}/{service}/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::file::{Attack, FileInfo};

/// One service's result for one file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultBlock {
    /// Archiving timestamp.
    pub archive_ts: Option<DateTime<Utc>>,
    /// Aggregate classification.
    pub classification: String,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Do not pass to other stages after this run.
    pub drop_file: bool,
    /// Expiry timestamp.
    pub expiry_ts: Option<DateTime<Utc>>,
    /// What the service reported about itself and the files it produced.
    pub response: ResultResponse,
    /// Scored sections.
    pub result: ResultBody,
    /// Nesting of `result.sections`.
    pub section_hierarchy: Vec<SectionHierarchyNode>,
    /// SHA256 of the analysed file.
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultResponse {
    /// Files extracted by the service.
    pub extracted: Vec<ResponseFile>,
    pub milestones: Milestones,
    pub service_context: Option<String>,
    pub service_debug_info: Option<String>,
    pub service_name: String,
    pub service_tool_version: Option<String>,
    pub service_version: String,
    /// Supplementary files produced by the service.
    pub supplementary: Vec<ResponseFile>,
}

/// A file produced by a service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseFile {
    pub classification: String,
    pub description: String,
    pub name: String,
    pub sha256: String,
}

/// Service start and completion times.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestones {
    pub service_completed: Option<DateTime<Utc>>,
    pub service_started: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultBody {
    /// Sum of the heuristic scores.
    pub score: i64,
    pub sections: Vec<Section>,
}

/// A titled part of a service result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    /// Section body. Its shape depends on `body_format`.
    pub body: Option<Value>,
    pub body_format: Option<BodyFormat>,
    pub classification: String,
    pub depth: u32,
    /// Heuristic that scored this section, if any.
    pub heuristic: Option<SectionHeuristic>,
    pub tags: Vec<SectionTag>,
    pub title_text: String,
}

/// How a section body should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyFormat {
    Text,
    MemoryDump,
    GraphData,
    Url,
    Json,
    KeyValue,
    ProcessTree,
    Table,
    #[serde(other)]
    Unknown,
}

/// The heuristic attached to a section. Unlike the summary [`Heuristic`]
/// this is an object and carries the score.
///
/// [`Heuristic`]: super::file::Heuristic
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionHeuristic {
    pub attack: Vec<Attack>,
    pub heur_id: String,
    pub name: String,
    pub score: i64,
    pub signature: Vec<Signature>,
}

/// A tag attached to a section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionTag {
    /// Full tag type including parents, e.g. `av.virus_name`.
    #[serde(rename = "type")]
    pub tag_type: String,
    /// Short tag type, e.g. `virus_name`.
    pub short_type: String,
    /// Tag value. Not restricted to strings.
    pub value: Value,
}

/// A node of the section hierarchy. `id` indexes into `result.sections`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionHierarchyNode {
    pub id: Option<u32>,
    pub children: Vec<SectionHierarchyNode>,
}

/// Payload of `file/result/{sha256}/{service}/`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileResultForService {
    pub file_info: Option<FileInfo>,
    pub results: Vec<ResultBlock>,
}

/// A signature that triggered a heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Signature {
    /// Number of times the signature triggered.
    pub frequency: u64,
    pub name: String,
}

/// An error a service raised while processing a file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceError {
    pub archive_ts: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub expiry_ts: Option<DateTime<Utc>>,
    pub response: ServiceErrorResponse,
    /// File the error relates to.
    pub sha256: String,
    #[serde(rename = "type")]
    pub error_type: Option<ServiceErrorType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceErrorResponse {
    pub message: String,
    pub service_debug_info: Option<String>,
    pub service_name: String,
    pub service_tool_version: Option<String>,
    pub service_version: String,
    pub status: Option<ServiceErrorStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceErrorStatus {
    FailNonrecoverable,
    FailRecoverable,
    #[serde(other)]
    Unknown,
}

/// Error categories. The server spells most of them with spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceErrorType {
    #[serde(rename = "EXCEPTION")]
    Exception,
    #[serde(rename = "MAX DEPTH REACHED")]
    MaxDepthReached,
    #[serde(rename = "MAX FILES REACHED")]
    MaxFilesReached,
    #[serde(rename = "MAX RETRY REACHED")]
    MaxRetryReached,
    #[serde(rename = "SERVICE BUSY")]
    ServiceBusy,
    #[serde(rename = "SERVICE DOWN")]
    ServiceDown,
    #[serde(rename = "TASK PRE-EMPTED")]
    TaskPreEmpted,
    #[serde(rename = "UNKNOWN", other)]
    Unknown,
}
