//! Typed request and response models of the Assemblyline v4 API.
//!
//! Response types decode leniently: unknown fields are ignored, missing ones
//! take their default, and enums the server may extend fall back to an
//! `Unknown` variant. Timestamps are UTC.

mod download;
mod envelope;
mod file;
mod hash_search;
mod ingest;
mod login;
mod positional;
mod result;
mod submission;

pub use download::{DownloadParams, Encoding};
pub use envelope::ApiEnvelope;
pub use file::{
    AlternateResponse, AlternateResult, AlternateScore, Attack, ChildFile, FileInfo, FileResults,
    Heuristic, Seen, Tag,
};
pub use hash_search::{HashSearchOptions, HashSearchResult};
pub use ingest::{
    ExtendedScan, IngestMessage, IngestOptions, IngestRequest, IngestResponse, IngestSubmission,
    Notification, SubmissionSource, SubmitOptions, SubmitRequest,
};
pub use login::{LoginResponse, Privilege};
pub use positional::PositionalError;
pub use result::{
    BodyFormat, FileResultForService, Milestones, ResponseFile, ResultBlock, ResultBody,
    ResultResponse, Section, SectionHeuristic, SectionHierarchyNode, SectionTag, ServiceError,
    ServiceErrorResponse, ServiceErrorStatus, ServiceErrorType, Signature,
};
pub use submission::{
    ServiceSelection, Submission, SubmissionFile, SubmissionFileResults, SubmissionFull,
    SubmissionParams, SubmissionState, SubmissionTree, Times, TreeNode, Verdict,
};
