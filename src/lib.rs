//! Assemblyline Client Library
//!
//! Typed async client for the Assemblyline v4 malware-analysis REST API.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Login credentials (API key or password)
//! - [`client`] - Session handling, 401 re-login, endpoints and downloads
//! - [`config`] - Layered configuration (TOML file, environment, overrides)
//! - [`model`] - Request and response types of the v4 API
//!
//! # Example
//!
//! ```no_run
//! use assemblyline_client::{AssemblylineApi, AssemblylineClient, ClientError, Credentials};
//!
//! # async fn example() -> Result<(), ClientError> {
//! let client = AssemblylineClient::new(
//!     "https://assemblyline.example.test",
//!     Credentials::api_key("admin", "devkey:admin")?,
//! )?;
//! let info = client.file_info("4a1f...").await?;
//! println!("{} is {} bytes", info.sha256, info.size);
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod config;
pub mod model;
mod user_agent;

// Re-export commonly used types
pub use auth::{Credentials, CredentialsError};
pub use client::{
    ApiError, AssemblylineApi, AssemblylineClient, ClientError, ClientOptions, DownloadStream,
    SESSION_COOKIE, TransportOptions,
};
pub use config::{AuthConfig, AuthMethod, ClientConfig, ConfigError, FileConfig, ProxyConfig};
pub use model::{
    DownloadParams, Encoding, HashSearchOptions, IngestOptions, IngestRequest, SubmissionSource,
    SubmitOptions, SubmitRequest,
};
