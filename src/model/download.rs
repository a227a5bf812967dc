//! Parameters of `file/download/{sha256}/`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Encoding of a downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// CaRT-neutered. The safe default for malware.
    #[default]
    Cart,
    /// The original bytes.
    Raw,
}

impl Encoding {
    /// Query string value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download options. The default is `{Cart, no name, no sid}`.
///
/// `name` and `sid` only affect the CaRT metadata section. The server ignores
/// them for raw downloads but they are still sent when set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadParams {
    /// CaRT-wrapped or raw bytes. Defaults to CaRT.
    pub encoding: Encoding,
    /// File name recorded in the CaRT metadata.
    pub name: Option<String>,
    /// Submission whose metadata should be included.
    pub sid: Option<String>,
}

impl DownloadParams {
    /// Query pairs in wire order. Unset or blank values are left out.
    pub(crate) fn query(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("encoding", Some(self.encoding.as_str())),
            ("name", non_blank(self.name.as_deref())),
            ("sid", non_blank(self.sid.as_deref())),
        ]
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
