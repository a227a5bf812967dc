//! File-centric payloads: `file/info/{sha256}/` and `file/result/{sha256}/`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::positional::{PositionalError, take_strings};
use super::result::{ResultBlock, ServiceError, Signature};

/// Information about a file known to Assemblyline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileInfo {
    /// Archiving timestamp.
    pub archive_ts: Option<DateTime<Utc>>,
    /// Dotted ASCII representation of the first 64 bytes.
    pub ascii: String,
    /// Classification of the file.
    pub classification: String,
    /// Entropy of the file.
    pub entropy: f64,
    /// Expiry timestamp.
    pub expiry_ts: Option<DateTime<Utc>>,
    /// Hex dump of the first 64 bytes.
    pub hex: String,
    /// libmagic description.
    pub magic: String,
    /// MD5 of the file.
    pub md5: String,
    /// MIME type as identified by libmagic.
    pub mime: String,
    /// When the file was seen.
    pub seen: Option<Seen>,
    /// SHA1 of the file.
    pub sha1: String,
    /// SHA256 of the file.
    pub sha256: String,
    /// Size in bytes.
    pub size: u64,
    /// SSDEEP fuzzy hash.
    pub ssdeep: String,
    /// File type as identified by Assemblyline.
    #[serde(rename = "type")]
    pub file_type: String,
}

/// Sighting counters for a file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Seen {
    /// Number of times the file was seen.
    pub count: u64,
    /// First sighting.
    pub first: Option<DateTime<Utc>>,
    /// Last sighting.
    pub last: Option<DateTime<Utc>>,
}

/// Everything Assemblyline knows about a file, from `file/result/{sha256}/`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileResults {
    /// Service name to alternate (older or differently configured) results.
    pub alternates: BTreeMap<String, Vec<AlternateResult>>,
    /// Attack category to attacks.
    pub attack_matrix: BTreeMap<String, Vec<Attack>>,
    /// Files extracted from this one. The server spells it `childrens`.
    pub childrens: Vec<ChildFile>,
    /// Service errors.
    pub errors: Vec<ServiceError>,
    /// File information.
    pub file_info: Option<FileInfo>,
    /// UI switch to disable features.
    pub file_viewer_only: bool,
    /// Heuristic type (`info`, `suspicious`, `malicious`) to heuristics.
    pub heuristics: BTreeMap<String, Vec<Heuristic>>,
    /// Metadata facets.
    pub metadata: BTreeMap<String, Value>,
    /// Result keys of the parents of this file.
    pub parents: Vec<String>,
    /// Service results.
    pub results: Vec<ResultBlock>,
    /// Aggregated signatures from all results.
    pub signatures: Vec<Signature>,
    /// Tag type to tags.
    pub tags: BTreeMap<String, Vec<Tag>>,
}

/// A result superseded by another run of the same service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlternateResult {
    /// Aggregate classification.
    pub classification: String,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Do not pass to other stages after this run.
    pub drop_file: bool,
    /// Result key, `<sha256>.<service>.<version>.<config>`.
    pub id: String,
    /// Service identity.
    pub response: AlternateResponse,
    /// Score summary.
    pub result: AlternateScore,
}

/// Service identity of an [`AlternateResult`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlternateResponse {
    pub service_name: String,
    pub service_tool_version: String,
    pub service_version: String,
}

/// Score summary of an [`AlternateResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlternateScore {
    pub score: i64,
}

/// A child file extracted during analysis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildFile {
    pub name: String,
    pub sha256: String,
}

/// An ATT&CK matrix entry.
///
/// On the wire this is `[attack_id, attack_pattern, heuristic_type]` inside
/// `attack_matrix`, and an object inside result section heuristics. Both forms
/// decode; it is encoded back as the array.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "AttackRepr", into = "[String; 3]")]
pub struct Attack {
    /// ATT&CK ID, e.g. `T1055`.
    pub attack_id: String,
    /// Pattern name.
    pub attack_pattern: String,
    /// `info`, `suspicious` or `malicious`.
    pub heuristic_type: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AttackRepr {
    Positional(Vec<Value>),
    Object {
        attack_id: String,
        #[serde(default, alias = "pattern")]
        attack_pattern: String,
        #[serde(default)]
        heuristic_type: String,
    },
}

impl TryFrom<AttackRepr> for Attack {
    type Error = PositionalError;

    fn try_from(repr: AttackRepr) -> Result<Self, Self::Error> {
        match repr {
            AttackRepr::Positional(values) => {
                let [attack_id, attack_pattern, heuristic_type] = take_strings("attack", values)?;
                Ok(Self {
                    attack_id,
                    attack_pattern,
                    heuristic_type,
                })
            }
            AttackRepr::Object {
                attack_id,
                attack_pattern,
                heuristic_type,
            } => Ok(Self {
                attack_id,
                attack_pattern,
                heuristic_type,
            }),
        }
    }
}

impl From<Attack> for [String; 3] {
    fn from(attack: Attack) -> Self {
        [attack.attack_id, attack.attack_pattern, attack.heuristic_type]
    }
}

/// A triggered heuristic, encoded as `[heur_id, name]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "[String; 2]")]
pub struct Heuristic {
    pub heur_id: String,
    pub name: String,
}

impl TryFrom<Vec<Value>> for Heuristic {
    type Error = PositionalError;

    fn try_from(values: Vec<Value>) -> Result<Self, Self::Error> {
        let [heur_id, name] = take_strings("heuristic", values)?;
        Ok(Self { heur_id, name })
    }
}

impl From<Heuristic> for [String; 2] {
    fn from(heuristic: Heuristic) -> Self {
        [heuristic.heur_id, heuristic.name]
    }
}

/// A tag value, encoded as `[value, heuristic_type]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "[String; 2]")]
pub struct Tag {
    pub value: String,
    pub heuristic_type: String,
}

impl TryFrom<Vec<Value>> for Tag {
    type Error = PositionalError;

    fn try_from(values: Vec<Value>) -> Result<Self, Self::Error> {
        let [value, heuristic_type] = take_strings("tag", values)?;
        Ok(Self {
            value,
            heuristic_type,
        })
    }
}

impl From<Tag> for [String; 2] {
    fn from(tag: Tag) -> Self {
        [tag.value, tag.heuristic_type]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_info_decodes_timestamps_and_type() {
        let info: FileInfo = serde_json::from_value(json!({
            "sha256": "334d016f755cd6dc58c53a86e183882f8ec14f52fb05345887c8a5edd42c87b7",
            "size": 19,
            "type": "text/plain",
            "entropy": 3.5,
            "seen": {"count": 4, "first": "2021-03-04T21:23:00.354786Z", "last": "2021-03-05T00:00:00Z"},
            "expiry_ts": null,
            "unexpected_field": 1
        }))
        .unwrap();
        assert_eq!(info.size, 19);
        assert_eq!(info.file_type, "text/plain");
        let seen = info.seen.unwrap();
        assert_eq!(seen.count, 4);
        assert_eq!(
            seen.first.unwrap().to_rfc3339(),
            "2021-03-04T21:23:00.354786+00:00"
        );
        assert!(info.expiry_ts.is_none());
    }

    #[test]
    fn test_file_results_decodes_array_shaped_maps() {
        let results: FileResults = serde_json::from_value(json!({
            "attack_matrix": {"defense-evasion": [["T1055", "Process Injection", "malicious"]]},
            "heuristics": {"suspicious": [["AL_PEEK_1", "Suspicious import"]]},
            "tags": {"network.static.domain": [["evil.example", "info"]]},
            "childrens": [{"name": "a.exe", "sha256": "abc"}],
            "file_viewer_only": true
        }))
        .unwrap();

        assert_eq!(
            results.attack_matrix["defense-evasion"][0],
            Attack {
                attack_id: "T1055".to_string(),
                attack_pattern: "Process Injection".to_string(),
                heuristic_type: "malicious".to_string(),
            }
        );
        assert_eq!(results.heuristics["suspicious"][0].heur_id, "AL_PEEK_1");
        assert_eq!(results.tags["network.static.domain"][0].value, "evil.example");
        assert_eq!(results.childrens[0].name, "a.exe");
        assert!(results.file_viewer_only);
    }

    #[test]
    fn test_heuristic_with_wrong_arity_is_a_decode_error() {
        let err = serde_json::from_value::<Heuristic>(json!(["only-id"])).unwrap_err();
        assert!(err.to_string().contains("heuristic expects at least 2"), "{err}");
    }

    #[test]
    fn test_attack_accepts_object_form() {
        let attack: Attack = serde_json::from_value(json!({
            "attack_id": "T1027",
            "pattern": "Obfuscated Files or Information",
            "categories": ["defense-evasion"]
        }))
        .unwrap();
        assert_eq!(attack.attack_id, "T1027");
        assert_eq!(attack.attack_pattern, "Obfuscated Files or Information");
    }

    #[test]
    fn test_tag_encodes_back_to_array() {
        let tag = Tag {
            value: "1.2.3.4".to_string(),
            heuristic_type: "info".to_string(),
        };
        assert_eq!(serde_json::to_value(tag).unwrap(), json!(["1.2.3.4", "info"]));
    }
}
