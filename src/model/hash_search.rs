//! Hash reputation lookups: `hash_search/{hash}/`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Optional filters for a hash search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HashSearchOptions {
    /// Data sources to query. Empty means all of them.
    pub data_sources: Vec<String>,
    /// Server-side timeout override in seconds.
    pub max_timeout: Option<u32>,
}

impl HashSearchOptions {
    /// The `db` query value: data sources joined by `|`.
    pub(crate) fn db_param(&self) -> Option<String> {
        if self.data_sources.is_empty() {
            None
        } else {
            Some(self.data_sources.join("|"))
        }
    }
}

/// One data source's answer to a hash search.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HashSearchResult {
    /// Error reported by the data source.
    pub error: Option<String>,
    /// Records found in the data source.
    pub items: Vec<BTreeMap<String, Value>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_db_param_joins_with_pipe() {
        let options = HashSearchOptions {
            data_sources: vec!["a".into(), "b".into(), "c".into()],
            max_timeout: Some(15),
        };
        assert_eq!(options.db_param().as_deref(), Some("a|b|c"));
        assert_eq!(HashSearchOptions::default().db_param(), None);
    }

    #[test]
    fn test_result_map_decodes_per_source() {
        let results: BTreeMap<String, HashSearchResult> = serde_json::from_str(
            r#"{"al":{"error":null,"items":[{"sha256":"x"}]},"alert":{"error":"timeout","items":[]}}"#,
        )
        .unwrap();
        assert_eq!(results["al"].items.len(), 1);
        assert_eq!(results["alert"].error.as_deref(), Some("timeout"));
    }
}
