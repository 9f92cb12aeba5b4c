//! Identity of a test variant branch and its write-once metadata.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

/// Primary key of a branch record: (project, test, variant, source branch).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchKey {
    pub project: String,
    pub test_id: String,
    pub variant_hash: String,
    /// Opaque hash identifying the source branch.
    pub ref_hash: Vec<u8>,
}

impl BranchKey {
    pub fn new(
        project: impl Into<String>,
        test_id: impl Into<String>,
        variant_hash: impl Into<String>,
        ref_hash: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            project: project.into(),
            test_id: test_id.into(),
            variant_hash: variant_hash.into(),
            ref_hash: ref_hash.into(),
        }
    }

    /// Lower-case hex rendering of `ref_hash`.
    #[must_use]
    pub fn ref_hash_hex(&self) -> String {
        let mut out = String::with_capacity(self.ref_hash.len() * 2);
        for byte in &self.ref_hash {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl fmt::Display for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.project,
            self.test_id,
            self.variant_hash,
            self.ref_hash_hex()
        )
    }
}

/// Key/value definition of a test variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub def: BTreeMap<String, String>,
}

impl Variant {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            def: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A Gitiles branch reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitilesRef {
    pub host: String,
    pub project: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// The source branch a record tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRef {
    Gitiles(GitilesRef),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_hash_renders_as_hex() {
        let key = BranchKey::new("project", "this//is/a/test", "0123456789abcdef", *b"ref_hash");
        assert_eq!(key.ref_hash_hex(), "7265665f68617368");
        assert_eq!(
            key.to_string(),
            "project/this//is/a/test/0123456789abcdef/7265665f68617368"
        );
    }

    #[test]
    fn source_ref_json_shape() {
        let source = SourceRef::Gitiles(GitilesRef {
            host: "host".to_owned(),
            project: "proj".to_owned(),
            reference: "ref".to_owned(),
        });
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"gitiles": {"host": "host", "project": "proj", "ref": "ref"}})
        );
    }
}
