use serde::{Deserialize, Serialize};

use crate::{StringMap, Uid};

/// Object metadata common to tasks and pods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Prefix the platform completes with a random suffix when `name` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,
    /// Opaque version used for optimistic concurrency on updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "StringMap::is_empty")]
    pub labels: StringMap,
    #[serde(default, skip_serializing_if = "StringMap::is_empty")]
    pub annotations: StringMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Returns `true` if any owner reference points at `uid`.
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_references.iter().any(|o| o.uid == uid)
    }

    /// Returns `true` if every `(key, value)` of `selector` is present in the labels.
    pub fn matches_labels(&self, selector: &StringMap) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).is_some_and(|have| have == v))
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Reference from a dependent object to its owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: Uid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ObjectMeta {
        let mut m = ObjectMeta {
            name: "p".into(),
            namespace: "default".into(),
            ..Default::default()
        };
        m.labels.insert("a".into(), "1".into());
        m.labels.insert("b".into(), "2".into());
        m.owner_references.push(OwnerReference {
            uid: "uid-1".into(),
            ..Default::default()
        });
        m
    }

    #[test]
    fn owner_match_by_uid() {
        let m = meta();
        assert!(m.is_owned_by("uid-1"));
        assert!(!m.is_owned_by("uid-2"));
    }

    #[test]
    fn label_selector_requires_all_pairs() {
        let m = meta();
        let mut sel = StringMap::new();
        sel.insert("a".into(), "1".into());
        assert!(m.matches_labels(&sel));

        sel.insert("b".into(), "3".into());
        assert!(!m.matches_labels(&sel));
        assert!(m.matches_labels(&StringMap::new()));
    }

    #[test]
    fn serde_skips_empty_fields() {
        let m = ObjectMeta {
            name: "x".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"name":"x"}"#);
    }
}
