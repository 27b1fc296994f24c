//! Nested name → value structures as they come out of the upstream JSON documents.
//!
//! Every upstream source (extras, multisigs, signers, pools, gauges, ...) is a tree of
//! string keys whose leaves are addresses. `AddressTree` keeps that shape explicit instead
//! of passing `serde_json::Value` around, and keeps insertion order so snapshots are
//! reproducible.

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One value inside an [`AddressTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// Textual address. Not guaranteed to be well formed until normalized.
    Address(String),
    /// Nested group of named values.
    Map(AddressTree),
    /// Anything else the upstream document contained (numbers, lists, null, ...).
    Other(Value),
}

impl Node {
    pub fn as_address(&self) -> Option<&str> {
        match self {
            Node::Address(address) => Some(address),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&AddressTree> {
        match self {
            Node::Map(tree) => Some(tree),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressTree(IndexMap<String, Node>);

impl AddressTree {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Builds a tree from an arbitrary JSON value. Non-object documents are logged and
    /// turned into an empty tree.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                warn!("Could not read address tree: {}", e);
                Self::new()
            }),
            Value::Null => Self::new(),
            other => {
                warn!("Expected a JSON object for an address tree, got {}", other);
                Self::new()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.0.get(key)
    }

    pub fn get_address(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Node::as_address)
    }

    pub fn get_map(&self, key: &str) -> Option<&AddressTree> {
        self.0.get(key).and_then(Node::as_map)
    }

    /// Follows a `/`-separated path through nested maps.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        let mut segments = path.split('/');
        let mut node = self.0.get(segments.next()?)?;
        for segment in segments {
            node = node.as_map()?.0.get(segment)?;
        }
        Some(node)
    }

    pub fn insert(&mut self, key: impl Into<String>, node: Node) -> Option<Node> {
        self.0.insert(key.into(), node)
    }

    pub fn insert_address(&mut self, key: impl Into<String>, address: impl Into<String>) {
        self.0.insert(key.into(), Node::Address(address.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl FromIterator<(String, Node)> for AddressTree {
    fn from_iter<T: IntoIterator<Item = (String, Node)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for AddressTree {
    type Item = (String, Node);
    type IntoIter = indexmap::map::IntoIter<String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_variants() {
        let tree = AddressTree::from_json(&json!({
            "dao": "0x10A19e7eE7d7F8a52822f6817de8ea18204F2e4f",
            "ops": { "alice": "0x0000000000000000000000000000000000000001" },
            "threshold": 3
        }));

        assert_eq!(
            tree.get_address("dao"),
            Some("0x10A19e7eE7d7F8a52822f6817de8ea18204F2e4f")
        );
        assert!(tree.get_map("ops").is_some());
        assert_eq!(tree.get("threshold"), Some(&Node::Other(json!(3))));
        assert_eq!(
            tree.lookup("ops/alice").and_then(Node::as_address),
            Some("0x0000000000000000000000000000000000000001")
        );
        assert!(tree.lookup("ops/bob").is_none());
    }

    #[test]
    fn test_non_object_is_empty() {
        assert!(AddressTree::from_json(&json!(["a", "b"])).is_empty());
        assert!(AddressTree::from_json(&Value::Null).is_empty());
    }
}
