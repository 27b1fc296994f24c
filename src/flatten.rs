// src/flatten.rs
//
// Turns nested address trees into flat `a/b/c -> leaf` maps.

use crate::tree::{AddressTree, Node};

/// Flattens `tree` into a single-level tree keyed by `/`-joined paths.
///
/// Keys are unique per nesting level, so no leaf is ever dropped here. Collisions can only
/// appear once several flattened sources are merged, and the registry resolves those.
pub fn flatten(tree: &AddressTree) -> AddressTree {
    let mut out = AddressTree::new();
    flatten_into("", tree, &mut out);
    out
}

/// Flattens `tree` under `prefix` (no trailing slash) into `out`, overwriting existing keys.
pub fn flatten_into(prefix: &str, tree: &AddressTree, out: &mut AddressTree) {
    for (key, node) in tree.iter() {
        let path = join_path(prefix, key);
        match node {
            Node::Map(inner) => flatten_into(&path, inner, out),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Joins two path fragments with `/`, ignoring an empty prefix.
pub fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested() {
        let tree = AddressTree::from_json(&json!({
            "ops": {
                "alice": "0x01",
                "team": { "bob": "0x02" }
            },
            "dao": "0x03"
        }));
        let flat = flatten(&tree);

        let keys: Vec<&String> = flat.keys().collect();
        assert_eq!(keys, vec!["ops/alice", "ops/team/bob", "dao"]);
        assert_eq!(flat.get_address("ops/team/bob"), Some("0x02"));
    }

    #[test]
    fn test_flatten_under_prefix_matches_nested() {
        let inner = AddressTree::from_json(&json!({ "alice": "0x01", "bob": "0x02" }));

        let mut merged = AddressTree::new();
        flatten_into("EOA/ops", &flatten(&inner), &mut merged);

        let mut wrapped = AddressTree::new();
        wrapped.insert("ops", Node::Map(inner));
        let mut direct = AddressTree::new();
        flatten_into("EOA", &wrapped, &mut direct);

        assert_eq!(merged, direct);
    }

    #[test]
    fn test_empty_map_has_no_leaves() {
        let tree = AddressTree::from_json(&json!({ "empty": {} }));
        assert!(flatten(&tree).is_empty());
    }
}
