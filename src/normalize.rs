// src/normalize.rs
//
// EIP-55 checksum normalization for address leaves of nested address trees.
// Malformed leaves are never fatal: they are kept verbatim and logged.

use crate::tree::{AddressTree, Node};
use ethers::types::Address;
use ethers::utils::to_checksum;
use log::warn;

/// Parses a 40 hex character address, with or without the `0x` prefix.
pub fn parse_address(raw: &str) -> Option<Address> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex_part.len() != 40 {
        return None;
    }
    let bytes = hex::decode(hex_part).ok()?;
    Some(Address::from_slice(&bytes))
}

/// Canonical mixed-case form of `raw`, or `None` when it is not an address.
pub fn checksum_address(raw: &str) -> Option<String> {
    parse_address(raw).map(|address| to_checksum(&address, None))
}

/// Checksums `raw` when possible, otherwise returns it unchanged.
pub fn checksum_or_passthrough(raw: &str) -> String {
    checksum_address(raw).unwrap_or_else(|| raw.to_string())
}

/// Recursively checksums every address leaf of `tree`.
///
/// String leaves that do not parse as addresses and non-string leaves are kept as they are
/// and reported with a warning. Normalizing an already normalized tree returns it unchanged.
pub fn normalize_tree(tree: &AddressTree) -> AddressTree {
    normalize_at("", tree)
}

fn normalize_at(prefix: &str, tree: &AddressTree) -> AddressTree {
    tree.iter()
        .map(|(key, node)| {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}/{}", prefix, key)
            };
            let normalized = match node {
                Node::Address(raw) => match checksum_address(raw) {
                    Some(checksummed) => Node::Address(checksummed),
                    None => {
                        warn!("{} = {:?} is not a valid address, keeping it as is", path, raw);
                        Node::Address(raw.clone())
                    }
                },
                Node::Map(inner) => Node::Map(normalize_at(&path, inner)),
                Node::Other(value) => {
                    warn!("{} {} formatted incorrectly", path, value);
                    Node::Other(value.clone())
                }
            };
            (key.clone(), normalized)
        })
        .collect()
}
