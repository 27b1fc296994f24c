// src/chains.rs
//
// Chain directory (extras/chains.json). Fetched once per process and shared read-only by
// every per-chain component.

use crate::errors::{AddressBookError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainDirectory {
    #[serde(rename = "CHAIN_IDS_BY_NAME", default)]
    pub chain_ids_by_name: IndexMap<String, u64>,
    #[serde(rename = "SCANNERS_BY_CHAIN", default)]
    pub scanners_by_chain: IndexMap<String, String>,
    #[serde(rename = "BALANCER_PRODUCTION_CHAINS", default)]
    pub balancer_production_chains: Vec<String>,
}

impl ChainDirectory {
    pub fn chains(&self) -> impl Iterator<Item = &str> {
        self.chain_ids_by_name.keys().map(String::as_str)
    }

    pub fn contains(&self, chain: &str) -> bool {
        self.chain_ids_by_name.contains_key(chain)
    }

    pub fn chain_id(&self, chain: &str) -> Result<u64> {
        self.chain_ids_by_name
            .get(chain)
            .copied()
            .ok_or_else(|| AddressBookError::UnknownChain(chain.to_string()))
    }

    pub fn scanner(&self, chain: &str) -> Option<&str> {
        self.scanners_by_chain.get(chain).map(String::as_str)
    }

    /// Name of the chain with the given numeric id.
    pub fn chain_name(&self, chain_id: u64) -> Option<&str> {
        self.chain_ids_by_name
            .iter()
            .find(|(_, id)| **id == chain_id)
            .map(|(name, _)| name.as_str())
    }

    /// Validates a chain name against the directory.
    pub fn require(&self, chain: &str) -> Result<()> {
        if self.contains(chain) {
            Ok(())
        } else {
            Err(AddressBookError::UnknownChain(chain.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chain_directory() {
        let directory: ChainDirectory = serde_json::from_value(json!({
            "CHAIN_IDS_BY_NAME": { "mainnet": 1, "arbitrum": 42161, "gnosis": 100 },
            "SCANNERS_BY_CHAIN": { "mainnet": "https://etherscan.io" },
            "BALANCER_PRODUCTION_CHAINS": ["mainnet", "arbitrum"]
        }))
        .unwrap();

        assert_eq!(directory.chains().collect::<Vec<_>>(), vec!["mainnet", "arbitrum", "gnosis"]);
        assert_eq!(directory.chain_id("arbitrum").unwrap(), 42161);
        assert_eq!(directory.chain_name(100), Some("gnosis"));
        assert_eq!(directory.scanner("mainnet"), Some("https://etherscan.io"));
        assert!(directory.scanner("gnosis").is_none());
        assert!(matches!(
            directory.require("fantom"),
            Err(AddressBookError::UnknownChain(_))
        ));
    }
}
