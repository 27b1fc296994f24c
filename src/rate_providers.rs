//! Reviewed rate providers per chain, from the code-review registry.
//!
//! The registry is keyed by chain (with `ethereum` standing in for `mainnet`) and then by
//! rate provider address. Besides the per-provider view, providers are re-indexed by the
//! asset they price, which is what pool tooling usually asks about.

use crate::normalize::checksum_or_passthrough;
use crate::tree::AddressTree;
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateProviderInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub factory: Option<String>,
}

/// A rate provider seen from the asset it prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenRateProvider {
    pub rate_provider: String,
    pub name: String,
    pub is_safe: bool,
    pub warnings: Vec<String>,
    pub factory: Option<String>,
    pub review_link: String,
}

/// Whole registry document: chain -> provider address -> info.
pub type RateProviderRegistry = IndexMap<String, IndexMap<String, RateProviderInfo>>;

/// Registry chain key for one of our chain names.
pub fn registry_chain(chain: &str) -> &str {
    if chain == "mainnet" {
        "ethereum"
    } else {
        chain
    }
}

/// Parses the registry document, skipping chains or entries that do not fit the schema.
pub fn parse_registry(value: &Value) -> RateProviderRegistry {
    let mut registry = RateProviderRegistry::new();
    let Some(chains) = value.as_object() else {
        return registry;
    };
    for (chain, providers) in chains {
        let Some(providers) = providers.as_object() else {
            warn!("Rate provider registry entry for {} is not an object", chain);
            continue;
        };
        let mut parsed = IndexMap::new();
        for (provider, info) in providers {
            match serde_json::from_value::<RateProviderInfo>(info.clone()) {
                Ok(info) => {
                    parsed.insert(checksum_or_passthrough(provider), info);
                }
                Err(e) => warn!(
                    "Rate provider {} on {} formatted incorrectly: {}",
                    provider, chain, e
                ),
            }
        }
        registry.insert(chain.clone(), parsed);
    }
    registry
}

#[derive(Debug, Clone, Default)]
pub struct RateProviders {
    pub chain: String,
    pub info_by_rate_provider: IndexMap<String, RateProviderInfo>,
    pub rate_providers_by_token: IndexMap<String, TokenRateProvider>,
}

impl RateProviders {
    pub fn new(chain: &str, registry: &RateProviderRegistry, browse_url: &str) -> Self {
        let key = registry_chain(chain);
        let Some(infos) = registry.get(key) else {
            warn!("Chain {} has no reviewed rate providers", key);
            return Self {
                chain: chain.to_string(),
                ..Self::default()
            };
        };

        let rate_providers_by_token = infos
            .iter()
            .map(|(provider, info)| {
                let token = checksum_or_passthrough(&info.asset);
                let entry = TokenRateProvider {
                    rate_provider: checksum_or_passthrough(provider),
                    name: info.name.clone(),
                    is_safe: info.summary == "safe",
                    warnings: info.warnings.clone(),
                    factory: info.factory.clone(),
                    review_link: info
                        .review
                        .replace("./", &format!("{}/rate-providers/", browse_url)),
                };
                (token, entry)
            })
            .collect();

        Self {
            chain: chain.to_string(),
            info_by_rate_provider: infos.clone(),
            rate_providers_by_token,
        }
    }

    /// Review link of the token's rate provider, only when that provider was reviewed safe.
    pub fn review_for_safe_rate_provider(&self, token: &str) -> Option<&str> {
        self.rate_providers_by_token
            .get(&checksum_or_passthrough(token))
            .filter(|entry| entry.is_safe)
            .map(|entry| entry.review_link.as_str())
    }

    /// `name -> provider address` tree for the address book. Duplicate names get the first
    /// four hex characters of the provider address appended, or the whole address when
    /// that is taken too.
    pub fn address_tree(&self) -> AddressTree {
        let mut tree = AddressTree::new();
        for (provider, info) in &self.info_by_rate_provider {
            let base = if info.name.is_empty() {
                provider.clone()
            } else {
                info.name.clone()
            };
            let short = format!("{}-{}", base, provider.get(2..6).unwrap_or_default());
            let key = if !tree.contains_key(&base) {
                base
            } else if !tree.contains_key(&short) {
                short
            } else {
                format!("{}-{}", base, provider)
            };
            tree.insert_address(key, provider.clone());
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BROWSE: &str = "https://github.com/balancer/code-review/blob/main";

    fn registry() -> RateProviderRegistry {
        parse_registry(&json!({
            "ethereum": {
                "0x1a8f81c256aee9c640e14bb0453ce247ea0dfe6f": {
                    "name": "wstETH Rate Provider",
                    "summary": "safe",
                    "asset": "0x7f39c581f595b53c5cb19bd0b3f8da6c935e2ca0",
                    "review": "./LidoWstethRateProviderReview.md",
                    "warnings": [],
                    "factory": ""
                },
                "0xcdaa68ce322728fe4185a60f103c194f1e2c47bc": {
                    "name": "wstETH Rate Provider",
                    "summary": "unsafe",
                    "asset": "0xae78736cd615f374d3085123a210448e74fc6393",
                    "review": "./RocketPoolRateProvider.md",
                    "warnings": ["eoa-upgradeable"]
                }
            },
            "arbitrum": "oops"
        }))
    }

    #[test]
    fn test_mainnet_alias_and_token_index() {
        let providers = RateProviders::new("mainnet", &registry(), BROWSE);
        assert_eq!(providers.info_by_rate_provider.len(), 2);

        let review = providers
            .review_for_safe_rate_provider("0x7f39c581f595b53c5cb19bd0b3f8da6c935e2ca0")
            .unwrap();
        assert_eq!(
            review,
            "https://github.com/balancer/code-review/blob/main/rate-providers/LidoWstethRateProviderReview.md"
        );
        assert!(providers
            .review_for_safe_rate_provider("0xae78736cd615f374d3085123a210448e74fc6393")
            .is_none());
    }

    #[test]
    fn test_unsupported_chain_is_empty() {
        let providers = RateProviders::new("arbitrum", &registry(), BROWSE);
        assert!(providers.info_by_rate_provider.is_empty());
        assert!(providers.address_tree().is_empty());
    }

    #[test]
    fn test_address_tree_deduplicates_names() {
        let providers = RateProviders::new("mainnet", &registry(), BROWSE);
        let tree = providers.address_tree();
        let keys: Vec<&String> = tree.keys().collect();
        assert_eq!(keys, vec!["wstETH Rate Provider", "wstETH Rate Provider-cdAa"]);
    }

    #[test]
    fn test_address_tree_keeps_prefix_collisions() {
        let mut registry = registry();
        let third = "0xcdAa2d9a2784B73BfB8F5Ef1AD4B42Bd54fFD093";
        registry["ethereum"].insert(
            third.to_string(),
            RateProviderInfo {
                name: "wstETH Rate Provider".to_string(),
                ..RateProviderInfo::default()
            },
        );
        let providers = RateProviders::new("mainnet", &registry, BROWSE);
        let tree = providers.address_tree();

        assert_eq!(tree.len(), 3);
        assert_eq!(
            tree.get_address("wstETH Rate Provider-cdAa"),
            Some("0xcdAa68ce322728FE4185a60f103C194F1E2c47BC")
        );
        assert_eq!(
            tree.get_address(&format!("wstETH Rate Provider-{}", third)),
            Some(third)
        );
    }
}
