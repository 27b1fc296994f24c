//! # Chain registry
//!
//! Merges every per-chain source into one flat `path -> address` book (the *flatbook*)
//! and its `address -> path` inverse (the *reversebook*).
//!
//! ## Merge order
//!
//! Later sources overwrite earlier ones when they produce the same path:
//!
//! 1. `pools/...`
//! 2. `gauges/...`
//! 3. `root_gauges/...` (mainnet only)
//! 4. `<deployment>/<contract>` - deployment data is authoritative over subgraph naming
//! 5. extras, unprefixed - hand-maintained last-mile corrections
//! 6. `multisigs/...`
//! 7. `EOA/...`
//! 8. `rate_providers/...`
//!
//! The reversebook is derived from the final flatbook in write order, so when several
//! paths share an address the one written last wins.

use crate::chains::ChainDirectory;
use crate::deployments::{Deployment, Deployments};
use crate::errors::{expect_unique, Result};
use crate::flatten::flatten;
use crate::normalize::checksum_or_passthrough;
use crate::sources::{ChainSources, DocumentFetcher, SharedDocuments, SourceLoader};
use crate::tree::{AddressTree, Node};
use indexmap::IndexMap;
use log::{debug, info, warn};

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Path → address, in write order.
pub type Flatbook = IndexMap<String, String>;
/// Address → path.
pub type Reversebook = IndexMap<String, String>;

/// Accumulates the flatbook for one chain following the fixed merge order.
pub struct RegistryBuilder {
    chain: String,
    flatbook: Flatbook,
}

impl RegistryBuilder {
    pub fn new(chain: &str) -> Self {
        Self {
            chain: chain.to_string(),
            flatbook: Flatbook::new(),
        }
    }

    /// Writes `address` at `path`. An overwritten path moves to the end so the write
    /// order seen by [`reverse_book`] is the order of last writes.
    pub fn insert(&mut self, path: String, address: &str) {
        let address = checksum_or_passthrough(address);
        if let Some(previous) = self.flatbook.shift_remove(&path) {
            if previous != address {
                debug!("{}: {} overwritten ({} -> {})", self.chain, path, previous, address);
            }
        }
        self.flatbook.insert(path, address);
    }

    /// Flattens `tree` under `prefix` and writes every address leaf.
    pub fn insert_tree(&mut self, prefix: &str, tree: &AddressTree) {
        for (key, node) in flatten(tree) {
            let path = if prefix.is_empty() {
                key
            } else {
                format!("{}/{}", prefix, key)
            };
            match node {
                Node::Address(address) => self.insert(path, &address),
                other => debug!("{}: skipping non-address leaf {} = {:?}", self.chain, path, other),
            }
        }
    }

    pub fn insert_deployments(&mut self, deployments: &Deployments) {
        for deployment in deployments.iter() {
            for contract in deployment.contracts.values() {
                self.insert(contract.path.clone(), &contract.address);
            }
        }
    }

    pub fn build(mut self, sources: ChainSources) -> ChainRegistry {
        self.insert_tree("pools", &sources.pools);
        self.insert_tree("gauges", &sources.gauges);
        if self.chain == "mainnet" {
            self.insert_tree("root_gauges", &sources.root_gauges);
        } else if !sources.root_gauges.is_empty() {
            warn!("{}: ignoring root gauges, they only exist on mainnet", self.chain);
        }
        self.insert_deployments(&sources.deployments);
        self.insert_tree("", &sources.extras);
        self.insert_tree("multisigs", &sources.multisigs);
        self.insert_tree("EOA", &sources.signers);
        self.insert_tree("rate_providers", &sources.rate_providers);

        let reversebook = reverse_book(&self.flatbook);
        info!(
            "📒 {} address book: {} paths, {} distinct addresses",
            self.chain,
            self.flatbook.len(),
            reversebook.len()
        );

        ChainRegistry {
            chain: self.chain,
            flatbook: self.flatbook,
            reversebook,
            deployments: sources.deployments,
            extras: sources.extras,
            multisigs: sources.multisigs,
            eoa: sources.signers,
            pools: sources.pools,
            gauges: sources.gauges,
            root_gauges: sources.root_gauges,
            rate_providers: sources.rate_providers,
        }
    }
}

/// Inverts a flatbook; for duplicated addresses the last path in iteration order wins.
pub fn reverse_book(flatbook: &Flatbook) -> Reversebook {
    let mut reverse = Reversebook::with_capacity(flatbook.len());
    for (path, address) in flatbook {
        reverse.insert(address.clone(), path.clone());
    }
    reverse
}

/// Canonical address book of one chain. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chain: String,
    flatbook: Flatbook,
    reversebook: Reversebook,
    deployments: Deployments,
    extras: AddressTree,
    multisigs: AddressTree,
    eoa: AddressTree,
    pools: AddressTree,
    gauges: AddressTree,
    root_gauges: AddressTree,
    rate_providers: AddressTree,
}

impl ChainRegistry {
    pub fn from_sources(chain: &str, sources: ChainSources) -> Self {
        RegistryBuilder::new(chain).build(sources)
    }

    /// Registry with no entries, used when a chain could not be built at all.
    pub fn empty(chain: &str) -> Self {
        Self {
            chain: chain.to_string(),
            ..Self::default()
        }
    }

    /// Loads every source for `chain` and builds its registry. Unknown chains degrade to an
    /// empty registry instead of failing.
    pub async fn load<F: DocumentFetcher>(
        loader: &SourceLoader<F>,
        directory: &ChainDirectory,
        shared: &SharedDocuments,
        chain: &str,
    ) -> Self {
        if let Err(e) = directory.require(chain) {
            warn!("⚠️ Could not build address book for {}: {}", chain, e);
            return Self::empty(chain);
        }
        let sources = loader.chain_sources(chain, shared).await;
        Self::from_sources(chain, sources)
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn flatbook(&self) -> &Flatbook {
        &self.flatbook
    }

    pub fn reversebook(&self) -> &Reversebook {
        &self.reversebook
    }

    pub fn deployments(&self) -> &Deployments {
        &self.deployments
    }

    pub fn extras(&self) -> &AddressTree {
        &self.extras
    }

    pub fn multisigs(&self) -> &AddressTree {
        &self.multisigs
    }

    pub fn eoa(&self) -> &AddressTree {
        &self.eoa
    }

    pub fn pools(&self) -> &AddressTree {
        &self.pools
    }

    pub fn gauges(&self) -> &AddressTree {
        &self.gauges
    }

    pub fn root_gauges(&self) -> &AddressTree {
        &self.root_gauges
    }

    pub fn rate_providers(&self) -> &AddressTree {
        &self.rate_providers
    }

    pub fn address(&self, path: &str) -> Option<&str> {
        self.flatbook.get(path).map(String::as_str)
    }

    /// Path recorded for `address`, in any capitalization.
    pub fn path(&self, address: &str) -> Option<&str> {
        self.reversebook
            .get(&checksum_or_passthrough(address))
            .map(String::as_str)
    }

    /// Every `(path, address)` whose path contains `substr` (case-sensitive).
    pub fn search_many(&self, substr: &str) -> Vec<(String, String)> {
        self.flatbook
            .iter()
            .filter(|(path, _)| path.contains(substr))
            .map(|(path, address)| (path.clone(), address.clone()))
            .collect()
    }

    /// The only `(path, address)` whose path contains `substr`.
    pub fn search_unique(&self, substr: &str) -> Result<(String, String)> {
        expect_unique(substr, self.search_many(substr))
    }

    pub fn search_many_deployments(&self, substr: &str) -> Vec<&Deployment> {
        self.deployments.search_many(substr)
    }

    /// Contract name → address map of the only deployment matching `substr`.
    pub fn search_unique_deployment(&self, substr: &str) -> Result<&Deployment> {
        self.deployments.search_unique(substr)
    }

    /// `(path, address)` of the newest deployed contract named exactly `contract`.
    ///
    /// The pair always agrees with the flatbook: when extras overwrote the deployment's
    /// path, the overriding address is returned.
    pub fn latest_contract(&self, contract: &str) -> Result<(String, String)> {
        let latest = self.deployments.latest_with_contract(contract)?;
        let path = self
            .path(&latest.address)
            .map(str::to_string)
            .unwrap_or_else(|| latest.path.clone());
        let address = self
            .address(&path)
            .map(str::to_string)
            .unwrap_or_else(|| latest.address.clone());
        Ok((path, address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AddressBookError;
    use serde_json::json;

    const VAULT: &str = "0xBA12222222228d8Ba445958a75a0704d566BF2C8";

    fn tree(value: serde_json::Value) -> AddressTree {
        AddressTree::from_json(&value)
    }

    fn sources() -> ChainSources {
        ChainSources {
            deployments: Deployments::from_json(&json!({
                "20210418-vault": { "Vault": "0xba12222222228d8ba445958a75a0704d566bf2c8" },
                "20210418-authorizer": { "Authorizer": "0x0000000000000000000000000000000000000001" },
                "20230101-authorizer-v2": { "Authorizer": "0x0000000000000000000000000000000000000002" }
            })),
            multisigs: tree(json!({ "dao": "0x0000000000000000000000000000000000000010" })),
            signers: tree(json!({
                "ops": { "alice": "0x0000000000000000000000000000000000000020" }
            })),
            pools: tree(json!({
                "B-80BAL-20WETH-5c6e": "0x0000000000000000000000000000000000000030"
            })),
            ..ChainSources::default()
        }
    }

    #[test]
    fn test_merge_prefixes() {
        let registry = ChainRegistry::from_sources("mainnet", sources());
        assert_eq!(registry.address("20210418-vault/Vault"), Some(VAULT));
        assert_eq!(
            registry.address("multisigs/dao"),
            Some("0x0000000000000000000000000000000000000010")
        );
        assert_eq!(
            registry.address("EOA/ops/alice"),
            Some("0x0000000000000000000000000000000000000020")
        );
        assert_eq!(
            registry.address("pools/B-80BAL-20WETH-5c6e"),
            Some("0x0000000000000000000000000000000000000030")
        );
        assert_eq!(registry.path(&VAULT.to_lowercase()), Some("20210418-vault/Vault"));
    }

    #[test]
    fn test_deployment_overrides_pool_and_extras_override_deployment() {
        let mut sources = sources();
        sources.pools = tree(json!({ "x": "0x0000000000000000000000000000000000000040" }));
        sources.extras = tree(json!({
            "20210418-authorizer": { "Authorizer": "0x0000000000000000000000000000000000000050" }
        }));
        // A pool whose flattened path collides with a deployment path.
        let mut builder = RegistryBuilder::new("mainnet");
        builder.insert(
            "20210418-vault/Vault".to_string(),
            "0x0000000000000000000000000000000000000060",
        );
        builder.insert_deployments(&sources.deployments);
        assert_eq!(builder.flatbook["20210418-vault/Vault"], VAULT);

        let registry = ChainRegistry::from_sources("mainnet", sources);
        assert_eq!(
            registry.address("20210418-authorizer/Authorizer"),
            Some("0x0000000000000000000000000000000000000050")
        );
    }

    #[test]
    fn test_pool_path_collision_loses_to_deployment() {
        let mut sources = ChainSources::default();
        sources.pools = tree(json!({ "Vault": "0x0000000000000000000000000000000000000060" }));
        sources.deployments = Deployments::from_json(&json!({
            "pools": { "Vault": "0xba12222222228d8ba445958a75a0704d566bf2c8" }
        }));
        let registry = ChainRegistry::from_sources("mainnet", sources);
        assert_eq!(registry.address("pools/Vault"), Some(VAULT));
        assert_eq!(registry.flatbook().len(), 1);
    }

    #[test]
    fn test_reverse_book_last_writer_wins() {
        let mut sources = ChainSources::default();
        sources.deployments = Deployments::from_json(&json!({
            "20210418-vault": { "Vault": VAULT }
        }));
        sources.multisigs = tree(json!({ "vault_alias": VAULT }));
        let registry = ChainRegistry::from_sources("arbitrum", sources);
        assert_eq!(registry.reversebook()[VAULT], "multisigs/vault_alias");

        let mut flatbook = Flatbook::new();
        flatbook.insert("a".to_string(), "0x1".to_string());
        flatbook.insert("b".to_string(), "0x1".to_string());
        assert_eq!(reverse_book(&flatbook)["0x1"], "b");
    }

    #[test]
    fn test_overwritten_path_counts_as_latest_write() {
        let mut builder = RegistryBuilder::new("mainnet");
        builder.insert("a".to_string(), ZERO_ADDRESS);
        builder.insert("b".to_string(), ZERO_ADDRESS);
        builder.insert("a".to_string(), ZERO_ADDRESS);
        assert_eq!(reverse_book(&builder.flatbook)[ZERO_ADDRESS], "a");
    }

    #[test]
    fn test_root_gauges_ignored_off_mainnet() {
        let mut sources = ChainSources::default();
        sources.root_gauges = tree(json!({ "r": "0x0000000000000000000000000000000000000070" }));
        assert!(ChainRegistry::from_sources("polygon", sources.clone())
            .address("root_gauges/r")
            .is_none());
        assert!(ChainRegistry::from_sources("mainnet", sources)
            .address("root_gauges/r")
            .is_some());
    }

    #[test]
    fn test_search_unique() {
        let mut sources = sources();
        let registry = ChainRegistry::from_sources("mainnet", sources.clone());
        assert_eq!(
            registry.search_unique("Vault").unwrap(),
            ("20210418-vault/Vault".to_string(), VAULT.to_string())
        );
        assert!(registry.search_many("vault/vault").is_empty());
        assert!(matches!(
            registry.search_unique("Nope"),
            Err(AddressBookError::NoResult(_))
        ));

        sources.extras = tree(json!({ "tools": { "VaultReader": ZERO_ADDRESS } }));
        let registry = ChainRegistry::from_sources("mainnet", sources);
        assert_eq!(registry.search_many("Vault").len(), 2);
        assert!(matches!(
            registry.search_unique("Vault"),
            Err(AddressBookError::MultipleMatches { .. })
        ));
    }

    #[test]
    fn test_latest_contract() {
        let registry = ChainRegistry::from_sources("mainnet", sources());
        let (path, address) = registry.latest_contract("Authorizer").unwrap();
        assert_eq!(path, "20230101-authorizer-v2/Authorizer");
        assert_eq!(address, "0x0000000000000000000000000000000000000002");
        assert!(matches!(
            registry.latest_contract("Missing"),
            Err(AddressBookError::NoResult(_))
        ));
    }

    #[test]
    fn test_latest_contract_follows_extras_override() {
        let mut sources = sources();
        sources.extras = tree(json!({
            "20230101-authorizer-v2": { "Authorizer": "0x0000000000000000000000000000000000000099" }
        }));
        let registry = ChainRegistry::from_sources("mainnet", sources);

        let (path, address) = registry.latest_contract("Authorizer").unwrap();
        assert_eq!(path, "20230101-authorizer-v2/Authorizer");
        assert_eq!(address, "0x0000000000000000000000000000000000000099");
        assert_eq!(registry.address(&path), Some(address.as_str()));
    }

    #[test]
    fn test_search_deployments() {
        let registry = ChainRegistry::from_sources("mainnet", sources());
        assert_eq!(registry.search_many_deployments("authorizer").len(), 2);
        let vault = registry.search_unique_deployment("vault").unwrap();
        assert_eq!(vault.addresses()["Vault"], VAULT);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ChainRegistry::empty("fantom");
        assert_eq!(registry.chain(), "fantom");
        assert!(registry.flatbook().is_empty());
        assert!(registry.reversebook().is_empty());
    }
}
