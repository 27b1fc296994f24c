//! # Source loading
//!
//! Fetches the upstream JSON documents the address book is built from and reshapes each
//! into an [`AddressTree`] (or [`Deployments`]).
//!
//! Absence is never an error here: a 404, a transport failure or a chain missing from a
//! chain-keyed document all degrade to an empty structure plus a warning, so the registry
//! can always be built from whatever subset of sources is available.
//!
//! Documents shared by every chain (multisigs, signers, pools, gauges, root gauges, the
//! rate provider registry) are fetched once into [`SharedDocuments`] and then sliced per
//! chain.

use crate::chains::ChainDirectory;
use crate::deployments::Deployments;
use crate::normalize::normalize_tree;
use crate::rate_providers::{parse_registry, RateProviderRegistry, RateProviders};
use crate::settings::Settings;
use crate::tree::AddressTree;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Transport boundary: fetch a document, `None` when it does not exist.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Option<Value>>;
    async fn fetch_text(&self, url: &str) -> Result<Option<String>>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http.timeout_seconds))
            .user_agent(settings.http.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn get(&self, url: &str) -> Result<Option<reqwest::Response>> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?;
        Ok(Some(response))
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Option<Value>> {
        match self.get(url).await? {
            Some(response) => {
                let value = response
                    .json::<Value>()
                    .await
                    .with_context(|| format!("{} is not valid JSON", url))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<Option<String>> {
        match self.get(url).await? {
            Some(response) => Ok(Some(response.text().await?)),
            None => Ok(None),
        }
    }
}

/// Large documents shared by all chains, fetched once per process.
#[derive(Debug, Clone, Default)]
pub struct SharedDocuments {
    pub multisigs: AddressTree,
    pub signers: AddressTree,
    pub pools: AddressTree,
    pub gauges: AddressTree,
    pub root_gauges: AddressTree,
    pub rate_providers: RateProviderRegistry,
}

/// Every source for one chain, already normalized.
#[derive(Debug, Clone, Default)]
pub struct ChainSources {
    pub deployments: Deployments,
    pub extras: AddressTree,
    pub multisigs: AddressTree,
    pub signers: AddressTree,
    pub pools: AddressTree,
    pub gauges: AddressTree,
    pub root_gauges: AddressTree,
    pub rate_providers: AddressTree,
}

pub struct SourceLoader<F: DocumentFetcher> {
    fetcher: F,
    settings: Settings,
}

impl<F: DocumentFetcher> SourceLoader<F> {
    pub fn new(fetcher: F, settings: Settings) -> Self {
        Self { fetcher, settings }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Chain directory; unlike the address sources this one is required.
    pub async fn chain_directory(&self) -> Result<ChainDirectory> {
        let url = self.settings.sources.chains();
        let value = self
            .fetcher
            .fetch_json(&url)
            .await?
            .with_context(|| format!("chain directory not found at {}", url))?;
        serde_json::from_value(value).context("chain directory formatted incorrectly")
    }

    /// Fetches a document, mapping every kind of failure to `None` with a warning.
    pub async fn fetch_optional(&self, url: &str) -> Option<Value> {
        match self.fetcher.fetch_json(url).await {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                warn!("⚠️ {} not found, using an empty structure", url);
                None
            }
            Err(e) => {
                warn!("⚠️ Failed to fetch {}: {:#}", url, e);
                None
            }
        }
    }

    async fn fetch_tree(&self, url: &str) -> AddressTree {
        self.fetch_optional(url)
            .await
            .map(|value| AddressTree::from_json(&value))
            .unwrap_or_default()
    }

    pub async fn shared_documents(&self) -> SharedDocuments {
        let sources = &self.settings.sources;
        let rate_providers = self
            .fetch_optional(&sources.rate_provider_registry())
            .await
            .map(|value| parse_registry(&value))
            .unwrap_or_default();

        let shared = SharedDocuments {
            multisigs: self.fetch_tree(&sources.multisigs()).await,
            signers: normalize_tree(&self.fetch_tree(&sources.signers()).await),
            pools: self.fetch_tree(&sources.pools()).await,
            gauges: self.fetch_tree(&sources.gauges()).await,
            root_gauges: self.fetch_tree(&sources.root_gauges()).await,
            rate_providers,
        };
        info!(
            "✅ Shared documents loaded (multisig chains: {}, pool chains: {}, gauge chains: {})",
            shared.multisigs.len(),
            shared.pools.len(),
            shared.gauges.len()
        );
        shared
    }

    pub async fn deployments(&self, chain: &str) -> Deployments {
        match self
            .fetch_optional(&self.settings.sources.deployments(chain))
            .await
        {
            Some(value) => Deployments::from_json(&value),
            None => Deployments::new(),
        }
    }

    pub async fn extras(&self, chain: &str) -> AddressTree {
        normalize_tree(&self.fetch_tree(&self.settings.sources.extras(chain)).await)
    }

    /// Per-chain sources. Never fails; missing pieces are empty.
    pub async fn chain_sources(&self, chain: &str, shared: &SharedDocuments) -> ChainSources {
        let rate_providers = RateProviders::new(
            chain,
            &shared.rate_providers,
            &self.settings.sources.code_review_browse_url,
        );
        ChainSources {
            deployments: self.deployments(chain).await,
            extras: self.extras(chain).await,
            multisigs: chain_section(&shared.multisigs, chain, "multisigs"),
            signers: shared.signers.clone(),
            pools: chain_section(&shared.pools, chain, "pools"),
            gauges: chain_section(&shared.gauges, chain, "gauges"),
            root_gauges: if chain == "mainnet" {
                chain_section(&shared.root_gauges, chain, "root_gauges")
            } else {
                AddressTree::new()
            },
            rate_providers: normalize_tree(&rate_providers.address_tree()),
        }
    }
}

/// The normalized sub-tree of a chain-keyed document, empty with a warning when absent.
pub fn chain_section(document: &AddressTree, chain: &str, source: &str) -> AddressTree {
    match document.get_map(chain) {
        Some(section) => normalize_tree(section),
        None => {
            warn!("⚠️ {} has no entry for {}", source, chain);
            AddressTree::new()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StaticFetcher;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_chain_sources_tolerate_missing_documents() {
        let settings = Settings::default();
        let sources = settings.sources.clone();
        let mut fetcher = StaticFetcher::default()
            .with_json(
                sources.multisigs(),
                json!({ "mainnet": { "dao": "0x10a19e7ee7d7f8a52822f6817de8ea18204f2e4f" } }),
            )
            .with_json(
                sources.deployments("mainnet"),
                json!({ "20210418-vault": { "Vault": "0xba12222222228d8ba445958a75a0704d566bf2c8" } }),
            );
        fetcher.failing.push(sources.pools());

        let loader = SourceLoader::new(fetcher, settings);
        let shared = loader.shared_documents().await;
        assert!(shared.pools.is_empty());

        let mainnet = loader.chain_sources("mainnet", &shared).await;
        assert_eq!(
            mainnet.multisigs.get_address("dao"),
            Some("0x10A19e7eE7d7F8a52822f6817de8ea18204F2e4f")
        );
        assert_eq!(mainnet.deployments.len(), 1);
        assert!(mainnet.extras.is_empty());
        assert!(mainnet.rate_providers.is_empty());

        let arbitrum = loader.chain_sources("arbitrum", &shared).await;
        assert!(arbitrum.multisigs.is_empty());
        assert!(arbitrum.deployments.is_empty());
    }

    #[tokio::test]
    async fn test_root_gauges_only_on_mainnet() {
        let settings = Settings::default();
        let fetcher = StaticFetcher::default().with_json(
            settings.sources.root_gauges(),
            json!({
                "mainnet": { "a-root-1234": "0x0000000000000000000000000000000000000011" },
                "arbitrum": { "b-root-5678": "0x0000000000000000000000000000000000000012" }
            }),
        );
        let loader = SourceLoader::new(fetcher, settings);
        let shared = loader.shared_documents().await;

        assert_eq!(loader.chain_sources("mainnet", &shared).await.root_gauges.len(), 1);
        assert!(loader.chain_sources("arbitrum", &shared).await.root_gauges.is_empty());
    }

    #[tokio::test]
    async fn test_chain_directory_is_required() {
        let settings = Settings::default();
        let loader = SourceLoader::new(StaticFetcher::default(), settings.clone());
        assert!(loader.chain_directory().await.is_err());

        let fetcher = StaticFetcher::default().with_json(
            settings.sources.chains(),
            json!({ "CHAIN_IDS_BY_NAME": { "mainnet": 1 } }),
        );
        let loader = SourceLoader::new(fetcher, settings);
        assert_eq!(loader.chain_directory().await.unwrap().chain_id("mainnet").unwrap(), 1);
    }
}
