//! # Core pools
//!
//! A core pool is a yield-bearing pool that carries enough liquidity and a live
//! preferential gauge. The set is recomputed from scratch on every run in four stages:
//!
//! 1. **Candidates**: subgraph query over rate-provider pools (see
//!    [`POOLS_WITH_RATE_PROVIDER`]).
//! 2. **Liveness**: drop candidates without a non-killed preferential gauge.
//! 3. **Whitelist**: add manually listed pools missing from the set.
//! 4. **Blacklist**: remove manually listed pools, including whitelisted ones.
//!
//! Pool ids are compared exactly as the subgraph and override files spell them.

use crate::errors::Result;
use crate::queries::{
    PoolSymbol, PreferentialGauge, POOLS_WITH_RATE_PROVIDER, PREFERENTIAL_GAUGES_FOR_POOL,
};
use crate::settings::CorePoolRules;
use crate::subgraph::{rows, SubgraphClient};
use futures::future::join_all;
use indexmap::IndexMap;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

/// Pool id → symbol.
pub type CorePools = IndexMap<String, String>;

/// Blacklist entry of one chain: a plain list of ids or ids annotated with a reason.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BlacklistEntry {
    Ids(Vec<String>),
    Annotated(IndexMap<String, Value>),
}

impl BlacklistEntry {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            BlacklistEntry::Ids(ids) => ids.iter().map(String::as_str).collect(),
            BlacklistEntry::Annotated(ids) => ids.keys().map(String::as_str).collect(),
        }
    }
}

/// Manually maintained whitelist (chain → pool id → symbol) and blacklist (chain → ids).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorePoolOverrides {
    pub whitelist: IndexMap<String, CorePools>,
    pub blacklist: IndexMap<String, BlacklistEntry>,
}

impl CorePoolOverrides {
    pub fn from_values(whitelist: Value, blacklist: Value) -> Result<Self> {
        let whitelist = if whitelist.is_null() {
            IndexMap::new()
        } else {
            serde_json::from_value(whitelist)?
        };
        let blacklist = if blacklist.is_null() {
            IndexMap::new()
        } else {
            serde_json::from_value(blacklist)?
        };
        Ok(Self {
            whitelist,
            blacklist,
        })
    }

    /// Reads both override files. A missing file is an error; a chain missing from a
    /// file just means no overrides for it.
    pub fn from_files(whitelist: impl AsRef<Path>, blacklist: impl AsRef<Path>) -> Result<Self> {
        let whitelist = serde_json::from_str(&std::fs::read_to_string(whitelist)?)?;
        let blacklist = serde_json::from_str(&std::fs::read_to_string(blacklist)?)?;
        Self::from_values(whitelist, blacklist)
    }

    pub fn from_rules(rules: &CorePoolRules) -> Result<Self> {
        Self::from_files(&rules.whitelist_path, &rules.blacklist_path)
    }

    pub fn whitelist_for(&self, chain: &str) -> Option<&CorePools> {
        self.whitelist.get(chain)
    }

    pub fn blacklist_for(&self, chain: &str) -> Vec<&str> {
        self.blacklist
            .get(chain)
            .map(BlacklistEntry::ids)
            .unwrap_or_default()
    }
}

/// State of a pool's preferential gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeLiveness {
    Alive,
    Killed,
    Missing,
}

impl GaugeLiveness {
    pub fn from_gauges(gauges: &[PreferentialGauge]) -> Self {
        if gauges.iter().any(|g| !g.is_killed) {
            GaugeLiveness::Alive
        } else if gauges.is_empty() {
            GaugeLiveness::Missing
        } else {
            GaugeLiveness::Killed
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self, GaugeLiveness::Alive)
    }
}

/// Stage 3: adds whitelisted pools that are not already present.
pub fn union_whitelist(pools: &mut CorePools, whitelist: Option<&CorePools>) {
    for (pool_id, symbol) in whitelist.into_iter().flatten() {
        if !pools.contains_key(pool_id) {
            pools.insert(pool_id.clone(), symbol.clone());
        }
    }
}

/// Stage 4: removes blacklisted pools.
pub fn subtract_blacklist(pools: &mut CorePools, blacklist: &[&str]) {
    for pool_id in blacklist {
        pools.shift_remove(*pool_id);
    }
}

pub struct CorePoolSelector<'a, C: SubgraphClient + ?Sized> {
    client: &'a C,
    rules: &'a CorePoolRules,
    overrides: &'a CorePoolOverrides,
}

impl<'a, C: SubgraphClient + ?Sized> CorePoolSelector<'a, C> {
    pub fn new(client: &'a C, rules: &'a CorePoolRules, overrides: &'a CorePoolOverrides) -> Self {
        Self {
            client,
            rules,
            overrides,
        }
    }

    /// Stage 1. A chain without a core subgraph has no candidates.
    pub async fn candidates(&self, chain: &str) -> Result<CorePools> {
        let variables = json!({
            "minLiquidity": self.rules.min_liquidity_usd.to_string(),
            "metaStableVersion": self.rules.metastable_version,
        });
        let Some(data) = self
            .client
            .execute(chain, &POOLS_WITH_RATE_PROVIDER, variables)
            .await?
        else {
            return Ok(CorePools::new());
        };
        let pools: Vec<PoolSymbol> = rows(&data, "pools")?;
        Ok(pools
            .into_iter()
            .map(|pool| {
                let symbol = pool.symbol.unwrap_or_else(|| {
                    warn!("⚠️ Pool {} on {} has no symbol, using its id", pool.id, chain);
                    pool.id.clone()
                });
                (pool.id, symbol)
            })
            .collect())
    }

    pub async fn gauge_liveness(&self, chain: &str, pool_id: &str) -> Result<GaugeLiveness> {
        let data = self
            .client
            .execute(chain, &PREFERENTIAL_GAUGES_FOR_POOL, json!({ "poolId": pool_id }))
            .await?;
        let gauges: Vec<PreferentialGauge> = match data {
            Some(data) => rows(&data, "liquidityGauges")?,
            None => Vec::new(),
        };
        Ok(GaugeLiveness::from_gauges(&gauges))
    }

    pub async fn has_alive_preferential_gauge(&self, chain: &str, pool_id: &str) -> Result<bool> {
        Ok(self.gauge_liveness(chain, pool_id).await?.is_alive())
    }

    /// Stage 2, applied to every candidate in order.
    pub async fn retain_alive(&self, chain: &str, candidates: CorePools) -> Result<CorePools> {
        let mut alive = CorePools::with_capacity(candidates.len());
        for (pool_id, symbol) in candidates {
            match self.gauge_liveness(chain, &pool_id).await? {
                GaugeLiveness::Alive => {
                    alive.insert(pool_id, symbol);
                }
                GaugeLiveness::Killed => {
                    warn!(
                        "⚠️ Pool {} ({}) on {} has a killed preferential gauge",
                        pool_id, symbol, chain
                    )
                }
                GaugeLiveness::Missing => {
                    warn!(
                        "⚠️ Pool {} ({}) on {} has no preferential gauge",
                        pool_id, symbol, chain
                    )
                }
            }
        }
        Ok(alive)
    }

    /// Runs all four stages for one chain.
    pub async fn build(&self, chain: &str) -> Result<CorePools> {
        let candidates = self.candidates(chain).await?;
        let found = candidates.len();
        let mut pools = self.retain_alive(chain, candidates).await?;
        let alive = pools.len();
        union_whitelist(&mut pools, self.overrides.whitelist_for(chain));
        subtract_blacklist(&mut pools, &self.overrides.blacklist_for(chain));
        info!(
            "✅ {}: {} core pools ({} candidates, {} with a live gauge)",
            chain,
            pools.len(),
            found,
            alive
        );
        Ok(pools)
    }

    /// Builds every chain not listed in `skip_chains`, concurrently.
    pub async fn build_all<I, S>(&self, chains: I) -> Result<IndexMap<String, CorePools>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chains: Vec<String> = chains
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .filter(|c| !self.rules.skip_chains.contains(c))
            .collect();
        let results = join_all(chains.iter().map(|chain| self.build(chain))).await;
        chains
            .into_iter()
            .zip(results)
            .map(|(chain, pools)| pools.map(|pools| (chain, pools)))
            .collect()
    }

    pub async fn is_core_pool(&self, chain: &str, pool_id: &str) -> Result<bool> {
        Ok(self.build(chain).await?.contains_key(pool_id))
    }
}
