//! # Ecosystem balances
//!
//! Who ultimately owns a pool's BPT at a given block. Raw BPT holders include the
//! pool's gauge and Aura's gauge staker; their balances are zeroed and redistributed to
//! the gauge depositors and Aura stakers respectively. The total must be unchanged
//! afterwards, up to a `1e-10` float tolerance.

use crate::errors::{AddressBookError, Result};
use crate::normalize::checksum_or_passthrough;
use crate::queries::{
    AuraAccount, BlockRow, GaugeShare, PoolShare, AURA_GAUGE_MAPPINGS, AURA_SHARES,
    FIRST_BLOCK_AFTER_TS, GAUGE_SHARES, USER_POOL_BALANCES,
};
use crate::subgraph::{rows, SubgraphClient};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

/// Aura's BPT staker contract per chain.
pub const AURA_GAUGE_STAKER_BY_CHAIN: &[(&str, &str)] =
    &[("mainnet", "0xaF52695E1bB01A16D33D7194C28C42b10e0Dbec2")];

/// Absolute tolerance when reconciling totals before and after redistribution.
pub const BALANCE_TOLERANCE: f64 = 1e-10;

/// Aura results are capped by `first: 1000`; reaching it means data was cut off.
const AURA_PAGE_LIMIT: usize = 1000;

const WEI: f64 = 1e18;

/// Holder address → balance (BPT units).
pub type Balances = IndexMap<String, f64>;

/// Aura pool id attached to a gauge; the subgraph returns either a scalar or a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AuraPid {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct AuraGaugeRow {
    pool: AuraPoolRow,
}

#[derive(Debug, Deserialize)]
struct AuraPoolRow {
    id: AuraPid,
    gauge: crate::queries::EntityId,
}

pub fn aura_staker(chain: &str) -> Option<&'static str> {
    AURA_GAUGE_STAKER_BY_CHAIN
        .iter()
        .find(|(name, _)| *name == chain)
        .map(|(_, staker)| *staker)
}

fn parse_amount(raw: &str, what: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| {
        AddressBookError::GraphQLRequest(format!("{} {:?} is not a number", what, raw))
    })
}

pub struct Ecosystem<'a, C: SubgraphClient + ?Sized> {
    chain: String,
    client: &'a C,
    aura_pids: Option<IndexMap<String, AuraPid>>,
}

impl<'a, C: SubgraphClient + ?Sized> Ecosystem<'a, C> {
    /// Loads the Aura gauge → pid mapping up front. A failing Aura subgraph only disables
    /// the Aura lookups.
    pub async fn new(client: &'a C, chain: &str) -> Self {
        let aura_pids = match Self::aura_gauge_mappings(client, chain).await {
            Ok(pids) => Some(pids),
            Err(e) => {
                warn!("⚠️ Failed to populate aura pids for {}: {}", chain, e);
                None
            }
        };
        Self {
            chain: chain.to_string(),
            client,
            aura_pids,
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Gauge address → Aura pid. A gauge listed twice is an error.
    pub async fn aura_gauge_mappings(client: &C, chain: &str) -> Result<IndexMap<String, AuraPid>> {
        let Some(data) = client.execute(chain, &AURA_GAUGE_MAPPINGS, json!({})).await? else {
            return Ok(IndexMap::new());
        };
        let gauges: Vec<AuraGaugeRow> = rows(&data, "gauges")?;
        let mut pids = IndexMap::with_capacity(gauges.len());
        for row in gauges {
            let gauge = checksum_or_passthrough(&row.pool.gauge.id);
            if let Some(existing) = pids.get(&gauge) {
                return Err(AddressBookError::MultipleMatches {
                    query: gauge.clone(),
                    matches: vec![format!("{:?}", existing), format!("{:?}", row.pool.id)],
                });
            }
            pids.insert(gauge, row.pool.id);
        }
        Ok(pids)
    }

    pub fn aura_pid_for_gauge(&self, gauge: &str) -> Result<String> {
        let gauge = checksum_or_passthrough(gauge);
        let pid = self
            .aura_pids
            .as_ref()
            .and_then(|pids| pids.get(&gauge))
            .ok_or_else(|| AddressBookError::NoResult(format!("gauge {} has no Aura pid", gauge)))?;
        match pid {
            AuraPid::One(pid) => Ok(pid.clone()),
            AuraPid::Many(pids) if pids.len() == 1 => Ok(pids[0].clone()),
            AuraPid::Many(pids) => Err(AddressBookError::UnexpectedListLength(format!(
                "gauge {} maps to {} Aura pids: {:?}",
                gauge,
                pids.len(),
                pids
            ))),
        }
    }

    /// BPT holders of `pool_id` at `block`.
    pub async fn get_bpt_balances(&self, pool_id: &str, block: u64) -> Result<Balances> {
        let variables = json!({ "poolId": pool_id, "block": block });
        let data = self.client.execute(&self.chain, &USER_POOL_BALANCES, variables).await?;
        let Some(pool) = data.as_ref().and_then(|d| d.get("pool")).filter(|p| !p.is_null()) else {
            return Ok(Balances::new());
        };
        let shares: Vec<PoolShare> = rows(pool, "shares")?;
        let mut balances = Balances::with_capacity(shares.len());
        for share in shares {
            let amount = parse_amount(&share.balance, "pool share")?;
            balances.insert(checksum_or_passthrough(&share.user_address.id), amount);
        }
        Ok(balances)
    }

    /// Depositors of `gauge` at `block`.
    pub async fn get_gauge_deposit_shares(&self, gauge: &str, block: u64) -> Result<Balances> {
        let variables = json!({ "gaugeAddress": checksum_or_passthrough(gauge), "block": block });
        let Some(data) = self.client.execute(&self.chain, &GAUGE_SHARES, variables).await? else {
            return Ok(Balances::new());
        };
        let shares: Vec<GaugeShare> = rows(&data, "gaugeShares")?;
        let mut balances = Balances::with_capacity(shares.len());
        for share in shares {
            let amount = parse_amount(&share.balance, "gauge share")?;
            balances.insert(checksum_or_passthrough(&share.user.id), amount);
        }
        Ok(balances)
    }

    /// Aura stakers of the pool behind `gauge` at `block`, converted from wei.
    pub async fn get_aura_pool_shares(&self, gauge: &str, block: u64) -> Result<Balances> {
        let pid = self.aura_pid_for_gauge(gauge)?;
        let variables = json!({ "poolId": pid, "block": block });
        let data = self.client.execute(&self.chain, &AURA_SHARES, variables).await?;
        let Some(leaderboard) = data
            .as_ref()
            .and_then(|d| d.get("leaderboard"))
            .filter(|l| !l.is_null())
        else {
            return Ok(Balances::new());
        };
        let accounts: Vec<AuraAccount> = rows(leaderboard, "accounts")?;
        if accounts.len() >= AURA_PAGE_LIMIT {
            return Err(AddressBookError::UnexpectedListLength(format!(
                "pagination limit hit on Aura pool {}",
                pid
            )));
        }
        let mut balances = Balances::with_capacity(accounts.len());
        for account in accounts {
            let staked = parse_amount(&account.staked, "aura stake")?;
            balances.insert(checksum_or_passthrough(&account.account.id), staked / WEI);
        }
        Ok(balances)
    }

    /// Final BPT ownership of `pool_id` at `block` with gauge and Aura positions
    /// attributed to their depositors.
    pub async fn ecosystem_balances(
        &self,
        pool_id: &str,
        gauge: &str,
        block: u64,
    ) -> Result<Balances> {
        let gauge = checksum_or_passthrough(gauge);
        let mut balances = self.get_bpt_balances(pool_id, block).await?;
        let circulating: f64 = balances.values().sum();

        let in_gauge = take_position(&mut balances, &gauge).unwrap_or_else(|| {
            warn!(
                "⚠️ No BPTs from {} are staked in gauge {} at block {}",
                pool_id, gauge, block
            );
            0.0
        });
        let deposits = self.get_gauge_deposit_shares(&gauge, block).await?;
        let counted = credit(&mut balances, deposits);
        if (counted - in_gauge).abs() > BALANCE_TOLERANCE {
            warn!(
                "⚠️ {} BPTs zeroed out of gauge {} but {} counted as gauge deposits",
                in_gauge, gauge, counted
            );
        }

        let mut in_aura = 0.0;
        match aura_staker(&self.chain) {
            Some(staker) => {
                in_aura = take_position(&mut balances, staker).unwrap_or_else(|| {
                    warn!("⚠️ No BPTs from {} are staked in Aura at block {}", pool_id, block);
                    0.0
                });
                let stakes = self.get_aura_pool_shares(&gauge, block).await?;
                let counted = credit(&mut balances, stakes);
                if (counted - in_aura).abs() > BALANCE_TOLERANCE {
                    warn!(
                        "⚠️ {} BPTs zeroed out of the Aura staker but {} counted as Aura deposits",
                        in_aura, counted
                    );
                }
            }
            None => warn!(
                "⚠️ No Aura staker known on {}, Aura deposits not attributed",
                self.chain
            ),
        }

        let total: f64 = balances.values().sum();
        info!(
            "Found {} BPTs of {} at block {}: {} in the gauge, {} through Aura",
            circulating, pool_id, block, in_gauge, in_aura
        );
        let delta = circulating - total;
        if delta.abs() > BALANCE_TOLERANCE {
            return Err(AddressBookError::Checksum {
                initial: circulating,
                counted: total,
                delta,
            });
        }
        Ok(balances)
    }

    pub async fn first_block_after_utc_timestamp(&self, timestamp: i64) -> Result<u64> {
        let variables = json!({ "timestamp": timestamp.to_string() });
        let data = self
            .client
            .execute(&self.chain, &FIRST_BLOCK_AFTER_TS, variables)
            .await?
            .unwrap_or(Value::Null);
        let blocks: Vec<BlockRow> = rows(&data, "blocks")?;
        let block = blocks.first().ok_or_else(|| {
            AddressBookError::NoResult(format!("no block after {} on {}", timestamp, self.chain))
        })?;
        block.number.parse().map_err(|_| {
            AddressBookError::GraphQLRequest(format!("bad block number {:?}", block.number))
        })
    }

    pub async fn first_block_after(&self, at: DateTime<Utc>) -> Result<u64> {
        self.first_block_after_utc_timestamp(at.timestamp()).await
    }
}

/// Zeroes `holder`'s balance and returns what it was.
fn take_position(balances: &mut Balances, holder: &str) -> Option<f64> {
    balances.get_mut(holder).map(|amount| std::mem::replace(amount, 0.0))
}

/// Adds every share to `balances`, returning the credited total.
fn credit(balances: &mut Balances, shares: Balances) -> f64 {
    let mut total = 0.0;
    for (holder, amount) in shares {
        *balances.entry(holder).or_insert(0.0) += amount;
        total += amount;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgraph::testing::FakeSubgraph;
    use chrono::TimeZone;

    const POOL: &str = "0x5c6ee304399dbdb9c8ef030ab642b10820db8f56000200000000000000000014";
    const GAUGE: &str = "0x0000000000000000000000000000000000000a11";
    const STAKER: &str = "0xaF52695E1bB01A16D33D7194C28C42b10e0Dbec2";
    const ALICE: &str = "0x0000000000000000000000000000000000000001";
    const BOB: &str = "0x0000000000000000000000000000000000000002";
    const CAROL: &str = "0x0000000000000000000000000000000000000003";

    fn subgraph(aura_staked_wei: &str) -> FakeSubgraph {
        let staked = aura_staked_wei.to_string();
        FakeSubgraph::new()
            .with_data(
                "mainnet",
                &AURA_GAUGE_MAPPINGS,
                json!({ "gauges": [
                    { "pool": { "id": "12", "gauge": { "id": GAUGE } } },
                    { "pool": { "id": ["13", "14"], "gauge": { "id": "0x0000000000000000000000000000000000000b22" } } }
                ] }),
            )
            .with_data(
                "mainnet",
                &USER_POOL_BALANCES,
                json!({ "pool": { "shares": [
                    { "userAddress": { "id": ALICE }, "balance": "10" },
                    { "userAddress": { "id": GAUGE }, "balance": "10" }
                ] } }),
            )
            .with_data(
                "mainnet",
                &GAUGE_SHARES,
                json!({ "gaugeShares": [
                    { "id": "s1", "user": { "id": BOB }, "balance": "2" },
                    { "id": "s2", "user": { "id": STAKER.to_lowercase() }, "balance": "8" }
                ] }),
            )
            .on("mainnet", &AURA_SHARES, move |variables| {
                assert_eq!(variables["poolId"], "12");
                Ok(Some(json!({ "leaderboard": {
                    "accounts": [
                        { "staked": staked.clone(), "account": { "id": CAROL } },
                        { "staked": "3000000000000000000", "account": { "id": ALICE } }
                    ],
                    "totalStaked": "0"
                } })))
            })
    }

    #[tokio::test]
    async fn test_aura_pid_lookup() {
        let subgraph = subgraph("0");
        let ecosystem = Ecosystem::new(&subgraph, "mainnet").await;
        assert_eq!(ecosystem.aura_pid_for_gauge(GAUGE).unwrap(), "12");
        assert!(matches!(
            ecosystem.aura_pid_for_gauge("0x0000000000000000000000000000000000000b22"),
            Err(AddressBookError::UnexpectedListLength(_))
        ));
        assert!(matches!(
            ecosystem.aura_pid_for_gauge(ALICE),
            Err(AddressBookError::NoResult(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_gauge_in_mapping() {
        let subgraph = FakeSubgraph::new().with_data(
            "mainnet",
            &AURA_GAUGE_MAPPINGS,
            json!({ "gauges": [
                { "pool": { "id": "1", "gauge": { "id": GAUGE } } },
                { "pool": { "id": "2", "gauge": { "id": GAUGE } } }
            ] }),
        );
        assert!(matches!(
            Ecosystem::aura_gauge_mappings(&subgraph, "mainnet").await,
            Err(AddressBookError::MultipleMatches { .. })
        ));
        let ecosystem = Ecosystem::new(&subgraph, "mainnet").await;
        assert!(matches!(
            ecosystem.aura_pid_for_gauge(GAUGE),
            Err(AddressBookError::NoResult(_))
        ));
    }

    #[tokio::test]
    async fn test_ecosystem_balances_redistribute() {
        let subgraph = subgraph("5000000000000000000");
        let ecosystem = Ecosystem::new(&subgraph, "mainnet").await;
        let balances = ecosystem.ecosystem_balances(POOL, GAUGE, 18_000_000).await.unwrap();

        // 20 BPT: 10 held by alice, 10 in the gauge (2 bob, 8 aura), aura split 5 carol / 3 alice.
        assert_eq!(balances[ALICE], 13.0);
        assert_eq!(balances[BOB], 2.0);
        assert_eq!(balances[CAROL], 5.0);
        assert_eq!(balances[GAUGE], 0.0);
        assert_eq!(balances[STAKER], 0.0);
        assert_eq!(balances.values().sum::<f64>(), 20.0);
    }

    #[tokio::test]
    async fn test_ecosystem_balances_checksum_mismatch() {
        // Aura reports 6 + 3 staked against 8 deposited by the staker.
        let subgraph = subgraph("6000000000000000000");
        let ecosystem = Ecosystem::new(&subgraph, "mainnet").await;
        match ecosystem.ecosystem_balances(POOL, GAUGE, 18_000_000).await {
            Err(AddressBookError::Checksum { initial, counted, delta }) => {
                assert_eq!(initial, 20.0);
                assert_eq!(counted, 21.0);
                assert_eq!(delta, -1.0);
            }
            other => panic!("expected a checksum error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_first_block_after() {
        let subgraph = FakeSubgraph::new().on("mainnet", &FIRST_BLOCK_AFTER_TS, |variables| {
            assert_eq!(variables["timestamp"], "1700000000");
            Ok(Some(json!({ "blocks": [{ "number": "18573050", "timestamp": "1700000003" }] })))
        });
        let ecosystem = Ecosystem::new(&subgraph, "mainnet").await;
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(ecosystem.first_block_after(at).await.unwrap(), 18_573_050);

        let ecosystem = Ecosystem::new(&subgraph, "polygon").await;
        assert!(matches!(
            ecosystem.first_block_after_utc_timestamp(1_700_000_000).await,
            Err(AddressBookError::NoResult(_))
        ));
    }
}
