// src/queries.rs
//
// GraphQL documents sent to the Balancer, gauge, Aura and blocks subgraphs, and the row
// shapes they return. Thresholds are passed as variables instead of being baked into the
// query text.

use crate::subgraph::SubgraphKind;
use serde::Deserialize;

/// A named GraphQL document bound to the subgraph kind that serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphQuery {
    pub name: &'static str,
    pub kind: SubgraphKind,
    pub body: &'static str,
}

/// Pools priced through a non-zero rate provider, above a liquidity floor, that either
/// accrue protocol yield fees, are MetaStable with a swap fee, or are Gyro pools.
pub const POOLS_WITH_RATE_PROVIDER: GraphQuery = GraphQuery {
    name: "pools_with_rate_provider",
    kind: SubgraphKind::Core,
    body: r#"
query PoolsWithRateProvider($minLiquidity: BigDecimal!, $metaStableVersion: Int!) {
  pools(
    first: 1000
    where: {
      and: [
        { priceRateProviders_: { address_not: "0x0000000000000000000000000000000000000000" } }
        { totalLiquidity_gt: $minLiquidity }
        {
          or: [
            { protocolYieldFeeCache_gt: 0 }
            { and: [
              { swapFee_gt: 0 }
              { poolType_contains: "MetaStable" }
              { poolTypeVersion: $metaStableVersion }
            ] }
            { poolType_contains_nocase: "Gyro" }
          ]
        }
      ]
    }
  ) {
    id
    symbol
  }
}
"#,
};

/// Preferential gauges of a pool, killed or not, so callers can tell the two apart.
pub const PREFERENTIAL_GAUGES_FOR_POOL: GraphQuery = GraphQuery {
    name: "preferential_gauges_for_pool",
    kind: SubgraphKind::Gauges,
    body: r#"
query PreferentialGauges($poolId: String!) {
  liquidityGauges(where: { poolId: $poolId, isPreferentialGauge: true }) {
    id
    isKilled
  }
}
"#,
};

pub const USER_POOL_BALANCES: GraphQuery = GraphQuery {
    name: "user_pool_balances",
    kind: SubgraphKind::Core,
    body: r#"
query GetUserPoolBalances($poolId: ID!, $block: Int) {
  pool(id: $poolId, block: { number: $block }) {
    shares(where: { balance_gt: "0" }, orderBy: balance, orderDirection: desc, first: 1000) {
      userAddress {
        id
      }
      balance
    }
  }
}
"#,
};

pub const GAUGE_SHARES: GraphQuery = GraphQuery {
    name: "gauge_shares",
    kind: SubgraphKind::Gauges,
    body: r#"
query FetchGaugeShares($gaugeAddress: String!, $block: Int) {
  gaugeShares(
    block: { number: $block }
    where: { gauge_contains_nocase: $gaugeAddress, balance_gt: "0" }
    orderBy: balance
    orderDirection: desc
    first: 1000
  ) {
    balance
    id
    user {
      id
    }
  }
}
"#,
};

pub const AURA_SHARES: GraphQuery = GraphQuery {
    name: "aura_shares",
    kind: SubgraphKind::Aura,
    body: r#"
query PoolLeaderboard($poolId: ID!, $block: Int) {
  leaderboard: pool(id: $poolId, block: { number: $block }) {
    accounts(first: 1000, where: { staked_gt: 0 }, orderBy: staked, orderDirection: desc) {
      staked
      account {
        id
      }
    }
    totalStaked
  }
}
"#,
};

pub const AURA_GAUGE_MAPPINGS: GraphQuery = GraphQuery {
    name: "aura_gauge_mappings",
    kind: SubgraphKind::Aura,
    body: r#"
query AuraGaugeMappings {
  gauges(first: 1000) {
    pool {
      id
      gauge {
        id
      }
    }
  }
}
"#,
};

pub const FIRST_BLOCK_AFTER_TS: GraphQuery = GraphQuery {
    name: "first_block_after_ts",
    kind: SubgraphKind::Blocks,
    body: r#"
query FirstBlockAfterTimestamp($timestamp: BigInt!) {
  blocks(first: 1, orderBy: number, orderDirection: asc, where: { timestamp_gte: $timestamp }) {
    number
    timestamp
  }
}
"#,
};

/// Paginated with `$first` / `$skip`.
pub const ALL_POOLS: GraphQuery = GraphQuery {
    name: "all_pools",
    kind: SubgraphKind::Core,
    body: r#"
query AllPools($first: Int!, $skip: Int!) {
  pools(first: $first, skip: $skip, orderBy: address, orderDirection: asc) {
    address
    symbol
  }
}
"#,
};

/// Paginated with `$first` / `$skip`.
pub const ALL_GAUGES: GraphQuery = GraphQuery {
    name: "all_gauges",
    kind: SubgraphKind::Gauges,
    body: r#"
query AllGauges($first: Int!, $skip: Int!) {
  liquidityGauges(first: $first, skip: $skip, orderBy: id, orderDirection: asc) {
    address: id
    symbol
  }
}
"#,
};

/// Mainnet root gauges and the child gauge each one bridges to.
pub const ROOT_GAUGES: GraphQuery = GraphQuery {
    name: "root_gauges",
    kind: SubgraphKind::Gauges,
    body: r#"
query RootGauges($first: Int!, $skip: Int!) {
  rootGauges(first: $first, skip: $skip, orderBy: id, orderDirection: asc) {
    id
    chain
    recipient
  }
}
"#,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoolSymbol {
    pub id: String,
    /// Null for some pools in the core subgraph.
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferentialGauge {
    pub id: String,
    #[serde(default)]
    pub is_killed: bool,
}

/// `address` + `symbol` row of the pool and gauge listings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddressSymbol {
    pub address: String,
    #[serde(default)]
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RootGauge {
    pub id: String,
    #[serde(default)]
    pub chain: Option<String>,
    pub recipient: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityId {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolShare {
    pub user_address: EntityId,
    pub balance: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GaugeShare {
    pub user: EntityId,
    pub balance: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuraAccount {
    pub account: EntityId,
    /// Wei-denominated.
    pub staked: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockRow {
    pub number: String,
}
