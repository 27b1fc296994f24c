// src/pools_gauges.rs
//
// Symbol → address books for pools, gauges and mainnet root gauges, generated from the
// subgraphs. These are the documents the address book later reads back as its `pools/`,
// `gauges/` and `root_gauges/` sources.
//
// Symbols are not unique upstream, so every symbol gets `-<first four hex chars>` of its
// address appended. Anything still colliding after that is rejected.

use crate::errors::{AddressBookError, Result};
use crate::normalize::checksum_or_passthrough;
use crate::queries::{AddressSymbol, RootGauge, ALL_GAUGES, ALL_POOLS, ROOT_GAUGES};
use crate::subgraph::{paginate, SubgraphClient};
use futures::future::join_all;
use indexmap::IndexMap;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;

const PAGE_SIZE: usize = 1000;

/// Symbol → address.
pub type NameMap = IndexMap<String, String>;

/// chain → symbol → address.
pub type ChainNameMaps = IndexMap<String, NameMap>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NameBooks {
    pub pools: ChainNameMaps,
    pub gauges: ChainNameMaps,
    pub root_gauges: ChainNameMaps,
}

fn short_hex(address: &str) -> &str {
    address.get(2..6).unwrap_or_default()
}

/// Builds a name map from `address` / `symbol` rows, ordered by address.
pub fn name_map(mut rows: Vec<AddressSymbol>) -> Result<NameMap> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in &rows {
        if !seen.insert(row.address.to_lowercase()) {
            return Err(AddressBookError::multiple(&row.address, [row.symbol.clone()]));
        }
    }

    rows.sort_by_key(|row| row.address.to_lowercase());
    let mut map = NameMap::with_capacity(rows.len());
    for row in rows {
        let symbol = format!("{}-{}", row.symbol, short_hex(&row.address));
        let address = checksum_or_passthrough(&row.address);
        if let Some(existing) = map.get(&symbol) {
            return Err(AddressBookError::multiple(
                &symbol,
                [existing.clone(), address],
            ));
        }
        map.insert(symbol, address);
    }
    Ok(map)
}

/// Names every root gauge after the child gauge it bridges to:
/// `<symbol>-gauge-<hex>` becomes `<symbol>-<chain>-root-<root hex>`.
pub fn root_gauge_map(roots: &[RootGauge], gauges: &ChainNameMaps) -> Result<NameMap> {
    let mut named: Vec<(String, String)> = Vec::new();
    for root in roots {
        // Mainnet root gauges are their own child gauge and carry no chain.
        let Some(chain) = root.chain.as_deref() else {
            continue;
        };
        let recipient = checksum_or_passthrough(&root.recipient);
        for (symbol, gauge) in gauges.values().flatten() {
            if *gauge != recipient {
                continue;
            }
            let stem = symbol.get(..symbol.len().saturating_sub(4)).unwrap_or_default();
            let symbol = format!(
                "{}{}",
                stem.replace("-gauge-", &format!("-{}-root-", chain.to_lowercase())),
                short_hex(&root.id)
            );
            let entry = (symbol, checksum_or_passthrough(&root.id));
            if !named.contains(&entry) {
                named.push(entry);
            }
        }
    }

    let mut ids = HashSet::with_capacity(named.len());
    let mut map = NameMap::with_capacity(named.len());
    for (symbol, id) in named {
        if !ids.insert(id.clone()) {
            return Err(AddressBookError::multiple(&id, [symbol]));
        }
        if let Some(existing) = map.get(&symbol) {
            return Err(AddressBookError::multiple(&symbol, [existing.clone(), id]));
        }
        map.insert(symbol, id);
    }
    Ok(map)
}

pub async fn query_all_pools<C: SubgraphClient + ?Sized>(
    client: &C,
    chain: &str,
) -> Result<Vec<AddressSymbol>> {
    paginate(client, chain, &ALL_POOLS, "pools", PAGE_SIZE).await
}

pub async fn query_all_gauges<C: SubgraphClient + ?Sized>(
    client: &C,
    chain: &str,
) -> Result<Vec<AddressSymbol>> {
    paginate(client, chain, &ALL_GAUGES, "liquidityGauges", PAGE_SIZE).await
}

pub async fn query_root_gauges<C: SubgraphClient + ?Sized>(client: &C) -> Result<Vec<RootGauge>> {
    paginate(client, "mainnet", &ROOT_GAUGES, "rootGauges", PAGE_SIZE).await
}

/// Pools and gauges for every chain, plus mainnet root gauges mapped onto them. Chains
/// with no rows are left out of the output.
pub async fn build_name_books<C, I, S>(client: &C, chains: I) -> Result<NameBooks>
where
    C: SubgraphClient + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let chains: Vec<String> = chains.into_iter().map(|c| c.as_ref().to_string()).collect();
    let per_chain = join_all(chains.iter().map(|chain| async move {
        let pools = query_all_pools(client, chain).await?;
        let gauges = query_all_gauges(client, chain).await?;
        Ok::<_, AddressBookError>((name_map(pools)?, name_map(gauges)?))
    }))
    .await;

    let mut books = NameBooks::default();
    for (chain, result) in chains.iter().zip(per_chain) {
        let (pools, gauges) = result?;
        info!("{}: {} pools, {} gauges", chain, pools.len(), gauges.len());
        if !pools.is_empty() {
            books.pools.insert(chain.clone(), pools);
        }
        if !gauges.is_empty() {
            books.gauges.insert(chain.clone(), gauges);
        }
    }

    if chains.iter().any(|c| c == "mainnet") {
        let roots = root_gauge_map(&query_root_gauges(client).await?, &books.gauges)?;
        if !roots.is_empty() {
            books.root_gauges.insert("mainnet".to_string(), roots);
        }
    } else {
        warn!("⚠️ mainnet not requested, root gauges not generated");
    }
    Ok(books)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgraph::testing::FakeSubgraph;
    use serde_json::json;

    fn row(address: &str, symbol: &str) -> AddressSymbol {
        AddressSymbol {
            address: address.to_string(),
            symbol: symbol.to_string(),
        }
    }

    #[test]
    fn test_name_map_suffix_and_order() {
        let map = name_map(vec![
            row("0x5c6ee304399dbdb9c8ef030ab642b10820db8f56", "B-80BAL-20WETH"),
            row("0x32296969ef14eb0c6d29669c550d4a0449130230", "B-stETH-STABLE"),
        ])
        .unwrap();
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            vec!["B-stETH-STABLE-3229", "B-80BAL-20WETH-5c6e"]
        );
    }

    #[test]
    fn test_name_map_rejects_duplicates() {
        assert!(matches!(
            name_map(vec![
                row("0x0000000000000000000000000000000000000001", "A"),
                row("0x0000000000000000000000000000000000000001", "B"),
            ]),
            Err(AddressBookError::MultipleMatches { .. })
        ));
        assert!(matches!(
            name_map(vec![
                row("0x0000000000000000000000000000000000000001", "A"),
                row("0x0000000000000000000000000000000000000002", "A"),
            ]),
            Err(AddressBookError::MultipleMatches { .. })
        ));
    }

    #[test]
    fn test_root_gauge_map() {
        let child = "0x0000000000000000000000000000000000000a11";
        let mut gauges = ChainNameMaps::new();
        gauges.insert(
            "arbitrum".to_string(),
            NameMap::from([("B-wstETH-WETH-gauge-0000".to_string(), child.to_string())]),
        );
        let roots = vec![
            RootGauge {
                id: "0x1234000000000000000000000000000000000000".to_string(),
                chain: Some("Arbitrum".to_string()),
                recipient: child.to_string(),
            },
            RootGauge {
                id: "0x9999000000000000000000000000000000000000".to_string(),
                chain: None,
                recipient: child.to_string(),
            },
        ];

        let map = root_gauge_map(&roots, &gauges).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get("B-wstETH-WETH-arbitrum-root-1234").map(String::as_str),
            Some("0x1234000000000000000000000000000000000000")
        );
    }

    #[tokio::test]
    async fn test_build_name_books() {
        let subgraph = FakeSubgraph::new()
            .with_data(
                "mainnet",
                &ALL_POOLS,
                json!({ "pools": [{ "address": "0x0000000000000000000000000000000000000001", "symbol": "P" }] }),
            )
            .with_data(
                "arbitrum",
                &ALL_GAUGES,
                json!({ "liquidityGauges": [{ "address": "0x0000000000000000000000000000000000000a11", "symbol": "G-gauge" }] }),
            )
            .with_data(
                "mainnet",
                &ROOT_GAUGES,
                json!({ "rootGauges": [{
                    "id": "0x1234000000000000000000000000000000000000",
                    "chain": "Arbitrum",
                    "recipient": "0x0000000000000000000000000000000000000a11"
                }] }),
            );

        let books = build_name_books(&subgraph, ["mainnet", "arbitrum"]).await.unwrap();
        assert_eq!(books.pools["mainnet"]["P-0000"], "0x0000000000000000000000000000000000000001");
        assert!(!books.pools.contains_key("arbitrum"));
        assert_eq!(
            books.gauges["arbitrum"]["G-gauge-0000"],
            "0x0000000000000000000000000000000000000a11"
        );
        assert_eq!(books.root_gauges["mainnet"].len(), 1);
    }
}
