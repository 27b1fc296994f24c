//! # Address book generator
//!
//! Regenerates the published snapshots in the output directory.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin bal_addressbook -- addresses
//! cargo run --bin bal_addressbook -- addresses --chain mainnet --chain arbitrum
//! cargo run --bin bal_addressbook -- core-pools
//! cargo run --bin bal_addressbook -- pools-gauges
//! cargo run --bin bal_addressbook -- permissions --chain mainnet --rpc-url https://...
//! cargo run --bin bal_addressbook -- subgraph-urls
//! ```
//!
//! Settings come from `Config.toml` and `BAL__*` environment variables; see
//! `bal_addressbook::settings`.

use anyhow::{Context, Result};
use bal_addressbook::{
    chains::ChainDirectory,
    contracts::Authorizer,
    core_pools::{CorePoolOverrides, CorePoolSelector},
    permissions::{collect_active_permissions, parse_manifest, ActionIdManifest},
    pools_gauges::build_name_books,
    registry::ChainRegistry,
    settings::Settings,
    snapshot,
    sources::{HttpFetcher, SourceLoader},
    subgraph::{HttpSubgraph, SubgraphEndpoints},
};
use clap::{Parser, Subcommand};
use ethers::prelude::{Address, Http, Provider};
use futures::future::join_all;
use log::warn;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Path of the Authorizer that holds every role.
const AUTHORIZER_PATH: &str = "20210418-authorizer/Authorizer";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Overrides the configured output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write `<chain>.json` and `<chain>_reverse.json` address books
    Addresses {
        /// Chains to build; all chains of the directory when omitted
        #[arg(long = "chain")]
        chains: Vec<String>,
    },
    /// Write `core_pools.json`
    CorePools,
    /// Write `pools.json`, `gauges.json` and `root_gauges.json`
    PoolsGauges,
    /// Write `permissions/active/<chain>.json` from the on-chain Authorizer
    Permissions {
        #[arg(long)]
        chain: String,
        /// JSON-RPC endpoint of the chain
        #[arg(long)]
        rpc_url: String,
    },
    /// Write `subgraph_urls.json`
    SubgraphUrls,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    println!("🚀 Starting bal_addressbook");

    let settings = Settings::new().context("Failed to load settings")?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.output_dir));
    println!("✅ Settings loaded (output: {})", output_dir.display());

    let fetcher = HttpFetcher::new(&settings)?;
    let loader = SourceLoader::new(fetcher, settings.clone());
    let directory = loader.chain_directory().await?;
    println!("✅ Chain directory loaded ({} chains)", directory.chain_ids_by_name.len());

    match args.command {
        Command::Addresses { chains } => {
            let chains = if chains.is_empty() {
                directory.chains().map(str::to_string).collect()
            } else {
                chains
            };
            write_addresses(&loader, &directory, &chains, &output_dir).await?
        }
        Command::CorePools => write_core_pools(&loader, &directory, &output_dir).await?,
        Command::PoolsGauges => write_pools_gauges(&loader, &directory, &output_dir).await?,
        Command::Permissions { chain, rpc_url } => {
            write_permissions(&loader, &directory, &chain, &rpc_url, &output_dir).await?
        }
        Command::SubgraphUrls => {
            let endpoints = SubgraphEndpoints::resolve(
                loader.fetcher(),
                loader.settings(),
                directory.chains(),
            )
            .await;
            snapshot::write_subgraph_urls(&output_dir, &endpoints)?;
        }
    }

    println!("✅ Done");
    Ok(())
}

async fn write_addresses(
    loader: &SourceLoader<HttpFetcher>,
    directory: &ChainDirectory,
    chains: &[String],
    output_dir: &Path,
) -> Result<()> {
    let shared = loader.shared_documents().await;
    let registries = join_all(
        chains
            .iter()
            .map(|chain| ChainRegistry::load(loader, directory, &shared, chain)),
    )
    .await;
    for registry in &registries {
        if registry.flatbook().is_empty() {
            warn!("⚠️ {} address book is empty", registry.chain());
        }
        snapshot::write_chain_books(output_dir, registry)?;
    }
    println!("✅ Address books written for {} chains", registries.len());
    Ok(())
}

async fn subgraph_client(
    loader: &SourceLoader<HttpFetcher>,
    chains: &[String],
) -> Result<HttpSubgraph> {
    let endpoints = SubgraphEndpoints::resolve(loader.fetcher(), loader.settings(), chains).await;
    HttpSubgraph::new(loader.settings(), endpoints)
}

async fn write_core_pools(
    loader: &SourceLoader<HttpFetcher>,
    directory: &ChainDirectory,
    output_dir: &Path,
) -> Result<()> {
    let rules = &loader.settings().core_pools;
    let overrides = CorePoolOverrides::from_rules(rules).with_context(|| {
        format!(
            "Failed to read core pool overrides ({}, {})",
            rules.whitelist_path, rules.blacklist_path
        )
    })?;
    let chains: Vec<String> = directory.chains().map(str::to_string).collect();
    let client = subgraph_client(loader, &chains).await?;

    let selector = CorePoolSelector::new(&client, rules, &overrides);
    let core_pools = selector.build_all(&chains).await?;
    snapshot::write_core_pools(output_dir, &core_pools)?;
    println!("✅ Core pools written for {} chains", core_pools.len());
    Ok(())
}

async fn write_pools_gauges(
    loader: &SourceLoader<HttpFetcher>,
    directory: &ChainDirectory,
    output_dir: &Path,
) -> Result<()> {
    // Balancer has root gauges pointing at optimism even though it is not a production chain.
    let mut chains = directory.balancer_production_chains.clone();
    if !chains.iter().any(|c| c == "optimism") {
        chains.push("optimism".to_string());
    }
    let client = subgraph_client(loader, &chains).await?;
    let books = build_name_books(&client, &chains).await?;
    snapshot::write_name_books(output_dir, &books)?;
    println!("✅ Pool and gauge books written");
    Ok(())
}

async fn write_permissions(
    loader: &SourceLoader<HttpFetcher>,
    directory: &ChainDirectory,
    chain: &str,
    rpc_url: &str,
    output_dir: &Path,
) -> Result<()> {
    directory.require(chain)?;
    let shared = loader.shared_documents().await;
    let registry = ChainRegistry::load(loader, directory, &shared, chain).await;
    let (_, authorizer) = registry
        .search_unique(AUTHORIZER_PATH)
        .with_context(|| format!("No Authorizer in the {} address book", chain))?;
    println!("✅ Authorizer on {}: {}", chain, authorizer);

    let manifest = match loader
        .fetch_optional(&loader.settings().sources.action_ids(chain))
        .await
    {
        Some(value) => parse_manifest(&value)?,
        None => ActionIdManifest::new(),
    };

    let provider = Provider::<Http>::try_from(rpc_url)
        .with_context(|| format!("Invalid RPC url {}", rpc_url))?;
    let authorizer = Authorizer::new(Address::from_str(&authorizer)?, Arc::new(provider));
    let active = collect_active_permissions(&authorizer, &manifest).await?;

    snapshot::write_active_permissions(output_dir, chain, &active)?;
    println!("✅ {} granted roles written for {}", active.len(), chain);
    Ok(())
}
