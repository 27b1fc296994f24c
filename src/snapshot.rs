// src/snapshot.rs
//
// JSON snapshot writers for the output directory. Every document is pretty-printed and
// written in one go; parent directories are created as needed.

use crate::core_pools::CorePools;
use crate::errors::Result;
use crate::permissions::ActivePermissions;
use crate::pools_gauges::NameBooks;
use crate::registry::ChainRegistry;
use crate::subgraph::SubgraphEndpoints;
use indexmap::IndexMap;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    fs::write(path, body)?;
    info!("💾 Wrote {}", path.display());
    Ok(())
}

/// `<chain>.json` (path → address) and `<chain>_reverse.json` (address → path, sorted by
/// address).
pub fn write_chain_books(dir: &Path, registry: &ChainRegistry) -> Result<(PathBuf, PathBuf)> {
    let chain = registry.chain();
    let flat = dir.join(format!("{}.json", chain));
    let reverse = dir.join(format!("{}_reverse.json", chain));

    let mut sorted = registry.reversebook().clone();
    sorted.sort_keys();

    write_json(&flat, registry.flatbook())?;
    write_json(&reverse, &sorted)?;
    Ok((flat, reverse))
}

pub fn write_core_pools(dir: &Path, core_pools: &IndexMap<String, CorePools>) -> Result<PathBuf> {
    let path = dir.join("core_pools.json");
    write_json(&path, core_pools)?;
    Ok(path)
}

/// `pools.json`, `gauges.json` and `root_gauges.json`.
pub fn write_name_books(dir: &Path, books: &NameBooks) -> Result<()> {
    write_json(&dir.join("pools.json"), &books.pools)?;
    write_json(&dir.join("gauges.json"), &books.gauges)?;
    write_json(&dir.join("root_gauges.json"), &books.root_gauges)
}

pub fn write_active_permissions(
    dir: &Path,
    chain: &str,
    active: &ActivePermissions,
) -> Result<PathBuf> {
    let path = dir.join("permissions").join("active").join(format!("{}.json", chain));
    write_json(&path, active)?;
    Ok(path)
}

pub fn write_subgraph_urls(dir: &Path, endpoints: &SubgraphEndpoints) -> Result<PathBuf> {
    let path = dir.join("subgraph_urls.json");
    write_json(&path, endpoints)?;
    Ok(path)
}
