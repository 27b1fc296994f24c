//! # Subgraph access
//!
//! Every GraphQL call goes through [`SubgraphClient`], keyed by chain and [`SubgraphKind`].
//! A chain without a subgraph of the requested kind is not an error: the client answers
//! `Ok(None)` and callers treat it as "no data".
//!
//! Endpoint URLs are resolved once, up front, into [`SubgraphEndpoints`]:
//!
//! 1. explicit `subgraph_urls` entries in [`Settings`]
//! 2. the Aura table for `aura`, a fixed blocks subgraph for optimism
//! 3. the `subgraph:` / `gauge:` / `blocks:` keys of the frontend's per-chain `index.ts`

use crate::errors::{AddressBookError, Result};
use crate::queries::GraphQuery;
use crate::settings::Settings;
use crate::sources::DocumentFetcher;
use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

const OPTIMISM_BLOCKS_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/iliaazhel/optimism-blocklytics";

const AURA_SUBGRAPHS: &[(&str, &str)] = &[
    ("mainnet", "https://graph.data.aura.finance/subgraphs/name/aura/aura-mainnet-v2-1"),
    ("arbitrum", "https://api.thegraph.com/subgraphs/name/aurafinance/aura-finance-arbitrum"),
    ("optimism", "https://api.thegraph.com/subgraphs/name/aurafinance/aura-finance-optimism"),
    ("gnosis", "https://api.thegraph.com/subgraphs/name/aurafinance/aura-finance-gnosis-chain"),
    ("base", "https://api.thegraph.com/subgraphs/name/aurafinance/aura-finance-base"),
    ("polygon", "https://api.thegraph.com/subgraphs/name/aurafinance/aura-finance-polygon"),
    ("zkevm", "https://api.studio.thegraph.com/query/69982/aura-finance-zkevm/version/latest"),
    (
        "avalanche",
        "https://subgraph.satsuma-prod.com/cae76ab408ca/1xhub-ltd/aura-finance-avalanche/version/v0.0.1/api",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubgraphKind {
    Core,
    Gauges,
    Blocks,
    Aura,
}

impl SubgraphKind {
    pub const ALL: [SubgraphKind; 4] = [
        SubgraphKind::Core,
        SubgraphKind::Gauges,
        SubgraphKind::Blocks,
        SubgraphKind::Aura,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubgraphKind::Core => "core",
            SubgraphKind::Gauges => "gauges",
            SubgraphKind::Blocks => "blocks",
            SubgraphKind::Aura => "aura",
        }
    }

    /// Key under which the frontend config lists this subgraph.
    fn frontend_key(&self) -> Option<&'static str> {
        match self {
            SubgraphKind::Core => Some("subgraph:"),
            SubgraphKind::Gauges => Some("gauge:"),
            SubgraphKind::Blocks => Some("blocks:"),
            SubgraphKind::Aura => None,
        }
    }
}

impl fmt::Display for SubgraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executes GraphQL documents against a chain's subgraphs.
#[async_trait]
pub trait SubgraphClient: Send + Sync {
    /// The `data` object of the response, or `None` when the chain has no subgraph of
    /// `query.kind`.
    async fn execute(&self, chain: &str, query: &GraphQuery, variables: Value)
        -> Result<Option<Value>>;
}

/// Resolved endpoint table: chain → kind → url.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SubgraphEndpoints(IndexMap<String, IndexMap<SubgraphKind, String>>);

impl SubgraphEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(&self, chain: &str, kind: SubgraphKind) -> Option<&str> {
        self.0
            .get(chain)
            .and_then(|by_kind| by_kind.get(&kind))
            .map(String::as_str)
    }

    pub fn insert(&mut self, chain: &str, kind: SubgraphKind, url: impl Into<String>) {
        self.0
            .entry(chain.to_string())
            .or_default()
            .insert(kind, url.into());
    }

    pub fn chains(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Resolves every kind for every chain. Kinds that cannot be resolved are left out.
    pub async fn resolve<F, I, S>(fetcher: &F, settings: &Settings, chains: I) -> Self
    where
        F: DocumentFetcher,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut endpoints = Self::new();
        for chain in chains {
            let chain = chain.as_ref();
            // The frontend config is shared by three kinds; fetch it lazily, once.
            let mut frontend: Option<Option<String>> = None;
            for kind in SubgraphKind::ALL {
                let url = match fixed_url(settings, chain, kind) {
                    Some(url) => Some(url),
                    None => match kind.frontend_key() {
                        Some(key) => {
                            if frontend.is_none() {
                                frontend =
                                    Some(fetch_frontend_config(fetcher, settings, chain).await);
                            }
                            frontend
                                .as_ref()
                                .and_then(|text| text.as_deref())
                                .and_then(|text| parse_frontend_config(text, key))
                        }
                        None => None,
                    },
                };
                match url {
                    Some(url) => endpoints.insert(chain, kind, url),
                    None => debug!("{}: no {} subgraph", chain, kind),
                }
            }
        }
        info!("✅ Subgraph endpoints resolved for {} chains", endpoints.0.len());
        endpoints
    }
}

/// URL known without looking at the frontend config.
fn fixed_url(settings: &Settings, chain: &str, kind: SubgraphKind) -> Option<String> {
    if let Some(url) = settings.subgraph_override(chain, kind.as_str()) {
        return Some(url.to_string());
    }
    match kind {
        SubgraphKind::Aura => AURA_SUBGRAPHS
            .iter()
            .find(|(name, _)| *name == chain)
            .map(|(_, url)| url.to_string()),
        SubgraphKind::Blocks if chain == "optimism" => Some(OPTIMISM_BLOCKS_SUBGRAPH.to_string()),
        _ => None,
    }
}

async fn fetch_frontend_config<F: DocumentFetcher>(
    fetcher: &F,
    settings: &Settings,
    chain: &str,
) -> Option<String> {
    let url = settings.sources.frontend_config(chain);
    match fetcher.fetch_text(&url).await {
        Ok(Some(text)) => Some(text),
        Ok(None) => {
            warn!("⚠️ No frontend config for {} at {}", chain, url);
            None
        }
        Err(e) => {
            warn!("⚠️ Failed to fetch frontend config for {}: {:#}", chain, e);
            None
        }
    }
}

/// Value of `key` in a frontend `index.ts`, written either on the same line
/// (`subgraph: 'https://...',`) or on the line after the key.
pub fn parse_frontend_config(text: &str, key: &str) -> Option<String> {
    let strip = |s: &str| {
        s.trim()
            .trim_matches(|c| c == ',' || c == '\'' || c == '"' || c == '`' || c == ' ')
            .to_string()
    };
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some((_, rest)) = line.split_once(key) else {
            continue;
        };
        let value = strip(rest);
        let value = if value.is_empty() {
            strip(lines.next()?)
        } else {
            value
        };
        return (!value.is_empty()).then_some(value);
    }
    None
}

/// reqwest-backed client posting `{query, variables}` to the resolved endpoint.
#[derive(Clone)]
pub struct HttpSubgraph {
    client: reqwest::Client,
    endpoints: SubgraphEndpoints,
}

impl HttpSubgraph {
    pub fn new(settings: &Settings, endpoints: SubgraphEndpoints) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http.timeout_seconds))
            .user_agent(settings.http.user_agent.clone())
            .build()?;
        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &SubgraphEndpoints {
        &self.endpoints
    }
}

#[async_trait]
impl SubgraphClient for HttpSubgraph {
    async fn execute(
        &self,
        chain: &str,
        query: &GraphQuery,
        variables: Value,
    ) -> Result<Option<Value>> {
        let Some(url) = self.endpoints.url(chain, query.kind) else {
            warn!("⚠️ {} has no {} subgraph, skipping {}", chain, query.kind, query.name);
            return Ok(None);
        };
        debug!("{} {} -> {}", chain, query.name, url);

        let response = self
            .client
            .post(url)
            .json(&json!({ "query": query.body, "variables": variables }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AddressBookError::GraphQLRequest(format!(
                "{} on {}: HTTP {}",
                query.name, chain, status
            )));
        }
        let body: Value = response.json().await?;
        extract_data(query, chain, body).map(Some)
    }
}

/// Pulls `data` out of a GraphQL response body, turning `errors` into a failure.
pub fn extract_data(query: &GraphQuery, chain: &str, mut body: Value) -> Result<Value> {
    if let Some(errors) = body.get("errors") {
        return Err(AddressBookError::GraphQLRequest(format!(
            "{} on {}: {}",
            query.name, chain, errors
        )));
    }
    match body.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(AddressBookError::GraphQLRequest(format!(
            "{} on {}: response has no data",
            query.name, chain
        ))),
    }
}

/// Deserializes the list under `field`. A missing or null field is an empty list.
pub fn rows<T: DeserializeOwned>(data: &Value, field: &str) -> Result<Vec<T>> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(list) => Ok(serde_json::from_value(list.clone())?),
    }
}

/// Runs a `$first` / `$skip` paginated query until a short page comes back.
pub async fn paginate<C, T>(
    client: &C,
    chain: &str,
    query: &GraphQuery,
    field: &str,
    page_size: usize,
) -> Result<Vec<T>>
where
    C: SubgraphClient + ?Sized,
    T: DeserializeOwned,
{
    let mut collected = Vec::new();
    let mut skip = 0usize;
    loop {
        let variables = json!({ "first": page_size, "skip": skip });
        let Some(data) = client.execute(chain, query, variables).await? else {
            break;
        };
        let page: Vec<T> = rows(&data, field)?;
        let fetched = page.len();
        collected.extend(page);
        if fetched < page_size {
            break;
        }
        skip += page_size;
    }
    Ok(collected)
}
