use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use url::Url;

/// Upstream locations of every document the address book is built from.
#[derive(Debug, Deserialize, Clone)]
pub struct Sources {
    /// Published snapshots (pools.json, gauges.json, permissions/active/<chain>.json, ...)
    #[serde(default = "default_outputs_url")]
    pub outputs_url: String,
    /// Hand-maintained extras (chains.json, multisigs.json, signers.json, <chain>.json)
    #[serde(default = "default_extras_url")]
    pub extras_url: String,
    /// Deployment manifests and action-id manifests
    #[serde(default = "default_deployments_url")]
    pub deployments_url: String,
    #[serde(default = "default_code_review_url")]
    pub code_review_url: String,
    /// Human-facing base used to rewrite relative review links
    #[serde(default = "default_code_review_browse_url")]
    pub code_review_browse_url: String,
    /// Frontend per-chain config directory, used to discover subgraph URLs
    #[serde(default = "default_frontend_config_url")]
    pub frontend_config_url: String,
}

fn default_outputs_url() -> String {
    "https://raw.githubusercontent.com/BalancerMaxis/bal_addresses/main/outputs".to_string()
}
fn default_extras_url() -> String {
    "https://raw.githubusercontent.com/BalancerMaxis/bal_addresses/main/extras".to_string()
}
fn default_deployments_url() -> String {
    "https://raw.githubusercontent.com/balancer/balancer-deployments/master".to_string()
}
fn default_code_review_url() -> String {
    "https://raw.githubusercontent.com/balancer/code-review/main".to_string()
}
fn default_code_review_browse_url() -> String {
    "https://github.com/balancer/code-review/blob/main".to_string()
}
fn default_frontend_config_url() -> String {
    "https://raw.githubusercontent.com/balancer/frontend-v2/develop/src/lib/config".to_string()
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            outputs_url: default_outputs_url(),
            extras_url: default_extras_url(),
            deployments_url: default_deployments_url(),
            code_review_url: default_code_review_url(),
            code_review_browse_url: default_code_review_browse_url(),
            frontend_config_url: default_frontend_config_url(),
        }
    }
}

impl Sources {
    pub fn chains(&self) -> String {
        format!("{}/chains.json", self.extras_url)
    }
    pub fn extras(&self, chain: &str) -> String {
        format!("{}/{}.json", self.extras_url, chain)
    }
    pub fn multisigs(&self) -> String {
        format!("{}/multisigs.json", self.extras_url)
    }
    pub fn signers(&self) -> String {
        format!("{}/signers.json", self.extras_url)
    }
    pub fn deployments(&self, chain: &str) -> String {
        format!("{}/addresses/{}.json", self.deployments_url, chain)
    }
    pub fn action_ids(&self, chain: &str) -> String {
        format!("{}/action-ids/{}/action-ids.json", self.deployments_url, chain)
    }
    pub fn pools(&self) -> String {
        format!("{}/pools.json", self.outputs_url)
    }
    pub fn gauges(&self) -> String {
        format!("{}/gauges.json", self.outputs_url)
    }
    pub fn root_gauges(&self) -> String {
        format!("{}/root_gauges.json", self.outputs_url)
    }
    pub fn active_permissions(&self, chain: &str) -> String {
        format!("{}/permissions/active/{}.json", self.outputs_url, chain)
    }
    pub fn rate_provider_registry(&self) -> String {
        format!("{}/rate-providers/registry.json", self.code_review_url)
    }
    /// Rejects base URLs that do not parse, naming the offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bases = [
            ("sources.outputs_url", &self.outputs_url),
            ("sources.extras_url", &self.extras_url),
            ("sources.deployments_url", &self.deployments_url),
            ("sources.code_review_url", &self.code_review_url),
            ("sources.code_review_browse_url", &self.code_review_browse_url),
            ("sources.frontend_config_url", &self.frontend_config_url),
        ];
        for (key, base) in bases {
            Url::parse(base)
                .map_err(|e| ConfigError::Message(format!("{}: {} ({})", key, e, base)))?;
        }
        Ok(())
    }

    /// Frontend config uses `gnosis-chain` for gnosis.
    pub fn frontend_config(&self, chain: &str) -> String {
        let chain = if chain == "gnosis" { "gnosis-chain" } else { chain };
        format!("{}/{}/index.ts", self.frontend_config_url, chain)
    }
}

/// Thresholds and override files of the core pool pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct CorePoolRules {
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
    /// Pool type version that identifies the legacy MetaStable pools
    #[serde(default = "default_metastable_version")]
    pub metastable_version: u32,
    #[serde(default = "default_whitelist_path")]
    pub whitelist_path: String,
    #[serde(default = "default_blacklist_path")]
    pub blacklist_path: String,
    /// Chains never considered for core pools (testnets)
    #[serde(default = "default_skip_chains")]
    pub skip_chains: Vec<String>,
}

fn default_min_liquidity_usd() -> f64 {
    250_000.0
}
fn default_metastable_version() -> u32 {
    1
}
fn default_whitelist_path() -> String {
    "config/core_pools_whitelist.json".to_string()
}
fn default_blacklist_path() -> String {
    "config/core_pools_blacklist.json".to_string()
}
fn default_skip_chains() -> Vec<String> {
    vec!["sepolia".to_string(), "goerli".to_string()]
}

impl Default for CorePoolRules {
    fn default() -> Self {
        Self {
            min_liquidity_usd: default_min_liquidity_usd(),
            metastable_version: default_metastable_version(),
            whitelist_path: default_whitelist_path(),
            blacklist_path: default_blacklist_path(),
            skip_chains: default_skip_chains(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Http {
    #[serde(default = "default_http_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout_seconds() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("bal-addressbook/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for Http {
    fn default() -> Self {
        Self {
            timeout_seconds: default_http_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub sources: Sources,
    #[serde(default)]
    pub core_pools: CorePoolRules,
    #[serde(default)]
    pub http: Http,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// chain -> subgraph kind ("core", "gauges", "blocks", "aura") -> url
    #[serde(default)]
    pub subgraph_urls: HashMap<String, HashMap<String, String>>,
}

fn default_output_dir() -> String {
    "outputs".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: Sources::default(),
            core_pools: CorePoolRules::default(),
            http: Http::default(),
            output_dir: default_output_dir(),
            subgraph_urls: HashMap::new(),
        }
    }
}

impl Settings {
    /// Loads `Config.toml` (optional) and `BAL__`-prefixed environment overrides,
    /// e.g. `BAL__SOURCES__OUTPUTS_URL` or `BAL__CORE_POOLS__MIN_LIQUIDITY_USD`.
    pub fn new() -> Result<Self, ConfigError> {
        let config_file = env::var("BAL_CONFIG").unwrap_or_else(|_| "Config.toml".to_string());
        let s = Config::builder()
            .add_source(File::with_name(&config_file).required(false))
            .add_source(
                Environment::with_prefix("BAL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        if let Ok(dir) = env::var("OUTPUT_DIR") {
            let trimmed = dir.trim();
            if !trimmed.is_empty() {
                settings.output_dir = trimmed.to_string();
            }
        }

        settings.sources.validate()?;
        Ok(settings)
    }

    /// Explicitly configured subgraph URL for a chain, if any.
    pub fn subgraph_override(&self, chain: &str, kind: &str) -> Option<&str> {
        self.subgraph_urls
            .get(chain)
            .and_then(|by_kind| by_kind.get(kind))
            .map(String::as_str)
    }
}
