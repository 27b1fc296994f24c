//! # Permissions
//!
//! Balancer's Authorizer gates every permissioned function behind a 32-byte *action id*.
//! The action-id manifest lists them per `deployment → contract → function`; this module
//! indexes that manifest both ways and joins it with the currently granted roles.
//!
//! - function path (`20210418-vault/Vault/setRelayerApproval`) → exactly one action id
//! - action id → every function path sharing it
//!
//! The all-zero action id is `DEFAULT_ADMIN_ROLE` and is always present.

use crate::errors::{expect_unique, AddressBookError, Result};
use crate::normalize::checksum_or_passthrough;
use crate::registry::ChainRegistry;
use crate::sources::{DocumentFetcher, SourceLoader};
use async_trait::async_trait;
use ethers::types::Address;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_ADMIN_ROLE: &str = "DEFAULT_ADMIN_ROLE";

/// Name reported for callers that are not in the address book.
pub const UNDEFINED_CALLER: &str = "undefined";

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId([u8; 32]);

impl ActionId {
    pub const ZERO: ActionId = ActionId([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for ActionId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for ActionId {
    type Err = AddressBookError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes =
            hex::decode(digits).map_err(|_| AddressBookError::InvalidActionId(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AddressBookError::InvalidActionId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionId({})", self)
    }
}

impl Serialize for ActionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One contract's entry in the action-id manifest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractActions {
    #[serde(default)]
    pub use_adaptor: bool,
    #[serde(default)]
    pub action_ids: IndexMap<String, ActionId>,
}

/// deployment → contract → actions.
pub type ActionIdManifest = IndexMap<String, IndexMap<String, ContractActions>>;

/// action id → addresses currently granted the role.
pub type ActivePermissions = IndexMap<ActionId, Vec<String>>;

pub fn parse_manifest(value: &Value) -> Result<ActionIdManifest> {
    if value.is_null() {
        return Ok(ActionIdManifest::new());
    }
    Ok(serde_json::from_value(value.clone())?)
}

pub fn parse_active_permissions(value: &Value) -> Result<ActivePermissions> {
    if value.is_null() {
        return Ok(ActivePermissions::new());
    }
    let raw: IndexMap<ActionId, Vec<String>> = serde_json::from_value(value.clone())?;
    Ok(raw
        .into_iter()
        .map(|(action_id, callers)| {
            let callers = callers.iter().map(|c| checksum_or_passthrough(c)).collect();
            (action_id, callers)
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct PermissionIndex {
    registry: Arc<ChainRegistry>,
    action_id_by_path: IndexMap<String, ActionId>,
    paths_by_action_id: IndexMap<ActionId, BTreeSet<String>>,
    use_adaptor: IndexMap<String, bool>,
    active: ActivePermissions,
}

impl PermissionIndex {
    pub fn new(
        registry: Arc<ChainRegistry>,
        manifest: &ActionIdManifest,
        active: ActivePermissions,
    ) -> Self {
        let mut action_id_by_path = IndexMap::new();
        let mut paths_by_action_id: IndexMap<ActionId, BTreeSet<String>> = IndexMap::new();
        let mut use_adaptor = IndexMap::new();

        action_id_by_path.insert(DEFAULT_ADMIN_ROLE.to_string(), ActionId::ZERO);
        paths_by_action_id
            .entry(ActionId::ZERO)
            .or_default()
            .insert(DEFAULT_ADMIN_ROLE.to_string());

        for (deployment, contracts) in manifest {
            for (contract, actions) in contracts {
                use_adaptor.insert(format!("{}/{}", deployment, contract), actions.use_adaptor);
                for (function, action_id) in &actions.action_ids {
                    let path = format!("{}/{}/{}", deployment, contract, function);
                    if let Some(previous) = action_id_by_path.insert(path.clone(), *action_id) {
                        warn!("{} listed twice ({} and {})", path, previous, action_id);
                    }
                    paths_by_action_id.entry(*action_id).or_default().insert(path);
                }
            }
        }

        info!(
            "🔐 {} permissions: {} function paths, {} action ids, {} granted",
            registry.chain(),
            action_id_by_path.len(),
            paths_by_action_id.len(),
            active.len()
        );

        Self {
            registry,
            action_id_by_path,
            paths_by_action_id,
            use_adaptor,
            active,
        }
    }

    /// Fetches the action-id manifest and the active permissions snapshot for the
    /// registry's chain. Either document missing means an empty index section.
    pub async fn load<F: DocumentFetcher>(
        loader: &SourceLoader<F>,
        registry: Arc<ChainRegistry>,
    ) -> Result<Self> {
        let chain = registry.chain().to_string();
        let sources = &loader.settings().sources;
        let manifest = match loader.fetch_optional(&sources.action_ids(&chain)).await {
            Some(value) => parse_manifest(&value)?,
            None => ActionIdManifest::new(),
        };
        let active = match loader.fetch_optional(&sources.active_permissions(&chain)).await {
            Some(value) => parse_active_permissions(&value)?,
            None => ActivePermissions::new(),
        };
        Ok(Self::new(registry, &manifest, active))
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn action_id(&self, path: &str) -> Option<ActionId> {
        self.action_id_by_path.get(path).copied()
    }

    pub fn paths(&self, action_id: &ActionId) -> Option<&BTreeSet<String>> {
        self.paths_by_action_id.get(action_id)
    }

    pub fn action_ids(&self) -> impl Iterator<Item = &ActionId> {
        self.paths_by_action_id.keys()
    }

    /// Every `(path, action id)` whose path contains `substr`.
    pub fn search_path(&self, substr: &str) -> Vec<(String, ActionId)> {
        self.action_id_by_path
            .iter()
            .filter(|(path, _)| path.contains(substr))
            .map(|(path, action_id)| (path.clone(), *action_id))
            .collect()
    }

    /// Resolves a unique deployment through the registry, then a unique function path
    /// inside it.
    pub fn search_unique_path_by_unique_deployment(
        &self,
        deployment_substr: &str,
        fx_substr: &str,
    ) -> Result<(String, ActionId)> {
        let deployment = self.registry.search_unique_deployment(deployment_substr)?;
        let prefix = format!("{}/", deployment.name);
        let matches = self
            .action_id_by_path
            .iter()
            .filter(|(path, _)| {
                path.starts_with(&prefix) && path[prefix.len()..].contains(fx_substr)
            })
            .map(|(path, action_id)| (path.clone(), *action_id))
            .collect();
        expect_unique(&format!("{}{}", prefix, fx_substr), matches)
    }

    pub fn allowed_addresses(&self, action_id: &ActionId) -> Result<&[String]> {
        match self.active.get(action_id) {
            Some(callers) if !callers.is_empty() => Ok(callers),
            _ => Err(AddressBookError::NoResult(format!(
                "no callers hold {} on {}",
                action_id,
                self.registry.chain()
            ))),
        }
    }

    /// Granted callers as address book paths, `undefined` for unknown addresses.
    pub fn allowed_caller_names(&self, action_id: &ActionId) -> Result<Vec<String>> {
        Ok(self
            .allowed_addresses(action_id)?
            .iter()
            .map(|address| {
                self.registry
                    .path(address)
                    .unwrap_or(UNDEFINED_CALLER)
                    .to_string()
            })
            .collect())
    }

    /// Whether calls to `deployment/contract` must be routed through the AuthorizerAdaptor.
    pub fn needs_authorizer_adaptor(&self, deployment: &str, contract: &str) -> Option<bool> {
        self.use_adaptor
            .get(&format!("{}/{}", deployment, contract))
            .copied()
    }
}

/// Read access to the Authorizer's role membership.
#[async_trait]
pub trait RoleSource: Send + Sync {
    async fn role_member_count(&self, action_id: &ActionId) -> anyhow::Result<u64>;
    async fn role_member(&self, action_id: &ActionId, index: u64) -> anyhow::Result<Address>;
}

/// Queries the current holders of every distinct action id in `manifest`. Roles nobody
/// holds are left out.
pub async fn collect_active_permissions<R: RoleSource + ?Sized>(
    authorizer: &R,
    manifest: &ActionIdManifest,
) -> anyhow::Result<ActivePermissions> {
    let mut active = ActivePermissions::new();
    let mut seen = BTreeSet::new();
    for (deployment, contracts) in manifest {
        debug!("Processing {}", deployment);
        for actions in contracts.values() {
            for action_id in actions.action_ids.values() {
                if !seen.insert(*action_id) {
                    continue;
                }
                let members = authorizer.role_member_count(action_id).await?;
                if members == 0 {
                    continue;
                }
                let mut callers = Vec::new();
                for i in 0..members {
                    let member = authorizer.role_member(action_id, i).await?;
                    callers.push(ethers::utils::to_checksum(&member, None));
                }
                active.insert(*action_id, callers);
            }
        }
    }
    Ok(active)
}
