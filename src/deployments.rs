//! # Deployments
//!
//! A deployment is a date-prefixed release unit (`20210418-authorizer`) bundling one or
//! more contracts. The upstream manifest comes in two shapes, both accepted here:
//!
//! ```json
//! { "20210418-vault": { "Vault": "0xBA12...", "BalancerHelpers": "0x5aDD..." } }
//! { "20210418-vault": { "contracts": [{ "name": "Vault", "address": "0xBA12..." }], "status": "ACTIVE" } }
//! ```
//!
//! The list form is normalized into the name-keyed form. Deployment names keep their date
//! prefix so that a plain string comparison orders them chronologically, which is what
//! [`Deployments::latest_with_contract`] relies on.

use crate::errors::{expect_unique, AddressBookError, Result};
use crate::flatten::join_path;
use crate::normalize::checksum_or_passthrough;
use indexmap::IndexMap;
use log::warn;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployedContract {
    pub name: String,
    pub address: String,
    /// Full deployment name, date prefix included.
    pub deployment: String,
    /// `<deployment>/<contract>`, the contract's path in the flatbook.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deployment {
    /// Name as published upstream, e.g. `20230101-authorizer-v2`.
    pub name: String,
    /// Name without the date prefix and with `-` replaced by `_`, e.g. `authorizer_v2`.
    pub ident: String,
    pub status: Option<String>,
    pub contracts: IndexMap<String, DeployedContract>,
}

impl Deployment {
    pub fn contract(&self, name: &str) -> Option<&DeployedContract> {
        self.contracts.get(name)
    }

    /// Contract name → checksummed address.
    pub fn addresses(&self) -> IndexMap<String, String> {
        self.contracts
            .values()
            .map(|c| (c.name.clone(), c.address.clone()))
            .collect()
    }

    fn matches(&self, substr: &str) -> bool {
        self.name.contains(substr) || self.ident.contains(substr)
    }
}

/// Strips a leading `YYYYMMDD-` and converts hyphens to underscores.
pub fn deployment_ident(name: &str) -> String {
    let bytes = name.as_bytes();
    let has_date = bytes.len() > 9
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'-';
    let rest = if has_date { &name[9..] } else { name };
    rest.replace('-', "_")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Deployments {
    by_name: IndexMap<String, Deployment>,
}

impl Deployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a per-chain deployments manifest in either supported shape.
    pub fn from_json(value: &Value) -> Self {
        let Some(entries) = value.as_object() else {
            if !value.is_null() {
                warn!("Deployments manifest is not an object, ignoring it");
            }
            return Self::new();
        };

        let mut deployments = Self::new();
        for (name, body) in entries {
            let mut deployment = Deployment {
                name: name.clone(),
                ident: deployment_ident(name),
                status: None,
                contracts: IndexMap::new(),
            };

            match body {
                Value::Object(fields) if fields.get("contracts").map_or(false, Value::is_array) => {
                    deployment.status = fields
                        .get("status")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    for entry in fields["contracts"].as_array().into_iter().flatten() {
                        let contract = entry.get("name").and_then(Value::as_str);
                        let address = entry.get("address").and_then(Value::as_str);
                        match (contract, address) {
                            (Some(contract), Some(address)) => {
                                deployment.insert_contract(contract, address)
                            }
                            _ => warn!("{}: contract entry {} formatted incorrectly", name, entry),
                        }
                    }
                }
                Value::Object(fields) => {
                    for (contract, address) in fields {
                        match address.as_str() {
                            Some(address) => deployment.insert_contract(contract, address),
                            None => {
                                warn!("{}/{} {} formatted incorrectly", name, contract, address)
                            }
                        }
                    }
                }
                other => {
                    warn!("Deployment {} is not an object ({}), skipping", name, other);
                    continue;
                }
            }

            deployments.by_name.insert(name.clone(), deployment);
        }
        deployments
    }

    pub fn insert(&mut self, deployment: Deployment) {
        self.by_name.insert(deployment.name.clone(), deployment);
    }

    pub fn get(&self, name: &str) -> Option<&Deployment> {
        self.by_name.get(name)
    }

    /// Looks a deployment up by its in-memory identifier (`authorizer_v2`).
    pub fn by_ident(&self, ident: &str) -> Option<&Deployment> {
        self.by_name.values().find(|d| d.ident == ident)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deployment> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// All deployments whose name or identifier contains `substr`.
    pub fn search_many(&self, substr: &str) -> Vec<&Deployment> {
        self.by_name.values().filter(|d| d.matches(substr)).collect()
    }

    pub fn search_unique(&self, substr: &str) -> Result<&Deployment> {
        let matches = self
            .search_many(substr)
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        expect_unique(substr, matches).map(|(_, deployment)| deployment)
    }

    /// The most recent deployment (greatest name) containing a contract named exactly
    /// `contract`.
    pub fn latest_with_contract(&self, contract: &str) -> Result<&DeployedContract> {
        self.by_name
            .values()
            .filter_map(|d| d.contract(contract))
            .max_by(|a, b| a.deployment.cmp(&b.deployment))
            .ok_or_else(|| {
                AddressBookError::NoResult(format!("no deployment contains {}", contract))
            })
    }
}

impl Deployment {
    fn insert_contract(&mut self, contract: &str, address: &str) {
        self.contracts.insert(
            contract.to_string(),
            DeployedContract {
                name: contract.to_string(),
                address: checksum_or_passthrough(address),
                deployment: self.name.clone(),
                path: join_path(&self.name, contract),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Deployments {
        Deployments::from_json(&json!({
            "20210418-authorizer": {
                "Authorizer": "0xa331d84ec860bf466b4cdccfb4ac09a1b43f3ae6"
            },
            "20230101-authorizer-v2": {
                "contracts": [
                    { "name": "Authorizer", "address": "0x0000000000000000000000000000000000000002" },
                    { "name": "AuthorizerAdaptor", "address": "0x0000000000000000000000000000000000000003" }
                ],
                "status": "ACTIVE"
            },
            "20210418-vault": {
                "Vault": "0xba12222222228d8ba445958a75a0704d566bf2c8"
            }
        }))
    }

    #[test]
    fn test_deployment_ident() {
        assert_eq!(deployment_ident("20210418-authorizer"), "authorizer");
        assert_eq!(deployment_ident("20230101-authorizer-v2"), "authorizer_v2");
        assert_eq!(deployment_ident("not-dated"), "not_dated");
        assert_eq!(deployment_ident("2021041-x"), "2021041_x");
    }

    #[test]
    fn test_both_manifest_shapes() {
        let deployments = sample();
        assert_eq!(deployments.len(), 3);

        let v2 = deployments.get("20230101-authorizer-v2").unwrap();
        assert_eq!(v2.status.as_deref(), Some("ACTIVE"));
        assert_eq!(v2.contracts.len(), 2);
        assert_eq!(
            v2.contract("AuthorizerAdaptor").unwrap().path,
            "20230101-authorizer-v2/AuthorizerAdaptor"
        );

        let vault = deployments.by_ident("vault").unwrap();
        assert_eq!(
            vault.addresses()["Vault"],
            "0xBA12222222228d8Ba445958a75a0704d566BF2C8"
        );
    }

    #[test]
    fn test_latest_with_contract() {
        let deployments = sample();
        let latest = deployments.latest_with_contract("Authorizer").unwrap();
        assert_eq!(latest.deployment, "20230101-authorizer-v2");
        assert_eq!(latest.address, "0x0000000000000000000000000000000000000002");

        assert!(matches!(
            deployments.latest_with_contract("Authorize"),
            Err(AddressBookError::NoResult(_))
        ));
    }

    #[test]
    fn test_search_deployments() {
        let deployments = sample();
        assert_eq!(deployments.search_many("authorizer").len(), 2);
        assert_eq!(deployments.search_many("nothing").len(), 0);
        assert_eq!(
            deployments.search_unique("authorizer_v2").unwrap().name,
            "20230101-authorizer-v2"
        );
        assert!(matches!(
            deployments.search_unique("authorizer"),
            Err(AddressBookError::MultipleMatches { .. })
        ));
        assert!(matches!(
            deployments.search_unique("gauge"),
            Err(AddressBookError::NoResult(_))
        ));
    }
}
