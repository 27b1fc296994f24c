//! # Balancer Address Book
//!
//! A canonical, deduplicated registry of Balancer addresses across every supported chain,
//! and the derivation of the "core pool" set used for incentive accounting.
//!
//! ## Overview
//!
//! Several independent upstream documents name on-chain addresses: deployment manifests,
//! subgraph-generated pool and gauge lists, hand-maintained extras, multisig and signer
//! lists, the rate provider review registry. This crate merges them under a fixed
//! precedence order into one checksummed, path-addressable book per chain.
//!
//! ## Architecture
//!
//! ### Registry Layer
//! [`sources::SourceLoader`] fetches and normalizes each upstream document, tolerating
//! absence. [`registry::RegistryBuilder`] flattens and merges them into a
//! [`registry::ChainRegistry`] with a reverse index, substring search and
//! "latest deployment" resolution.
//!
//! ### Permissions Layer
//! [`permissions::PermissionIndex`] maps Authorizer action ids to function paths and
//! granted callers.
//!
//! ### Pool Pipelines
//! [`core_pools::CorePoolSelector`] derives core pools from subgraph data plus manual
//! overrides. [`pools_gauges`] generates the pool and gauge name books, and [`ecosystem`]
//! attributes BPT held in gauges and Aura to the underlying depositors.

// Address Model
/// Error kinds and the crate `Result`
pub mod errors;
/// Nested name → address trees
pub mod tree;
/// EIP-55 checksumming of address trees
pub mod normalize;
/// Nested tree → `/`-joined flat paths
pub mod flatten;
/// Date-prefixed deployment manifests
pub mod deployments;

// Registry Layer
/// Chain directory (ids, scanners, production chains)
pub mod chains;
/// Reviewed rate providers per chain
pub mod rate_providers;
/// Upstream document fetching with graceful degradation
pub mod sources;
/// Per-chain merged address book
pub mod registry;

// Permissions
/// Action id ↔ function path index
pub mod permissions;

// Subgraphs & Pool Pipelines
/// GraphQL transport and endpoint resolution
pub mod subgraph;
/// GraphQL documents and row types
pub mod queries;
/// Core pool derivation
pub mod core_pools;
/// Pool and gauge name books
pub mod pools_gauges;
/// BPT ownership across gauges and Aura
pub mod ecosystem;

// Outputs
/// JSON snapshot writers
pub mod snapshot;

// Contracts (Public ABIs Only)
/// Smart contract bindings (read-only)
pub mod contracts;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use core_pools::CorePoolSelector;
pub use errors::{AddressBookError, Result};
pub use permissions::PermissionIndex;
pub use registry::ChainRegistry;
pub use settings::Settings;
pub use sources::SourceLoader;
