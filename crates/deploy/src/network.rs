//! Static per-network configuration and its validation.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use alloy_core::primitives::Address;
use anyhow::Context;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    dependency::Dependency,
    error::{ProvisionError, ProvisionResult},
    unit::UnitSpec,
};

/// Built-in registry, parsed once by [`NetworkRegistry::builtin`].
const BUILTIN_NETWORKS: &str = include_str!("networks.toml");

/// Whether a network's infrastructure is mocked locally or pre-existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    /// Ephemeral or local network; tokens and price feeds are mock units.
    #[display("development")]
    Development,
    /// Persistent network with real infrastructure addresses.
    #[display("public")]
    Public,
}

/// Configuration record for one supported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// EVM chain id, used as the network identifier everywhere.
    pub chain_id: u64,
    /// Human-readable name (`sepolia`, `localhost`, ...).
    pub name: String,
    pub kind: NetworkKind,
    /// Blocks awaited after a deployment before it is considered durable.
    pub block_confirmations: u64,
    /// Default RPC endpoint, overridable through [`NetworkConfig::rpc_url_env`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,
    /// Dependency address table. May be partial on development networks.
    #[serde(default)]
    pub addresses: BTreeMap<Dependency, Address>,
}

impl NetworkConfig {
    pub fn is_development(&self) -> bool {
        self.kind == NetworkKind::Development
    }

    pub fn address_of(&self, dependency: Dependency) -> ProvisionResult<Address> {
        self.addresses
            .get(&dependency)
            .copied()
            .ok_or(ProvisionError::MissingDependencyAddress {
                network: self.chain_id,
                dependency,
            })
    }

    /// Environment variable holding the RPC endpoint, e.g. `SEPOLIA_RPC_URL`.
    pub fn rpc_url_env(&self) -> String {
        format!("{}_RPC_URL", self.name.to_uppercase())
    }

    /// Environment variable holding the signing key, e.g. `SEPOLIA_PRIVATE_KEY`.
    pub fn private_key_env(&self) -> String {
        format!("{}_PRIVATE_KEY", self.name.to_uppercase())
    }

    /// Configuration defects of this network with respect to `specs`.
    pub fn gaps(&self, specs: &[UnitSpec]) -> Vec<ConfigGap> {
        let mut gaps = Vec::new();
        if self.kind != NetworkKind::Public {
            return gaps;
        }

        if self.block_confirmations == 0 {
            gaps.push(ConfigGap::ZeroConfirmations {
                network: self.name.clone(),
            });
        }

        let mut reported = BTreeSet::new();
        for spec in specs.iter().filter(|s| s.applies_to(self.kind)) {
            for dependency in spec.dependencies() {
                if !self.addresses.contains_key(&dependency) && reported.insert(dependency) {
                    gaps.push(ConfigGap::MissingAddress {
                        network: self.name.clone(),
                        unit: spec.name.clone(),
                        dependency,
                    });
                }
            }
        }

        gaps
    }
}

/// A configuration defect found by registry validation.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ConfigGap {
    #[display("public network {network} waits for zero confirmations")]
    ZeroConfirmations { network: String },
    #[display("network {network} has no address for '{dependency}' required by {unit}")]
    MissingAddress {
        network: String,
        unit: String,
        dependency: Dependency,
    },
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    networks: Vec<NetworkConfig>,
}

/// Lookup structure from chain id to [`NetworkConfig`], built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRegistry {
    networks: BTreeMap<u64, NetworkConfig>,
}

impl NetworkRegistry {
    /// Build a registry, rejecting duplicate chain ids or names.
    pub fn from_networks(networks: Vec<NetworkConfig>) -> anyhow::Result<Self> {
        let mut by_id = BTreeMap::new();
        let mut names = BTreeSet::new();

        for network in networks {
            if !names.insert(network.name.clone()) {
                anyhow::bail!("Duplicate network name in registry: {}", network.name);
            }
            if by_id.insert(network.chain_id, network).is_some() {
                anyhow::bail!("Duplicate chain id in registry");
            }
        }

        Ok(Self { networks: by_id })
    }

    /// Parse a registry from its TOML representation.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let file: RegistryFile =
            toml::from_str(content).context("Failed to parse network registry as TOML")?;
        Self::from_networks(file.networks)
    }

    /// Load a registry from a TOML file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read network registry from {}", path.display()))?;
        let registry = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), networks = registry.len(), "Network registry loaded");
        Ok(registry)
    }

    /// The registry shipped with the crate.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml(BUILTIN_NETWORKS).context("Built-in network registry is malformed")
    }

    pub fn lookup(&self, chain_id: u64) -> ProvisionResult<&NetworkConfig> {
        self.networks
            .get(&chain_id)
            .ok_or_else(|| ProvisionError::UnknownNetwork {
                network: chain_id.to_string(),
            })
    }

    /// Find a network by chain id or by name.
    pub fn find(&self, network: &str) -> ProvisionResult<&NetworkConfig> {
        if let Ok(chain_id) = network.parse::<u64>() {
            return self.lookup(chain_id);
        }

        self.networks
            .values()
            .find(|n| n.name.eq_ignore_ascii_case(network))
            .ok_or_else(|| ProvisionError::UnknownNetwork {
                network: network.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.values()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Every configuration defect across all registered networks.
    pub fn validate(&self, specs: &[UnitSpec]) -> Vec<ConfigGap> {
        self.iter().flat_map(|network| network.gaps(specs)).collect()
    }

    /// Fail with [`ProvisionError::InvalidRegistry`] if `network` cannot serve `specs`.
    pub fn check_network(&self, chain_id: u64, specs: &[UnitSpec]) -> ProvisionResult<()> {
        let gaps = self.lookup(chain_id)?.gaps(specs);
        if gaps.is_empty() {
            Ok(())
        } else {
            Err(ProvisionError::InvalidRegistry { gaps })
        }
    }
}
