//! Front-end artifact synchronization.
//!
//! Deployment facts are merged into JSON files consumed by the front-end:
//!
//! - `contractAddresses.json`: `{ "<chain id>": ["0x..", ..] }`
//! - `abi.json`: interface descriptor of the primary unit
//! - `abis.json`: `{ "<unit>": <descriptor> }`
//! - `externalContractsAddresses.json`: `{ "<chain id>": { "linkToken": "0x..", .. } }`
//!
//! Each file is read, merged in memory and rewritten as a whole. There is no locking: one
//! writer per set of files is assumed.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    deployer::ResolvedDeployment,
    dependency::Dependency,
    error::{ProvisionError, ProvisionResult},
    fs::FsHandler,
    network::NetworkConfig,
    unit::ACCOUNTABLE_FACTORY,
};

pub const CONTRACTS_FILENAME: &str = "contractAddresses.json";
pub const ABI_FILENAME: &str = "abi.json";
pub const ABIS_FILENAME: &str = "abis.json";
pub const EXTERNAL_FILENAME: &str = "externalContractsAddresses.json";

/// Addresses per network id.
pub type AddressBook = BTreeMap<String, Vec<String>>;

/// External-dependency addresses per network id.
pub type ExternalBook = BTreeMap<String, BTreeMap<String, Value>>;

/// Locations of the synchronized files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub contracts: PathBuf,
    pub abi: PathBuf,
    /// Descriptor store keyed by unit name; not written when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abis: Option<PathBuf>,
    pub external: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            contracts: dir.join(CONTRACTS_FILENAME),
            abi: dir.join(ABI_FILENAME),
            abis: Some(dir.join(ABIS_FILENAME)),
            external: dir.join(EXTERNAL_FILENAME),
        }
    }
}

/// Merges deployment facts into the front-end files.
#[derive(Debug, Clone)]
pub struct ArtifactSynchronizer {
    enabled: bool,
    paths: ArtifactPaths,
    primary_unit: String,
}

impl ArtifactSynchronizer {
    pub fn new(enabled: bool, paths: ArtifactPaths) -> Self {
        Self {
            enabled,
            paths,
            primary_unit: ACCOUNTABLE_FACTORY.to_string(),
        }
    }

    /// Synchronizer that never touches the file system.
    pub fn disabled() -> Self {
        Self::new(false, ArtifactPaths::in_dir("."))
    }

    /// Unit whose descriptor is written to the `abi` file.
    pub fn primary_unit(mut self, unit: impl Into<String>) -> Self {
        self.primary_unit = unit.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Merge `deployments` made on `network` into the artifact files.
    ///
    /// A no-op without any file access when synchronization is disabled.
    pub fn sync(
        &self,
        deployments: &[ResolvedDeployment],
        network: &NetworkConfig,
    ) -> ProvisionResult<()> {
        if !self.enabled {
            tracing::debug!("Front-end synchronization disabled");
            return Ok(());
        }

        tracing::info!(
            network = network.chain_id,
            deployments = deployments.len(),
            "Writing to front end..."
        );

        let mut contracts: AddressBook = read_json(&self.paths.contracts)?;
        merge_addresses(
            &mut contracts,
            network.chain_id,
            deployments.iter().map(|d| d.address),
        );
        write_json(&self.paths.contracts, &contracts)?;

        if let Some(primary) = deployments.iter().find(|d| d.unit == self.primary_unit) {
            write_json(&self.paths.abi, &primary.descriptor)?;
        }

        if let Some(abis_path) = &self.paths.abis {
            let mut abis: BTreeMap<String, Value> = read_json(abis_path)?;
            for deployment in deployments {
                abis.insert(
                    deployment.unit.clone(),
                    deployment.descriptor.clone().into_inner(),
                );
            }
            write_json(abis_path, &abis)?;
        }

        let mut external: ExternalBook = read_json(&self.paths.external)?;
        merge_external(&mut external, network);
        write_json(&self.paths.external, &external)?;

        tracing::info!(
            contracts = %self.paths.contracts.display(),
            external = %self.paths.external.display(),
            "Front end written"
        );

        Ok(())
    }
}

/// Append each address to the network's set unless already present.
pub fn merge_addresses(
    book: &mut AddressBook,
    chain_id: u64,
    addresses: impl IntoIterator<Item = Address>,
) {
    let key = chain_id.to_string();
    for address in addresses {
        let known = book
            .get(&key)
            .is_some_and(|set| set.iter().any(|existing| same_address(existing, address)));
        if !known {
            book.entry(key.clone()).or_default().push(address.to_string());
        }
    }
}

/// Record the network's external-dependency addresses.
///
/// A new network gets a table populated from its config; an existing one only gains the keys
/// it lacks, existing values are kept.
pub fn merge_external(book: &mut ExternalBook, network: &NetworkConfig) {
    let entry = book.entry(network.chain_id.to_string()).or_default();
    for dependency in Dependency::EXTERNAL {
        let Some(address) = network.addresses.get(&dependency) else {
            continue;
        };
        entry
            .entry(dependency.to_string())
            .or_insert_with(|| Value::String(address.to_string()));
    }
}

fn same_address(existing: &str, address: Address) -> bool {
    match existing.parse::<Address>() {
        Ok(parsed) => parsed == address,
        Err(_) => existing.eq_ignore_ascii_case(&address.to_string()),
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> ProvisionResult<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(ProvisionError::ArtifactIo {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&content).map_err(|source| ProvisionError::ArtifactFormat {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> ProvisionResult<()> {
    let content = serde_json::to_vec(value).map_err(|source| ProvisionError::ArtifactFormat {
        path: path.to_path_buf(),
        source,
    })?;

    FsHandler::write_atomic(path, &content).map_err(|e| ProvisionError::ArtifactIo {
        path: path.to_path_buf(),
        source: std::io::Error::other(format!("{e:#}")),
    })?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "Artifact file written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;
    use serde_json::json;
    use tempdir::TempDir;

    use super::*;
    use crate::{backend::InterfaceDescriptor, network::NetworkRegistry};

    const FACTORY: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const AUTOMATION: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");

    fn deployments() -> Vec<ResolvedDeployment> {
        vec![
            ResolvedDeployment {
                unit: ACCOUNTABLE_FACTORY.to_string(),
                address: FACTORY,
                descriptor: InterfaceDescriptor::from(json!([{ "type": "constructor" }])),
                args: vec![],
            },
            ResolvedDeployment {
                unit: "AccountableTaskAutomation".to_string(),
                address: AUTOMATION,
                descriptor: InterfaceDescriptor::default(),
                args: vec![],
            },
        ]
    }

    fn read(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_merge_addresses_dedupes_case_insensitively() {
        let mut book = AddressBook::new();
        book.insert(
            "31337".to_string(),
            vec!["0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string()],
        );

        merge_addresses(&mut book, 31337, [FACTORY, AUTOMATION]);
        merge_addresses(&mut book, 31337, [AUTOMATION]);

        assert_eq!(book["31337"].len(), 2);
        assert_eq!(book["31337"][1], AUTOMATION.to_string());
    }

    #[test]
    fn test_merge_addresses_new_network() {
        let mut book = AddressBook::new();
        merge_addresses(&mut book, 11155111, [FACTORY]);
        assert_eq!(book["11155111"], vec![FACTORY.to_string()]);
    }

    #[test]
    fn test_merge_addresses_nothing_published() {
        let mut book = AddressBook::new();
        merge_addresses(&mut book, 31337, []);
        assert!(book.is_empty());
    }

    #[test]
    fn test_merge_external_populates_from_config() {
        let registry = NetworkRegistry::builtin().unwrap();
        let sepolia = registry.lookup(11155111).unwrap();
        let mut book = ExternalBook::new();

        merge_external(&mut book, sepolia);

        let entry = &book["11155111"];
        assert_eq!(entry.len(), Dependency::EXTERNAL.len());
        assert_eq!(
            entry["linkToken"],
            json!(sepolia.addresses[&Dependency::LinkToken].to_string())
        );
    }

    #[test]
    fn test_merge_external_keeps_existing_values() {
        let registry = NetworkRegistry::builtin().unwrap();
        let sepolia = registry.lookup(11155111).unwrap();
        let mut book = ExternalBook::new();
        book.entry("11155111".to_string())
            .or_default()
            .insert("linkToken".to_string(), json!("0x01"));

        merge_external(&mut book, sepolia);

        assert_eq!(book["11155111"]["linkToken"], json!("0x01"));
        assert_eq!(book["11155111"].len(), Dependency::EXTERNAL.len());
    }

    #[test]
    fn test_disabled_sync_touches_nothing() {
        let dir = TempDir::new("accountable-sync").unwrap();
        let paths = ArtifactPaths::in_dir(dir.path().join("constants"));
        let registry = NetworkRegistry::builtin().unwrap();

        ArtifactSynchronizer::new(false, paths.clone())
            .sync(&deployments(), registry.lookup(31337).unwrap())
            .unwrap();

        assert!(!dir.path().join("constants").exists());
    }

    #[test]
    fn test_sync_writes_all_files() {
        let dir = TempDir::new("accountable-sync").unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let registry = NetworkRegistry::builtin().unwrap();

        ArtifactSynchronizer::new(true, paths.clone())
            .sync(&deployments(), registry.lookup(31337).unwrap())
            .unwrap();

        assert_eq!(
            read(&paths.contracts),
            json!({ "31337": [FACTORY.to_string(), AUTOMATION.to_string()] })
        );
        assert_eq!(read(&paths.abi), json!([{ "type": "constructor" }]));
        assert_eq!(
            read(paths.abis.as_ref().unwrap())["AccountableTaskAutomation"],
            json!([])
        );
        assert_eq!(
            read(&paths.external)["31337"]
                .as_object()
                .unwrap()
                .len(),
            Dependency::EXTERNAL.len()
        );
    }

    #[test]
    fn test_sync_is_idempotent() {
        let dir = TempDir::new("accountable-sync").unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let registry = NetworkRegistry::builtin().unwrap();
        let synchronizer = ArtifactSynchronizer::new(true, paths.clone());
        let localhost = registry.lookup(31337).unwrap();

        synchronizer.sync(&deployments(), localhost).unwrap();
        let first = std::fs::read(&paths.contracts).unwrap();
        synchronizer.sync(&deployments(), localhost).unwrap();

        assert_eq!(std::fs::read(&paths.contracts).unwrap(), first);
        assert_eq!(read(&paths.contracts)["31337"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_sync_keeps_other_networks() {
        let dir = TempDir::new("accountable-sync").unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        std::fs::write(&paths.contracts, r#"{"80001":["0x0000000000000000000000000000000000000001"]}"#)
            .unwrap();
        let registry = NetworkRegistry::builtin().unwrap();

        ArtifactSynchronizer::new(true, paths.clone())
            .sync(&deployments()[..1], registry.lookup(1337).unwrap())
            .unwrap();

        let contracts = read(&paths.contracts);
        assert_eq!(
            contracts["80001"],
            json!(["0x0000000000000000000000000000000000000001"])
        );
        assert_eq!(contracts["1337"], json!([FACTORY.to_string()]));
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = TempDir::new("accountable-sync").unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        std::fs::write(&paths.contracts, "not json").unwrap();
        let registry = NetworkRegistry::builtin().unwrap();

        let err = ArtifactSynchronizer::new(true, paths)
            .sync(&deployments(), registry.lookup(31337).unwrap())
            .unwrap_err();

        assert!(matches!(err, ProvisionError::ArtifactFormat { .. }));
    }
}
