//! Hardhat compilation artifacts and per-network deployment records.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::{DeployedInstance, InterfaceDescriptor};
use crate::{fs::FsHandler, unit::ConstructorArg};

/// A compiled contract as emitted by Hardhat (`artifacts/contracts/<Source>.sol/<Name>.json`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: serde_json::Value,
    pub bytecode: String,
    #[serde(skip)]
    pub path: PathBuf,
}

impl ContractArtifact {
    /// Creation bytecode, without constructor arguments.
    pub fn creation_code(&self) -> anyhow::Result<Vec<u8>> {
        let code = hex::decode(self.bytecode.trim_start_matches("0x"))
            .context(format!("Invalid bytecode in {}", self.path.display()))?;
        if code.is_empty() {
            anyhow::bail!(
                "Artifact {} has no bytecode (abstract contract or interface?)",
                self.path.display()
            );
        }
        Ok(code)
    }

    /// Fully qualified name, `contracts/Foo.sol:Foo`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: PathBuf,
}

/// Compiler input and version recorded by Hardhat for a compilation job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    /// Standard JSON input passed to solc.
    pub input: serde_json::Value,
}

/// Read-only view over a Hardhat `artifacts/` directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate and parse the artifact of `unit`.
    pub fn load(&self, unit: &str) -> anyhow::Result<ContractArtifact> {
        let file_name = format!("{unit}.json");
        let path = find_file(&self.root, &file_name)?.context(format!(
            "No artifact named {} under {}",
            file_name,
            self.root.display()
        ))?;

        let content = std::fs::read_to_string(&path)
            .context(format!("Failed to read artifact {}", path.display()))?;
        let mut artifact: ContractArtifact = serde_json::from_str(&content)
            .context(format!("Failed to parse artifact {}", path.display()))?;
        artifact.path = path;
        Ok(artifact)
    }

    /// Build info referenced by the artifact's sibling `.dbg.json` file.
    pub fn build_info(&self, artifact: &ContractArtifact) -> anyhow::Result<BuildInfo> {
        let dir = artifact
            .path
            .parent()
            .context("Artifact path must have a parent directory")?;
        let dbg_path = dir.join(format!("{}.dbg.json", artifact.contract_name));

        let dbg: DebugFile = serde_json::from_str(
            &std::fs::read_to_string(&dbg_path)
                .context(format!("Failed to read {}", dbg_path.display()))?,
        )
        .context(format!("Failed to parse {}", dbg_path.display()))?;

        let build_info_path = dir.join(dbg.build_info);
        let content = std::fs::read_to_string(&build_info_path)
            .context(format!("Failed to read build info {}", build_info_path.display()))?;
        serde_json::from_str(&content)
            .context(format!("Failed to parse build info {}", build_info_path.display()))
    }
}

/// Depth-first search for a file name, in sorted directory order.
fn find_file(dir: &Path, file_name: &str) -> anyhow::Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut entries = std::fs::read_dir(dir)
        .context(format!("Failed to list {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .context(format!("Failed to list {}", dir.display()))?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if let Some(found) = find_file(&path, file_name)? {
                return Ok(Some(found));
            }
        } else if path.file_name().is_some_and(|name| name == file_name) {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Persisted record of one deployment, `deployments/<network>/<Unit>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub address: alloy_core::primitives::Address,
    pub abi: InterfaceDescriptor,
    pub transaction_hash: String,
    pub args: Vec<ConstructorArg>,
}

/// Deployment records of one network, so instances survive across runs.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    dir: PathBuf,
}

impl DeploymentStore {
    pub fn new(root: impl AsRef<Path>, network_name: &str) -> Self {
        Self {
            dir: root.as_ref().join(network_name),
        }
    }

    fn record_path(&self, unit: &str) -> PathBuf {
        self.dir.join(format!("{unit}.json"))
    }

    pub fn save(
        &self,
        unit: &str,
        instance: &DeployedInstance,
        transaction_hash: &str,
        args: &[ConstructorArg],
    ) -> anyhow::Result<()> {
        let record = DeploymentRecord {
            address: instance.address,
            abi: instance.descriptor.clone(),
            transaction_hash: transaction_hash.to_string(),
            args: args.to_vec(),
        };
        let json =
            serde_json::to_string_pretty(&record).context("Failed to serialize deployment record")?;

        let path = self.record_path(unit);
        FsHandler::write_atomic(&path, json.as_bytes())?;
        tracing::debug!(unit, path = %path.display(), "Deployment record saved");
        Ok(())
    }

    pub fn load(&self, unit: &str) -> anyhow::Result<Option<DeployedInstance>> {
        let path = self.record_path(unit);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .context(format!("Failed to read deployment record {}", path.display()))?;
        let record: DeploymentRecord = serde_json::from_str(&content)
            .context(format!("Failed to parse deployment record {}", path.display()))?;

        Ok(Some(DeployedInstance {
            address: record.address,
            descriptor: record.abi,
        }))
    }
}
