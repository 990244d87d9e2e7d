//! The deployment collaborator: submits deployments, verifies sources and looks up instances.

mod artifact;
mod etherscan;
mod memory;
mod rpc;

use std::future::Future;

use alloy_core::primitives::Address;
use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::unit::ConstructorArg;

pub use artifact::{ArtifactStore, BuildInfo, ContractArtifact, DeploymentRecord, DeploymentStore};
pub use etherscan::{ETHERSCAN_API_URL, EtherscanClient};
pub use memory::{BackendCall, DEFAULT_DEPLOYER, InMemoryBackend};
pub use rpc::{RpcBackend, RpcBackendConfig, sender_from_private_key};

/// Errors reported by a [`DeploymentBackend`].
#[derive(Error, Debug)]
pub enum BackendError {
    /// No instance of the unit has been deployed.
    #[error("unit '{0}' not found")]
    UnitNotFound(String),
    /// The backend refused or failed the operation.
    #[error("{0}")]
    Rejected(String),
    /// Transport or local I/O failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Opaque description of a deployed unit's callable surface (its ABI fragments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Deref, From)]
#[serde(transparent)]
pub struct InterfaceDescriptor(serde_json::Value);

impl Default for InterfaceDescriptor {
    fn default() -> Self {
        Self(serde_json::Value::Array(Vec::new()))
    }
}

impl InterfaceDescriptor {
    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

/// A unit instance known to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedInstance {
    pub address: Address,
    pub descriptor: InterfaceDescriptor,
}

/// Low-level deployment machinery consumed by the [`Deployer`](crate::Deployer).
///
/// Calls are issued strictly one at a time. Any waiting for confirmations, and any timeout on
/// that wait, belongs to the implementation.
pub trait DeploymentBackend: Send {
    /// Deploy `unit` with `args`, returning once `confirmations` blocks have been observed.
    fn deploy(
        &mut self,
        unit: &str,
        args: &[ConstructorArg],
        confirmations: u64,
    ) -> impl Future<Output = Result<DeployedInstance, BackendError>> + Send;

    /// Submit the source of the unit deployed at `address` for public verification.
    fn verify(
        &mut self,
        unit: &str,
        address: Address,
        args: &[ConstructorArg],
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Look up a previously deployed instance; fails with [`BackendError::UnitNotFound`].
    fn deployed_instance(
        &self,
        unit: &str,
    ) -> impl Future<Output = Result<DeployedInstance, BackendError>> + Send;
}
