//! In-process backend with deterministic addresses, for dry runs and tests.

use std::collections::{BTreeMap, BTreeSet};

use alloy_core::primitives::{Address, address};

use super::{BackendError, DeployedInstance, DeploymentBackend, InterfaceDescriptor};
use crate::unit::ConstructorArg;

/// First account of the default development mnemonic.
pub const DEFAULT_DEPLOYER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// A call observed by the [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Deploy {
        unit: String,
        args: Vec<ConstructorArg>,
        confirmations: u64,
    },
    Verify {
        unit: String,
        address: Address,
        args: Vec<ConstructorArg>,
    },
}

/// Backend that "deploys" by assigning CREATE addresses from a deployer account and nonce.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    deployer: Address,
    nonce: u64,
    instances: BTreeMap<String, DeployedInstance>,
    descriptors: BTreeMap<String, InterfaceDescriptor>,
    failing_deploys: BTreeSet<String>,
    verify_failure: Option<String>,
    calls: Vec<BackendCall>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_DEPLOYER)
    }
}

impl InMemoryBackend {
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            nonce: 0,
            instances: BTreeMap::new(),
            descriptors: BTreeMap::new(),
            failing_deploys: BTreeSet::new(),
            verify_failure: None,
            calls: Vec::new(),
        }
    }

    /// Register an instance as already deployed.
    pub fn with_instance(mut self, unit: impl Into<String>, address: Address) -> Self {
        let unit = unit.into();
        let descriptor = self.descriptors.get(&unit).cloned().unwrap_or_default();
        self.instances
            .insert(unit, DeployedInstance { address, descriptor });
        self
    }

    /// Interface descriptor returned for every deployment of `unit`.
    pub fn with_descriptor(mut self, unit: impl Into<String>, descriptor: serde_json::Value) -> Self {
        self.descriptors.insert(unit.into(), descriptor.into());
        self
    }

    /// Make every deployment of `unit` fail.
    pub fn fail_deploy(mut self, unit: impl Into<String>) -> Self {
        self.failing_deploys.insert(unit.into());
        self
    }

    /// Make every verification fail with `reason`.
    pub fn fail_verification(mut self, reason: impl Into<String>) -> Self {
        self.verify_failure = Some(reason.into());
        self
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn deploy_calls(&self) -> impl Iterator<Item = &BackendCall> {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Deploy { .. }))
    }

    pub fn verify_calls(&self) -> impl Iterator<Item = &BackendCall> {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Verify { .. }))
    }
}

impl DeploymentBackend for InMemoryBackend {
    async fn deploy(
        &mut self,
        unit: &str,
        args: &[ConstructorArg],
        confirmations: u64,
    ) -> Result<DeployedInstance, BackendError> {
        self.calls.push(BackendCall::Deploy {
            unit: unit.to_string(),
            args: args.to_vec(),
            confirmations,
        });

        if self.failing_deploys.contains(unit) {
            return Err(BackendError::Rejected(format!(
                "transaction deploying {unit} reverted"
            )));
        }

        let address = self.deployer.create(self.nonce);
        self.nonce += 1;

        let instance = DeployedInstance {
            address,
            descriptor: self.descriptors.get(unit).cloned().unwrap_or_default(),
        };
        self.instances.insert(unit.to_string(), instance.clone());

        tracing::debug!(unit, %address, confirmations, "In-memory deployment recorded");
        Ok(instance)
    }

    async fn verify(
        &mut self,
        unit: &str,
        address: Address,
        args: &[ConstructorArg],
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::Verify {
            unit: unit.to_string(),
            address,
            args: args.to_vec(),
        });

        match &self.verify_failure {
            Some(reason) => Err(BackendError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    async fn deployed_instance(&self, unit: &str) -> Result<DeployedInstance, BackendError> {
        self.instances
            .get(unit)
            .cloned()
            .ok_or_else(|| BackendError::UnitNotFound(unit.to_string()))
    }
}
