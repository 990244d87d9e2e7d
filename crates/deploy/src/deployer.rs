use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    ArtifactSynchronizer, DependencyResolver, NetworkRegistry, VerificationGate,
    VerificationOutcome,
    backend::{DeploymentBackend, InterfaceDescriptor},
    error::{ProvisionError, ProvisionResult},
    unit::{ConstructorArg, UnitSpec},
};

/// A unit deployed during this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDeployment {
    pub unit: String,
    pub address: Address,
    pub descriptor: InterfaceDescriptor,
    /// Constructor arguments the unit was deployed with.
    pub args: Vec<ConstructorArg>,
}

/// One deployed unit and what happened after deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployedUnit {
    pub deployment: ResolvedDeployment,
    pub verification: VerificationOutcome,
    /// Whether the deployment is propagated to the front-end artifacts.
    pub published: bool,
}

/// Outcome of a run against one network.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentReport {
    pub chain_id: u64,
    pub network: String,
    /// Deployed units, in deployment order.
    pub units: Vec<DeployedUnit>,
    /// Units that do not apply to the network kind.
    pub skipped: Vec<String>,
}

impl DeploymentReport {
    pub fn deployments(&self) -> impl Iterator<Item = &ResolvedDeployment> {
        self.units.iter().map(|u| &u.deployment)
    }

    pub fn published(&self) -> Vec<ResolvedDeployment> {
        self.units
            .iter()
            .filter(|u| u.published)
            .map(|u| u.deployment.clone())
            .collect()
    }
}

/// Orchestrates deployment of unit specs on one network at a time.
///
/// Units are processed strictly in the given order; the first failure aborts the run and
/// nothing already deployed is rolled back.
pub struct Deployer<B> {
    registry: NetworkRegistry,
    backend: B,
    verification: VerificationGate,
    artifacts: ArtifactSynchronizer,
}

impl<B: DeploymentBackend> Deployer<B> {
    pub fn new(
        registry: NetworkRegistry,
        backend: B,
        verification: VerificationGate,
        artifacts: ArtifactSynchronizer,
    ) -> Self {
        Self {
            registry,
            backend,
            verification,
            artifacts,
        }
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Deploy `specs` on `chain_id`, then synchronize the front-end artifacts.
    pub async fn run(
        &mut self,
        specs: &[UnitSpec],
        chain_id: u64,
    ) -> ProvisionResult<DeploymentReport> {
        let report = self.deploy_all(specs, chain_id).await?;

        let network = self.registry.lookup(chain_id)?;
        self.artifacts.sync(&report.published(), network)?;

        Ok(report)
    }

    /// Deploy every spec applying to the network, in order.
    pub async fn deploy_all(
        &mut self,
        specs: &[UnitSpec],
        chain_id: u64,
    ) -> ProvisionResult<DeploymentReport> {
        let network = self.registry.lookup(chain_id)?;
        self.registry.check_network(chain_id, specs)?;

        tracing::info!(
            network = %network.name,
            chain_id,
            kind = %network.kind,
            confirmations = network.block_confirmations,
            units = specs.len(),
            "Starting deployment process..."
        );

        let mut report = DeploymentReport {
            chain_id,
            network: network.name.clone(),
            units: Vec::with_capacity(specs.len()),
            skipped: Vec::new(),
        };

        for spec in specs {
            if !spec.applies_to(network.kind) {
                tracing::debug!(unit = %spec.name, kind = %network.kind, "Unit skipped on this network");
                report.skipped.push(spec.name.clone());
                continue;
            }

            let addresses = DependencyResolver::new(&self.registry)
                .resolve(chain_id, &spec.dependencies(), &self.backend)
                .await
                .map_err(|e| e.for_unit(&spec.name, chain_id))?;
            let args = spec
                .assemble(&addresses)
                .map_err(|e| e.for_unit(&spec.name, chain_id))?;

            tracing::info!(unit = %spec.name, args = args.len(), "Deploying...");

            let instance = self
                .backend
                .deploy(&spec.name, &args, network.block_confirmations)
                .await
                .map_err(|e| ProvisionError::Deploy(e).for_unit(&spec.name, chain_id))?;

            tracing::info!(
                unit = %spec.name,
                address = %instance.address,
                network = chain_id,
                "Deployed"
            );

            let deployment = ResolvedDeployment {
                unit: spec.name.clone(),
                address: instance.address,
                descriptor: instance.descriptor,
                args,
            };

            let verification = self
                .verification
                .maybe_verify(&mut self.backend, &deployment, network, &deployment.args)
                .await;

            report.units.push(DeployedUnit {
                deployment,
                verification,
                published: spec.publish,
            });
        }

        tracing::info!(
            network = %network.name,
            deployed = report.units.len(),
            skipped = report.skipped.len(),
            "Deployment complete"
        );

        Ok(report)
    }
}
