//! Builder module for creating a [`Deployer`].
//!
//! The [`DeployerBuilder`] gathers the network registry, the verification credential and the
//! artifact synchronizer, either one by one or from [`DeploySettings`], and binds them to a
//! deployment backend.

use anyhow::Result;

use crate::{
    ArtifactSynchronizer, Deployer, DeploySettings, NetworkConfig, NetworkRegistry,
    VerificationGate, backend::DeploymentBackend,
};

/// Builder for creating a [`Deployer`].
///
/// # Example
///
/// ```no_run
/// use accountable_deploy::{DeployerBuilder, InMemoryBackend, unit::builtin_units};
///
/// # async fn example() -> anyhow::Result<()> {
/// let mut deployer = DeployerBuilder::new()
///     .etherscan_api_key("KEY")
///     .build(InMemoryBackend::default())?;
/// let report = deployer.run(&builtin_units(), 31337).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeployerBuilder {
    /// The network registry (optional, built-in if not provided).
    registry: Option<NetworkRegistry>,
    /// Verification gate (no credential if not provided).
    verification: VerificationGate,
    /// The artifact synchronizer (optional, disabled if not provided).
    synchronizer: Option<ArtifactSynchronizer>,
}

impl DeployerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from resolved settings, loading the registry they point to.
    pub fn from_settings(settings: &DeploySettings) -> Result<Self> {
        Ok(Self {
            registry: Some(settings.registry()?),
            verification: settings.verification_gate(),
            synchronizer: Some(settings.synchronizer()),
        })
    }

    pub fn registry(mut self, registry: NetworkRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn etherscan_api_key(mut self, key: impl Into<String>) -> Self {
        self.verification = VerificationGate::new(Some(key.into()));
        self
    }

    /// Drop the verification credential, so every unit reports `skipped`.
    pub fn without_verification(mut self) -> Self {
        self.verification = VerificationGate::default();
        self
    }

    pub fn synchronizer(mut self, synchronizer: ArtifactSynchronizer) -> Self {
        self.synchronizer = Some(synchronizer);
        self
    }

    /// Find `network` (name or chain id) in the registry the deployer will use.
    pub fn network(&self, network: &str) -> Result<NetworkConfig> {
        let builtin;
        let registry = match &self.registry {
            Some(registry) => registry,
            None => {
                builtin = NetworkRegistry::builtin()?;
                &builtin
            }
        };
        Ok(registry.find(network)?.clone())
    }

    /// Build the [`Deployer`] driving `backend`.
    pub fn build<B: DeploymentBackend>(self, backend: B) -> Result<Deployer<B>> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => NetworkRegistry::builtin()?,
        };

        tracing::debug!(
            networks = registry.len(),
            verification = self.verification.has_credential(),
            "Deployer built"
        );

        Ok(Deployer::new(
            registry,
            backend,
            self.verification,
            self.synchronizer
                .unwrap_or_else(ArtifactSynchronizer::disabled),
        ))
    }
}
