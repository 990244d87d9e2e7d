//! Best-effort public source verification.

use derive_more::Display;

use crate::{
    backend::DeploymentBackend,
    deployer::ResolvedDeployment,
    network::{NetworkConfig, NetworkKind},
    unit::ConstructorArg,
};

/// Result of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum VerificationOutcome {
    #[display("skipped")]
    Skipped,
    #[display("verified")]
    Verified,
    #[display("failed: {_0}")]
    Failed(String),
}

impl VerificationOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Decides whether a deployment gets submitted for verification, and submits it.
#[derive(Debug, Clone, Default)]
pub struct VerificationGate {
    credential: Option<String>,
}

impl VerificationGate {
    /// An empty credential counts as absent.
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential: credential.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Verification runs only on public networks with a credential present.
    pub fn should_verify(&self, network: &NetworkConfig) -> bool {
        network.kind == NetworkKind::Public && self.has_credential()
    }

    /// Verify `deployment` when the gate allows it. Never fails the run.
    pub async fn maybe_verify<B: DeploymentBackend>(
        &self,
        backend: &mut B,
        deployment: &ResolvedDeployment,
        network: &NetworkConfig,
        args: &[ConstructorArg],
    ) -> VerificationOutcome {
        if !self.should_verify(network) {
            tracing::debug!(
                unit = %deployment.unit,
                network = network.chain_id,
                "Verification skipped"
            );
            return VerificationOutcome::Skipped;
        }

        tracing::info!(
            unit = %deployment.unit,
            address = %deployment.address,
            network = network.chain_id,
            "Verifying..."
        );

        match backend
            .verify(&deployment.unit, deployment.address, args)
            .await
        {
            Ok(()) => {
                tracing::info!(unit = %deployment.unit, "Verified");
                VerificationOutcome::Verified
            }
            Err(e) => {
                tracing::warn!(
                    unit = %deployment.unit,
                    address = %deployment.address,
                    error = %e,
                    "Verification failed, continuing"
                );
                VerificationOutcome::Failed(e.to_string())
            }
        }
    }
}
