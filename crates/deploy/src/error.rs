//! Error types for the provisioning pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::{backend::BackendError, dependency::Dependency, network::ConfigGap};

/// Result type alias for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Errors surfaced by the provisioning pipeline.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The requested network is not registered.
    #[error("unknown network '{network}'")]
    UnknownNetwork { network: String },

    /// A dependency name outside the closed [`Dependency`] set.
    #[error("unknown dependency '{0}'")]
    UnknownDependency(String),

    /// A network table has no address for a requested dependency.
    #[error("network {network} has no address for dependency '{dependency}'")]
    MissingDependencyAddress { network: u64, dependency: Dependency },

    /// A unit looked up through the deployment backend has not been deployed.
    #[error("unit '{unit}' has not been deployed on network {network}")]
    UnitNotFound { unit: String, network: u64 },

    /// A unit was given a different number of addresses than it declares dependencies.
    #[error("unit '{unit}' declares {expected} dependencies but {resolved} addresses were given")]
    ArgumentMismatch {
        unit: String,
        expected: usize,
        resolved: usize,
    },

    /// The registry failed validation against the unit specs.
    #[error("invalid network registry: {}", format_gaps(.gaps))]
    InvalidRegistry { gaps: Vec<ConfigGap> },

    /// The deployment backend rejected or failed a deployment.
    #[error("deployment failed: {0}")]
    Deploy(#[source] BackendError),

    /// Any other backend failure (instance lookup transport errors).
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Reading or writing an artifact file failed.
    #[error("artifact file {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact file holds JSON of the wrong shape.
    #[error("malformed artifact file {path}: {source}")]
    ArtifactFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A failure while provisioning a specific unit.
    #[error("unit '{unit}' on network {network}: {source}")]
    Unit {
        unit: String,
        network: u64,
        #[source]
        source: Box<ProvisionError>,
    },
}

impl ProvisionError {
    /// Attach the failing unit name and network to this error.
    pub fn for_unit(self, unit: &str, network: u64) -> Self {
        match self {
            already @ Self::Unit { .. } => already,
            other => Self::Unit {
                unit: unit.to_string(),
                network,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping unit wrappers.
    pub fn root(&self) -> &ProvisionError {
        match self {
            Self::Unit { source, .. } => source.root(),
            other => other,
        }
    }
}

fn format_gaps(gaps: &[ConfigGap]) -> String {
    gaps.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
