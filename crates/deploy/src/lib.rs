//! accountable-deploy - Network-parameterized deployment of the Accountable contracts.
//!
//! This crate resolves each unit's external dependencies per network (mock instances on
//! development networks, configured addresses on public ones), deploys the units in order,
//! optionally verifies them, and merges the results into the front-end artifact files.

mod artifacts;
pub use artifacts::{
    ABI_FILENAME, ABIS_FILENAME, AddressBook, ArtifactPaths, ArtifactSynchronizer,
    CONTRACTS_FILENAME, EXTERNAL_FILENAME, ExternalBook, merge_addresses, merge_external,
};

pub mod backend;
pub use backend::{
    BackendError, DeployedInstance, DeploymentBackend, InMemoryBackend, InterfaceDescriptor,
    RpcBackend, RpcBackendConfig,
};

mod builder;
pub use builder::DeployerBuilder;

mod dependency;
pub use dependency::{Dependency, DependencyKind, MOCK_PRICE_FEED_UNIT};

mod deployer;
pub use deployer::{DeployedUnit, Deployer, DeploymentReport, ResolvedDeployment};

mod error;
pub use error::{ProvisionError, ProvisionResult};

mod fs;

mod network;
pub use network::{ConfigGap, NetworkConfig, NetworkKind, NetworkRegistry};

mod resolver;
pub use resolver::DependencyResolver;

mod rpc;

mod settings;
pub use settings::{
    DEFAULT_FRONT_END_DIR, DeploySettings, ENV_PREFIX, SETTINGS_FILENAME, parse_flag,
};

pub mod unit;
pub use unit::{ArgSlot, ConstructorArg, UnitManifest, UnitSpec};

mod verify;
pub use verify::{VerificationGate, VerificationOutcome};
