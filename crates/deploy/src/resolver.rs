//! Network-parameterized dependency resolution.

use alloy_core::primitives::Address;

use crate::{
    backend::{BackendError, DeploymentBackend},
    dependency::Dependency,
    error::{ProvisionError, ProvisionResult},
    network::{NetworkConfig, NetworkRegistry},
};

/// Resolves declared dependencies to concrete addresses for a network.
///
/// On public networks this is a pure table lookup. On development networks tokens and price
/// feeds resolve to the mock units already deployed through the backend; dependencies without a
/// mock fall back to the network table.
pub struct DependencyResolver<'a> {
    registry: &'a NetworkRegistry,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(registry: &'a NetworkRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `dependencies` on `chain_id`, preserving order one-to-one.
    pub async fn resolve<B: DeploymentBackend>(
        &self,
        chain_id: u64,
        dependencies: &[Dependency],
        backend: &B,
    ) -> ProvisionResult<Vec<Address>> {
        let network = self.registry.lookup(chain_id)?;

        let mut addresses = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            addresses.push(Self::resolve_one(network, *dependency, backend).await?);
        }

        tracing::debug!(
            network = chain_id,
            kind = %network.kind,
            ?dependencies,
            ?addresses,
            "Dependencies resolved"
        );

        Ok(addresses)
    }

    async fn resolve_one<B: DeploymentBackend>(
        network: &NetworkConfig,
        dependency: Dependency,
        backend: &B,
    ) -> ProvisionResult<Address> {
        let mock = dependency.mock_unit().filter(|_| network.is_development());
        let Some(mock) = mock else {
            return network.address_of(dependency);
        };

        match backend.deployed_instance(mock).await {
            Ok(instance) => Ok(instance.address),
            Err(BackendError::UnitNotFound(unit)) => Err(ProvisionError::UnitNotFound {
                unit,
                network: network.chain_id,
            }),
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;

    use super::*;
    use crate::backend::InMemoryBackend;

    const TOKEN: Address = address!("0x000000000000000000000000000000000000aaaa");
    const FEED: Address = address!("0x000000000000000000000000000000000000bbbb");

    fn mocked_backend() -> InMemoryBackend {
        InMemoryBackend::default()
            .with_instance("MockWethToken", TOKEN)
            .with_instance("MockV3Aggregator", FEED)
    }

    #[tokio::test]
    async fn test_development_resolves_to_mocks() {
        let registry = NetworkRegistry::builtin().unwrap();
        let resolver = DependencyResolver::new(&registry);

        let addresses = resolver
            .resolve(
                31337,
                &[Dependency::Weth, Dependency::WethUsdPriceFeed],
                &mocked_backend(),
            )
            .await
            .unwrap();

        assert_eq!(addresses, vec![TOKEN, FEED]);
    }

    #[tokio::test]
    async fn test_development_price_feeds_share_one_mock() {
        let registry = NetworkRegistry::builtin().unwrap();
        let resolver = DependencyResolver::new(&registry);

        let addresses = resolver
            .resolve(
                1337,
                &[
                    Dependency::EthUsdPriceFeed,
                    Dependency::WbtcUsdPriceFeed,
                    Dependency::UsdcUsdPriceFeed,
                    Dependency::MaticUsdPriceFeed,
                ],
                &mocked_backend(),
            )
            .await
            .unwrap();

        assert!(addresses.iter().all(|a| *a == FEED));
    }

    #[tokio::test]
    async fn test_development_automation_reads_table() {
        let registry = NetworkRegistry::builtin().unwrap();
        let resolver = DependencyResolver::new(&registry);
        let expected = registry
            .lookup(31337)
            .unwrap()
            .address_of(Dependency::KeeperRegistry)
            .unwrap();

        let addresses = resolver
            .resolve(31337, &[Dependency::KeeperRegistry], &InMemoryBackend::default())
            .await
            .unwrap();

        assert_eq!(addresses, vec![expected]);
    }

    #[tokio::test]
    async fn test_development_missing_mock() {
        let registry = NetworkRegistry::builtin().unwrap();
        let resolver = DependencyResolver::new(&registry);

        let err = resolver
            .resolve(31337, &[Dependency::Usdc], &mocked_backend())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::UnitNotFound { unit, network: 31337 } if unit == "MockUsdcToken"
        ));
    }

    #[tokio::test]
    async fn test_public_reads_table_and_ignores_backend() {
        let registry = NetworkRegistry::builtin().unwrap();
        let resolver = DependencyResolver::new(&registry);
        let sepolia = registry.lookup(11155111).unwrap();
        let dependencies = [Dependency::Weth, Dependency::WethUsdPriceFeed, Dependency::Weth];

        let first = resolver
            .resolve(11155111, &dependencies, &mocked_backend())
            .await
            .unwrap();
        let second = resolver
            .resolve(11155111, &dependencies, &InMemoryBackend::default())
            .await
            .unwrap();

        let expected: Vec<_> = dependencies
            .iter()
            .map(|d| sepolia.addresses[d])
            .collect();
        assert_eq!(first, expected);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_public_missing_address() {
        let registry = NetworkRegistry::builtin().unwrap();
        let resolver = DependencyResolver::new(&registry);

        let err = resolver
            .resolve(137, &[Dependency::LinkToken], &InMemoryBackend::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::MissingDependencyAddress {
                network: 137,
                dependency: Dependency::LinkToken
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_network() {
        let registry = NetworkRegistry::builtin().unwrap();
        let resolver = DependencyResolver::new(&registry);

        let result = resolver
            .resolve(5, &[Dependency::Weth], &InMemoryBackend::default())
            .await;
        assert!(matches!(result, Err(ProvisionError::UnknownNetwork { .. })));
    }
}
