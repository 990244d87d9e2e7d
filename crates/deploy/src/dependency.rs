//! The closed set of external dependencies a deployable unit may declare.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// Name of the shared mock price feed deployed on development networks.
pub const MOCK_PRICE_FEED_UNIT: &str = "MockV3Aggregator";

/// An external dependency resolved to an address per network.
///
/// The wire name (serde and [`std::fmt::Display`]) is the camelCase key used in network tables
/// and in the external-dependency artifact file.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Dependency {
    Weth,
    Wbtc,
    Usdc,
    LinkToken,
    EthUsdPriceFeed,
    WethUsdPriceFeed,
    WbtcUsdPriceFeed,
    UsdcUsdPriceFeed,
    MaticUsdPriceFeed,
    KeeperRegistry,
    KeeperRegistrar,
    CronUpKeepFactory,
}

/// Resolution class of a [`Dependency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DependencyKind {
    Token,
    PriceFeed,
    Automation,
}

impl Dependency {
    /// External infrastructure published alongside the deployed addresses.
    pub const EXTERNAL: [Dependency; 4] = [
        Dependency::LinkToken,
        Dependency::KeeperRegistrar,
        Dependency::KeeperRegistry,
        Dependency::CronUpKeepFactory,
    ];

    /// Parse a wire name, failing on anything outside the closed set.
    pub fn parse(name: &str) -> Result<Self, ProvisionError> {
        Self::from_str(name).map_err(|_| ProvisionError::UnknownDependency(name.to_string()))
    }

    pub fn kind(&self) -> DependencyKind {
        match self {
            Self::Weth | Self::Wbtc | Self::Usdc | Self::LinkToken => DependencyKind::Token,
            Self::EthUsdPriceFeed
            | Self::WethUsdPriceFeed
            | Self::WbtcUsdPriceFeed
            | Self::UsdcUsdPriceFeed
            | Self::MaticUsdPriceFeed => DependencyKind::PriceFeed,
            Self::KeeperRegistry | Self::KeeperRegistrar | Self::CronUpKeepFactory => {
                DependencyKind::Automation
            }
        }
    }

    /// The mock unit standing in for this dependency on development networks.
    ///
    /// Every price feed maps to the same [`MOCK_PRICE_FEED_UNIT`], whatever asset it prices.
    /// Automation infrastructure has no mock and is read from the network table instead.
    pub fn mock_unit(&self) -> Option<&'static str> {
        match self {
            Self::Weth => Some("MockWethToken"),
            Self::Wbtc => Some("MockWbtcToken"),
            Self::Usdc => Some("MockUsdcToken"),
            Self::LinkToken => Some("MockLinkToken"),
            _ if self.kind() == DependencyKind::PriceFeed => Some(MOCK_PRICE_FEED_UNIT),
            _ => None,
        }
    }
}
