//! Deployable unit specifications and constructor-argument assembly.

use std::{collections::BTreeSet, path::Path};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    dependency::{Dependency, MOCK_PRICE_FEED_UNIT},
    error::{ProvisionError, ProvisionResult},
    network::NetworkKind,
};

/// Tag carried by every built-in unit.
pub const TAG_ALL: &str = "all";

/// Name of the unit whose interface descriptor is published as the front-end ABI.
pub const ACCOUNTABLE_FACTORY: &str = "AccountableFactory";
pub const ACCOUNTABLE_TASK_AUTOMATION: &str = "AccountableTaskAutomation";

/// Decimals of the mock price feed.
const MOCK_FEED_DECIMALS: u64 = 18;
/// Initial answer of the mock price feed, in whole units (scaled by 1e18).
const MOCK_FEED_INITIAL_PRICE: u64 = 2_000;

/// A literal constructor argument, ABI-encodable as a constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstructorArg {
    Address(Address),
    AddressArray(Vec<Address>),
    Uint(U256),
    Bool(bool),
    String(String),
}

impl ConstructorArg {
    pub fn to_sol_value(&self) -> DynSolValue {
        match self {
            Self::Address(address) => DynSolValue::Address(*address),
            Self::AddressArray(addresses) => {
                DynSolValue::Array(addresses.iter().copied().map(DynSolValue::Address).collect())
            }
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
            Self::Bool(value) => DynSolValue::Bool(*value),
            Self::String(value) => DynSolValue::String(value.clone()),
        }
    }
}

/// ABI-encode a constructor argument vector, ready to append to creation bytecode.
pub fn encode_constructor_args(args: &[ConstructorArg]) -> Vec<u8> {
    DynSolValue::Tuple(args.iter().map(ConstructorArg::to_sol_value).collect()).abi_encode_params()
}

/// One position in a unit's constructor signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArgSlot {
    /// A single resolved address.
    Dependency(Dependency),
    /// An array of resolved addresses, in the listed order.
    Dependencies(Vec<Dependency>),
    /// A unit-specific literal at a fixed position.
    Literal(ConstructorArg),
}

fn default_publish() -> bool {
    true
}

/// Describes one unit to provision.
///
/// `args` is the single source of truth for constructor argument order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgSlot>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Restrict the unit to one network kind (mocks are development-only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_on: Option<NetworkKind>,
    /// Whether the deployed address is published to the artifact files.
    #[serde(default = "default_publish")]
    pub publish: bool,
}

impl UnitSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            tags: vec![TAG_ALL.to_string()],
            only_on: None,
            publish: true,
        }
    }

    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.args.push(ArgSlot::Dependency(dependency));
        self
    }

    pub fn dependency_list(mut self, dependencies: impl IntoIterator<Item = Dependency>) -> Self {
        self.args
            .push(ArgSlot::Dependencies(dependencies.into_iter().collect()));
        self
    }

    /// Append single-address dependencies given by wire name.
    pub fn dependency_names(mut self, names: &[&str]) -> ProvisionResult<Self> {
        for name in names {
            self = self.dependency(Dependency::parse(name)?);
        }
        Ok(self)
    }

    pub fn literal(mut self, arg: ConstructorArg) -> Self {
        self.args.push(ArgSlot::Literal(arg));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn only_on(mut self, kind: NetworkKind) -> Self {
        self.only_on = Some(kind);
        self
    }

    pub fn unpublished(mut self) -> Self {
        self.publish = false;
        self
    }

    pub fn applies_to(&self, kind: NetworkKind) -> bool {
        self.only_on.is_none_or(|only| only == kind)
    }

    /// Every declared dependency, flattened in argument order.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.args
            .iter()
            .flat_map(|slot| match slot {
                ArgSlot::Dependency(dependency) => vec![*dependency],
                ArgSlot::Dependencies(dependencies) => dependencies.clone(),
                ArgSlot::Literal(_) => vec![],
            })
            .collect()
    }

    /// Interleave resolved addresses with literals in declared order.
    ///
    /// `resolved` holds one address per entry of [`UnitSpec::dependencies`], in that order.
    pub fn assemble(&self, resolved: &[Address]) -> ProvisionResult<Vec<ConstructorArg>> {
        let expected = self.dependencies().len();
        if resolved.len() != expected {
            return Err(ProvisionError::ArgumentMismatch {
                unit: self.name.clone(),
                expected,
                resolved: resolved.len(),
            });
        }

        let mut remaining = resolved;
        let mut take = |n: usize| {
            let (head, tail) = remaining.split_at(n);
            remaining = tail;
            head.to_vec()
        };

        Ok(self
            .args
            .iter()
            .map(|slot| match slot {
                ArgSlot::Dependency(_) => ConstructorArg::Address(take(1)[0]),
                ArgSlot::Dependencies(list) => ConstructorArg::AddressArray(take(list.len())),
                ArgSlot::Literal(arg) => arg.clone(),
            })
            .collect())
    }
}

/// Keep units carrying any of `tags`, preserving order. No tags keeps everything.
pub fn select(units: &[UnitSpec], tags: &[String]) -> Vec<UnitSpec> {
    units
        .iter()
        .filter(|unit| tags.is_empty() || unit.tags.iter().any(|t| tags.contains(t)))
        .cloned()
        .collect()
}

/// Mock units deployed first on development networks.
pub fn mock_units() -> Vec<UnitSpec> {
    let initial_price = U256::from(MOCK_FEED_INITIAL_PRICE) * U256::from(10u64).pow(U256::from(18u64));

    let feed = UnitSpec::new(MOCK_PRICE_FEED_UNIT)
        .literal(ConstructorArg::Uint(U256::from(MOCK_FEED_DECIMALS)))
        .literal(ConstructorArg::Uint(initial_price));

    let tokens = [
        Dependency::Weth,
        Dependency::Wbtc,
        Dependency::Usdc,
        Dependency::LinkToken,
    ]
    .into_iter()
    .filter_map(|d| d.mock_unit())
    .map(UnitSpec::new);

    std::iter::once(feed)
        .chain(tokens)
        .map(|unit| {
            unit.tag("mocks")
                .only_on(NetworkKind::Development)
                .unpublished()
        })
        .collect()
}

/// The factory taking collateral tokens, their price feeds and the wrapped native token.
pub fn accountable_factory() -> UnitSpec {
    UnitSpec::new(ACCOUNTABLE_FACTORY)
        .dependency_list([Dependency::Weth, Dependency::Wbtc, Dependency::Usdc])
        .dependency_list([
            Dependency::WethUsdPriceFeed,
            Dependency::WbtcUsdPriceFeed,
            Dependency::UsdcUsdPriceFeed,
        ])
        .dependency(Dependency::Weth)
        .tag("accountableFactory")
}

/// Task automation wired to the keeper infrastructure.
pub fn accountable_task_automation() -> UnitSpec {
    UnitSpec::new(ACCOUNTABLE_TASK_AUTOMATION)
        .dependency(Dependency::CronUpKeepFactory)
        .dependency(Dependency::KeeperRegistry)
        .dependency(Dependency::KeeperRegistrar)
        .dependency(Dependency::LinkToken)
        .tag("accountableTaskAutomation")
}

/// Every built-in unit in deployment order: mocks, factory, task automation.
pub fn builtin_units() -> Vec<UnitSpec> {
    let mut units = mock_units();
    units.push(accountable_factory());
    units.push(accountable_task_automation());
    units
}

/// A list of unit specs loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitManifest {
    pub units: Vec<UnitSpec>,
}

impl UnitManifest {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let manifest: Self =
            toml::from_str(content).context("Failed to parse unit manifest as TOML")?;

        let mut names = BTreeSet::new();
        for unit in &manifest.units {
            if !names.insert(unit.name.as_str()) {
                anyhow::bail!("Duplicate unit name in manifest: {}", unit.name);
            }
        }

        Ok(manifest)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read unit manifest from {}", path.display()))?;
        let manifest = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), units = manifest.units.len(), "Unit manifest loaded");
        Ok(manifest)
    }
}
