//! Layered deployment settings.
//!
//! Sources, lowest precedence first: built-in defaults, the `Accountable.toml` file, the
//! well-known `ETHERSCAN_API_KEY` / `UPDATE_FRONT_END` variables, then `ACCOUNTABLE_*`
//! variables (`ACCOUNTABLE_FRONT_END__CONTRACTS` for nested keys).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    ArtifactPaths, ArtifactSynchronizer, NetworkRegistry, VerificationGate,
    unit::{ACCOUNTABLE_FACTORY, UnitManifest, UnitSpec, builtin_units, select},
};

/// The default name for the settings file.
pub const SETTINGS_FILENAME: &str = "Accountable.toml";

/// Prefix of the environment variables overriding settings.
pub const ENV_PREFIX: &str = "ACCOUNTABLE_";

/// Front-end constants directory, next to this repository.
pub const DEFAULT_FRONT_END_DIR: &str = "../ACCOUNTABLE-UI/constants";

/// Variables honored without the prefix.
const WELL_KNOWN_ENV: [&str; 2] = ["ETHERSCAN_API_KEY", "UPDATE_FRONT_END"];

/// Everything a deployment run is configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Target network, by name or chain id.
    pub network: String,
    /// Only deploy units carrying one of these tags. Empty deploys everything.
    pub tags: Vec<String>,
    /// Network registry file; the built-in registry when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<PathBuf>,
    /// Unit manifest file; the built-in units when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<PathBuf>,
    /// Synchronize the front-end artifacts after deploying.
    #[serde(deserialize_with = "deserialize_flag")]
    pub update_front_end: bool,
    /// Unit whose interface descriptor goes to the front-end `abi` file.
    pub primary_unit: String,
    /// Verification credential. Never written back to disk.
    #[serde(skip_serializing)]
    pub etherscan_api_key: Option<String>,
    /// Hardhat compilation output.
    pub artifacts_dir: PathBuf,
    /// Per-network deployment records.
    pub deployments_dir: PathBuf,
    /// Front-end artifact files.
    pub front_end: ArtifactPaths,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            network: "hardhat".to_string(),
            tags: Vec::new(),
            registry: None,
            units: None,
            update_front_end: false,
            primary_unit: ACCOUNTABLE_FACTORY.to_string(),
            etherscan_api_key: None,
            artifacts_dir: PathBuf::from("artifacts"),
            deployments_dir: PathBuf::from("deployments"),
            front_end: ArtifactPaths::in_dir(DEFAULT_FRONT_END_DIR),
        }
    }
}

impl DeploySettings {
    /// The layered settings sources; `config` replaces the default settings file.
    pub fn figment(config: Option<&Path>) -> Figment {
        let file = config.unwrap_or(Path::new(SETTINGS_FILENAME));

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::raw().only(&WELL_KNOWN_ENV))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Resolve settings from every source.
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let settings: Self = Self::figment(config)
            .extract()
            .context("Failed to resolve deployment settings")?;
        tracing::debug!(?settings, "Settings resolved");
        Ok(settings)
    }

    /// Save the settings to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write settings to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Load the settings from a TOML file, or from `Accountable.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Settings file or directory not found: {}", path.display());
        }

        let settings_path = if path.is_dir() {
            path.join(SETTINGS_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&settings_path)
            .context(format!("Failed to read settings from {}", settings_path.display()))?;
        let settings: Self =
            toml::from_str(&content).context("Failed to parse settings file as TOML")?;
        tracing::info!(path = %settings_path.display(), "Settings loaded");
        Ok(settings)
    }

    pub fn registry(&self) -> Result<NetworkRegistry> {
        match &self.registry {
            Some(path) => NetworkRegistry::load_from_file(path),
            None => NetworkRegistry::builtin(),
        }
    }

    /// The units to deploy, filtered by tags.
    pub fn unit_specs(&self) -> Result<Vec<UnitSpec>> {
        let units = match &self.units {
            Some(path) => UnitManifest::load_from_file(path)?.units,
            None => builtin_units(),
        };
        Ok(select(&units, &self.tags))
    }

    pub fn synchronizer(&self) -> ArtifactSynchronizer {
        ArtifactSynchronizer::new(self.update_front_end, self.front_end.clone())
            .primary_unit(&self.primary_unit)
    }

    pub fn verification_gate(&self) -> VerificationGate {
        VerificationGate::new(self.etherscan_api_key.clone())
    }
}

/// Whether an environment-style flag is set: any non-empty value except `0` and `false`.
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(flag) => flag,
        Flag::Int(n) => n != 0,
        Flag::Text(text) => parse_flag(&text),
    })
}
