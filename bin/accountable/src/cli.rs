use std::{convert::Infallible, path::PathBuf};

use accountable_deploy::{ArtifactPaths, DeploySettings, parse_flag};
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "accountable")]
#[command(
    author,
    version,
    about = "Deploy the Accountable contracts and publish their addresses to the front end"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "ACCOUNTABLE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a settings file, `Accountable.toml` by default.
    #[arg(long, global = true, alias = "conf")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy the selected units on a network (default).
    ///
    /// Transactions are sent with `eth_sendTransaction`: the endpoint in `<NAME>_RPC_URL` must
    /// hold the deployer key (a local node, or a signing proxy in front of a public node).
    /// `<NAME>_PRIVATE_KEY` only selects the sender account.
    Deploy(DeployArgs),
    /// Validate every registered network against the selected units.
    Check {
        /// Only check units carrying one of these tags.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// List the registered networks.
    Networks,
}

#[derive(Debug, Clone, Default, Args)]
pub struct DeployArgs {
    /// The target network, by name or chain id.
    #[arg(short, long)]
    pub network: Option<String>,

    /// Only deploy units carrying one of these tags.
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Deploy against an in-memory backend: nothing is sent to a node, verified or written
    /// to the front end.
    #[arg(long)]
    pub dry_run: bool,

    /// The Hardhat artifacts directory.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// The directory holding per-network deployment records.
    #[arg(long)]
    pub deployments: Option<PathBuf>,

    /// The front-end constants directory receiving the artifact files.
    #[arg(long)]
    pub front_end_dir: Option<PathBuf>,

    /// The block explorer API key. Verification is skipped without it.
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Write the deployed addresses and interface to the front end.
    #[arg(
        long,
        env = "UPDATE_FRONT_END",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_update_flag
    )]
    pub update_front_end: Option<bool>,

    /// Save the resolved settings to this file before deploying.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

impl DeployArgs {
    /// Override `settings` with the arguments given on the command line.
    pub fn apply(&self, settings: &mut DeploySettings) {
        if let Some(network) = &self.network {
            settings.network = network.clone();
        }
        if !self.tags.is_empty() {
            settings.tags = self.tags.clone();
        }
        if let Some(artifacts) = &self.artifacts {
            settings.artifacts_dir = artifacts.clone();
        }
        if let Some(deployments) = &self.deployments {
            settings.deployments_dir = deployments.clone();
        }
        if let Some(dir) = &self.front_end_dir {
            settings.front_end = ArtifactPaths::in_dir(dir);
        }
        if let Some(key) = &self.etherscan_api_key {
            settings.etherscan_api_key = Some(key.clone());
        }
        if let Some(update) = self.update_front_end {
            settings.update_front_end = update;
        }
    }
}

fn parse_update_flag(value: &str) -> Result<bool, Infallible> {
    Ok(parse_flag(value))
}
