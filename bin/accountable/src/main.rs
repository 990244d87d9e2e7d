//! accountable deploys the Accountable contracts on a configured network and keeps the front
//! end in sync with the deployed addresses.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use url::Url;

use accountable_deploy::{
    ArtifactSynchronizer, DeployerBuilder, DeploySettings, DeploymentBackend, DeploymentReport, InMemoryBackend,
    NetworkConfig, RpcBackend, RpcBackendConfig, UnitSpec, backend::sender_from_private_key,
};
use cli::{Cli, Command, DeployArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut settings = DeploySettings::load(cli.config.as_deref())?;

    match cli
        .command
        .unwrap_or_else(|| Command::Deploy(DeployArgs::default()))
    {
        Command::Deploy(args) => {
            args.apply(&mut settings);
            if let Some(path) = &args.save_config {
                settings.save_to_file(path)?;
            }
            deploy(&settings, args.dry_run).await
        }
        Command::Check { tags } => {
            if !tags.is_empty() {
                settings.tags = tags;
            }
            check(&settings)
        }
        Command::Networks => networks(&settings),
    }
}

async fn deploy(settings: &DeploySettings, dry_run: bool) -> Result<()> {
    let report = execute(settings, dry_run).await?;
    print_report(&report);
    Ok(())
}

/// Run the deployment described by `settings`.
///
/// A dry run deploys on an in-memory chain: nothing is verified and the front end is left
/// untouched.
async fn execute(settings: &DeploySettings, dry_run: bool) -> Result<DeploymentReport> {
    let builder = DeployerBuilder::from_settings(settings)?;
    let network = builder.network(&settings.network)?;
    let specs = settings.unit_specs()?;

    tracing::info!(
        network = %network.name,
        chain_id = network.chain_id,
        units = specs.len(),
        dry_run,
        front_end = settings.update_front_end && !dry_run,
        "Loading deployment..."
    );

    if dry_run {
        let builder = builder
            .synchronizer(ArtifactSynchronizer::disabled())
            .without_verification();
        deploy_with(builder, InMemoryBackend::default(), &specs, &network).await
    } else {
        let backend = RpcBackend::connect(rpc_config(settings, &network)?).await?;
        deploy_with(builder, backend, &specs, &network).await
    }
}

async fn deploy_with<B: DeploymentBackend>(
    builder: DeployerBuilder,
    backend: B,
    specs: &[UnitSpec],
    network: &NetworkConfig,
) -> Result<DeploymentReport> {
    let mut deployer = builder.build(backend)?;
    let report = deployer
        .run(specs, network.chain_id)
        .await
        .context(format!("Deployment on {} failed", network.name))?;
    Ok(report)
}

/// Backend configuration from the network's `<NAME>_RPC_URL` and `<NAME>_PRIVATE_KEY`.
fn rpc_config(settings: &DeploySettings, network: &NetworkConfig) -> Result<RpcBackendConfig> {
    let rpc_url = match non_empty_env(&network.rpc_url_env()) {
        Some(url) => Url::parse(&url).context(format!("Invalid {}", network.rpc_url_env()))?,
        None => network.rpc_url.clone().context(format!(
            "No RPC endpoint for {}: set {}",
            network.name,
            network.rpc_url_env()
        ))?,
    };

    let mut config = RpcBackendConfig::new(rpc_url, network.chain_id, &network.name);
    config.artifacts_dir = settings.artifacts_dir.clone();
    config.deployments_dir = settings.deployments_dir.clone();
    config.etherscan_api_key = settings.etherscan_api_key.clone();

    if let Some(private_key) = non_empty_env(&network.private_key_env()) {
        config.from = Some(
            sender_from_private_key(&private_key)
                .context(format!("Invalid {}", network.private_key_env()))?,
        );
    }

    Ok(config)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn check(settings: &DeploySettings) -> Result<()> {
    let registry = settings.registry()?;
    let specs = settings.unit_specs()?;

    let gaps = registry.validate(&specs);
    if gaps.is_empty() {
        tracing::info!(
            networks = registry.len(),
            units = specs.len(),
            "Network registry is complete"
        );
        return Ok(());
    }

    for gap in &gaps {
        println!("{gap}");
    }
    anyhow::bail!("{} configuration gap(s) found", gaps.len())
}

fn networks(settings: &DeploySettings) -> Result<()> {
    let registry = settings.registry()?;

    let mut table = Table::new();
    table.set_header(vec!["Chain id", "Name", "Kind", "Confirmations", "Addresses"]);
    for network in registry.iter() {
        table.add_row(vec![
            network.chain_id.to_string(),
            network.name.clone(),
            network.kind.to_string(),
            network.block_confirmations.to_string(),
            network.addresses.len().to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn print_report(report: &DeploymentReport) {
    let mut table = Table::new();
    table.set_header(vec!["Unit", "Address", "Verification"]);
    for unit in &report.units {
        table.add_row(vec![
            unit.deployment.unit.clone(),
            unit.deployment.address.to_string(),
            unit.verification.to_string(),
        ]);
    }

    println!("Deployed on {} ({})", report.network, report.chain_id);
    println!("{table}");
}
