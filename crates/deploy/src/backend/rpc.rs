//! JSON-RPC deployment backend.
//!
//! Transactions are sent with `eth_sendTransaction`, so the endpoint must hold the sender's
//! key (a local development node, or a signing proxy in front of a public node).

use std::{path::PathBuf, time::Duration};

use alloy_core::primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use serde::Deserialize;
use url::Url;

use super::{
    ArtifactStore, BackendError, DeployedInstance, DeploymentBackend, DeploymentStore,
    EtherscanClient, InterfaceDescriptor,
};
use crate::{
    rpc::{self, DEFAULT_REQUEST_TIMEOUT, deserialize_u64_from_hex},
    unit::{ConstructorArg, encode_constructor_args},
};

/// Derive the sender address from a hex-encoded private key.
pub fn sender_from_private_key(private_key: &str) -> anyhow::Result<Address> {
    let signer: PrivateKeySigner = private_key
        .trim()
        .parse()
        .context("Invalid private key")?;
    Ok(signer.address())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    status: u64,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    block_number: u64,
    contract_address: Option<Address>,
}

/// Configuration for [`RpcBackend`].
#[derive(Debug, Clone)]
pub struct RpcBackendConfig {
    pub rpc_url: Url,
    pub chain_id: u64,
    /// Network name, used as the deployment records sub-directory.
    pub network_name: String,
    /// Sender; the node's first account when absent.
    pub from: Option<Address>,
    pub artifacts_dir: PathBuf,
    pub deployments_dir: PathBuf,
    pub etherscan_api_key: Option<String>,
    pub etherscan_api_url: Option<String>,
    pub poll_interval: Duration,
    /// Upper bound on receipt and confirmation waits. `None` waits indefinitely.
    pub confirmation_timeout: Option<Duration>,
}

impl RpcBackendConfig {
    pub fn new(rpc_url: Url, chain_id: u64, network_name: impl Into<String>) -> Self {
        Self {
            rpc_url,
            chain_id,
            network_name: network_name.into(),
            from: None,
            artifacts_dir: PathBuf::from("artifacts"),
            deployments_dir: PathBuf::from("deployments"),
            etherscan_api_key: None,
            etherscan_api_url: None,
            poll_interval: Duration::from_secs(2),
            confirmation_timeout: None,
        }
    }
}

/// Backend talking to a node over JSON-RPC, with Hardhat artifacts as the bytecode source.
#[derive(Debug, Clone)]
pub struct RpcBackend {
    client: reqwest::Client,
    rpc_url: Url,
    from: Address,
    artifacts: ArtifactStore,
    deployments: DeploymentStore,
    etherscan: Option<EtherscanClient>,
    poll_interval: Duration,
    confirmation_timeout: Option<Duration>,
}

impl RpcBackend {
    /// Connect to the node, checking that it serves the expected chain.
    pub async fn connect(config: RpcBackendConfig) -> anyhow::Result<Self> {
        let client = rpc::create_client(DEFAULT_REQUEST_TIMEOUT)?;
        let url = config.rpc_url.as_str();

        let chain_id: String = rpc::json_rpc_call(&client, url, "eth_chainId", vec![])
            .await
            .context(format!("Failed to reach RPC endpoint {url}"))?;
        let chain_id = u64::from_str_radix(chain_id.trim_start_matches("0x"), 16)
            .context("Invalid eth_chainId response")?;
        if chain_id != config.chain_id {
            anyhow::bail!(
                "RPC endpoint serves chain {} but network {} expects {}",
                chain_id,
                config.network_name,
                config.chain_id
            );
        }

        let from = match config.from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&client, url, "eth_accounts", vec![]).await?;
                accounts
                    .first()
                    .copied()
                    .context("Node exposes no accounts and no sender was configured")?
            }
        };

        let etherscan = config.etherscan_api_key.map(|key| {
            let etherscan = EtherscanClient::new(client.clone(), key, config.chain_id);
            match config.etherscan_api_url {
                Some(api_url) => etherscan.api_url(api_url),
                None => etherscan,
            }
        });

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id,
            %from,
            "Connected to deployment endpoint"
        );

        Ok(Self {
            client,
            rpc_url: config.rpc_url,
            from,
            artifacts: ArtifactStore::new(config.artifacts_dir),
            deployments: DeploymentStore::new(config.deployments_dir, &config.network_name),
            etherscan,
            poll_interval: config.poll_interval,
            confirmation_timeout: config.confirmation_timeout,
        })
    }

    async fn receipt(&self, tx_hash: &str) -> anyhow::Result<Option<TransactionReceipt>> {
        rpc::json_rpc_call(
            &self.client,
            self.rpc_url.as_str(),
            "eth_getTransactionReceipt",
            vec![serde_json::json!(tx_hash)],
        )
        .await
    }

    async fn block_number(&self) -> anyhow::Result<u64> {
        let number: String =
            rpc::json_rpc_call(&self.client, self.rpc_url.as_str(), "eth_blockNumber", vec![])
                .await?;
        u64::from_str_radix(number.trim_start_matches("0x"), 16)
            .context("Invalid eth_blockNumber response")
    }

    /// Wait until `confirmations` blocks, counting the inclusion block, are on the chain.
    async fn wait_for_confirmations(
        &self,
        included_at: u64,
        confirmations: u64,
    ) -> anyhow::Result<()> {
        if confirmations <= 1 {
            return Ok(());
        }

        let target = included_at + confirmations - 1;
        tracing::info!(included_at, target, confirmations, "Waiting for confirmations...");

        rpc::poll_until(
            "block confirmations",
            self.poll_interval,
            self.confirmation_timeout,
            move || async move { Ok((self.block_number().await? >= target).then_some(())) },
        )
        .await
    }
}

impl DeploymentBackend for RpcBackend {
    async fn deploy(
        &mut self,
        unit: &str,
        args: &[ConstructorArg],
        confirmations: u64,
    ) -> Result<DeployedInstance, BackendError> {
        let artifact = self.artifacts.load(unit)?;
        let mut data = artifact.creation_code()?;
        data.extend(encode_constructor_args(args));

        let tx_hash: String = rpc::json_rpc_call(
            &self.client,
            self.rpc_url.as_str(),
            "eth_sendTransaction",
            vec![serde_json::json!({
                "from": self.from,
                "data": format!("0x{}", hex::encode(&data)),
            })],
        )
        .await
        .map_err(|e| BackendError::Rejected(format!("{e:#}")))?;

        tracing::info!(unit, tx_hash = %tx_hash, "Deployment transaction sent");

        let this = &*self;
        let hash = tx_hash.as_str();
        let receipt = rpc::poll_until(
            "transaction receipt",
            self.poll_interval,
            self.confirmation_timeout,
            move || this.receipt(hash),
        )
        .await?;

        if receipt.status != 1 {
            return Err(BackendError::Rejected(format!(
                "transaction {tx_hash} deploying {unit} reverted"
            )));
        }

        let address = receipt.contract_address.ok_or_else(|| {
            BackendError::Rejected(format!("receipt of {tx_hash} has no contract address"))
        })?;

        self.wait_for_confirmations(receipt.block_number, confirmations)
            .await?;

        let instance = DeployedInstance {
            address,
            descriptor: InterfaceDescriptor::from(artifact.abi),
        };
        self.deployments.save(unit, &instance, &tx_hash, args)?;

        Ok(instance)
    }

    async fn verify(
        &mut self,
        unit: &str,
        address: Address,
        args: &[ConstructorArg],
    ) -> Result<(), BackendError> {
        let etherscan = self
            .etherscan
            .as_ref()
            .ok_or_else(|| BackendError::Rejected("no verification API key configured".to_string()))?;

        let artifact = self.artifacts.load(unit)?;
        let build_info = self.artifacts.build_info(&artifact)?;

        etherscan
            .verify(&artifact, &build_info, address, &encode_constructor_args(args))
            .await
    }

    async fn deployed_instance(&self, unit: &str) -> Result<DeployedInstance, BackendError> {
        self.deployments
            .load(unit)?
            .ok_or_else(|| BackendError::UnitNotFound(unit.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;
    use httpmock::prelude::*;
    use serde_json::{Value, json};
    use tempdir::TempDir;

    use super::*;
    use crate::backend::DEFAULT_DEPLOYER;

    const DEPLOYED: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const TX_HASH: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";

    /// A node answering JSON-RPC calls on `/`, one mock per method.
    struct TestNode {
        server: MockServer,
        dir: TempDir,
    }

    impl TestNode {
        async fn new() -> Self {
            let node = Self {
                server: MockServer::start_async().await,
                dir: TempDir::new("accountable-rpc").unwrap(),
            };

            let artifact = node.dir.path().join("artifacts/contracts/Box.sol/Box.json");
            std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
            std::fs::write(
                &artifact,
                r#"{
                    "contractName": "Box",
                    "sourceName": "contracts/Box.sol",
                    "abi": [{ "type": "constructor", "inputs": [] }],
                    "bytecode": "0x6080"
                }"#,
            )
            .unwrap();

            node.respond("eth_chainId", json!("0x7a69")).await;
            node.respond("eth_sendTransaction", json!(TX_HASH)).await;
            node
        }

        async fn respond(&self, method: &str, result: Value) -> httpmock::Mock<'_> {
            let needle = format!("\"{method}\"");
            let body = json!({ "jsonrpc": "2.0", "id": 1, "result": result });
            self.server
                .mock_async(|when, then| {
                    when.method(POST).path("/").body_contains(needle);
                    then.status(200).json_body(body);
                })
                .await
        }

        async fn receipt(&self, status: &str, contract_address: Option<Address>) {
            self.respond(
                "eth_getTransactionReceipt",
                json!({
                    "status": status,
                    "blockNumber": "0x10",
                    "contractAddress": contract_address,
                    "transactionHash": TX_HASH,
                }),
            )
            .await;
        }

        async fn backend(&self) -> RpcBackend {
            let mut config = RpcBackendConfig::new(
                Url::parse(&self.server.url("/")).unwrap(),
                31337,
                "localhost",
            );
            config.from = Some(DEFAULT_DEPLOYER);
            config.artifacts_dir = self.dir.path().join("artifacts");
            config.deployments_dir = self.dir.path().join("deployments");
            config.poll_interval = Duration::from_millis(5);
            config.confirmation_timeout = Some(Duration::from_millis(200));
            RpcBackend::connect(config).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_chain() {
        let node = TestNode::new().await;
        let mut config =
            RpcBackendConfig::new(Url::parse(&node.server.url("/")).unwrap(), 1, "mainnet");
        config.from = Some(DEFAULT_DEPLOYER);

        let err = RpcBackend::connect(config).await.unwrap_err();
        assert!(err.to_string().contains("serves chain 31337"));
    }

    #[tokio::test]
    async fn test_deploy_waits_for_confirmations_and_records_instance() {
        let node = TestNode::new().await;
        node.receipt("0x1", Some(DEPLOYED)).await;
        // Included at block 16: six confirmations are reached at block 21.
        let head = node.respond("eth_blockNumber", json!("0x15")).await;
        let mut backend = node.backend().await;

        let instance = backend.deploy("Box", &[], 6).await.unwrap();

        assert_eq!(instance.address, DEPLOYED);
        head.assert_async().await;
        assert_eq!(backend.deployed_instance("Box").await.unwrap(), instance);
        assert!(node.dir.path().join("deployments/localhost/Box.json").exists());
    }

    #[tokio::test]
    async fn test_confirmations_count_the_inclusion_block() {
        let node = TestNode::new().await;
        node.receipt("0x1", Some(DEPLOYED)).await;
        node.respond("eth_blockNumber", json!("0x14")).await;
        let mut backend = node.backend().await;

        let err = backend.deploy("Box", &[], 6).await.unwrap_err();

        assert!(err.to_string().contains("block confirmations"));
        assert!(matches!(
            backend.deployed_instance("Box").await,
            Err(BackendError::UnitNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_single_confirmation_skips_head_polling() {
        let node = TestNode::new().await;
        node.receipt("0x1", Some(DEPLOYED)).await;
        let head = node.respond("eth_blockNumber", json!("0x10")).await;
        let mut backend = node.backend().await;

        backend.deploy("Box", &[], 1).await.unwrap();

        assert_eq!(head.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_reverted_deployment_is_rejected() {
        let node = TestNode::new().await;
        node.receipt("0x0", Some(DEPLOYED)).await;
        let mut backend = node.backend().await;

        let err = backend.deploy("Box", &[], 1).await.unwrap_err();

        assert!(matches!(err, BackendError::Rejected(reason) if reason.contains("reverted")));
    }

    #[tokio::test]
    async fn test_receipt_without_contract_address_is_rejected() {
        let node = TestNode::new().await;
        node.receipt("0x1", None).await;
        let mut backend = node.backend().await;

        let err = backend.deploy("Box", &[], 1).await.unwrap_err();

        assert!(
            matches!(err, BackendError::Rejected(reason) if reason.contains("no contract address"))
        );
    }

    #[tokio::test]
    async fn test_verify_without_key_is_rejected() {
        let node = TestNode::new().await;
        let mut backend = node.backend().await;

        let err = backend.verify("Box", DEPLOYED, &[]).await.unwrap_err();

        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[test]
    fn test_sender_from_private_key() {
        // First account of the default development mnemonic.
        let from = sender_from_private_key(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        assert_eq!(from, DEFAULT_DEPLOYER);
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(sender_from_private_key("not-a-key").is_err());
    }

    #[test]
    fn test_receipt_parsing() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "status": "0x1",
            "blockNumber": "0x10",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "transactionHash": "0xabc"
        }))
        .unwrap();

        assert_eq!(receipt.status, 1);
        assert_eq!(receipt.block_number, 16);
        assert!(receipt.contract_address.is_some());
    }
}
