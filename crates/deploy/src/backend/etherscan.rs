//! Source verification through the Etherscan v2 API.

use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::Context;
use serde::Deserialize;

use super::{BackendError, BuildInfo, ContractArtifact};
use crate::rpc::poll_until;

/// Multichain Etherscan endpoint; the target chain is selected with `chainid`.
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Upper bound on waiting for a verdict once a submission is accepted.
pub const DEFAULT_VERIFICATION_TIMEOUT: Duration = Duration::from_secs(300);

const PENDING: &str = "Pending in queue";
const VERIFIED: &str = "Pass - Verified";

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

/// Client submitting contract sources for verification.
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    chain_id: u64,
    poll_interval: Duration,
    timeout: Duration,
}

impl EtherscanClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, chain_id: u64) -> Self {
        Self {
            client,
            api_url: ETHERSCAN_API_URL.to_string(),
            api_key: api_key.into(),
            chain_id,
            poll_interval: Duration::from_secs(5),
            timeout: DEFAULT_VERIFICATION_TIMEOUT,
        }
    }

    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// How often the verdict is polled, and how long to wait for it.
    pub fn polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.timeout = timeout;
        self
    }

    /// Submit the standard JSON input of `artifact` and wait for the verdict.
    pub async fn verify(
        &self,
        artifact: &ContractArtifact,
        build_info: &BuildInfo,
        address: Address,
        encoded_args: &[u8],
    ) -> Result<(), BackendError> {
        let source = serde_json::to_string(&build_info.input)
            .context("Failed to serialize compiler input")?;
        let compiler_version = format!("v{}", build_info.solc_long_version);
        let chain_id = self.chain_id.to_string();
        let contract_name = artifact.qualified_name();
        let contract_address = address.to_string();
        let constructor_args = hex::encode(encoded_args);

        let response: EtherscanResponse = self
            .client
            .post(&self.api_url)
            .query(&[("chainid", chain_id.as_str())])
            .form(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "verifysourcecode"),
                ("contractaddress", contract_address.as_str()),
                ("sourceCode", source.as_str()),
                ("codeformat", "solidity-standard-json-input"),
                ("contractname", contract_name.as_str()),
                ("compilerversion", compiler_version.as_str()),
                // Etherscan's spelling.
                ("constructorArguements", constructor_args.as_str()),
            ])
            .send()
            .await
            .context("Failed to submit verification request")?
            .json()
            .await
            .context("Failed to parse verification response")?;

        if response.status != "1" {
            if response.result.to_lowercase().contains("already verified") {
                tracing::info!(%address, "Contract already verified");
                return Ok(());
            }
            return Err(BackendError::Rejected(format!(
                "{}: {}",
                response.message, response.result
            )));
        }

        let guid = response.result.as_str();
        tracing::debug!(%address, guid, "Verification submitted");

        let verdict = poll_until(
            "verification verdict",
            self.poll_interval,
            Some(self.timeout),
            move || self.check_status(guid),
        )
        .await?;

        if verdict == VERIFIED || verdict.to_lowercase().contains("already verified") {
            Ok(())
        } else {
            Err(BackendError::Rejected(verdict))
        }
    }

    async fn check_status(&self, guid: &str) -> anyhow::Result<Option<String>> {
        let chain_id = self.chain_id.to_string();
        let response: EtherscanResponse = self
            .client
            .get(&self.api_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("Failed to query verification status")?
            .json()
            .await
            .context("Failed to parse verification status")?;

        if response.result == PENDING {
            Ok(None)
        } else {
            Ok(Some(response.result))
        }
    }
}
