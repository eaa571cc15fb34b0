//! Code-introspection source for L1 contracts
//!
//! Deploy-and-register needs the interface descriptor and creation bytecode
//! of the L1 contract. [`ExplorerClient`] fetches both from an
//! Etherscan-compatible API (`getabi` and `getcontractcreation`).

use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::abi::ContractInterfaceDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::redact::Redacted;

/// Interface and creation bytecode of a verified contract
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    pub descriptor: ContractInterfaceDescriptor,
    pub bytecode: Bytes,
}

/// Where deploy-and-register learns what to mirror.
#[async_trait]
pub trait ContractSource: Send + Sync {
    async fn fetch(&self, address: Address) -> BridgeResult<ContractArtifact>;
}

/// Etherscan-style envelope: `status` is "1" on success, and `result` holds
/// either the payload or the error text.
#[derive(Debug, Deserialize)]
struct ExplorerEnvelope<T> {
    status: String,
    message: String,
    result: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractCreation {
    contract_address: String,
    #[serde(default)]
    creation_bytecode: Option<String>,
}

/// Etherscan v2 compatible client
pub struct ExplorerClient {
    client: Client,
    base_url: Url,
    chain_id: u64,
    api_key: Option<String>,
}

impl std::fmt::Debug for ExplorerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorerClient")
            .field("base_url", &self.base_url.as_str())
            .field("chain_id", &self.chain_id)
            .field("api_key", &self.api_key.as_ref().map(Redacted))
            .finish()
    }
}

impl ExplorerClient {
    /// `chain_id` selects the L1 network on multi-chain explorers.
    pub fn new(base_url: &str, chain_id: u64, api_key: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url).wrap_err("Invalid explorer API URL")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .wrap_err("Failed to create HTTP client")?;

        info!(url = %base_url, chain_id, "Explorer client initialized");

        Ok(Self {
            client,
            base_url,
            chain_id,
            api_key,
        })
    }

    fn request_url(&self, action: &str, params: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("chainid", &self.chain_id.to_string())
                .append_pair("module", "contract")
                .append_pair("action", action);
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(key) = &self.api_key {
                query.append_pair("apikey", key);
            }
        }
        url
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, action: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.request_url(action, params);
        debug!(action, "Explorer request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .wrap_err_with(|| format!("Explorer {} request failed", action))?;

        if !response.status().is_success() {
            return Err(eyre!("Explorer {} returned HTTP {}", action, response.status()));
        }

        let body: ExplorerEnvelope<serde_json::Value> = response
            .json()
            .await
            .wrap_err_with(|| format!("Failed to parse explorer {} response", action))?;

        if body.status != "1" {
            return Err(eyre!(
                "Explorer {} failed: {} ({})",
                action,
                body.message,
                body.result
            ));
        }

        serde_json::from_value(body.result)
            .wrap_err_with(|| format!("Unexpected explorer {} payload", action))
    }

    /// Verified ABI of `address`.
    pub async fn fetch_abi(&self, address: Address) -> BridgeResult<ContractInterfaceDescriptor> {
        let abi: String = self
            .get("getabi", &[("address", format!("{:#x}", address))])
            .await
            .map_err(|e| BridgeError::Explorer(format!("{:#}", e)))?;
        ContractInterfaceDescriptor::from_json_str(&abi)
    }

    /// Creation bytecode of `address`.
    pub async fn fetch_creation_bytecode(&self, address: Address) -> BridgeResult<Bytes> {
        let creations: Vec<ContractCreation> = self
            .get(
                "getcontractcreation",
                &[("contractaddresses", format!("{:#x}", address))],
            )
            .await
            .map_err(|e| BridgeError::Explorer(format!("{:#}", e)))?;

        let creation = creations
            .into_iter()
            .find(|c| {
                c.contract_address
                    .parse::<Address>()
                    .map(|a| a == address)
                    .unwrap_or(false)
            })
            .ok_or_else(|| BridgeError::Explorer(format!("no creation record for {}", address)))?;

        let code = creation.creation_bytecode.ok_or_else(|| {
            BridgeError::Explorer(format!("explorer omits creation bytecode for {}", address))
        })?;
        decode_bytecode(&code)
    }
}

fn decode_bytecode(code: &str) -> BridgeResult<Bytes> {
    let trimmed = code.trim();
    let raw = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| BridgeError::Explorer(format!("creation bytecode is not hex: {}", e)))?;
    if raw.is_empty() {
        return Err(BridgeError::Explorer("creation bytecode is empty".to_string()));
    }
    Ok(Bytes::from(raw))
}

#[async_trait]
impl ContractSource for ExplorerClient {
    async fn fetch(&self, address: Address) -> BridgeResult<ContractArtifact> {
        let descriptor = self.fetch_abi(address).await?;
        let bytecode = self.fetch_creation_bytecode(address).await?;
        info!(
            address = %address,
            functions = descriptor.functions().count(),
            bytecode_len = bytecode.len(),
            "Fetched contract artifact"
        );
        Ok(ContractArtifact {
            descriptor,
            bytecode,
        })
    }
}
