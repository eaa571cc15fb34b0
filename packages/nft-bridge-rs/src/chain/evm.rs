//! EVM JSON-RPC chain client
//!
//! Wraps an alloy provider with a local wallet. Transaction fields (nonce,
//! gas limit, gas price, chain id) are filled explicitly while the
//! submission lane is held, so two flows sharing a signer can never race for
//! the same nonce.

use std::fmt;
use std::time::{Duration, Instant};

use alloy::{
    dyn_abi::DynSolValue,
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::{
        http::{Client, Http},
        TransportError,
    },
};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ChainClient, SubmissionLane};
use crate::abi::ContractInterfaceDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::redact::Redacted;
use crate::types::{ChainRole, TransactionHandle, TransactionReceiptSummary};

/// Headroom added on top of `eth_estimateGas`.
const GAS_LIMIT_BUFFER_PERCENT: u64 = 20;

/// Receipt polling interval.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connection settings for one ledger
#[derive(Clone)]
pub struct EvmChainConfig {
    pub role: ChainRole,
    /// RPC URL (e.g., "http://localhost:8545")
    pub rpc_url: String,
    /// Expected EIP-155 chain id; checked against the node on connect
    pub chain_id: u64,
    /// Private key (hex string, with or without 0x prefix)
    pub private_key: String,
    /// Upper bound on waiting for a receipt
    pub receipt_timeout: Duration,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for EvmChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmChainConfig")
            .field("role", &self.role)
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("private_key", &Redacted(&self.private_key))
            .field("receipt_timeout", &self.receipt_timeout)
            .finish()
    }
}

#[allow(clippy::type_complexity)]
type SigningProvider = alloy::providers::fillers::FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::WalletFiller<EthereumWallet>,
    >,
    RootProvider<Http<Client>>,
    Http<Client>,
    Ethereum,
>;

/// Chain client for one EVM ledger
pub struct EvmChainClient {
    role: ChainRole,
    chain_id: u64,
    signer_address: Address,
    provider: SigningProvider,
    receipt_timeout: Duration,
    /// Single submission lane for this signing identity
    submission: SubmissionLane,
}

impl EvmChainClient {
    /// Build the client and check that the node serves the configured chain.
    pub async fn connect(config: &EvmChainConfig) -> Result<Self> {
        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;
        let signer_address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new().wallet(wallet).on_http(
            config
                .rpc_url
                .parse()
                .map_err(|e| eyre!("Invalid RPC URL: {}", e))?,
        );

        let remote_chain_id = provider
            .get_chain_id()
            .await
            .wrap_err_with(|| format!("Failed to reach {} RPC at {}", config.role, config.rpc_url))?;
        if remote_chain_id != config.chain_id {
            return Err(eyre!(
                "{} RPC reports chain id {}, expected {}",
                config.role,
                remote_chain_id,
                config.chain_id
            ));
        }

        info!(
            role = %config.role,
            rpc_url = %config.rpc_url,
            chain_id = config.chain_id,
            address = %signer_address,
            "Created EVM chain client"
        );

        Ok(Self {
            role: config.role,
            chain_id: config.chain_id,
            signer_address,
            provider,
            receipt_timeout: config.receipt_timeout,
            submission: SubmissionLane::new(),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Fill nonce, gas and fees, then hand the transaction to the node.
    /// Only called from inside the submission lane.
    async fn submit(&self, tx: TransactionRequest) -> BridgeResult<TxHash> {
        let estimate = self.provider.estimate_gas(&tx).await.map_err(|e| {
            BridgeError::GasEstimationFailed(node_message(&e))
        })?;
        let gas_limit = estimate + estimate * GAS_LIMIT_BUFFER_PERCENT / 100;

        let nonce = self
            .provider
            .get_transaction_count(self.signer_address)
            .pending()
            .await
            .map_err(|e| BridgeError::Rpc(format!("nonce lookup failed: {}", e)))?;
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| BridgeError::Rpc(format!("gas price lookup failed: {}", e)))?;

        let tx = tx
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(gas_price)
            .with_chain_id(self.chain_id);

        debug!(
            role = %self.role,
            nonce,
            gas_limit,
            gas_price,
            "Submitting transaction"
        );

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| classify(e, BridgeError::RemoteCallReverted))?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> BridgeResult<TransactionReceipt> {
        let start = Instant::now();

        while start.elapsed() < self.receipt_timeout {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => {
                    warn!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed, polling again");
                }
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }

        Err(BridgeError::ReceiptTimeout {
            tx_hash: tx_hash.to_string(),
            timeout_secs: self.receipt_timeout.as_secs(),
        })
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    fn role(&self) -> ChainRole {
        self.role
    }

    fn signer_address(&self) -> Address {
        self.signer_address
    }

    async fn read_call(
        &self,
        address: Address,
        descriptor: &ContractInterfaceDescriptor,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<Vec<DynSolValue>> {
        let (fragment, data) = descriptor.encode_call(function, args)?;

        let tx = TransactionRequest::default()
            .with_from(self.signer_address)
            .with_to(address)
            .with_input(data);

        debug!(role = %self.role, contract = %address, function, "eth_call");

        let raw = self
            .provider
            .call(&tx)
            .await
            .map_err(|e| classify(e, BridgeError::RemoteCallReverted))?;
        fragment.decode_output(&raw)
    }

    async fn send_transaction(
        &self,
        address: Address,
        descriptor: &ContractInterfaceDescriptor,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<TransactionHandle> {
        let (_, data) = descriptor.encode_call(function, args)?;

        let tx = TransactionRequest::default()
            .with_from(self.signer_address)
            .with_to(address)
            .with_input(data);

        let tx_hash = self.submission.submit(|| self.submit(tx)).await?;

        info!(
            role = %self.role,
            contract = %address,
            function,
            tx_hash = %tx_hash,
            "Transaction accepted"
        );

        Ok(TransactionHandle {
            role: self.role,
            tx_hash,
        })
    }

    async fn confirm(&self, handle: &TransactionHandle) -> BridgeResult<TransactionReceiptSummary> {
        let receipt = self.wait_for_receipt(handle.tx_hash).await?;
        if !receipt.status() {
            return Err(BridgeError::RemoteCallReverted(format!(
                "transaction {} reverted",
                handle.tx_hash
            )));
        }
        Ok(summarize(&receipt))
    }

    async fn get_code(&self, address: Address) -> BridgeResult<Bytes> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| BridgeError::Rpc(e.to_string()))?;
        if code.is_empty() {
            return Err(BridgeError::AddressNotAContract {
                address: address.to_string(),
            });
        }
        Ok(code)
    }

    async fn deploy_contract(
        &self,
        descriptor: &ContractInterfaceDescriptor,
        bytecode: &Bytes,
        constructor_args: &[Value],
    ) -> BridgeResult<Address> {
        // Arity and argument checks happen here, before the lane or any RPC.
        let init_code = descriptor.encode_deployment(bytecode, constructor_args)?;

        let tx = TransactionRequest::default()
            .with_from(self.signer_address)
            .with_deploy_code(init_code);

        let tx_hash = self
            .submission
            .submit(|| self.submit(tx))
            .await
            .map_err(|e| match e {
                BridgeError::RemoteCallReverted(msg) => BridgeError::DeploymentReverted(msg),
                other => other,
            })?;

        info!(role = %self.role, tx_hash = %tx_hash, "Deployment accepted, waiting for receipt");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.status() {
            return Err(BridgeError::DeploymentReverted(format!(
                "deployment {} reverted",
                tx_hash
            )));
        }
        let address = receipt.contract_address.ok_or_else(|| {
            BridgeError::DeploymentReverted(format!("receipt of {} has no contract address", tx_hash))
        })?;

        info!(role = %self.role, address = %address, tx_hash = %tx_hash, "Contract deployed");
        Ok(address)
    }
}

fn summarize(receipt: &TransactionReceipt) -> TransactionReceiptSummary {
    TransactionReceiptSummary {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        gas_used: receipt.gas_used as u64,
        contract_address: receipt.contract_address,
    }
}

/// Message of a node-side error response, or the transport error text.
fn node_message(e: &TransportError) -> String {
    match e.as_error_resp() {
        Some(payload) => payload.message.to_string(),
        None => e.to_string(),
    }
}

/// Node-side error responses map through `on_node_error`; transport
/// failures become `Rpc`.
fn classify(e: TransportError, on_node_error: fn(String) -> BridgeError) -> BridgeError {
    match e.as_error_resp() {
        Some(payload) => on_node_error(payload.message.to_string()),
        None => BridgeError::Rpc(e.to_string()),
    }
}
