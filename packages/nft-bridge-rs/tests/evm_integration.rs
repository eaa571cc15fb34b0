//! EVM Chain Client Integration Test
//!
//! Exercises [`EvmChainClient`] against a running Anvil node: connect, deploy
//! a minimal contract, read it back through a descriptor.
//!
//! ## Running
//!
//! ```bash
//! anvil &
//! INTEGRATION_TEST=1 \
//! L2_RPC_URL=http://localhost:8545 \
//! cargo test --test evm_integration -- --ignored --nocapture
//! ```
//!
//! `L2_CHAIN_ID` defaults to 31337 and `BRIDGE_PRIVATE_KEY` to the first
//! Anvil account.

use std::time::Duration;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Bytes, U256};
use nft_bridge_rs::{
    BridgeError, ChainClient, ChainRole, ContractInterfaceDescriptor, ContractInvoker,
    EvmChainClient, EvmChainConfig,
};
use serde_json::json;
use std::sync::Arc;

const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Init code whose runtime answers every call with uint256(42).
const ANSWER_INIT_CODE: &str = "0x600a600c600039600a6000f3602a60005260206000f3";

const ANSWER_ABI: &str = r#"[
  {"type": "constructor", "inputs": [], "stateMutability": "nonpayable"},
  {"type": "function", "name": "answer", "stateMutability": "view", "inputs": [],
   "outputs": [{"name": "", "type": "uint256"}]}
]"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,nft_bridge_rs=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn config_from_env() -> Option<EvmChainConfig> {
    init_tracing();
    if std::env::var("INTEGRATION_TEST").is_err() {
        eprintln!("INTEGRATION_TEST not set, skipping");
        return None;
    }
    Some(EvmChainConfig {
        role: ChainRole::L2,
        rpc_url: std::env::var("L2_RPC_URL").unwrap_or_else(|_| "http://localhost:8545".to_string()),
        chain_id: std::env::var("L2_CHAIN_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(31337),
        private_key: std::env::var("BRIDGE_PRIVATE_KEY").unwrap_or_else(|_| ANVIL_KEY.to_string()),
        receipt_timeout: Duration::from_secs(30),
    })
}

#[tokio::test]
#[ignore]
async fn test_connect_rejects_wrong_chain_id() {
    let Some(mut config) = config_from_env() else {
        return;
    };
    config.chain_id += 1;
    let err = EvmChainClient::connect(&config).await.err().unwrap();
    assert!(err.to_string().contains("expected"));
}

#[tokio::test]
#[ignore]
async fn test_deploy_and_read_back() {
    let Some(config) = config_from_env() else {
        return;
    };
    let client = Arc::new(EvmChainClient::connect(&config).await.unwrap());
    let invoker = ContractInvoker::new(client.clone());
    let descriptor = ContractInterfaceDescriptor::from_json_str(ANSWER_ABI).unwrap();
    let init_code: Bytes = ANSWER_INIT_CODE.parse().unwrap();

    let address = invoker.deploy(&descriptor, &init_code, &[]).await.unwrap();
    println!("Deployed answer contract at {}", address);

    let code = invoker.code_at(address).await.unwrap();
    assert!(!code.is_empty());

    let values = invoker
        .read(&descriptor, address, "answer", &[])
        .await
        .unwrap();
    assert_eq!(values, vec![DynSolValue::Uint(U256::from(42), 256)]);
}

#[tokio::test]
#[ignore]
async fn test_signer_has_no_code() {
    let Some(config) = config_from_env() else {
        return;
    };
    let client = EvmChainClient::connect(&config).await.unwrap();
    let err = client.get_code(client.signer_address()).await.unwrap_err();
    assert!(matches!(err, BridgeError::AddressNotAContract { .. }));
}

#[tokio::test]
#[ignore]
async fn test_constructor_mismatch_is_local() {
    let Some(config) = config_from_env() else {
        return;
    };
    let client = EvmChainClient::connect(&config).await.unwrap();
    let descriptor = ContractInterfaceDescriptor::from_json_str(ANSWER_ABI).unwrap();
    let err = client
        .deploy_contract(&descriptor, &Bytes::from_static(&[0x00]), &[json!("extra")])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BridgeError::ConstructorArgumentMismatch {
            expected: 0,
            actual: 1
        }
    );
}
