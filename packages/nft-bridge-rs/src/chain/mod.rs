//! Per-ledger transaction clients
//!
//! One [`ChainClient`] exists per ledger role. It owns the read connection and
//! the signing identity, and every call is shaped by a
//! [`ContractInterfaceDescriptor`] rather than by generated bindings.
//!
//! ## Submodules
//!
//! - `evm` - JSON-RPC implementation over an alloy provider
//! - `lane` - per-signer submission serialization

pub mod evm;
pub mod lane;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use serde_json::Value;

use crate::abi::ContractInterfaceDescriptor;
use crate::error::BridgeResult;
use crate::types::{ChainRole, TransactionHandle, TransactionReceiptSummary};

pub use evm::{EvmChainClient, EvmChainConfig};
pub use lane::SubmissionLane;

/// Ledger access used by the invoker and the orchestrator.
///
/// Implementations validate the call shape against the descriptor before any
/// RPC, and serialize transaction submission per signing identity: at most one
/// submission is in flight per client. Reads are not serialized.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Ledger this client talks to.
    fn role(&self) -> ChainRole;

    /// Address of the signing identity.
    fn signer_address(&self) -> Address;

    /// State-non-mutating call (`eth_call`), decoded per the descriptor.
    async fn read_call(
        &self,
        address: Address,
        descriptor: &ContractInterfaceDescriptor,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<Vec<DynSolValue>>;

    /// Estimate gas, sign and submit. Returns once the node accepted the
    /// transaction; inclusion is checked with [`ChainClient::confirm`].
    async fn send_transaction(
        &self,
        address: Address,
        descriptor: &ContractInterfaceDescriptor,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<TransactionHandle>;

    /// Wait for the receipt of a submitted transaction. A failed receipt is
    /// `RemoteCallReverted`.
    async fn confirm(&self, handle: &TransactionHandle) -> BridgeResult<TransactionReceiptSummary>;

    /// Runtime code at `address`; `AddressNotAContract` when empty.
    async fn get_code(&self, address: Address) -> BridgeResult<Bytes>;

    /// Deploy `bytecode` with ABI-encoded constructor arguments and wait for
    /// the contract address.
    async fn deploy_contract(
        &self,
        descriptor: &ContractInterfaceDescriptor,
        bytecode: &Bytes,
        constructor_args: &[Value],
    ) -> BridgeResult<Address>;
}
