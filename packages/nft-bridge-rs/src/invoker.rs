//! Descriptor-driven call dispatch
//!
//! The invoker checks the call shape against the descriptor before anything
//! reaches the chain client, so a misshapen call never costs an RPC.

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes};
use serde_json::Value;

use crate::abi::ContractInterfaceDescriptor;
use crate::chain::ChainClient;
use crate::error::BridgeResult;
use crate::types::{ChainRole, TransactionHandle};

/// What an invocation produced
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutput {
    /// Decoded return values of a read
    Values(Vec<DynSolValue>),
    /// Handle of a submitted transaction
    Submitted(TransactionHandle),
}

/// Single validated entry point onto one chain
#[derive(Clone)]
pub struct ContractInvoker {
    client: Arc<dyn ChainClient>,
}

impl ContractInvoker {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    pub fn role(&self) -> ChainRole {
        self.client.role()
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn supports_function(&self, descriptor: &ContractInterfaceDescriptor, name: &str) -> bool {
        descriptor.supports_function(name)
    }

    /// Route to a read or a transaction submission.
    pub async fn invoke(
        &self,
        descriptor: &ContractInterfaceDescriptor,
        address: Address,
        function: &str,
        args: &[Value],
        mutating: bool,
    ) -> BridgeResult<CallOutput> {
        descriptor.validate_call(function, args.len())?;

        if mutating {
            self.client
                .send_transaction(address, descriptor, function, args)
                .await
                .map(CallOutput::Submitted)
        } else {
            self.client
                .read_call(address, descriptor, function, args)
                .await
                .map(CallOutput::Values)
        }
    }

    /// Like [`ContractInvoker::invoke`], choosing read vs. write from the
    /// declared mutability.
    pub async fn invoke_auto(
        &self,
        descriptor: &ContractInterfaceDescriptor,
        address: Address,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<CallOutput> {
        let fragment = descriptor.validate_call(function, args.len())?;
        let mutating = !fragment.mutability.is_read_only();
        self.invoke(descriptor, address, function, args, mutating)
            .await
    }

    /// Read call returning decoded values.
    pub async fn read(
        &self,
        descriptor: &ContractInterfaceDescriptor,
        address: Address,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<Vec<DynSolValue>> {
        descriptor.validate_call(function, args.len())?;
        self.client
            .read_call(address, descriptor, function, args)
            .await
    }

    /// Submit a transaction and wait for its successful receipt.
    pub async fn transact(
        &self,
        descriptor: &ContractInterfaceDescriptor,
        address: Address,
        function: &str,
        args: &[Value],
    ) -> BridgeResult<TransactionHandle> {
        descriptor.validate_call(function, args.len())?;
        let handle = self
            .client
            .send_transaction(address, descriptor, function, args)
            .await?;
        self.client.confirm(&handle).await?;
        Ok(handle)
    }

    /// Deploy through the client after the constructor-arity check.
    pub async fn deploy(
        &self,
        descriptor: &ContractInterfaceDescriptor,
        bytecode: &Bytes,
        constructor_args: &[Value],
    ) -> BridgeResult<Address> {
        descriptor.validate_deployment(constructor_args.len())?;
        self.client
            .deploy_contract(descriptor, bytecode, constructor_args)
            .await
    }

    /// Runtime code at `address`.
    pub async fn code_at(&self, address: Address) -> BridgeResult<Bytes> {
        self.client.get_code(address).await
    }
}

impl std::fmt::Debug for ContractInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractInvoker")
            .field("role", &self.client.role())
            .field("signer", &self.client.signer_address())
            .finish()
    }
}

impl From<Arc<dyn ChainClient>> for ContractInvoker {
    fn from(client: Arc<dyn ChainClient>) -> Self {
        Self::new(client)
    }
}
