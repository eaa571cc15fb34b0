//! Error taxonomy for the bridge
//!
//! Validation errors are raised before any RPC leaves the process and map to
//! 4xx results at the HTTP edge. Ledger errors are failures of the enclosing
//! flow and are never retried automatically; callers re-invoke the flow,
//! which re-reads on-chain state first.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    // ========================================================================
    // Registry / lookup
    // ========================================================================
    #[error("No contract binding registered for {address}")]
    BindingNotFound { address: String },

    #[error("Registry error: {0}")]
    Registry(String),

    // ========================================================================
    // Validation (pre-network)
    // ========================================================================
    #[error("Malformed contract interface: {0}")]
    MalformedInterface(String),

    #[error("Function not found in interface: {name}")]
    FunctionNotFound { name: String },

    #[error("Function {function} expects {expected} argument(s), got {actual}")]
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("Constructor expects {expected} argument(s), got {actual}")]
    ConstructorArgumentMismatch { expected: usize, actual: usize },

    #[error("Argument {index} of {function} is invalid: {reason}")]
    InvalidArgument {
        function: String,
        index: usize,
        reason: String,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid chain type: {0} (expected l1 or l2)")]
    InvalidChainType(String),

    // ========================================================================
    // Ledger
    // ========================================================================
    #[error("Gas estimation failed: {0}")]
    GasEstimationFailed(String),

    #[error("Remote call reverted: {0}")]
    RemoteCallReverted(String),

    #[error("Deployment reverted: {0}")]
    DeploymentReverted(String),

    #[error("Address {address} holds no contract code")]
    AddressNotAContract { address: String },

    #[error("Transaction {tx_hash} not confirmed after {timeout_secs}s")]
    ReceiptTimeout { tx_hash: String, timeout_secs: u64 },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Explorer error: {0}")]
    Explorer(String),
}

impl BridgeError {
    /// True for errors detected before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BridgeError::MalformedInterface(_)
                | BridgeError::FunctionNotFound { .. }
                | BridgeError::ArgumentCountMismatch { .. }
                | BridgeError::ConstructorArgumentMismatch { .. }
                | BridgeError::InvalidArgument { .. }
                | BridgeError::InvalidAddress(_)
                | BridgeError::InvalidChainType(_)
        )
    }

    /// True for failures reported by a ledger or the explorer.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            BridgeError::GasEstimationFailed(_)
                | BridgeError::RemoteCallReverted(_)
                | BridgeError::DeploymentReverted(_)
                | BridgeError::AddressNotAContract { .. }
                | BridgeError::ReceiptTimeout { .. }
                | BridgeError::Rpc(_)
                | BridgeError::Explorer(_)
        )
    }

    /// Stable variant name, used as the `error` field of HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::BindingNotFound { .. } => "BindingNotFound",
            BridgeError::Registry(_) => "RegistryError",
            BridgeError::MalformedInterface(_) => "MalformedInterface",
            BridgeError::FunctionNotFound { .. } => "FunctionNotFound",
            BridgeError::ArgumentCountMismatch { .. } => "ArgumentCountMismatch",
            BridgeError::ConstructorArgumentMismatch { .. } => "ConstructorArgumentMismatch",
            BridgeError::InvalidArgument { .. } => "InvalidArgument",
            BridgeError::InvalidAddress(_) => "InvalidAddress",
            BridgeError::InvalidChainType(_) => "InvalidChainType",
            BridgeError::GasEstimationFailed(_) => "GasEstimationFailed",
            BridgeError::RemoteCallReverted(_) => "RemoteCallReverted",
            BridgeError::DeploymentReverted(_) => "DeploymentReverted",
            BridgeError::AddressNotAContract { .. } => "AddressNotAContract",
            BridgeError::ReceiptTimeout { .. } => "ReceiptTimeout",
            BridgeError::Rpc(_) => "RpcError",
            BridgeError::Explorer(_) => "ExplorerError",
        }
    }

    pub(crate) fn binding_not_found(address: impl ToString) -> Self {
        BridgeError::BindingNotFound {
            address: address.to_string(),
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
