//! Shared types for the bridge flows
//!
//! Addresses are alloy `Address` values throughout: parsing normalises case,
//! so two spellings of the same address compare equal.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::abi::ContractInterfaceDescriptor;
use crate::error::{BridgeError, BridgeResult};

/// Which ledger a client or binding side refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainRole {
    L1,
    L2,
}

impl ChainRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainRole::L1 => "l1",
            ChainRole::L2 => "l2",
        }
    }
}

impl fmt::Display for ChainRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainRole {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l1" => Ok(ChainRole::L1),
            "l2" => Ok(ChainRole::L2),
            _ => Err(BridgeError::InvalidChainType(s.to_string())),
        }
    }
}

/// Parse a hex address; any letter case is accepted.
pub fn parse_address(s: &str) -> BridgeResult<Address> {
    Address::from_str(s.trim()).map_err(|_| BridgeError::InvalidAddress(s.to_string()))
}

/// Parse a token id given in decimal (or 0x-hex).
///
/// Only plain digit runs are accepted: no sign, no `_` separators, and
/// never an empty string.
pub fn parse_token_id(s: &str) -> BridgeResult<U256> {
    let s = s.trim();
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    let well_formed = !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
    let parsed = if well_formed {
        U256::from_str_radix(digits, radix as u64).ok()
    } else {
        None
    };
    parsed.ok_or_else(|| BridgeError::InvalidArgument {
        function: "tokenId".to_string(),
        index: 0,
        reason: format!("{:?} is not a non-negative integer", s),
    })
}

/// Registered association between an L1 contract and its L2 mirror.
///
/// `l1_address` is the natural key. `l2_address` changes only when the
/// mirror is redeployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractBinding {
    pub l1_address: Address,
    pub l2_address: Address,
    pub interface: ContractInterfaceDescriptor,
    pub bytecode: Bytes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContractBinding {
    pub fn new(
        l1_address: Address,
        l2_address: Address,
        interface: ContractInterfaceDescriptor,
        bytecode: Bytes,
    ) -> Self {
        let now = Utc::now();
        Self {
            l1_address,
            l2_address,
            interface,
            bytecode,
            created_at: now,
            updated_at: now,
        }
    }

    /// Contract address of this binding on the given chain.
    pub fn address_on(&self, role: ChainRole) -> Address {
        match role {
            ChainRole::L1 => self.l1_address,
            ChainRole::L2 => self.l2_address,
        }
    }
}

/// One token instance, identical on both ledgers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenIdentity {
    pub contract_address: Address,
    pub token_id: U256,
}

impl fmt::Display for TokenIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.contract_address, self.token_id)
    }
}

/// Externally asserted ownership; built per request, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipClaim {
    pub token: TokenIdentity,
    pub claimed_owner: Address,
}

/// Result of a successful login/sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub owner_address: Address,
    pub l1_address: Address,
    pub l2_address: Address,
    pub token_id: U256,
    pub minted_now: bool,
}

/// Outcome of login/sync. A rejected claim is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Synced(SyncResult),
    OwnershipRejected {
        claimed_owner: Address,
        actual_owner: Address,
    },
}

/// Result of pushing L2 metadata back to L1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushBackResult {
    pub l1_address: Address,
    pub l2_address: Address,
    pub token_id: U256,
    pub token_uri: String,
    pub tx_hash: TxHash,
}

/// Result of deploy-and-register
#[derive(Debug, Clone, PartialEq)]
pub struct DeployOutcome {
    pub binding: ContractBinding,
    /// false when an existing binding was returned unchanged
    pub deployed_now: bool,
}

/// Result of a reconciliation pass on one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileResult {
    pub token_id: U256,
    pub token_uri: String,
    /// true when a `setTokenURI` was submitted on L2
    pub updated: bool,
}

/// Handle for a transaction accepted by a node; not a proof of inclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHandle {
    pub role: ChainRole,
    pub tx_hash: TxHash,
}

/// Included-transaction summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceiptSummary {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
}
