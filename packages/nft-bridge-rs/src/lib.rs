//! NFT-Bridge-RS: L1 → L2 NFT mirroring
//!
//! This crate holds everything the bridge API needs to keep an NFT on L1 and
//! its mirror on L2 consistent:
//!
//! - **ABI** - Runtime contract interface descriptors, argument coercion, calldata encoding
//! - **Chain** - Per-ledger transaction clients with a single submission lane per signer
//! - **Invoker** - Descriptor-validated call dispatch
//! - **Registry** - L1 ↔ L2 contract bindings (in-memory or PostgreSQL)
//! - **Explorer** - Verified ABI and creation bytecode lookup for deploy-and-register
//! - **Orchestrator** - Login/sync, metadata push-back, deploy-and-register, generic calls
//! - **Testing Module** - Scripted ledger and fixtures (feature `testing`)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! nft-bridge-rs = { path = "../nft-bridge-rs" }
//! ```

pub mod abi;
pub mod chain;
pub mod error;
pub mod explorer;
pub mod invoker;
pub mod orchestrator;
pub mod redact;
pub mod registry;
pub mod types;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used items at the crate root
pub use abi::ContractInterfaceDescriptor;
pub use chain::{ChainClient, EvmChainClient, EvmChainConfig};
pub use error::{BridgeError, BridgeResult};
pub use explorer::{ContractArtifact, ContractSource, ExplorerClient};
pub use invoker::{CallOutput, ContractInvoker};
pub use orchestrator::{BridgeOrchestrator, InvokeOutcome};
pub use registry::{ContractRegistry, InMemoryRegistry, PgContractRegistry};
pub use types::{
    parse_address, parse_token_id, ChainRole, ContractBinding, DeployOutcome, LoginOutcome,
    PushBackResult, ReconcileResult, SyncResult, TokenIdentity,
};
