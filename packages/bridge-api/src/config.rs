//! Bridge API configuration

use std::env;
use std::fmt;
use std::time::Duration;

use eyre::{eyre, Result};
use nft_bridge_rs::redact::Redacted;
use nft_bridge_rs::{ChainRole, EvmChainConfig};

/// Default explorer endpoint (Etherscan v2, multi-chain)
pub const DEFAULT_EXPLORER_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Bridge API configuration
#[derive(Clone)]
pub struct Config {
    /// L1 (source ledger) connection
    pub l1: EvmChainConfig,
    /// L2 (mirror ledger) connection
    pub l2: EvmChainConfig,

    /// PostgreSQL URL; bindings are kept in memory when unset
    pub database_url: Option<String>,

    /// Etherscan-compatible API used by deploy-and-register
    pub explorer_api_url: String,
    pub explorer_api_key: Option<String>,

    /// HTTP bind address (default 0.0.0.0)
    pub bind_address: String,
    /// HTTP port (default 8080)
    pub port: u16,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("l1", &self.l1)
            .field("l2", &self.l2)
            .field("database_url", &self.database_url.as_ref().map(Redacted))
            .field("explorer_api_url", &self.explorer_api_url)
            .field("explorer_api_key", &self.explorer_api_key.as_ref().map(Redacted))
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .finish()
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| eyre!("{} required", name))
}

fn required_u64(name: &str) -> Result<u64> {
    required(name)?
        .trim()
        .parse()
        .map_err(|_| eyre!("Invalid {}", name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from `.env` (if present) and the environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }
        Self::from_env()
    }

    /// Load configuration from the process environment only
    pub fn from_env() -> Result<Self> {
        // One signing key serves both ledgers
        let private_key = required("BRIDGE_PRIVATE_KEY")?;

        let receipt_timeout = Duration::from_secs(
            env::var("RECEIPT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
        );

        let l1 = EvmChainConfig {
            role: ChainRole::L1,
            rpc_url: required("L1_RPC_URL")?,
            chain_id: required_u64("L1_CHAIN_ID")?,
            private_key: private_key.clone(),
            receipt_timeout,
        };
        let l2 = EvmChainConfig {
            role: ChainRole::L2,
            rpc_url: required("L2_RPC_URL")?,
            chain_id: required_u64("L2_CHAIN_ID")?,
            private_key,
            receipt_timeout,
        };

        Ok(Self {
            l1,
            l2,
            database_url: optional("DATABASE_URL"),
            explorer_api_url: optional("EXPLORER_API_URL")
                .unwrap_or_else(|| DEFAULT_EXPLORER_API_URL.to_string()),
            explorer_api_key: optional("EXPLORER_API_KEY"),
            bind_address: optional("API_BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        })
    }
}
