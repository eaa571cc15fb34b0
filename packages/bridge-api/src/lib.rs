//! NFT Bridge API - Library interface
//!
//! Re-exports internal modules for use in integration tests.

pub mod config;
pub mod metrics;
pub mod server;
