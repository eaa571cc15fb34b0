//! Prometheus metrics for the bridge flows

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Bridge counters, registered on a private registry
pub struct Metrics {
    /// Login attempts by outcome (synced, rejected, error)
    pub logins_total: IntCounterVec,
    pub mints_total: IntCounter,
    pub pushbacks_total: IntCounter,
    /// Deploy-and-register calls by result (deployed, existing, error)
    pub deployments_total: IntCounterVec,
    /// Generic contract calls by chain
    pub contract_calls_total: IntCounterVec,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let logins_total = IntCounterVec::new(
            Opts::new("nft_bridge_logins_total", "Login/sync requests by outcome"),
            &["outcome"],
        )
        .expect("constant metric name is valid");

        let mints_total = IntCounter::new(
            "nft_bridge_mints_total",
            "Mirror tokens minted on L2",
        )
        .expect("constant metric name is valid");

        let pushbacks_total = IntCounter::new(
            "nft_bridge_pushbacks_total",
            "Token URIs pushed back from L2 to L1",
        )
        .expect("constant metric name is valid");

        let deployments_total = IntCounterVec::new(
            Opts::new(
                "nft_bridge_deployments_total",
                "Deploy-and-register requests by result",
            ),
            &["result"],
        )
        .expect("constant metric name is valid");

        let contract_calls_total = IntCounterVec::new(
            Opts::new("nft_bridge_contract_calls_total", "Generic contract calls by chain"),
            &["chain"],
        )
        .expect("constant metric name is valid");

        // Names are unique constants and this runs once per Metrics
        registry
            .register(Box::new(logins_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(mints_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(pushbacks_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(deployments_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(contract_calls_total.clone()))
            .expect("metric registration must not be called twice");

        Self {
            logins_total,
            mints_total,
            pushbacks_total,
            deployments_total,
            contract_calls_total,
            registry,
        }
    }

    /// Text exposition of every registered metric
    pub fn encode(&self) -> Result<(String, Vec<u8>), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}
