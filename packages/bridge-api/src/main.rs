//! NFT Bridge API Node
//!
//! HTTP front for the L1 → L2 NFT bridge:
//!
//! 1. `GET /login/...` verifies L1 ownership and mints the L2 mirror if needed
//! 2. `GET /update/...` pushes an L2 token URI back to L1
//! 3. `POST /deploy/...` deploys an L2 mirror of a verified L1 contract
//! 4. `POST /callContract/...` calls any function of a bound contract
//!
//! Bindings live in PostgreSQL when `DATABASE_URL` is set, otherwise in
//! memory for the lifetime of the process.

use std::sync::Arc;

use bridge_api::config::Config;
use bridge_api::metrics::Metrics;
use bridge_api::server::{start_server, AppState};
use nft_bridge_rs::{
    BridgeOrchestrator, ContractInvoker, ContractRegistry, EvmChainClient, ExplorerClient,
    InMemoryRegistry, PgContractRegistry,
};
use tracing::{info, warn};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    let config = Config::load()?;
    init_logging();

    info!("Starting NFT Bridge API");
    info!(
        l1_rpc = %config.l1.rpc_url,
        l2_rpc = %config.l2.rpc_url,
        persistent = config.database_url.is_some(),
        "Configuration loaded"
    );

    let l1 = Arc::new(EvmChainClient::connect(&config.l1).await?);
    let l2 = Arc::new(EvmChainClient::connect(&config.l2).await?);

    let registry: Arc<dyn ContractRegistry> = match &config.database_url {
        Some(url) => Arc::new(PgContractRegistry::connect(url).await?),
        None => {
            warn!("DATABASE_URL not set, contract bindings are kept in memory only");
            Arc::new(InMemoryRegistry::new())
        }
    };

    let explorer = Arc::new(ExplorerClient::new(
        &config.explorer_api_url,
        config.l1.chain_id,
        config.explorer_api_key.clone(),
    )?);

    let orchestrator = BridgeOrchestrator::new(
        ContractInvoker::new(l1),
        ContractInvoker::new(l2),
        registry,
        explorer,
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        metrics: Arc::new(Metrics::new()),
    };

    start_server(
        &config.bind_address,
        config.port,
        state,
        wait_for_shutdown_signal(),
    )
    .await?;

    info!("NFT Bridge API stopped");
    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` overrides the filter
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nft_bridge_api=debug,nft_bridge_rs=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
