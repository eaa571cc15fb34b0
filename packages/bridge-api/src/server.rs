//! HTTP surface of the bridge
//!
//! Thin axum layer over [`BridgeOrchestrator`]: path parsing, status
//! mapping, metrics. Token ids travel as decimal strings.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use eyre::eyre;
use nft_bridge_rs::{
    parse_address, parse_token_id, BridgeError, BridgeOrchestrator, ChainRole, InvokeOutcome,
    LoginOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::metrics::Metrics;

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BridgeOrchestrator>,
    pub metrics: Arc<Metrics>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Handler failure, rendered as `{error, message}`
#[derive(Debug)]
pub enum ApiError {
    Bridge(BridgeError),
    OwnershipRejected { claimed: String, actual: String },
    UnsupportedFunction(String),
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        ApiError::Bridge(e)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

fn status_of(e: &BridgeError) -> StatusCode {
    match e {
        BridgeError::BindingNotFound { .. } => StatusCode::NOT_FOUND,
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        e if e.is_remote() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Bridge(e) => {
                let status = status_of(&e);
                if status.is_server_error() {
                    warn!(error = %e, "Request failed");
                }
                (status, e.kind().to_string(), e.to_string())
            }
            ApiError::OwnershipRejected { claimed, actual } => (
                StatusCode::FORBIDDEN,
                "OwnershipRejected".to_string(),
                format!("{} is not the owner (owner is {})", claimed, actual),
            ),
            ApiError::UnsupportedFunction(name) => (
                StatusCode::BAD_REQUEST,
                "UnsupportedFunction".to_string(),
                format!("function {} is not part of the contract interface", name),
            ),
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub owner_address: String,
    pub l1_nft_address: String,
    pub l2_nft_address: String,
    pub token_id: String,
    pub minted_now: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub l1_nft_address: String,
    pub l2_nft_address: String,
    pub token_id: String,
    pub token_uri: String,
    pub tx_hash: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[serde(default)]
    pub constructor_args: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub l1_address: String,
    pub l2_address: String,
    pub deployed_now: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallRequest {
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallResponse {
    pub result: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub chain_type: String,
    pub contract_address: String,
    pub token_id: String,
    pub token_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub token_id: String,
    pub token_uri: String,
    pub updated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub l1_signer: String,
    pub l2_signer: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Flow A
async fn login(
    State(state): State<AppState>,
    Path((owner, nft, token_id)): Path<(String, String, String)>,
) -> ApiResult<LoginResponse> {
    let owner = parse_address(&owner)?;
    let nft = parse_address(&nft)?;
    let token_id = parse_token_id(&token_id)?;

    let outcome = match state.orchestrator.login_and_sync(owner, nft, token_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            state.metrics.logins_total.with_label_values(&["error"]).inc();
            return Err(e.into());
        }
    };

    match outcome {
        LoginOutcome::Synced(result) => {
            state.metrics.logins_total.with_label_values(&["synced"]).inc();
            if result.minted_now {
                state.metrics.mints_total.inc();
            }
            Ok(Json(LoginResponse {
                owner_address: result.owner_address.to_string(),
                l1_nft_address: result.l1_address.to_string(),
                l2_nft_address: result.l2_address.to_string(),
                token_id: result.token_id.to_string(),
                minted_now: result.minted_now,
            }))
        }
        LoginOutcome::OwnershipRejected {
            claimed_owner,
            actual_owner,
        } => {
            state.metrics.logins_total.with_label_values(&["rejected"]).inc();
            Err(ApiError::OwnershipRejected {
                claimed: claimed_owner.to_string(),
                actual: actual_owner.to_string(),
            })
        }
    }
}

/// Flow B
async fn update(
    State(state): State<AppState>,
    Path((l2_nft, token_id)): Path<(String, String)>,
) -> ApiResult<UpdateResponse> {
    let l2_nft = parse_address(&l2_nft)?;
    let token_id = parse_token_id(&token_id)?;

    let pushed = state.orchestrator.update_l1_from_l2(l2_nft, token_id).await?;
    state.metrics.pushbacks_total.inc();

    Ok(Json(UpdateResponse {
        l1_nft_address: pushed.l1_address.to_string(),
        l2_nft_address: pushed.l2_address.to_string(),
        token_id: pushed.token_id.to_string(),
        token_uri: pushed.token_uri,
        tx_hash: pushed.tx_hash.to_string(),
    }))
}

/// Flow C
async fn deploy(
    State(state): State<AppState>,
    Path(l1_nft): Path<String>,
    Json(body): Json<DeployRequest>,
) -> ApiResult<DeployResponse> {
    let l1_nft = parse_address(&l1_nft)?;

    let outcome = match state
        .orchestrator
        .deploy_and_register(l1_nft, &body.constructor_args)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            state.metrics.deployments_total.with_label_values(&["error"]).inc();
            return Err(e.into());
        }
    };

    let label = if outcome.deployed_now { "deployed" } else { "existing" };
    state.metrics.deployments_total.with_label_values(&[label]).inc();

    Ok(Json(DeployResponse {
        l1_address: outcome.binding.l1_address.to_string(),
        l2_address: outcome.binding.l2_address.to_string(),
        deployed_now: outcome.deployed_now,
    }))
}

/// Flow D
async fn call_contract(
    State(state): State<AppState>,
    Path((chain_type, contract, function)): Path<(String, String, String)>,
    Json(body): Json<CallRequest>,
) -> ApiResult<CallResponse> {
    let role: ChainRole = chain_type.parse()?;
    let contract = parse_address(&contract)?;
    state
        .metrics
        .contract_calls_total
        .with_label_values(&[role.as_str()])
        .inc();

    match state
        .orchestrator
        .generic_invoke(role.as_str(), contract, &function, &body.args)
        .await?
    {
        InvokeOutcome::Completed(result) => Ok(Json(CallResponse { result })),
        InvokeOutcome::UnsupportedFunction { name } => Err(ApiError::UnsupportedFunction(name)),
    }
}

async fn metadata(
    State(state): State<AppState>,
    Path((chain_type, contract, token_id)): Path<(String, String, String)>,
) -> ApiResult<MetadataResponse> {
    let role: ChainRole = chain_type.parse()?;
    let contract = parse_address(&contract)?;
    let token_id = parse_token_id(&token_id)?;

    let token_uri = state.orchestrator.token_uri(role, contract, token_id).await?;
    Ok(Json(MetadataResponse {
        chain_type: role.to_string(),
        contract_address: contract.to_string(),
        token_id: token_id.to_string(),
        token_uri,
    }))
}

async fn reconcile(
    State(state): State<AppState>,
    Path((l1_nft, token_id)): Path<(String, String)>,
) -> ApiResult<ReconcileResponse> {
    let l1_nft = parse_address(&l1_nft)?;
    let token_id = parse_token_id(&token_id)?;

    let result = state.orchestrator.reconcile_token_uri(l1_nft, token_id).await?;
    Ok(Json(ReconcileResponse {
        token_id: result.token_id.to_string(),
        token_uri: result.token_uri,
        updated: result.updated,
    }))
}

/// Health check endpoint handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    Json(HealthResponse {
        status: "healthy".to_string(),
        l1_signer: orchestrator
            .invoker(ChainRole::L1)
            .client()
            .signer_address()
            .to_string(),
        l2_signer: orchestrator
            .invoker(ChainRole::L2)
            .client()
            .signer_address()
            .to_string(),
    })
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok((content_type, buffer)) => {
            ([(header::CONTENT_TYPE, content_type)], buffer).into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response(),
    }
}

/// All bridge routes over `state`
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/login/{owner_address}/{nft_address}/{token_id}", get(login))
        .route("/update/{l2_nft_address}/{token_id}", get(update))
        .route("/deploy/{l1_nft_address}", post(deploy))
        .route(
            "/callContract/{chain_type}/{contract_address}/{function_name}",
            post(call_contract),
        )
        .route(
            "/metadata/{chain_type}/{contract_address}/{token_id}",
            get(metadata),
        )
        .route("/reconcile/{l1_nft_address}/{token_id}", post(reconcile))
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Serve the bridge API until `shutdown` resolves
pub async fn start_server(
    bind_address: &str,
    port: u16,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> eyre::Result<()> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("Bridge API listening on {}", addr);
    info!("  /health  - Signer addresses (JSON)");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
