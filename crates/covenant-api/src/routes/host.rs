//! Host environment endpoints
//!
//! The clock, the pause switch, and the in-memory asset ledger the loan
//! contracts reconcile against.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use covenant_core::{AccountId, AssetId};
use covenant_loan::{AssetDriver, PauseSwitch};

use crate::dto::{
    ApiError, AssetTransferRequest, BalanceResponse, ClockRequest, HostStatusResponse,
    MintRequest, PauseRequest,
};
use crate::AppState;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Create host routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/clock", post(set_clock))
        .route("/pause", post(set_pause))
        .route("/assets/mint", post(mint))
        .route("/assets/transfer", post(transfer))
        .route("/assets/:asset/balances/:account", get(balance))
}

fn bad_request(err: ApiError) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(err))
}

/// GET /host/status - Clock, pause flag, loan count
pub async fn status(State(state): State<AppState>) -> Json<HostStatusResponse> {
    let host = state.read().await;
    Json(HostStatusResponse {
        now: host.clock,
        paused: host.pause.paused,
        loan_count: host.loans.len(),
    })
}

/// POST /host/clock - Advance the environment clock (monotonic)
pub async fn set_clock(
    State(state): State<AppState>,
    Json(request): Json<ClockRequest>,
) -> ApiResult<Json<HostStatusResponse>> {
    let mut host = state.write().await;
    if request.now < host.clock {
        return Err(bad_request(ApiError::new(
            "clock_not_monotonic",
            format!("clock is at {}, cannot rewind to {}", host.clock, request.now),
        )));
    }
    host.clock = request.now;
    Ok(Json(HostStatusResponse {
        now: host.clock,
        paused: host.pause.paused,
        loan_count: host.loans.len(),
    }))
}

/// POST /host/pause - Flip the protocol pause switch
pub async fn set_pause(
    State(state): State<AppState>,
    Json(request): Json<PauseRequest>,
) -> Json<HostStatusResponse> {
    let mut host = state.write().await;
    host.pause = PauseSwitch::new(request.paused);
    tracing::info!("protocol paused = {}", request.paused);
    Json(HostStatusResponse {
        now: host.clock,
        paused: host.pause.paused,
        loan_count: host.loans.len(),
    })
}

/// POST /host/assets/mint - Seed a balance
pub async fn mint(
    State(state): State<AppState>,
    Json(request): Json<MintRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let amount = crate::dto::parse_amount("amount", &request.amount).map_err(bad_request)?;
    let asset = AssetId::new(request.asset);
    let account = AccountId::new(request.account);

    let mut host = state.write().await;
    host.assets.mint(&asset, &account, amount);
    let amount = host.assets.balance_of(&asset, &account);
    Ok(Json(BalanceResponse {
        asset: asset.to_string(),
        account: account.to_string(),
        amount: amount.to_string(),
    }))
}

/// POST /host/assets/transfer - Move a balance between accounts
pub async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<AssetTransferRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let amount = crate::dto::parse_amount("amount", &request.amount).map_err(bad_request)?;
    let asset = AssetId::new(request.asset);
    let from = AccountId::new(request.from);
    let to = AccountId::new(request.to);

    let mut host = state.write().await;
    if !host.assets.transfer(&asset, &from, &to, amount) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new(
                "transfer_failed",
                format!("{} lacks {} of {}", from, amount, asset),
            )),
        ));
    }
    let amount = host.assets.balance_of(&asset, &to);
    Ok(Json(BalanceResponse {
        asset: asset.to_string(),
        account: to.to_string(),
        amount: amount.to_string(),
    }))
}

/// GET /host/assets/{asset}/balances/{account} - Read a balance
pub async fn balance(
    State(state): State<AppState>,
    Path((asset, account)): Path<(String, String)>,
) -> Json<BalanceResponse> {
    let asset = AssetId::new(asset);
    let account = AccountId::new(account);
    let host = state.read().await;
    let amount = host.assets.balance_of(&asset, &account);
    Json(BalanceResponse {
        asset: asset.to_string(),
        account: account.to_string(),
        amount: amount.to_string(),
    })
}
