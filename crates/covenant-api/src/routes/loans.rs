//! Loan lifecycle endpoints
//!
//! One write lock over the host serializes every mutating operation, the
//! way the engine's execution model expects. Handlers translate wire
//! DTOs, hand the call to the contract, and map `LoanError` onto the
//! stable `code` field plus the engine's HTTP status.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use covenant_core::{AccountId, AssetId, LoanError};
use covenant_loan::{Context, RefinanceCall};

use crate::dto::{
    AmountResponse, ApiError, BreakdownResponse, CallerRequest, CollateralRequirementResponse,
    CreateLoanRequest, CreateLoanResponse, EventDto, EventsResponse, FundRequest, LoanSummaryDto,
    LoanViewDto, LoansResponse, PaymentResponse, ProposeResponse, RefinanceRequest,
    RepossessRequest, RepossessResponse, RoleRequest, SkimRequest, TransferOutRequest,
};
use crate::state::Host;
use crate::AppState;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Create loan routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_loan).get(list_loans))
        .route("/:id", get(get_loan))
        .route("/:id/events", get(get_events))
        .route("/:id/payments/next", get(next_payment))
        .route("/:id/payments/closing", get(closing_payment))
        .route("/:id/collateral/requirement", get(collateral_requirement))
        .route("/:id/fund", post(fund))
        .route("/:id/collateral/post", post(post_collateral))
        .route("/:id/collateral/remove", post(remove_collateral))
        .route("/:id/drawdown", post(drawdown))
        .route("/:id/return", post(return_funds))
        .route("/:id/pay", post(pay))
        .route("/:id/close", post(close))
        .route("/:id/claim", post(claim))
        .route("/:id/repossess", post(repossess))
        .route("/:id/skim", post(skim))
        .route("/:id/borrower", post(set_borrower))
        .route("/:id/lender", post(set_lender))
        .route("/:id/refinance/propose", post(propose))
        .route("/:id/refinance/accept", post(accept))
}

fn loan_error(err: LoanError) -> (StatusCode, Json<ApiError>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiError::new(err.error_code(), err.to_string())))
}

fn bad_request(err: ApiError) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(err))
}

fn not_found(id: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::not_found(format!("loan {} not found", id))),
    )
}

fn parse_amount(field: &str, value: &str) -> ApiResult<u128> {
    crate::dto::parse_amount(field, value).map_err(bad_request)
}

fn parse_calls(calls: &[crate::dto::RefinanceCallDto]) -> ApiResult<Vec<RefinanceCall>> {
    calls
        .iter()
        .map(|call| call.to_call().map_err(bad_request))
        .collect()
}

/// POST /loans - Initialize a new loan
pub async fn create_loan(
    State(state): State<AppState>,
    Json(request): Json<CreateLoanRequest>,
) -> ApiResult<Json<CreateLoanResponse>> {
    let init = request.to_init().map_err(bad_request)?;
    let mut host = state.write().await;
    let id = host.create_loan(init).map_err(loan_error)?;
    let view = host.loans[&id].view();
    tracing::info!("initialized loan {}", id);
    Ok(Json(CreateLoanResponse {
        id,
        view: view.into(),
    }))
}

/// GET /loans - List hosted loans
pub async fn list_loans(State(state): State<AppState>) -> Json<LoansResponse> {
    let host = state.read().await;
    let mut loans: Vec<LoanSummaryDto> = host
        .loans
        .iter()
        .map(|(id, contract)| LoanSummaryDto {
            id: id.clone(),
            borrower: contract.loan().borrower.to_string(),
            principal: contract.loan().principal.to_string(),
            active: contract.loan().is_active(),
        })
        .collect();
    loans.sort_by(|a, b| a.id.cmp(&b.id));
    let count = loans.len();
    Json(LoansResponse { loans, count })
}

/// GET /loans/{id} - Loan projection
pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LoanViewDto>> {
    let host = state.read().await;
    let contract = host.loans.get(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(contract.view().into()))
}

/// GET /loans/{id}/events - Recorded events
pub async fn get_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EventsResponse>> {
    let host = state.read().await;
    let contract = host.loans.get(&id).ok_or_else(|| not_found(&id))?;
    let events: Vec<EventDto> = contract.events().iter().map(EventDto::from).collect();
    let count = events.len();
    Ok(Json(EventsResponse { events, count }))
}

#[derive(Debug, Deserialize)]
pub struct NowQuery {
    /// Defaults to the host clock
    pub now: Option<u64>,
}

/// GET /loans/{id}/payments/next - Preview the next payment
pub async fn next_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<NowQuery>,
) -> ApiResult<Json<BreakdownResponse>> {
    let host = state.read().await;
    let contract = host.loans.get(&id).ok_or_else(|| not_found(&id))?;
    let now = query.now.unwrap_or(host.clock);
    let (principal, interest) = contract.next_payment_breakdown(now).map_err(loan_error)?;
    Ok(Json(BreakdownResponse {
        principal: principal.to_string(),
        interest: interest.to_string(),
        total: (principal + interest).to_string(),
    }))
}

/// GET /loans/{id}/payments/closing - Preview the early-repayment total
pub async fn closing_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BreakdownResponse>> {
    let host = state.read().await;
    let contract = host.loans.get(&id).ok_or_else(|| not_found(&id))?;
    let (principal, interest) = contract.closing_payment_breakdown().map_err(loan_error)?;
    Ok(Json(BreakdownResponse {
        principal: principal.to_string(),
        interest: interest.to_string(),
        total: (principal + interest).to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DrawdownQuery {
    pub drawdown: String,
}

/// GET /loans/{id}/collateral/requirement?drawdown= - Collateral needed
/// before drawing that amount down
pub async fn collateral_requirement(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DrawdownQuery>,
) -> ApiResult<Json<CollateralRequirementResponse>> {
    let drawdown = parse_amount("drawdown", &query.drawdown)?;
    let host = state.read().await;
    let contract = host.loans.get(&id).ok_or_else(|| not_found(&id))?;
    let additional = contract
        .loan()
        .additional_collateral_required_for(drawdown)
        .ok_or_else(|| {
            bad_request(ApiError::new(
                "arithmetic_overflow",
                "collateral requirement not representable",
            ))
        })?;
    Ok(Json(CollateralRequirementResponse {
        drawdown: drawdown.to_string(),
        additional_collateral: additional.to_string(),
    }))
}

/// POST /loans/{id}/fund - Bind the lender and start the schedule
pub async fn fund(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FundRequest>,
) -> ApiResult<Json<AmountResponse>> {
    let lender = request.lender.to_capability();
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    let amount = contract
        .fund_loan(&ctx, assets, &lender)
        .map_err(loan_error)?;
    Ok(Json(AmountResponse {
        amount: amount.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/collateral/post - Credit unaccounted collateral
pub async fn post_collateral(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CallerRequest>,
) -> ApiResult<Json<AmountResponse>> {
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    let amount = contract
        .post_collateral(&ctx, assets)
        .map_err(loan_error)?;
    Ok(Json(AmountResponse {
        amount: amount.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/collateral/remove - Release collateral
pub async fn remove_collateral(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TransferOutRequest>,
) -> ApiResult<Json<AmountResponse>> {
    let amount = parse_amount("amount", &request.amount)?;
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    contract
        .remove_collateral(&ctx, assets, amount, &AccountId::new(request.destination))
        .map_err(loan_error)?;
    Ok(Json(AmountResponse {
        amount: amount.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/drawdown - Withdraw drawable funds
pub async fn drawdown(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TransferOutRequest>,
) -> ApiResult<Json<AmountResponse>> {
    let amount = parse_amount("amount", &request.amount)?;
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    contract
        .drawdown_funds(&ctx, assets, amount, &AccountId::new(request.destination))
        .map_err(loan_error)?;
    Ok(Json(AmountResponse {
        amount: amount.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/return - Credit unaccounted funds back to drawable
pub async fn return_funds(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CallerRequest>,
) -> ApiResult<Json<AmountResponse>> {
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    let amount = contract.return_funds(&ctx, assets).map_err(loan_error)?;
    Ok(Json(AmountResponse {
        amount: amount.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/pay - Settle the next scheduled payment
pub async fn pay(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CallerRequest>,
) -> ApiResult<Json<PaymentResponse>> {
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    let (principal, interest) = contract.make_payment(&ctx, assets).map_err(loan_error)?;
    Ok(Json(PaymentResponse {
        principal: principal.to_string(),
        interest: interest.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/close - Repay the whole loan early
pub async fn close(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CallerRequest>,
) -> ApiResult<Json<PaymentResponse>> {
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    let (principal, interest) = contract.close_loan(&ctx, assets).map_err(loan_error)?;
    Ok(Json(PaymentResponse {
        principal: principal.to_string(),
        interest: interest.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/claim - Withdraw accumulated payments (lender)
pub async fn claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TransferOutRequest>,
) -> ApiResult<Json<AmountResponse>> {
    let amount = parse_amount("amount", &request.amount)?;
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    contract
        .claim_funds(&ctx, assets, amount, &AccountId::new(request.destination))
        .map_err(loan_error)?;
    Ok(Json(AmountResponse {
        amount: amount.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/repossess - Seize all balances after default
pub async fn repossess(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RepossessRequest>,
) -> ApiResult<Json<RepossessResponse>> {
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    let (collateral, funds) = contract
        .repossess(&ctx, assets, &AccountId::new(request.destination))
        .map_err(loan_error)?;
    tracing::info!("loan {} repossessed", id);
    Ok(Json(RepossessResponse {
        collateral: collateral.to_string(),
        funds: funds.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/skim - Sweep a stray asset
pub async fn skim(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SkimRequest>,
) -> ApiResult<Json<AmountResponse>> {
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    let amount = contract
        .skim(
            &ctx,
            assets,
            &AssetId::new(request.asset),
            &AccountId::new(request.destination),
        )
        .map_err(loan_error)?;
    Ok(Json(AmountResponse {
        amount: amount.to_string(),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/borrower - Transfer the borrower role
pub async fn set_borrower(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RoleRequest>,
) -> ApiResult<Json<LoanViewDto>> {
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    contract
        .set_borrower(&ctx, AccountId::new(request.account))
        .map_err(loan_error)?;
    Ok(Json(contract.view().into()))
}

/// POST /loans/{id}/lender - Transfer the lender role
pub async fn set_lender(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RoleRequest>,
) -> ApiResult<Json<LoanViewDto>> {
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    contract
        .set_lender(&ctx, AccountId::new(request.account))
        .map_err(loan_error)?;
    Ok(Json(contract.view().into()))
}

/// POST /loans/{id}/refinance/propose - Record or clear a proposal
pub async fn propose(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RefinanceRequest>,
) -> ApiResult<Json<ProposeResponse>> {
    let calls = parse_calls(&request.calls)?;
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    let commitment = contract
        .propose_new_terms(&ctx, &AccountId::new(request.refinancer), &calls)
        .map_err(loan_error)?;
    Ok(Json(ProposeResponse {
        commitment: commitment.map(|hash| hash.to_hex()),
        view: contract.view().into(),
    }))
}

/// POST /loans/{id}/refinance/accept - Replay a proposed call sequence
pub async fn accept(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RefinanceRequest>,
) -> ApiResult<Json<LoanViewDto>> {
    let calls = parse_calls(&request.calls)?;
    let mut host = state.write().await;
    let now = host.clock;
    let pause = host.pause;
    let Host { loans, assets, .. } = &mut *host;
    let contract = loans.get_mut(&id).ok_or_else(|| not_found(&id))?;
    let ctx = Context::new(AccountId::new(request.caller), now, &pause);
    contract
        .accept_new_terms(&ctx, assets, &AccountId::new(request.refinancer), &calls)
        .map_err(loan_error)?;
    tracing::info!("loan {} accepted new terms", id);
    Ok(Json(contract.view().into()))
}
