//! Data Transfer Objects for API requests and responses
//!
//! Amounts and scaled rates cross the wire as decimal strings; the
//! engine's integer width does not fit JSON numbers.

use serde::{Deserialize, Serialize};

use covenant_core::{AccountId, Amount, AssetId};
use covenant_loan::{Event, LoanInit, LoanView, RefinanceCall, StaticLender};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Loans this host currently carries
    pub loans: usize,
    /// Whether the protocol pause switch is on
    pub paused: bool,
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }
}

pub(crate) fn parse_amount(field: &str, value: &str) -> Result<Amount, ApiError> {
    value
        .parse::<Amount>()
        .map_err(|_| ApiError::bad_request(format!("{} is not a valid amount", field)))
}

fn zero() -> String {
    "0".to_string()
}

// =============================================================================
// Loan DTOs
// =============================================================================

/// Loan creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLoanRequest {
    pub borrower: String,
    pub collateral_asset: String,
    pub funds_asset: String,
    #[serde(default)]
    pub grace_period: u64,
    pub payment_interval: u64,
    pub payments: u32,
    #[serde(default = "zero")]
    pub collateral_required: String,
    pub principal_requested: String,
    #[serde(default = "zero")]
    pub ending_principal: String,
    #[serde(default = "zero")]
    pub interest_rate: String,
    #[serde(default = "zero")]
    pub late_fee_rate: String,
    #[serde(default = "zero")]
    pub late_interest_premium: String,
    #[serde(default = "zero")]
    pub closing_rate: String,
}

impl CreateLoanRequest {
    pub fn to_init(&self) -> Result<LoanInit, ApiError> {
        Ok(LoanInit {
            borrower: AccountId::new(self.borrower.clone()),
            collateral_asset: AssetId::new(self.collateral_asset.clone()),
            funds_asset: AssetId::new(self.funds_asset.clone()),
            grace_period: self.grace_period,
            payment_interval: self.payment_interval,
            payments: self.payments,
            collateral_required: parse_amount("collateral_required", &self.collateral_required)?,
            principal_requested: parse_amount("principal_requested", &self.principal_requested)?,
            ending_principal: parse_amount("ending_principal", &self.ending_principal)?,
            interest_rate: parse_amount("interest_rate", &self.interest_rate)?,
            late_fee_rate: parse_amount("late_fee_rate", &self.late_fee_rate)?,
            late_interest_premium: parse_amount(
                "late_interest_premium",
                &self.late_interest_premium,
            )?,
            closing_rate: parse_amount("closing_rate", &self.closing_rate)?,
        })
    }
}

/// Full loan projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanViewDto {
    pub account: String,
    pub borrower: String,
    pub lender: Option<String>,
    pub collateral_asset: String,
    pub funds_asset: String,
    pub grace_period: u64,
    pub payment_interval: u64,
    pub interest_rate: String,
    pub late_fee_rate: String,
    pub late_interest_premium: String,
    pub closing_rate: String,
    pub collateral_required: String,
    pub principal_requested: String,
    pub ending_principal: String,
    pub drawable_funds: String,
    pub claimable_funds: String,
    pub collateral: String,
    pub principal: String,
    pub next_payment_due_date: u64,
    pub payments_remaining: u32,
    pub active: bool,
    pub refinance_commitment: Option<String>,
}

impl From<LoanView> for LoanViewDto {
    fn from(view: LoanView) -> Self {
        Self {
            account: view.account.to_string(),
            borrower: view.borrower.to_string(),
            lender: view.lender.map(|lender| lender.to_string()),
            collateral_asset: view.collateral_asset.to_string(),
            funds_asset: view.funds_asset.to_string(),
            grace_period: view.grace_period,
            payment_interval: view.payment_interval,
            interest_rate: view.interest_rate.to_string(),
            late_fee_rate: view.late_fee_rate.to_string(),
            late_interest_premium: view.late_interest_premium.to_string(),
            closing_rate: view.closing_rate.to_string(),
            collateral_required: view.collateral_required.to_string(),
            principal_requested: view.principal_requested.to_string(),
            ending_principal: view.ending_principal.to_string(),
            drawable_funds: view.drawable_funds.to_string(),
            claimable_funds: view.claimable_funds.to_string(),
            collateral: view.collateral.to_string(),
            principal: view.principal.to_string(),
            next_payment_due_date: view.next_payment_due_date,
            payments_remaining: view.payments_remaining,
            active: view.active,
            refinance_commitment: view.refinance_commitment.map(|hash| hash.to_hex()),
        }
    }
}

/// One row of the loan listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSummaryDto {
    pub id: String,
    pub borrower: String,
    pub principal: String,
    pub active: bool,
}

/// List of hosted loans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoansResponse {
    pub loans: Vec<LoanSummaryDto>,
    pub count: usize,
}

/// Loan creation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLoanResponse {
    pub id: String,
    pub view: LoanViewDto,
}

/// Lender capability presented at fund time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LenderDto {
    pub account: String,
    #[serde(default)]
    pub treasury_fee_bps: u64,
    #[serde(default)]
    pub delegate_fee_bps: u64,
    /// Defaults to the lender account when omitted
    pub treasury: Option<String>,
    /// Defaults to the lender account when omitted
    pub delegate: Option<String>,
}

impl LenderDto {
    pub fn to_capability(&self) -> StaticLender {
        StaticLender {
            account: AccountId::new(self.account.clone()),
            treasury_fee_bps: self.treasury_fee_bps,
            delegate_fee_bps: self.delegate_fee_bps,
            treasury: AccountId::new(self.treasury.clone().unwrap_or_else(|| self.account.clone())),
            delegate: AccountId::new(self.delegate.clone().unwrap_or_else(|| self.account.clone())),
        }
    }
}

/// Fund request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRequest {
    pub caller: String,
    pub lender: LenderDto,
}

/// An operation that only names its caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerRequest {
    pub caller: String,
}

/// An operation moving an amount to a destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutRequest {
    pub caller: String,
    pub amount: String,
    pub destination: String,
}

/// Repossession request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepossessRequest {
    pub caller: String,
    pub destination: String,
}

/// Skim request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkimRequest {
    pub caller: String,
    pub asset: String,
    pub destination: String,
}

/// Role transfer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRequest {
    pub caller: String,
    pub account: String,
}

/// Amount moved by an operation, plus the post-state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountResponse {
    pub amount: String,
    pub view: LoanViewDto,
}

/// Payment result, plus the post-state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub principal: String,
    pub interest: String,
    pub view: LoanViewDto,
}

/// Payment preview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownResponse {
    pub principal: String,
    pub interest: String,
    pub total: String,
}

/// Repossession result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepossessResponse {
    pub collateral: String,
    pub funds: String,
    pub view: LoanViewDto,
}

/// Additional collateral needed ahead of a drawdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralRequirementResponse {
    pub drawdown: String,
    pub additional_collateral: String,
}

// =============================================================================
// Refinance DTOs
// =============================================================================

/// One refinance mutation on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RefinanceCallDto {
    DecreasePrincipal { amount: String },
    IncreasePrincipal { amount: String },
    SetClosingRate { rate: String },
    SetCollateralRequired { amount: String },
    SetEndingPrincipal { amount: String },
    SetGracePeriod { seconds: u64 },
    SetInterestRate { rate: String },
    SetLateFeeRate { rate: String },
    SetLateInterestPremium { rate: String },
    SetPaymentInterval { seconds: u64 },
    SetPaymentsRemaining { payments: u32 },
}

impl RefinanceCallDto {
    pub fn to_call(&self) -> Result<RefinanceCall, ApiError> {
        Ok(match self {
            Self::DecreasePrincipal { amount } => RefinanceCall::DecreasePrincipal {
                amount: parse_amount("amount", amount)?,
            },
            Self::IncreasePrincipal { amount } => RefinanceCall::IncreasePrincipal {
                amount: parse_amount("amount", amount)?,
            },
            Self::SetClosingRate { rate } => RefinanceCall::SetClosingRate {
                rate: parse_amount("rate", rate)?,
            },
            Self::SetCollateralRequired { amount } => RefinanceCall::SetCollateralRequired {
                amount: parse_amount("amount", amount)?,
            },
            Self::SetEndingPrincipal { amount } => RefinanceCall::SetEndingPrincipal {
                amount: parse_amount("amount", amount)?,
            },
            Self::SetGracePeriod { seconds } => {
                RefinanceCall::SetGracePeriod { seconds: *seconds }
            }
            Self::SetInterestRate { rate } => RefinanceCall::SetInterestRate {
                rate: parse_amount("rate", rate)?,
            },
            Self::SetLateFeeRate { rate } => RefinanceCall::SetLateFeeRate {
                rate: parse_amount("rate", rate)?,
            },
            Self::SetLateInterestPremium { rate } => RefinanceCall::SetLateInterestPremium {
                rate: parse_amount("rate", rate)?,
            },
            Self::SetPaymentInterval { seconds } => {
                RefinanceCall::SetPaymentInterval { seconds: *seconds }
            }
            Self::SetPaymentsRemaining { payments } => RefinanceCall::SetPaymentsRemaining {
                payments: *payments,
            },
        })
    }

    pub fn from_call(call: &RefinanceCall) -> Self {
        match *call {
            RefinanceCall::DecreasePrincipal { amount } => Self::DecreasePrincipal {
                amount: amount.to_string(),
            },
            RefinanceCall::IncreasePrincipal { amount } => Self::IncreasePrincipal {
                amount: amount.to_string(),
            },
            RefinanceCall::SetClosingRate { rate } => Self::SetClosingRate {
                rate: rate.to_string(),
            },
            RefinanceCall::SetCollateralRequired { amount } => Self::SetCollateralRequired {
                amount: amount.to_string(),
            },
            RefinanceCall::SetEndingPrincipal { amount } => Self::SetEndingPrincipal {
                amount: amount.to_string(),
            },
            RefinanceCall::SetGracePeriod { seconds } => Self::SetGracePeriod { seconds },
            RefinanceCall::SetInterestRate { rate } => Self::SetInterestRate {
                rate: rate.to_string(),
            },
            RefinanceCall::SetLateFeeRate { rate } => Self::SetLateFeeRate {
                rate: rate.to_string(),
            },
            RefinanceCall::SetLateInterestPremium { rate } => Self::SetLateInterestPremium {
                rate: rate.to_string(),
            },
            RefinanceCall::SetPaymentInterval { seconds } => Self::SetPaymentInterval { seconds },
            RefinanceCall::SetPaymentsRemaining { payments } => {
                Self::SetPaymentsRemaining { payments }
            }
        }
    }
}

/// Refinance proposal / acceptance request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinanceRequest {
    pub caller: String,
    pub refinancer: String,
    #[serde(default)]
    pub calls: Vec<RefinanceCallDto>,
}

/// Proposal response: the commitment now pending, if any
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeResponse {
    pub commitment: Option<String>,
    pub view: LoanViewDto,
}

// =============================================================================
// Event DTOs
// =============================================================================

/// A recorded loan event with string-encoded amounts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventDto {
    Initialized {
        borrower: String,
        collateral_asset: String,
        funds_asset: String,
        grace_period: u64,
        payment_interval: u64,
        payments: u32,
        collateral_required: String,
        principal_requested: String,
        ending_principal: String,
        interest_rate: String,
        late_fee_rate: String,
        late_interest_premium: String,
        closing_rate: String,
    },
    BorrowerSet {
        borrower: String,
    },
    LenderSet {
        lender: String,
    },
    Funded {
        lender: String,
        amount: String,
        next_payment_due_date: u64,
    },
    CollateralPosted {
        amount: String,
    },
    CollateralRemoved {
        amount: String,
        destination: String,
    },
    FundsDrawnDown {
        amount: String,
        destination: String,
    },
    FundsReturned {
        amount: String,
    },
    FundsClaimed {
        amount: String,
        destination: String,
    },
    PaymentMade {
        principal: String,
        interest: String,
    },
    LoanClosed {
        principal: String,
        interest: String,
    },
    NewTermsProposed {
        commitment: Option<String>,
        refinancer: String,
        calls: Vec<RefinanceCallDto>,
    },
    NewTermsAccepted {
        commitment: String,
        refinancer: String,
        calls: Vec<RefinanceCallDto>,
    },
    Repossessed {
        collateral: String,
        funds: String,
        destination: String,
    },
    Skimmed {
        asset: String,
        amount: String,
        destination: String,
    },
}

impl From<&Event> for EventDto {
    fn from(event: &Event) -> Self {
        match event {
            Event::Initialized {
                borrower,
                collateral_asset,
                funds_asset,
                grace_period,
                payment_interval,
                payments,
                collateral_required,
                principal_requested,
                ending_principal,
                interest_rate,
                late_fee_rate,
                late_interest_premium,
                closing_rate,
            } => Self::Initialized {
                borrower: borrower.to_string(),
                collateral_asset: collateral_asset.to_string(),
                funds_asset: funds_asset.to_string(),
                grace_period: *grace_period,
                payment_interval: *payment_interval,
                payments: *payments,
                collateral_required: collateral_required.to_string(),
                principal_requested: principal_requested.to_string(),
                ending_principal: ending_principal.to_string(),
                interest_rate: interest_rate.to_string(),
                late_fee_rate: late_fee_rate.to_string(),
                late_interest_premium: late_interest_premium.to_string(),
                closing_rate: closing_rate.to_string(),
            },
            Event::BorrowerSet { borrower } => Self::BorrowerSet {
                borrower: borrower.to_string(),
            },
            Event::LenderSet { lender } => Self::LenderSet {
                lender: lender.to_string(),
            },
            Event::Funded {
                lender,
                amount,
                next_payment_due_date,
            } => Self::Funded {
                lender: lender.to_string(),
                amount: amount.to_string(),
                next_payment_due_date: *next_payment_due_date,
            },
            Event::CollateralPosted { amount } => Self::CollateralPosted {
                amount: amount.to_string(),
            },
            Event::CollateralRemoved { amount, destination } => Self::CollateralRemoved {
                amount: amount.to_string(),
                destination: destination.to_string(),
            },
            Event::FundsDrawnDown { amount, destination } => Self::FundsDrawnDown {
                amount: amount.to_string(),
                destination: destination.to_string(),
            },
            Event::FundsReturned { amount } => Self::FundsReturned {
                amount: amount.to_string(),
            },
            Event::FundsClaimed { amount, destination } => Self::FundsClaimed {
                amount: amount.to_string(),
                destination: destination.to_string(),
            },
            Event::PaymentMade { principal, interest } => Self::PaymentMade {
                principal: principal.to_string(),
                interest: interest.to_string(),
            },
            Event::LoanClosed { principal, interest } => Self::LoanClosed {
                principal: principal.to_string(),
                interest: interest.to_string(),
            },
            Event::NewTermsProposed {
                commitment,
                refinancer,
                calls,
            } => Self::NewTermsProposed {
                commitment: commitment.as_ref().map(|hash| hash.to_hex()),
                refinancer: refinancer.to_string(),
                calls: calls.iter().map(RefinanceCallDto::from_call).collect(),
            },
            Event::NewTermsAccepted {
                commitment,
                refinancer,
                calls,
            } => Self::NewTermsAccepted {
                commitment: commitment.to_hex(),
                refinancer: refinancer.to_string(),
                calls: calls.iter().map(RefinanceCallDto::from_call).collect(),
            },
            Event::Repossessed {
                collateral,
                funds,
                destination,
            } => Self::Repossessed {
                collateral: collateral.to_string(),
                funds: funds.to_string(),
                destination: destination.to_string(),
            },
            Event::Skimmed {
                asset,
                amount,
                destination,
            } => Self::Skimmed {
                asset: asset.to_string(),
                amount: amount.to_string(),
                destination: destination.to_string(),
            },
        }
    }
}

/// Event log response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<EventDto>,
    pub count: usize,
}

// =============================================================================
// Host DTOs
// =============================================================================

/// Clock advance request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockRequest {
    pub now: u64,
}

/// Host status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostStatusResponse {
    pub now: u64,
    pub paused: bool,
    pub loan_count: usize,
}

/// Pause switch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseRequest {
    pub paused: bool,
}

/// Mint request (seeding demo balances)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRequest {
    pub asset: String,
    pub account: String,
    pub amount: String,
}

/// Asset transfer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetTransferRequest {
    pub asset: String,
    pub from: String,
    pub to: String,
    pub amount: String,
}

/// Balance response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub asset: String,
    pub account: String,
    pub amount: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("x", "12345").unwrap(), 12_345);
        assert!(parse_amount("x", "12.5").is_err());
        assert!(parse_amount("x", "-1").is_err());
    }

    #[test]
    fn test_create_loan_request_defaults() {
        let json = r#"{
            "borrower": "b",
            "collateral_asset": "gold",
            "funds_asset": "usd",
            "payment_interval": 2592000,
            "payments": 12,
            "principal_requested": "1000"
        }"#;
        let request: CreateLoanRequest = serde_json::from_str(json).unwrap();
        let init = request.to_init().unwrap();
        assert_eq!(init.principal_requested, 1_000);
        assert_eq!(init.ending_principal, 0);
        assert_eq!(init.grace_period, 0);
    }

    #[test]
    fn test_refinance_call_dto_roundtrip() {
        let call = RefinanceCall::DecreasePrincipal { amount: 200 };
        let dto = RefinanceCallDto::from_call(&call);
        assert_eq!(dto.to_call().unwrap(), call);

        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains("decrease_principal"));
    }

    #[test]
    fn test_lender_dto_defaults_recipients_to_account() {
        let json = r#"{"account": "pool"}"#;
        let dto: LenderDto = serde_json::from_str(json).unwrap();
        let lender = dto.to_capability();
        assert_eq!(lender.treasury, AccountId::new("pool"));
        assert_eq!(lender.delegate, AccountId::new("pool"));
        assert_eq!(lender.treasury_fee_bps, 0);
    }

    #[test]
    fn test_event_dto_from_event() {
        let event = Event::PaymentMade {
            principal: u128::MAX,
            interest: 1,
        };
        let dto = EventDto::from(&event);
        let json = serde_json::to_string(&dto).unwrap();
        // amounts wider than a JSON number survive as strings
        assert!(json.contains(&u128::MAX.to_string()));
    }
}
