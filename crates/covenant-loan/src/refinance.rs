//! Refinance commitment protocol
//!
//! A refinance is an ordered set of term mutations. The borrower proposes
//! `(refinancer, calls)` bound by a digest; the lender accepts by
//! presenting the identical pair, which replays every call atomically and
//! re-checks collateralization. Calls are a closed enum applied by match,
//! never opaque code.

use blake2::digest::{consts::U32, Digest};
use blake2::Blake2b;
use serde::{Deserialize, Serialize};

use covenant_core::{AccountId, Amount, CommitmentHash, LoanError, Op, Result};

use crate::capabilities::AssetDriver;
use crate::state::Loan;

/// One term mutation inside a refinance proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RefinanceCall {
    DecreasePrincipal { amount: Amount },
    IncreasePrincipal { amount: Amount },
    SetClosingRate { rate: Amount },
    SetCollateralRequired { amount: Amount },
    SetEndingPrincipal { amount: Amount },
    SetGracePeriod { seconds: u64 },
    SetInterestRate { rate: Amount },
    SetLateFeeRate { rate: Amount },
    SetLateInterestPremium { rate: Amount },
    SetPaymentInterval { seconds: u64 },
    SetPaymentsRemaining { payments: u32 },
}

impl RefinanceCall {
    /// Stable one-byte tag for the canonical encoding
    fn tag(&self) -> u8 {
        match self {
            Self::DecreasePrincipal { .. } => 0x01,
            Self::IncreasePrincipal { .. } => 0x02,
            Self::SetClosingRate { .. } => 0x03,
            Self::SetCollateralRequired { .. } => 0x04,
            Self::SetEndingPrincipal { .. } => 0x05,
            Self::SetGracePeriod { .. } => 0x06,
            Self::SetInterestRate { .. } => 0x07,
            Self::SetLateFeeRate { .. } => 0x08,
            Self::SetLateInterestPremium { .. } => 0x09,
            Self::SetPaymentInterval { .. } => 0x0a,
            Self::SetPaymentsRemaining { .. } => 0x0b,
        }
    }

    /// Argument widened to the encoding's fixed 16-byte slot
    fn argument(&self) -> u128 {
        match *self {
            Self::DecreasePrincipal { amount }
            | Self::IncreasePrincipal { amount }
            | Self::SetCollateralRequired { amount }
            | Self::SetEndingPrincipal { amount } => amount,
            Self::SetClosingRate { rate }
            | Self::SetInterestRate { rate }
            | Self::SetLateFeeRate { rate }
            | Self::SetLateInterestPremium { rate } => rate,
            Self::SetGracePeriod { seconds } | Self::SetPaymentInterval { seconds } => {
                seconds as u128
            }
            Self::SetPaymentsRemaining { payments } => payments as u128,
        }
    }
}

/// Canonical encoding: length-prefixed refinancer id, then per call one
/// tag byte and a 16-byte big-endian argument
fn canonical_encode(refinancer: &AccountId, calls: &[RefinanceCall]) -> Vec<u8> {
    let id = refinancer.as_str().as_bytes();
    let mut buf = Vec::with_capacity(4 + id.len() + calls.len() * 17);
    buf.extend_from_slice(&(id.len() as u32).to_be_bytes());
    buf.extend_from_slice(id);
    for call in calls {
        buf.push(call.tag());
        buf.extend_from_slice(&call.argument().to_be_bytes());
    }
    buf
}

/// Digest binding a `(refinancer, calls)` proposal
pub fn commitment_for(refinancer: &AccountId, calls: &[RefinanceCall]) -> CommitmentHash {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(canonical_encode(refinancer, calls));
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    CommitmentHash(out)
}

/// Apply one mutation to `loan`, reading unaccounted funds through
/// `assets`. Callers stage the loan and commit only when the whole call
/// sequence succeeds.
pub(crate) fn apply_call(
    loan: &mut Loan,
    assets: &dyn AssetDriver,
    call: &RefinanceCall,
    op: Op,
) -> Result<()> {
    match *call {
        RefinanceCall::DecreasePrincipal { amount } => {
            if loan.drawable_funds < amount {
                return Err(LoanError::Invariant {
                    op,
                    check: "insufficient_drawable_funds",
                });
            }
            let principal = loan.principal.checked_sub(amount).ok_or(LoanError::Invariant {
                op,
                check: "decrease_exceeds_principal",
            })?;
            let requested = loan
                .principal_requested
                .checked_sub(amount)
                .filter(|requested| *requested > 0)
                .ok_or(LoanError::Invariant {
                    op,
                    check: "principal_requested_exhausted",
                })?;
            if principal < loan.ending_principal {
                return Err(LoanError::Invariant {
                    op,
                    check: "ending_principal_exceeds_principal",
                });
            }
            loan.principal = principal;
            loan.principal_requested = requested;
            loan.drawable_funds -= amount;
        }
        RefinanceCall::IncreasePrincipal { amount } => {
            let funds_asset = loan.funds_asset.clone();
            if loan.unaccounted(assets, &funds_asset) < amount {
                return Err(LoanError::Invariant {
                    op,
                    check: "insufficient_unaccounted_funds",
                });
            }
            loan.principal = loan
                .principal
                .checked_add(amount)
                .ok_or(LoanError::Arithmetic { op, context: "principal" })?;
            loan.principal_requested = loan
                .principal_requested
                .checked_add(amount)
                .ok_or(LoanError::Arithmetic { op, context: "principal_requested" })?;
            loan.drawable_funds = loan
                .drawable_funds
                .checked_add(amount)
                .ok_or(LoanError::Arithmetic { op, context: "drawable_funds" })?;
        }
        RefinanceCall::SetClosingRate { rate } => loan.closing_rate = rate,
        RefinanceCall::SetCollateralRequired { amount } => loan.collateral_required = amount,
        RefinanceCall::SetEndingPrincipal { amount } => {
            if amount > loan.principal {
                return Err(LoanError::Invariant {
                    op,
                    check: "ending_principal_exceeds_principal",
                });
            }
            loan.ending_principal = amount;
        }
        RefinanceCall::SetGracePeriod { seconds } => loan.grace_period = seconds,
        RefinanceCall::SetInterestRate { rate } => loan.interest_rate = rate,
        RefinanceCall::SetLateFeeRate { rate } => loan.late_fee_rate = rate,
        RefinanceCall::SetLateInterestPremium { rate } => loan.late_interest_premium = rate,
        RefinanceCall::SetPaymentInterval { seconds } => {
            if seconds == 0 {
                return Err(LoanError::Invariant {
                    op,
                    check: "zero_payment_interval",
                });
            }
            loan.payment_interval = seconds;
        }
        RefinanceCall::SetPaymentsRemaining { payments } => {
            if payments == 0 {
                return Err(LoanError::Invariant {
                    op,
                    check: "zero_payments_remaining",
                });
            }
            loan.payments_remaining = payments;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::AssetId;

    use crate::capabilities::InMemoryAssets;
    use crate::state::LoanInit;

    fn refinancer() -> AccountId {
        AccountId::new("refinancer-1")
    }

    fn active_loan() -> Loan {
        let mut loan = Loan::from_init(
            AccountId::new("loan-1"),
            AccountId::new("factory"),
            LoanInit {
                borrower: AccountId::new("borrower"),
                collateral_asset: AssetId::new("gold"),
                funds_asset: AssetId::new("usd"),
                grace_period: 0,
                payment_interval: 30 * 86_400,
                payments: 12,
                collateral_required: 0,
                principal_requested: 1_000,
                ending_principal: 0,
                interest_rate: 0,
                late_fee_rate: 0,
                late_interest_premium: 0,
                closing_rate: 0,
            },
        );
        loan.principal = 1_000;
        loan.drawable_funds = 500;
        loan.next_payment_due_date = 1;
        loan
    }

    #[test]
    fn test_commitment_is_deterministic() {
        let calls = vec![
            RefinanceCall::DecreasePrincipal { amount: 200 },
            RefinanceCall::SetInterestRate { rate: 42 },
        ];
        assert_eq!(
            commitment_for(&refinancer(), &calls),
            commitment_for(&refinancer(), &calls)
        );
    }

    #[test]
    fn test_commitment_depends_on_refinancer_and_order() {
        let a = RefinanceCall::DecreasePrincipal { amount: 200 };
        let b = RefinanceCall::SetInterestRate { rate: 42 };
        let forward = commitment_for(&refinancer(), &[a, b]);
        let reversed = commitment_for(&refinancer(), &[b, a]);
        let other = commitment_for(&AccountId::new("refinancer-2"), &[a, b]);
        assert_ne!(forward, reversed);
        assert_ne!(forward, other);
    }

    #[test]
    fn test_commitment_distinguishes_call_kinds_with_same_argument() {
        let grace = commitment_for(&refinancer(), &[RefinanceCall::SetGracePeriod { seconds: 7 }]);
        let interval =
            commitment_for(&refinancer(), &[RefinanceCall::SetPaymentInterval { seconds: 7 }]);
        assert_ne!(grace, interval);
    }

    #[test]
    fn test_decrease_principal_moves_all_three() {
        let mut loan = active_loan();
        let assets = InMemoryAssets::new();
        apply_call(
            &mut loan,
            &assets,
            &RefinanceCall::DecreasePrincipal { amount: 200 },
            Op::AcceptNewTerms,
        )
        .unwrap();
        assert_eq!(loan.principal, 800);
        assert_eq!(loan.principal_requested, 800);
        assert_eq!(loan.drawable_funds, 300);
    }

    #[test]
    fn test_decrease_principal_requires_drawable() {
        let mut loan = active_loan();
        loan.drawable_funds = 100;
        let assets = InMemoryAssets::new();
        let err = apply_call(
            &mut loan,
            &assets,
            &RefinanceCall::DecreasePrincipal { amount: 200 },
            Op::AcceptNewTerms,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "accept_new_terms:insufficient_drawable_funds");
    }

    #[test]
    fn test_increase_principal_requires_unaccounted_funds() {
        let mut loan = active_loan();
        let mut assets = InMemoryAssets::new();
        let err = apply_call(
            &mut loan,
            &assets,
            &RefinanceCall::IncreasePrincipal { amount: 300 },
            Op::AcceptNewTerms,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "accept_new_terms:insufficient_unaccounted_funds");

        // the lender wires in 300 first; buckets claim 500 drawable
        assets.mint(&loan.funds_asset, &loan.account, 800);
        apply_call(
            &mut loan,
            &assets,
            &RefinanceCall::IncreasePrincipal { amount: 300 },
            Op::AcceptNewTerms,
        )
        .unwrap();
        assert_eq!(loan.principal, 1_300);
        assert_eq!(loan.principal_requested, 1_300);
        assert_eq!(loan.drawable_funds, 800);
    }

    #[test]
    fn test_set_ending_principal_capped_by_principal() {
        let mut loan = active_loan();
        let assets = InMemoryAssets::new();
        assert!(apply_call(
            &mut loan,
            &assets,
            &RefinanceCall::SetEndingPrincipal { amount: 1_000 },
            Op::AcceptNewTerms,
        )
        .is_ok());
        let err = apply_call(
            &mut loan,
            &assets,
            &RefinanceCall::SetEndingPrincipal { amount: 1_001 },
            Op::AcceptNewTerms,
        )
        .unwrap_err();
        assert_eq!(
            err.error_code(),
            "accept_new_terms:ending_principal_exceeds_principal"
        );
    }

    #[test]
    fn test_zero_interval_and_payments_rejected() {
        let mut loan = active_loan();
        let assets = InMemoryAssets::new();
        assert!(apply_call(
            &mut loan,
            &assets,
            &RefinanceCall::SetPaymentInterval { seconds: 0 },
            Op::AcceptNewTerms,
        )
        .is_err());
        assert!(apply_call(
            &mut loan,
            &assets,
            &RefinanceCall::SetPaymentsRemaining { payments: 0 },
            Op::AcceptNewTerms,
        )
        .is_err());
    }

    #[test]
    fn test_call_serde_roundtrip() {
        let call = RefinanceCall::SetPaymentsRemaining { payments: 6 };
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("set_payments_remaining"));
        let parsed: RefinanceCall = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, call);
    }
}
