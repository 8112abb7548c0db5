//! Loan state types
//!
//! A [`Loan`] is the single long-lived entity behind one contract: two
//! parties, two assets, the term sheet, and the internal accounting
//! buckets reconciled against external balances on every transition.

use serde::{Deserialize, Serialize};

use covenant_core::{AccountId, Amount, AssetId, CommitmentHash, Timestamp};

use crate::calculator;

/// Initialization parameters, validated before any state is committed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanInit {
    pub borrower: AccountId,
    pub collateral_asset: AssetId,
    pub funds_asset: AssetId,
    /// Seconds past a missed due date before repossession becomes legal
    pub grace_period: u64,
    /// Seconds between scheduled payments
    pub payment_interval: u64,
    pub payments: u32,
    pub collateral_required: Amount,
    pub principal_requested: Amount,
    /// Balloon principal left unpaid at the scheduled end of the loan
    pub ending_principal: Amount,
    /// Annualized, scaled by 10^18
    pub interest_rate: Amount,
    /// Flat fraction of outstanding principal, scaled by 10^18
    pub late_fee_rate: Amount,
    /// Annualized premium added to the interest rate while late
    pub late_interest_premium: Amount,
    /// Flat fraction of outstanding principal on early close
    pub closing_rate: Amount,
}

/// Full state of one loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// The loan's own asset-holding identity
    pub account: AccountId,
    /// The party that performed initialization
    pub factory: AccountId,

    pub borrower: AccountId,
    /// Unset until funding
    pub lender: Option<AccountId>,

    pub collateral_asset: AssetId,
    pub funds_asset: AssetId,

    pub grace_period: u64,
    pub payment_interval: u64,
    pub interest_rate: Amount,
    pub late_fee_rate: Amount,
    pub late_interest_premium: Amount,
    pub closing_rate: Amount,
    pub collateral_required: Amount,
    pub principal_requested: Amount,
    pub ending_principal: Amount,

    pub drawable_funds: Amount,
    pub claimable_funds: Amount,
    pub collateral: Amount,
    pub principal: Amount,
    pub next_payment_due_date: Timestamp,
    pub payments_remaining: u32,

    pub refinance_commitment: Option<CommitmentHash>,
}

impl Loan {
    pub(crate) fn from_init(account: AccountId, factory: AccountId, init: LoanInit) -> Self {
        Self {
            account,
            factory,
            borrower: init.borrower,
            lender: None,
            collateral_asset: init.collateral_asset,
            funds_asset: init.funds_asset,
            grace_period: init.grace_period,
            payment_interval: init.payment_interval,
            interest_rate: init.interest_rate,
            late_fee_rate: init.late_fee_rate,
            late_interest_premium: init.late_interest_premium,
            closing_rate: init.closing_rate,
            collateral_required: init.collateral_required,
            principal_requested: init.principal_requested,
            ending_principal: init.ending_principal,
            drawable_funds: 0,
            claimable_funds: 0,
            collateral: 0,
            principal: 0,
            next_payment_due_date: 0,
            payments_remaining: init.payments,
            refinance_commitment: None,
        }
    }

    /// A loan is active from funding until final payment, close, or
    /// repossession
    pub fn is_active(&self) -> bool {
        self.next_payment_due_date > 0
    }

    /// Next scheduled payment as `(principal, interest)`, including late
    /// charges once `now` has passed the due date
    pub fn next_payment_breakdown(&self, now: Timestamp) -> Option<(Amount, Amount)> {
        calculator::payment_breakdown(
            now,
            self.next_payment_due_date,
            self.principal,
            self.ending_principal,
            self.interest_rate,
            self.late_fee_rate,
            self.late_interest_premium,
            self.payment_interval,
            self.payments_remaining,
        )
    }

    /// Early-repayment breakdown as `(principal, interest)`
    pub fn closing_payment_breakdown(&self) -> Option<(Amount, Amount)> {
        calculator::closing_breakdown(self.principal, self.closing_rate)
    }

    pub fn view(&self) -> LoanView {
        LoanView {
            account: self.account.clone(),
            borrower: self.borrower.clone(),
            lender: self.lender.clone(),
            collateral_asset: self.collateral_asset.clone(),
            funds_asset: self.funds_asset.clone(),
            grace_period: self.grace_period,
            payment_interval: self.payment_interval,
            interest_rate: self.interest_rate,
            late_fee_rate: self.late_fee_rate,
            late_interest_premium: self.late_interest_premium,
            closing_rate: self.closing_rate,
            collateral_required: self.collateral_required,
            principal_requested: self.principal_requested,
            ending_principal: self.ending_principal,
            drawable_funds: self.drawable_funds,
            claimable_funds: self.claimable_funds,
            collateral: self.collateral,
            principal: self.principal,
            next_payment_due_date: self.next_payment_due_date,
            payments_remaining: self.payments_remaining,
            active: self.is_active(),
            refinance_commitment: self.refinance_commitment,
        }
    }
}

/// Read-only projection of a loan for hosts and APIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanView {
    pub account: AccountId,
    pub borrower: AccountId,
    pub lender: Option<AccountId>,
    pub collateral_asset: AssetId,
    pub funds_asset: AssetId,
    pub grace_period: u64,
    pub payment_interval: u64,
    pub interest_rate: Amount,
    pub late_fee_rate: Amount,
    pub late_interest_premium: Amount,
    pub closing_rate: Amount,
    pub collateral_required: Amount,
    pub principal_requested: Amount,
    pub ending_principal: Amount,
    pub drawable_funds: Amount,
    pub claimable_funds: Amount,
    pub collateral: Amount,
    pub principal: Amount,
    pub next_payment_due_date: Timestamp,
    pub payments_remaining: u32,
    pub active: bool,
    pub refinance_commitment: Option<CommitmentHash>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ONE;

    pub(crate) fn sample_init() -> LoanInit {
        LoanInit {
            borrower: AccountId::new("borrower"),
            collateral_asset: AssetId::new("gold"),
            funds_asset: AssetId::new("usd"),
            grace_period: 5 * 86_400,
            payment_interval: 30 * 86_400,
            payments: 12,
            collateral_required: 400,
            principal_requested: 1_000,
            ending_principal: 0,
            interest_rate: ONE / 10,
            late_fee_rate: ONE / 100,
            late_interest_premium: ONE / 20,
            closing_rate: ONE / 10,
        }
    }

    #[test]
    fn test_fresh_loan_is_inactive() {
        let loan = Loan::from_init(
            AccountId::new("loan-1"),
            AccountId::new("factory"),
            sample_init(),
        );
        assert!(!loan.is_active());
        assert_eq!(loan.principal, 0);
        assert_eq!(loan.payments_remaining, 12);
        assert!(loan.lender.is_none());
        assert!(loan.refinance_commitment.is_none());
    }

    #[test]
    fn test_view_mirrors_state() {
        let mut loan = Loan::from_init(
            AccountId::new("loan-1"),
            AccountId::new("factory"),
            sample_init(),
        );
        loan.principal = 750;
        loan.next_payment_due_date = 42;
        let view = loan.view();
        assert_eq!(view.principal, 750);
        assert!(view.active);
        assert_eq!(view.payments_remaining, 12);
    }
}
