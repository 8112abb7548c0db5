//! Loan lifecycle events
//!
//! Recorded by the contract after ledger mutations commit, before the
//! operation returns; the host drains them for transport.

use serde::{Deserialize, Serialize};

use covenant_core::{AccountId, Amount, AssetId, CommitmentHash, Timestamp};

use crate::refinance::RefinanceCall;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Initialized {
        borrower: AccountId,
        collateral_asset: AssetId,
        funds_asset: AssetId,
        grace_period: u64,
        payment_interval: u64,
        payments: u32,
        collateral_required: Amount,
        principal_requested: Amount,
        ending_principal: Amount,
        interest_rate: Amount,
        late_fee_rate: Amount,
        late_interest_premium: Amount,
        closing_rate: Amount,
    },
    BorrowerSet {
        borrower: AccountId,
    },
    LenderSet {
        lender: AccountId,
    },
    Funded {
        lender: AccountId,
        amount: Amount,
        next_payment_due_date: Timestamp,
    },
    CollateralPosted {
        amount: Amount,
    },
    CollateralRemoved {
        amount: Amount,
        destination: AccountId,
    },
    FundsDrawnDown {
        amount: Amount,
        destination: AccountId,
    },
    FundsReturned {
        amount: Amount,
    },
    FundsClaimed {
        amount: Amount,
        destination: AccountId,
    },
    PaymentMade {
        principal: Amount,
        interest: Amount,
    },
    LoanClosed {
        principal: Amount,
        interest: Amount,
    },
    NewTermsProposed {
        commitment: Option<CommitmentHash>,
        refinancer: AccountId,
        calls: Vec<RefinanceCall>,
    },
    NewTermsAccepted {
        commitment: CommitmentHash,
        refinancer: AccountId,
        calls: Vec<RefinanceCall>,
    },
    Repossessed {
        collateral: Amount,
        funds: Amount,
        destination: AccountId,
    },
    Skimmed {
        asset: AssetId,
        amount: Amount,
        destination: AccountId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_tagging() {
        let event = Event::PaymentMade {
            principal: 90,
            interest: 10,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"payment_made\""));
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_repossessed_event_carries_both_seizures() {
        let event = Event::Repossessed {
            collateral: 300,
            funds: 1_000,
            destination: AccountId::new("vault"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("repossessed"));
        assert!(json.contains("vault"));
    }
}
