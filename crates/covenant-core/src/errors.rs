//! Error types for Covenant
//!
//! Every operation failure carries the operation it occurred in plus a
//! stable check name; `error_code()` is the public contract and does not
//! change across versions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// External operations of the loan surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Initialize,
    FundLoan,
    PostCollateral,
    RemoveCollateral,
    DrawdownFunds,
    ReturnFunds,
    MakePayment,
    CloseLoan,
    ClaimFunds,
    Repossess,
    Skim,
    SetBorrower,
    SetLender,
    ProposeNewTerms,
    AcceptNewTerms,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::FundLoan => "fund_loan",
            Self::PostCollateral => "post_collateral",
            Self::RemoveCollateral => "remove_collateral",
            Self::DrawdownFunds => "drawdown_funds",
            Self::ReturnFunds => "return_funds",
            Self::MakePayment => "make_payment",
            Self::CloseLoan => "close_loan",
            Self::ClaimFunds => "claim_funds",
            Self::Repossess => "repossess",
            Self::Skim => "skim",
            Self::SetBorrower => "set_borrower",
            Self::SetLender => "set_lender",
            Self::ProposeNewTerms => "propose_new_terms",
            Self::AcceptNewTerms => "accept_new_terms",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role a caller must hold for a gated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Borrower,
    Lender,
    BorrowerOrLender,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Borrower => "borrower",
            Self::Lender => "lender",
            Self::BorrowerOrLender => "borrower_or_lender",
        }
    }

    /// Check name used in the stable error code
    fn check(&self) -> &'static str {
        match self {
            Self::Borrower => "not_borrower",
            Self::Lender => "not_lender",
            Self::BorrowerOrLender => "not_borrower_or_lender",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by loan operations.
///
/// Each variant maps to one kind of the error taxonomy: authorization,
/// pause gate, lifecycle state, invariant, arithmetic, external call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoanError {
    #[error("{op}: caller is not the {role}")]
    Unauthorized { op: Op, role: Role },

    #[error("{op}: protocol is paused")]
    Paused { op: Op },

    #[error("{op}: {check}")]
    InvalidState { op: Op, check: &'static str },

    #[error("{op}: invariant violated: {check}")]
    Invariant { op: Op, check: &'static str },

    #[error("{op}: arithmetic overflow in {context}")]
    Arithmetic { op: Op, context: &'static str },

    #[error("{op}: external call failed: {reason}")]
    External { op: Op, reason: String },
}

impl LoanError {
    /// Operation the error occurred in
    pub fn op(&self) -> Op {
        match self {
            Self::Unauthorized { op, .. }
            | Self::Paused { op }
            | Self::InvalidState { op, .. }
            | Self::Invariant { op, .. }
            | Self::Arithmetic { op, .. }
            | Self::External { op, .. } => *op,
        }
    }

    /// Stable textual code: `"{operation}:{check}"`
    pub fn error_code(&self) -> String {
        let check = match self {
            Self::Unauthorized { role, .. } => role.check(),
            Self::Paused { .. } => "protocol_paused",
            Self::InvalidState { check, .. } => check,
            Self::Invariant { check, .. } => check,
            Self::Arithmetic { .. } => "arithmetic_overflow",
            Self::External { .. } => "external_call_failed",
        };
        format!("{}:{}", self.op(), check)
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 403,
            Self::Paused { .. } => 503,
            Self::InvalidState { .. } | Self::Invariant { .. } => 422,
            Self::Arithmetic { .. } => 422,
            Self::External { .. } => 502,
        }
    }
}

/// Result type alias for loan operations
pub type Result<T> = std::result::Result<T, LoanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = LoanError::Unauthorized {
            op: Op::DrawdownFunds,
            role: Role::Borrower,
        };
        assert_eq!(err.error_code(), "drawdown_funds:not_borrower");
        assert_eq!(err.status_code(), 403);

        let err = LoanError::Invariant {
            op: Op::MakePayment,
            check: "insufficient_funds",
        };
        assert_eq!(err.error_code(), "make_payment:insufficient_funds");
        assert_eq!(err.status_code(), 422);

        let err = LoanError::Paused { op: Op::FundLoan };
        assert_eq!(err.error_code(), "fund_loan:protocol_paused");
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_error_display_names_operation() {
        let err = LoanError::External {
            op: Op::ClaimFunds,
            reason: "transfer rejected".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("claim_funds"));
        assert!(msg.contains("transfer rejected"));
    }

    #[test]
    fn test_op_round_trips_through_serde() {
        let json = serde_json::to_string(&Op::AcceptNewTerms).unwrap();
        assert_eq!(json, "\"accept_new_terms\"");
        let op: Op = serde_json::from_str(&json).unwrap();
        assert_eq!(op, Op::AcceptNewTerms);
    }
}
