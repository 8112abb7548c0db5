//! Covenant Loan Engine
//!
//! A single-contract-per-loan state machine: collateralized fixed-term
//! loans between one borrower and one lender, amortized in closed form
//! over scaled fixed-point integers, reconciled against externally held
//! asset balances on every transition, and refinanced through a
//! hash-committed two-phase protocol.

pub mod calculator;
pub mod capabilities;
pub mod constants;
pub mod contract;
pub mod events;
pub mod ledger;
pub mod refinance;
pub mod state;

pub use calculator::{installment, periodic_rate, scaled_exponent};
pub use capabilities::{
    AssetDriver, InMemoryAssets, LenderCapability, PauseSwitch, ProtocolGlobals, StaticLender,
};
pub use contract::{Context, LoanContract};
pub use events::Event;
pub use ledger::required_collateral_for;
pub use refinance::{commitment_for, RefinanceCall};
pub use state::{Loan, LoanInit, LoanView};
