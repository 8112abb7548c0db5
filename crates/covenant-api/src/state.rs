//! Application state shared across API handlers

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use covenant_core::{AccountId, AppConfig, LoanError, Timestamp};
use covenant_loan::{InMemoryAssets, LoanContract, LoanInit, PauseSwitch};

/// Everything one API process hosts: the contracts, the asset ledger
/// behind them, the pause switch, and the environment clock.
///
/// Handlers take the write guard for the whole host, which is exactly
/// the serialization the loan engine's execution model requires.
pub struct Host {
    pub config: AppConfig,
    pub clock: Timestamp,
    pub pause: PauseSwitch,
    pub assets: InMemoryAssets,
    pub loans: HashMap<String, LoanContract>,
    pub next_loan: u64,
}

impl Host {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            clock: 0,
            pause: PauseSwitch::default(),
            assets: InMemoryAssets::new(),
            loans: HashMap::new(),
            next_loan: 1,
        }
    }

    /// Initialize a new loan contract under a fresh host-assigned id
    pub fn create_loan(&mut self, init: LoanInit) -> Result<String, LoanError> {
        let id = format!("loan-{}", self.next_loan);
        let contract = LoanContract::initialize(
            AccountId::new(id.clone()),
            AccountId::new(self.config.factory.clone()),
            init,
        )?;
        self.next_loan += 1;
        self.loans.insert(id.clone(), contract);
        Ok(id)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<RwLock<Host>>,
}

impl AppState {
    /// Create a new application state with default config
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create with a specific config
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Host::new(config))),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Host> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Host> {
        self.inner.write().await
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::AssetId;
    use covenant_loan::constants::ONE;

    fn sample_init() -> LoanInit {
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
            interest_rate: ONE / 10,
            late_fee_rate: 0,
            late_interest_premium: 0,
            closing_rate: 0,
        }
    }

    #[tokio::test]
    async fn test_create_loan_assigns_sequential_ids() {
        let state = AppState::new();
        let mut host = state.write().await;
        let first = host.create_loan(sample_init()).unwrap();
        let second = host.create_loan(sample_init()).unwrap();
        assert_eq!(first, "loan-1");
        assert_eq!(second, "loan-2");
        assert!(host.loans.contains_key("loan-1"));
    }

    #[tokio::test]
    async fn test_create_loan_propagates_validation() {
        let state = AppState::new();
        let mut host = state.write().await;
        let mut init = sample_init();
        init.principal_requested = 0;
        let err = host.create_loan(init).unwrap_err();
        assert_eq!(err.error_code(), "initialize:zero_principal_requested");
        assert!(host.loans.is_empty());
    }
}
