//! Injected external capabilities
//!
//! The loan engine never owns global state: asset balances, the pause
//! flag, and the lender's fee terms all arrive through these interfaces.
//! `InMemoryAssets` is the concrete driver used by the HTTP facade and
//! the test suites.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use covenant_core::{AccountId, Amount, AssetId};

/// Fungible-asset driver.
///
/// A `false` return from a transfer is a fatal error for the operation in
/// progress; the driver itself must be atomic (a failed transfer moves
/// nothing).
pub trait AssetDriver {
    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount;

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> bool;

    fn transfer_from(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> bool {
        self.transfer(asset, from, to, amount)
    }
}

/// Fee terms and recipients reported by the funding lender
pub trait LenderCapability {
    fn account(&self) -> AccountId;

    /// Treasury origination fee in basis points
    fn treasury_fee_bps(&self) -> u64;

    /// Delegate (investor) origination fee in basis points
    fn delegate_fee_bps(&self) -> u64;

    fn treasury(&self) -> AccountId;

    fn delegate(&self) -> AccountId;
}

/// Protocol-wide switches resolved at call time
pub trait ProtocolGlobals {
    fn protocol_paused(&self) -> bool;
}

/// In-memory fungible-asset ledger keyed by (asset, account)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryAssets {
    balances: HashMap<AssetId, HashMap<AccountId, Amount>>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account out of thin air (seeding test and demo state)
    pub fn mint(&mut self, asset: &AssetId, account: &AccountId, amount: Amount) {
        let entry = self
            .balances
            .entry(asset.clone())
            .or_default()
            .entry(account.clone())
            .or_insert(0);
        *entry = entry.saturating_add(amount);
    }
}

impl AssetDriver for InMemoryAssets {
    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        self.balances
            .get(asset)
            .and_then(|accounts| accounts.get(account))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> bool {
        if amount == 0 {
            return true;
        }
        let available = self.balance_of(asset, from);
        if available < amount {
            return false;
        }
        let accounts = self.balances.entry(asset.clone()).or_default();
        *accounts.entry(from.clone()).or_insert(0) -= amount;
        *accounts.entry(to.clone()).or_insert(0) += amount;
        true
    }
}

/// Lender capability backed by plain fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticLender {
    pub account: AccountId,
    pub treasury_fee_bps: u64,
    pub delegate_fee_bps: u64,
    pub treasury: AccountId,
    pub delegate: AccountId,
}

impl StaticLender {
    /// A lender that charges no origination fees
    pub fn feeless(account: AccountId) -> Self {
        Self {
            treasury: account.clone(),
            delegate: account.clone(),
            account,
            treasury_fee_bps: 0,
            delegate_fee_bps: 0,
        }
    }
}

impl LenderCapability for StaticLender {
    fn account(&self) -> AccountId {
        self.account.clone()
    }

    fn treasury_fee_bps(&self) -> u64 {
        self.treasury_fee_bps
    }

    fn delegate_fee_bps(&self) -> u64 {
        self.delegate_fee_bps
    }

    fn treasury(&self) -> AccountId {
        self.treasury.clone()
    }

    fn delegate(&self) -> AccountId {
        self.delegate.clone()
    }
}

/// Pause flag with interior state, shared by the host
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PauseSwitch {
    pub paused: bool,
}

impl PauseSwitch {
    pub fn new(paused: bool) -> Self {
        Self { paused }
    }
}

impl ProtocolGlobals for PauseSwitch {
    fn protocol_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str) -> AssetId {
        AssetId::new(id)
    }

    fn account(id: &str) -> AccountId {
        AccountId::new(id)
    }

    #[test]
    fn test_mint_and_balance() {
        let mut assets = InMemoryAssets::new();
        assets.mint(&asset("usd"), &account("alice"), 500);
        assert_eq!(assets.balance_of(&asset("usd"), &account("alice")), 500);
        assert_eq!(assets.balance_of(&asset("usd"), &account("bob")), 0);
        assert_eq!(assets.balance_of(&asset("gold"), &account("alice")), 0);
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut assets = InMemoryAssets::new();
        assets.mint(&asset("usd"), &account("alice"), 500);
        assert!(assets.transfer(&asset("usd"), &account("alice"), &account("bob"), 200));
        assert_eq!(assets.balance_of(&asset("usd"), &account("alice")), 300);
        assert_eq!(assets.balance_of(&asset("usd"), &account("bob")), 200);
    }

    #[test]
    fn test_transfer_insufficient_balance_moves_nothing() {
        let mut assets = InMemoryAssets::new();
        assets.mint(&asset("usd"), &account("alice"), 100);
        assert!(!assets.transfer(&asset("usd"), &account("alice"), &account("bob"), 200));
        assert_eq!(assets.balance_of(&asset("usd"), &account("alice")), 100);
        assert_eq!(assets.balance_of(&asset("usd"), &account("bob")), 0);
    }

    #[test]
    fn test_zero_transfer_always_succeeds() {
        let mut assets = InMemoryAssets::new();
        assert!(assets.transfer(&asset("usd"), &account("alice"), &account("bob"), 0));
    }

    #[test]
    fn test_feeless_lender() {
        let lender = StaticLender::feeless(account("pool"));
        assert_eq!(lender.treasury_fee_bps(), 0);
        assert_eq!(lender.delegate_fee_bps(), 0);
        assert_eq!(lender.treasury(), account("pool"));
    }

    #[test]
    fn test_pause_switch() {
        assert!(!PauseSwitch::default().protocol_paused());
        assert!(PauseSwitch::new(true).protocol_paused());
    }
}
