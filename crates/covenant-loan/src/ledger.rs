//! Accounting ledger
//!
//! Reconciles the loan's internal buckets (`drawable_funds`,
//! `claimable_funds`, `collateral`) against the external balances the
//! asset driver reports. The ledger never initiates asset movement; every
//! state-mutating operation consults [`Loan::unaccounted`] before touching
//! buckets so that any surplus sitting in the contract is attributed to
//! the current call.

use covenant_core::{Amount, AssetId};

use crate::calculator::mul_div;
use crate::capabilities::AssetDriver;
use crate::state::Loan;

/// Collateral needed to secure the undrawn portion of outstanding
/// principal:
///
/// `collateral_required * max(0, principal - drawable) / principal_requested`,
/// truncating. `None` only when `principal_requested` is zero, which
/// initialization forbids.
pub fn required_collateral_for(
    collateral_required: Amount,
    principal: Amount,
    drawable_funds: Amount,
    principal_requested: Amount,
) -> Option<Amount> {
    let outstanding = principal.saturating_sub(drawable_funds);
    if outstanding == 0 {
        return Some(0);
    }
    mul_div(collateral_required, outstanding, principal_requested)
}

impl Loan {
    /// Sum of the internal buckets that claim `asset`
    fn claimed_in(&self, asset: &AssetId) -> Amount {
        let mut claimed: Amount = 0;
        if *asset == self.collateral_asset {
            claimed = claimed.saturating_add(self.collateral);
        }
        if *asset == self.funds_asset {
            claimed = claimed
                .saturating_add(self.drawable_funds)
                .saturating_add(self.claimable_funds);
        }
        claimed
    }

    /// External balance of `asset` minus what the buckets already claim.
    ///
    /// Underflow cannot happen while reconciliation holds, but a deficit
    /// reads as zero rather than propagating.
    pub fn unaccounted(&self, assets: &dyn AssetDriver, asset: &AssetId) -> Amount {
        assets
            .balance_of(asset, &self.account)
            .saturating_sub(self.claimed_in(asset))
    }

    /// Collateral-sufficiency predicate over current buckets
    pub fn is_collateral_maintained(&self) -> bool {
        match required_collateral_for(
            self.collateral_required,
            self.principal,
            self.drawable_funds,
            self.principal_requested,
        ) {
            Some(required) => self.collateral >= required,
            None => false,
        }
    }

    /// Extra collateral a borrower must post before drawing down `amount`
    pub fn additional_collateral_required_for(&self, amount: Amount) -> Option<Amount> {
        let drawable_after = self.drawable_funds.saturating_sub(amount);
        let required = required_collateral_for(
            self.collateral_required,
            self.principal,
            drawable_after,
            self.principal_requested,
        )?;
        Some(required.saturating_sub(self.collateral))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::{AccountId, AssetId};

    use crate::capabilities::InMemoryAssets;
    use crate::state::{Loan, LoanInit};

    fn sample_loan() -> Loan {
        Loan::from_init(
            AccountId::new("loan-1"),
            AccountId::new("factory"),
            LoanInit {
                borrower: AccountId::new("borrower"),
                collateral_asset: AssetId::new("gold"),
                funds_asset: AssetId::new("usd"),
                grace_period: 0,
                payment_interval: 30 * 86_400,
                payments: 12,
                collateral_required: 400,
                principal_requested: 1_000,
                ending_principal: 0,
                interest_rate: 0,
                late_fee_rate: 0,
                late_interest_premium: 0,
                closing_rate: 0,
            },
        )
    }

    #[test]
    fn test_required_collateral_scales_with_undrawn_principal() {
        // 400 required, 1000 requested, 600 of it drawn down
        assert_eq!(required_collateral_for(400, 1_000, 400, 1_000), Some(240));
        // fully backed by drawable funds: nothing required
        assert_eq!(required_collateral_for(400, 1_000, 1_000, 1_000), Some(0));
        assert_eq!(required_collateral_for(400, 500, 1_000, 1_000), Some(0));
        // nothing drawn: full requirement
        assert_eq!(required_collateral_for(400, 1_000, 0, 1_000), Some(400));
    }

    #[test]
    fn test_required_collateral_zero_requested_is_defended() {
        assert_eq!(required_collateral_for(400, 1_000, 0, 0), None);
        // ...unless nothing is outstanding
        assert_eq!(required_collateral_for(400, 0, 0, 0), Some(0));
    }

    #[test]
    fn test_unaccounted_splits_by_asset() {
        let mut loan = sample_loan();
        let mut assets = InMemoryAssets::new();
        assets.mint(&loan.funds_asset, &loan.account, 1_200);
        assets.mint(&loan.collateral_asset, &loan.account, 300);

        loan.drawable_funds = 700;
        loan.claimable_funds = 300;
        loan.collateral = 250;

        assert_eq!(loan.unaccounted(&assets, &loan.funds_asset.clone()), 200);
        assert_eq!(loan.unaccounted(&assets, &loan.collateral_asset.clone()), 50);
    }

    #[test]
    fn test_unaccounted_deficit_reads_zero() {
        let mut loan = sample_loan();
        let assets = InMemoryAssets::new();
        loan.drawable_funds = 500;
        assert_eq!(loan.unaccounted(&assets, &loan.funds_asset.clone()), 0);
    }

    #[test]
    fn test_collateral_maintained_tracks_drawdown() {
        let mut loan = sample_loan();
        loan.principal = 1_000;
        loan.drawable_funds = 1_000;
        // nothing drawn yet, nothing required
        assert!(loan.is_collateral_maintained());

        loan.drawable_funds = 400;
        // 240 required now
        assert!(!loan.is_collateral_maintained());
        loan.collateral = 240;
        assert!(loan.is_collateral_maintained());
    }

    #[test]
    fn test_additional_collateral_required_for_drawdown() {
        let mut loan = sample_loan();
        loan.principal = 1_000;
        loan.drawable_funds = 1_000;
        loan.collateral = 0;
        assert_eq!(loan.additional_collateral_required_for(600), Some(240));
        // already posted enough
        loan.collateral = 300;
        assert_eq!(loan.additional_collateral_required_for(600), Some(0));
    }
}
