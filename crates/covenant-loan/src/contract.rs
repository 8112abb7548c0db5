//! Loan lifecycle state machine
//!
//! Every external entry point funnels through the same discipline:
//! authorization, pause gate, ledger reconciliation, then the transition
//! itself. Operations validate first, perform external transfers next,
//! commit bucket mutations after that, and record events last, so an
//! error on any path leaves no partial state behind.

use covenant_core::{
    AccountId, Amount, AssetId, CommitmentHash, LoanError, Op, Result, Role, Timestamp,
};

use crate::calculator;
use crate::capabilities::{AssetDriver, LenderCapability, ProtocolGlobals};
use crate::events::Event;
use crate::refinance::{self, RefinanceCall};
use crate::state::{Loan, LoanInit, LoanView};

/// Per-call environment: the caller, the host clock, and the protocol
/// globals resolved for this call
pub struct Context<'a> {
    pub caller: AccountId,
    pub now: Timestamp,
    pub globals: &'a dyn ProtocolGlobals,
}

impl<'a> Context<'a> {
    pub fn new(caller: AccountId, now: Timestamp, globals: &'a dyn ProtocolGlobals) -> Self {
        Self { caller, now, globals }
    }
}

/// One loan and its event log
#[derive(Debug, Clone)]
pub struct LoanContract {
    loan: Loan,
    events: Vec<Event>,
}

impl LoanContract {
    /// Validate terms and create the loan in its pre-funding state.
    ///
    /// `account` is the identity under which the driver holds this loan's
    /// balances; `factory` is the initializing party.
    pub fn initialize(account: AccountId, factory: AccountId, init: LoanInit) -> Result<Self> {
        let op = Op::Initialize;
        if init.principal_requested == 0 {
            return Err(LoanError::Invariant { op, check: "zero_principal_requested" });
        }
        if init.ending_principal > init.principal_requested {
            return Err(LoanError::Invariant { op, check: "ending_principal_exceeds_requested" });
        }
        if init.collateral_asset == init.funds_asset {
            return Err(LoanError::Invariant { op, check: "assets_not_distinct" });
        }
        if init.payment_interval == 0 {
            return Err(LoanError::Invariant { op, check: "zero_payment_interval" });
        }
        if init.payments == 0 {
            return Err(LoanError::Invariant { op, check: "zero_payments" });
        }

        let initialized = Event::Initialized {
            borrower: init.borrower.clone(),
            collateral_asset: init.collateral_asset.clone(),
            funds_asset: init.funds_asset.clone(),
            grace_period: init.grace_period,
            payment_interval: init.payment_interval,
            payments: init.payments,
            collateral_required: init.collateral_required,
            principal_requested: init.principal_requested,
            ending_principal: init.ending_principal,
            interest_rate: init.interest_rate,
            late_fee_rate: init.late_fee_rate,
            late_interest_premium: init.late_interest_premium,
            closing_rate: init.closing_rate,
        };

        Ok(Self {
            loan: Loan::from_init(account, factory, init),
            events: vec![initialized],
        })
    }

    pub fn loan(&self) -> &Loan {
        &self.loan
    }

    pub fn view(&self) -> LoanView {
        self.loan.view()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Hand the recorded events to the host for transport
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Next scheduled payment as `(principal, interest)` at `now`
    pub fn next_payment_breakdown(&self, now: Timestamp) -> Result<(Amount, Amount)> {
        self.loan
            .next_payment_breakdown(now)
            .ok_or(LoanError::Arithmetic { op: Op::MakePayment, context: "payment_breakdown" })
    }

    /// Early-repayment breakdown as `(principal, interest)`
    pub fn closing_payment_breakdown(&self) -> Result<(Amount, Amount)> {
        self.loan
            .closing_payment_breakdown()
            .ok_or(LoanError::Arithmetic { op: Op::CloseLoan, context: "closing_breakdown" })
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    fn gate(&self, ctx: &Context, op: Op) -> Result<()> {
        if ctx.globals.protocol_paused() {
            return Err(LoanError::Paused { op });
        }
        Ok(())
    }

    fn require_borrower(&self, ctx: &Context, op: Op) -> Result<()> {
        if ctx.caller != self.loan.borrower {
            return Err(LoanError::Unauthorized { op, role: Role::Borrower });
        }
        Ok(())
    }

    fn require_lender(&self, ctx: &Context, op: Op) -> Result<()> {
        if self.loan.lender.as_ref() != Some(&ctx.caller) {
            return Err(LoanError::Unauthorized { op, role: Role::Lender });
        }
        Ok(())
    }

    fn require_party(&self, ctx: &Context, op: Op) -> Result<()> {
        let is_borrower = ctx.caller == self.loan.borrower;
        let is_lender = self.loan.lender.as_ref() == Some(&ctx.caller);
        if !is_borrower && !is_lender {
            return Err(LoanError::Unauthorized { op, role: Role::BorrowerOrLender });
        }
        Ok(())
    }

    fn require_active(&self, op: Op) -> Result<()> {
        if !self.loan.is_active() {
            return Err(LoanError::InvalidState { op, check: "loan_not_active" });
        }
        Ok(())
    }

    fn pay_out(
        &self,
        assets: &mut dyn AssetDriver,
        asset: &AssetId,
        to: &AccountId,
        amount: Amount,
        op: Op,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        if assets.transfer(asset, &self.loan.account, to, amount) {
            Ok(())
        } else {
            Err(LoanError::External {
                op,
                reason: format!("transfer of {} {} rejected", amount, asset),
            })
        }
    }

    // ------------------------------------------------------------------
    // Funding and collateral
    // ------------------------------------------------------------------

    /// Bind the lender, seed the ledger from the unaccounted funds-asset
    /// surplus, and start the payment schedule.
    ///
    /// Fees are withheld up front for the whole schedule; anything wired
    /// in beyond the requested principal becomes claimable. Calling this
    /// on an already-active loan rebates the surplus to the stored lender
    /// and changes nothing.
    pub fn fund_loan(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
        lender: &dyn LenderCapability,
    ) -> Result<Amount> {
        let op = Op::FundLoan;
        self.gate(ctx, op)?;

        if self.loan.is_active() {
            let stored = match &self.loan.lender {
                Some(stored) => stored.clone(),
                None => return Err(LoanError::InvalidState { op, check: "lender_unbound" }),
            };
            let funds_asset = self.loan.funds_asset.clone();
            let surplus = self.loan.unaccounted(assets, &funds_asset);
            self.pay_out(assets, &funds_asset, &stored, surplus, op)?;
            return Ok(surplus);
        }

        if self.loan.payments_remaining == 0 {
            return Err(LoanError::InvalidState { op, check: "loan_terminated" });
        }

        let funds_asset = self.loan.funds_asset.clone();
        let funds_in = self.loan.unaccounted(assets, &funds_asset);

        let treasury_fee = calculator::funding_fee(
            self.loan.principal_requested,
            lender.treasury_fee_bps(),
            self.loan.payment_interval,
            self.loan.payments_remaining,
        )
        .ok_or(LoanError::Arithmetic { op, context: "treasury_fee" })?;
        let delegate_fee = calculator::funding_fee(
            self.loan.principal_requested,
            lender.delegate_fee_bps(),
            self.loan.payment_interval,
            self.loan.payments_remaining,
        )
        .ok_or(LoanError::Arithmetic { op, context: "delegate_fee" })?;
        let fee_total = treasury_fee
            .checked_add(delegate_fee)
            .ok_or(LoanError::Arithmetic { op, context: "fee_total" })?;

        if fee_total > self.loan.principal_requested {
            return Err(LoanError::Invariant { op, check: "fees_exceed_principal" });
        }
        if funds_in < self.loan.principal_requested {
            return Err(LoanError::Invariant { op, check: "insufficient_funding" });
        }

        self.pay_out(assets, &funds_asset, &lender.treasury(), treasury_fee, op)?;
        self.pay_out(assets, &funds_asset, &lender.delegate(), delegate_fee, op)?;

        let lender_account = lender.account();
        let next_due = ctx
            .now
            .checked_add(self.loan.payment_interval)
            .ok_or(LoanError::Arithmetic { op, context: "next_payment_due_date" })?;

        self.loan.lender = Some(lender_account.clone());
        self.loan.principal = self.loan.principal_requested;
        self.loan.drawable_funds = self.loan.principal_requested - fee_total;
        self.loan.claimable_funds = self
            .loan
            .claimable_funds
            .saturating_add(funds_in - self.loan.principal_requested);
        self.loan.next_payment_due_date = next_due;

        self.events.push(Event::Funded {
            lender: lender_account,
            amount: funds_in,
            next_payment_due_date: next_due,
        });
        Ok(funds_in)
    }

    /// Credit the unaccounted collateral-asset surplus to the collateral
    /// bucket. Callable by anyone; returns the amount posted.
    pub fn post_collateral(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
    ) -> Result<Amount> {
        let op = Op::PostCollateral;
        self.gate(ctx, op)?;

        let collateral_asset = self.loan.collateral_asset.clone();
        let amount = self.loan.unaccounted(assets, &collateral_asset);
        self.loan.collateral = self
            .loan
            .collateral
            .checked_add(amount)
            .ok_or(LoanError::Arithmetic { op, context: "collateral" })?;

        self.events.push(Event::CollateralPosted { amount });
        Ok(amount)
    }

    /// Release collateral to `destination`, as long as the remainder
    /// still secures the undrawn principal
    pub fn remove_collateral(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
        amount: Amount,
        destination: &AccountId,
    ) -> Result<()> {
        let op = Op::RemoveCollateral;
        self.gate(ctx, op)?;
        self.require_borrower(ctx, op)?;

        let remaining = self
            .loan
            .collateral
            .checked_sub(amount)
            .ok_or(LoanError::Invariant { op, check: "insufficient_collateral" })?;
        let required = crate::ledger::required_collateral_for(
            self.loan.collateral_required,
            self.loan.principal,
            self.loan.drawable_funds,
            self.loan.principal_requested,
        )
        .ok_or(LoanError::Arithmetic { op, context: "required_collateral" })?;
        if remaining < required {
            return Err(LoanError::Invariant { op, check: "insufficient_collateral" });
        }

        let collateral_asset = self.loan.collateral_asset.clone();
        self.pay_out(assets, &collateral_asset, destination, amount, op)?;
        self.loan.collateral = remaining;

        self.events.push(Event::CollateralRemoved {
            amount,
            destination: destination.clone(),
        });
        Ok(())
    }

    /// Withdraw drawable funds to `destination`, re-checking that the
    /// posted collateral still covers the now-larger undrawn exposure
    pub fn drawdown_funds(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
        amount: Amount,
        destination: &AccountId,
    ) -> Result<()> {
        let op = Op::DrawdownFunds;
        self.gate(ctx, op)?;
        self.require_borrower(ctx, op)?;

        let drawable_after = self
            .loan
            .drawable_funds
            .checked_sub(amount)
            .ok_or(LoanError::Invariant { op, check: "insufficient_drawable_funds" })?;
        let required = crate::ledger::required_collateral_for(
            self.loan.collateral_required,
            self.loan.principal,
            drawable_after,
            self.loan.principal_requested,
        )
        .ok_or(LoanError::Arithmetic { op, context: "required_collateral" })?;
        if self.loan.collateral < required {
            return Err(LoanError::Invariant { op, check: "insufficient_collateral" });
        }

        let funds_asset = self.loan.funds_asset.clone();
        self.pay_out(assets, &funds_asset, destination, amount, op)?;
        self.loan.drawable_funds = drawable_after;

        self.events.push(Event::FundsDrawnDown {
            amount,
            destination: destination.clone(),
        });
        Ok(())
    }

    /// Credit the unaccounted funds-asset surplus back to the drawable
    /// bucket. Callable by anyone; returns the amount returned.
    pub fn return_funds(&mut self, ctx: &Context, assets: &mut dyn AssetDriver) -> Result<Amount> {
        let op = Op::ReturnFunds;
        self.gate(ctx, op)?;

        let funds_asset = self.loan.funds_asset.clone();
        let amount = self.loan.unaccounted(assets, &funds_asset);
        self.loan.drawable_funds = self
            .loan
            .drawable_funds
            .checked_add(amount)
            .ok_or(LoanError::Arithmetic { op, context: "drawable_funds" })?;

        self.events.push(Event::FundsReturned { amount });
        Ok(amount)
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Settle the next scheduled payment out of unaccounted funds plus
    /// the drawable bucket. Returns the `(principal, interest)` paid.
    pub fn make_payment(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
    ) -> Result<(Amount, Amount)> {
        let op = Op::MakePayment;
        self.gate(ctx, op)?;
        self.require_active(op)?;

        let (principal_portion, interest) = self
            .loan
            .next_payment_breakdown(ctx.now)
            .ok_or(LoanError::Arithmetic { op, context: "payment_breakdown" })?;
        let total = principal_portion
            .checked_add(interest)
            .ok_or(LoanError::Arithmetic { op, context: "payment_total" })?;

        self.settle(assets, total, op)?;

        self.loan.principal = self
            .loan
            .principal
            .checked_sub(principal_portion)
            .ok_or(LoanError::Arithmetic { op, context: "principal" })?;
        self.loan.payments_remaining -= 1;
        self.loan.next_payment_due_date = if self.loan.payments_remaining == 0 {
            0
        } else {
            self.loan
                .next_payment_due_date
                .checked_add(self.loan.payment_interval)
                .ok_or(LoanError::Arithmetic { op, context: "next_payment_due_date" })?
        };

        self.events.push(Event::PaymentMade {
            principal: principal_portion,
            interest,
        });
        Ok((principal_portion, interest))
    }

    /// Repay the whole loan ahead of schedule at the flat closing rate.
    /// Fails once the next payment is overdue.
    pub fn close_loan(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
    ) -> Result<(Amount, Amount)> {
        let op = Op::CloseLoan;
        self.gate(ctx, op)?;
        self.require_active(op)?;
        if ctx.now > self.loan.next_payment_due_date {
            return Err(LoanError::InvalidState { op, check: "payment_overdue" });
        }

        let (principal, interest) = self
            .loan
            .closing_payment_breakdown()
            .ok_or(LoanError::Arithmetic { op, context: "closing_breakdown" })?;
        let total = principal
            .checked_add(interest)
            .ok_or(LoanError::Arithmetic { op, context: "payment_total" })?;

        self.settle(assets, total, op)?;

        self.loan.principal = 0;
        self.loan.payments_remaining = 0;
        self.loan.next_payment_due_date = 0;

        self.events.push(Event::LoanClosed { principal, interest });
        Ok((principal, interest))
    }

    /// Move `total` into the claimable bucket, drawing on unaccounted
    /// funds first and the drawable bucket for the remainder
    fn settle(&mut self, assets: &mut dyn AssetDriver, total: Amount, op: Op) -> Result<()> {
        let funds_asset = self.loan.funds_asset.clone();
        let money = self.loan.unaccounted(assets, &funds_asset);
        let pool = self
            .loan
            .drawable_funds
            .checked_add(money)
            .ok_or(LoanError::Arithmetic { op, context: "drawable_funds" })?;
        let drawable_after = pool
            .checked_sub(total)
            .ok_or(LoanError::Invariant { op, check: "insufficient_funds" })?;
        self.loan.drawable_funds = drawable_after;
        self.loan.claimable_funds = self
            .loan
            .claimable_funds
            .checked_add(total)
            .ok_or(LoanError::Arithmetic { op, context: "claimable_funds" })?;
        Ok(())
    }

    /// Withdraw accumulated payments to `destination` (lender only)
    pub fn claim_funds(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
        amount: Amount,
        destination: &AccountId,
    ) -> Result<()> {
        let op = Op::ClaimFunds;
        self.gate(ctx, op)?;
        self.require_lender(ctx, op)?;

        let remaining = self
            .loan
            .claimable_funds
            .checked_sub(amount)
            .ok_or(LoanError::Invariant { op, check: "insufficient_claimable_funds" })?;

        let funds_asset = self.loan.funds_asset.clone();
        self.pay_out(assets, &funds_asset, destination, amount, op)?;
        self.loan.claimable_funds = remaining;

        self.events.push(Event::FundsClaimed {
            amount,
            destination: destination.clone(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Default handling
    // ------------------------------------------------------------------

    /// Seize every balance of both assets once the grace period after a
    /// missed payment has lapsed. Returns `(collateral, funds)` seized.
    pub fn repossess(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
        destination: &AccountId,
    ) -> Result<(Amount, Amount)> {
        let op = Op::Repossess;
        self.gate(ctx, op)?;
        self.require_lender(ctx, op)?;
        self.require_active(op)?;

        let deadline = self
            .loan
            .next_payment_due_date
            .checked_add(self.loan.grace_period)
            .ok_or(LoanError::Arithmetic { op, context: "default_deadline" })?;
        if ctx.now <= deadline {
            return Err(LoanError::InvalidState { op, check: "not_in_default" });
        }

        let collateral_asset = self.loan.collateral_asset.clone();
        let funds_asset = self.loan.funds_asset.clone();
        let collateral_seized = assets.balance_of(&collateral_asset, &self.loan.account);
        let funds_seized = assets.balance_of(&funds_asset, &self.loan.account);

        self.pay_out(assets, &collateral_asset, destination, collateral_seized, op)?;
        self.pay_out(assets, &funds_asset, destination, funds_seized, op)?;

        self.loan.drawable_funds = 0;
        self.loan.claimable_funds = 0;
        self.loan.collateral = 0;
        self.loan.principal = 0;
        self.loan.payments_remaining = 0;
        self.loan.next_payment_due_date = 0;
        self.loan.lender = None;

        self.events.push(Event::Repossessed {
            collateral: collateral_seized,
            funds: funds_seized,
            destination: destination.clone(),
        });
        Ok((collateral_seized, funds_seized))
    }

    /// Sweep a stray asset (neither the funds nor the collateral asset)
    /// out of the loan's account
    pub fn skim(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
        asset: &AssetId,
        destination: &AccountId,
    ) -> Result<Amount> {
        let op = Op::Skim;
        self.gate(ctx, op)?;
        self.require_party(ctx, op)?;
        if *asset == self.loan.funds_asset || *asset == self.loan.collateral_asset {
            return Err(LoanError::InvalidState { op, check: "protected_asset" });
        }

        let amount = assets.balance_of(asset, &self.loan.account);
        self.pay_out(assets, asset, destination, amount, op)?;

        self.events.push(Event::Skimmed {
            asset: asset.clone(),
            amount,
            destination: destination.clone(),
        });
        Ok(amount)
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    /// Hand the borrower role to another account
    pub fn set_borrower(&mut self, ctx: &Context, borrower: AccountId) -> Result<()> {
        let op = Op::SetBorrower;
        self.gate(ctx, op)?;
        self.require_borrower(ctx, op)?;

        self.loan.borrower = borrower.clone();
        self.events.push(Event::BorrowerSet { borrower });
        Ok(())
    }

    /// Hand the lender role to another account
    pub fn set_lender(&mut self, ctx: &Context, lender: AccountId) -> Result<()> {
        let op = Op::SetLender;
        self.gate(ctx, op)?;
        self.require_lender(ctx, op)?;

        self.loan.lender = Some(lender.clone());
        self.events.push(Event::LenderSet { lender });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Refinance
    // ------------------------------------------------------------------

    /// Record (or, with empty calls, withdraw) a refinance proposal.
    /// Returns the new commitment.
    pub fn propose_new_terms(
        &mut self,
        ctx: &Context,
        refinancer: &AccountId,
        calls: &[RefinanceCall],
    ) -> Result<Option<CommitmentHash>> {
        let op = Op::ProposeNewTerms;
        self.gate(ctx, op)?;
        self.require_borrower(ctx, op)?;

        let commitment = if calls.is_empty() {
            None
        } else {
            Some(refinance::commitment_for(refinancer, calls))
        };
        self.loan.refinance_commitment = commitment;

        self.events.push(Event::NewTermsProposed {
            commitment,
            refinancer: refinancer.clone(),
            calls: calls.to_vec(),
        });
        Ok(commitment)
    }

    /// Replay a proposed call sequence against the loan. The whole
    /// sequence applies atomically, collateralization is re-checked, and
    /// the commitment is cleared.
    pub fn accept_new_terms(
        &mut self,
        ctx: &Context,
        assets: &mut dyn AssetDriver,
        refinancer: &AccountId,
        calls: &[RefinanceCall],
    ) -> Result<()> {
        let op = Op::AcceptNewTerms;
        self.gate(ctx, op)?;
        self.require_lender(ctx, op)?;

        let commitment = refinance::commitment_for(refinancer, calls);
        if self.loan.refinance_commitment != Some(commitment) {
            return Err(LoanError::External {
                op,
                reason: "commitment mismatch".to_string(),
            });
        }

        let mut staged = self.loan.clone();
        for call in calls {
            refinance::apply_call(&mut staged, assets, call, op)?;
        }

        if staged.ending_principal > staged.principal_requested {
            return Err(LoanError::Invariant { op, check: "ending_principal_exceeds_requested" });
        }
        if staged.principal > staged.principal_requested {
            return Err(LoanError::Invariant { op, check: "principal_exceeds_requested" });
        }
        if !staged.is_collateral_maintained() {
            return Err(LoanError::Invariant { op, check: "insufficient_collateral" });
        }

        staged.refinance_commitment = None;
        self.loan = staged;

        self.events.push(Event::NewTermsAccepted {
            commitment,
            refinancer: refinancer.clone(),
            calls: calls.to_vec(),
        });
        Ok(())
    }
}
