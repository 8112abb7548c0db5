//! Amortization Calculator
//!
//! Fixed-point installment math and payment breakdowns. All rates are
//! fractions scaled by [`ONE`]; intermediate products go through `BigUint`
//! to prevent overflow. No I/O, no floats - just calculations.
//!
//! Functions return `None` when a result cannot be represented (division
//! by zero, narrowing failure, underflow); callers surface that as an
//! arithmetic error.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use covenant_core::{Amount, Timestamp};

use crate::constants::{BPS_DENOM, ONE, SECONDS_PER_YEAR};

/// `a * b / denom` with an overflow-safe intermediate product
pub fn mul_div(a: Amount, b: Amount, denom: Amount) -> Option<Amount> {
    if denom == 0 {
        return None;
    }
    let result = BigUint::from(a) * BigUint::from(b) / BigUint::from(denom);
    result.to_u128()
}

/// Convert an annualized rate into the rate for one payment interval.
///
/// `annual_rate * interval_seconds / SECONDS_PER_YEAR`, truncating.
pub fn periodic_rate(annual_rate: Amount, interval_seconds: u64) -> Option<Amount> {
    mul_div(annual_rate, interval_seconds as Amount, SECONDS_PER_YEAR as Amount)
}

/// `(base / one)^exponent * one` by square-and-multiply.
///
/// `exponent == 0` yields `one`.
pub fn scaled_exponent(base: Amount, exponent: u32, one: Amount) -> Option<Amount> {
    if one == 0 {
        return None;
    }
    let one_big = BigUint::from(one);
    let mut base = BigUint::from(base);
    let mut result = if exponent & 1 == 0 {
        one_big.clone()
    } else {
        base.clone()
    };
    let mut exponent = exponent;
    loop {
        exponent >>= 1;
        if exponent == 0 {
            break;
        }
        base = &base * &base / &one_big;
        if exponent & 1 == 1 {
            result = result * &base / &one_big;
        }
    }
    result.to_u128()
}

/// Closed-form installment for one payment.
///
/// Returns `(principal_portion, interest_portion)` from
///
/// `A = (principal * (1+r)^n - ending_principal) * r / ((1+r)^n - 1)`
///
/// where `r` is the periodic rate. When the compounded factor collapses
/// to `one` (rate effectively zero) the schedule degrades to straight-line
/// principal with no interest.
pub fn installment(
    principal: Amount,
    ending_principal: Amount,
    annual_rate: Amount,
    interval_seconds: u64,
    payments: u32,
) -> Option<(Amount, Amount)> {
    if payments == 0 {
        return None;
    }
    let rate = periodic_rate(annual_rate, interval_seconds)?;
    let raised = scaled_exponent(ONE.checked_add(rate)?, payments, ONE)?;

    if raised <= ONE {
        let principal_portion = principal.checked_sub(ending_principal)? / payments as Amount;
        return Some((principal_portion, 0));
    }

    let gross = mul_div(principal, raised, ONE)?;
    let net = gross.checked_sub(ending_principal)?;
    let total = mul_div(net, rate, raised - ONE)?;
    let interest = mul_div(principal, rate, ONE)?;
    let principal_portion = total.saturating_sub(interest);
    Some((principal_portion, interest))
}

/// Pro-rata interest accrued past the due date at `annual_rate + premium`.
///
/// `principal * (annual_rate + premium) * seconds_late / (SECONDS_PER_YEAR * ONE)`
pub fn late_interest(
    principal: Amount,
    annual_rate: Amount,
    premium: Amount,
    seconds_late: u64,
) -> Option<Amount> {
    let rate = annual_rate.checked_add(premium)?;
    let numerator = BigUint::from(principal) * BigUint::from(rate) * BigUint::from(seconds_late);
    let denominator = BigUint::from(SECONDS_PER_YEAR) * BigUint::from(ONE);
    (numerator / denominator).to_u128()
}

/// Flat fee on outstanding principal: `principal * rate / ONE`
pub fn flat_fee(principal: Amount, rate: Amount) -> Option<Amount> {
    mul_div(principal, rate, ONE)
}

/// Origination fee withheld at fund time.
///
/// `principal_requested * fee_bps * payment_interval * payments / (SECONDS_PER_YEAR * 10_000)`
pub fn funding_fee(
    principal_requested: Amount,
    fee_bps: u64,
    payment_interval: u64,
    payments: u32,
) -> Option<Amount> {
    let numerator = BigUint::from(principal_requested)
        * BigUint::from(fee_bps)
        * BigUint::from(payment_interval)
        * BigUint::from(payments);
    let denominator = BigUint::from(SECONDS_PER_YEAR) * BigUint::from(BPS_DENOM);
    (numerator / denominator).to_u128()
}

/// Next scheduled payment, including the balloon override on the final
/// payment and late charges once `now` passes the due date.
#[allow(clippy::too_many_arguments)]
pub fn payment_breakdown(
    now: Timestamp,
    due_date: Timestamp,
    principal: Amount,
    ending_principal: Amount,
    interest_rate: Amount,
    late_fee_rate: Amount,
    late_interest_premium: Amount,
    payment_interval: u64,
    payments_remaining: u32,
) -> Option<(Amount, Amount)> {
    let (mut principal_portion, mut interest) = installment(
        principal,
        ending_principal,
        interest_rate,
        payment_interval,
        payments_remaining,
    )?;

    if payments_remaining == 1 {
        principal_portion = principal;
    }

    if now > due_date {
        let seconds_late = now - due_date;
        interest = interest
            .checked_add(late_interest(
                principal,
                interest_rate,
                late_interest_premium,
                seconds_late,
            )?)?
            .checked_add(flat_fee(principal, late_fee_rate)?)?;
    }

    Some((principal_portion, interest))
}

/// Early-repayment breakdown: full outstanding principal plus the flat
/// closing fee.
pub fn closing_breakdown(principal: Amount, closing_rate: Amount) -> Option<(Amount, Amount)> {
    Some((principal, flat_fee(principal, closing_rate)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 86_400;

    #[test]
    fn test_mul_div_truncates() {
        assert_eq!(mul_div(10, 3, 4), Some(7));
        assert_eq!(mul_div(0, 3, 4), Some(0));
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert_eq!(mul_div(1, 1, 0), None);
    }

    #[test]
    fn test_mul_div_survives_huge_products() {
        // product exceeds u128, quotient does not
        let big = u128::MAX / 2;
        assert_eq!(mul_div(big, 4, 4), Some(big));
    }

    #[test]
    fn test_periodic_rate_30_days_at_12_percent() {
        // 0.12 * 30/365 scaled by 1e18
        let rate = periodic_rate(120_000_000_000_000_000, 30 * DAY).unwrap();
        assert_eq!(rate, 120_000_000_000_000_000u128 * 30 / 365);
    }

    #[test]
    fn test_scaled_exponent_identity() {
        assert_eq!(scaled_exponent(ONE, 0, ONE), Some(ONE));
        assert_eq!(scaled_exponent(2 * ONE, 0, ONE), Some(ONE));
        assert_eq!(scaled_exponent(3 * ONE, 1, ONE), Some(3 * ONE));
    }

    #[test]
    fn test_scaled_exponent_squares() {
        assert_eq!(scaled_exponent(2 * ONE, 2, ONE), Some(4 * ONE));
        assert_eq!(scaled_exponent(2 * ONE, 10, ONE), Some(1024 * ONE));
    }

    #[test]
    fn test_scaled_exponent_fractional_base() {
        // 1.5^2 = 2.25
        let result = scaled_exponent(ONE + ONE / 2, 2, ONE).unwrap();
        assert_eq!(result, 2_250_000_000_000_000_000);
    }

    #[test]
    fn test_installment_zero_rate_is_straight_line() {
        let (p, i) = installment(1_200, 0, 0, 30 * DAY, 12).unwrap();
        assert_eq!(p, 100);
        assert_eq!(i, 0);
    }

    #[test]
    fn test_installment_zero_payments() {
        assert_eq!(installment(1_000, 0, ONE / 10, 30 * DAY, 0), None);
    }

    #[test]
    fn test_installment_interest_only_has_no_principal_portion() {
        // ending principal equals principal: every payment is interest only
        let (p, i) = installment(1_000, 1_000, ONE / 10, 30 * DAY, 6).unwrap();
        assert_eq!(p, 0);
        assert!(i > 0);
    }

    #[test]
    fn test_installment_single_payment_nets_to_principal_minus_ending() {
        let (p, i) = installment(1_000_000, 250_000, ONE / 10, 30 * DAY, 1).unwrap();
        // one payment: A = principal + interest - ending, so the principal
        // portion is principal - ending (up to truncation)
        let expected = 1_000_000 - 250_000;
        assert!(p >= expected - 2 && p <= expected);
        assert!(i > 0);
    }

    #[test]
    fn test_installment_schedule_amortizes_fully() {
        // walk a 12-payment schedule, recomputing each step the way the
        // payment engine does; remaining principal must hit zero exactly
        // once the final payment pays the full outstanding balance
        let rate = 120_000_000_000_000_000; // 0.12
        let mut principal: Amount = 1_000_000;
        let mut installments = Vec::new();
        for n in (1..=12u32).rev() {
            let (mut p, i) = installment(principal, 0, rate, 30 * DAY, n).unwrap();
            if n == 1 {
                p = principal;
            }
            installments.push(p + i);
            principal -= p;
        }
        assert_eq!(principal, 0);
        // near-constant installments: truncation only ever loses a unit or
        // two per step
        let max = installments.iter().max().unwrap();
        let min = installments.iter().min().unwrap();
        assert!(max - min <= 50, "installments spread too wide: {:?}", installments);
    }

    #[test]
    fn test_late_interest_pro_rata() {
        // 1000 principal, 12% + 5% premium, 5 days late
        let rate = 120_000_000_000_000_000u128;
        let premium = 50_000_000_000_000_000u128;
        let got = late_interest(1_000, rate, premium, 5 * DAY).unwrap();
        let expected = (BigUint::from(1_000u32) * (rate + premium) * (5 * DAY)
            / (BigUint::from(SECONDS_PER_YEAR) * ONE))
            .to_u128()
            .unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_flat_fee() {
        // 1% of 1000
        assert_eq!(flat_fee(1_000, ONE / 100), Some(10));
    }

    #[test]
    fn test_funding_fee_one_year_of_intervals() {
        // 50 bps on 1_000_000 over exactly one year of coverage
        let fee = funding_fee(1_000_000, 50, SECONDS_PER_YEAR / 12, 12).unwrap();
        assert_eq!(fee, 1_000_000 * 50 / 10_000);
    }

    #[test]
    fn test_funding_fee_zero_bps() {
        assert_eq!(funding_fee(1_000_000, 0, 30 * DAY, 12), Some(0));
    }

    #[test]
    fn test_payment_breakdown_on_time_has_no_late_charges() {
        let rate = 120_000_000_000_000_000;
        let on_time = payment_breakdown(100, 100, 1_000_000, 0, rate, ONE / 100, ONE / 20, 30 * DAY, 12)
            .unwrap();
        let scheduled =
            installment(1_000_000, 0, rate, 30 * DAY, 12).unwrap();
        assert_eq!(on_time, scheduled);
    }

    #[test]
    fn test_payment_breakdown_adds_late_charges() {
        let rate = 120_000_000_000_000_000;
        let late_fee_rate = ONE / 100;
        let premium = ONE / 20;
        let due = 1_000u64;
        let now = due + 5 * DAY;

        let (p, i) =
            payment_breakdown(now, due, 1_000_000, 0, rate, late_fee_rate, premium, 30 * DAY, 12)
                .unwrap();
        let (sp, si) = installment(1_000_000, 0, rate, 30 * DAY, 12).unwrap();
        let expected_extra = late_interest(1_000_000, rate, premium, 5 * DAY).unwrap()
            + flat_fee(1_000_000, late_fee_rate).unwrap();

        assert_eq!(p, sp);
        assert_eq!(i, si + expected_extra);
    }

    #[test]
    fn test_payment_breakdown_final_payment_pays_balloon() {
        let (p, _) = payment_breakdown(0, 100, 1_000, 1_000, ONE / 10, 0, 0, 30 * DAY, 1).unwrap();
        assert_eq!(p, 1_000);
    }

    #[test]
    fn test_closing_breakdown() {
        let (p, i) = closing_breakdown(1_000, ONE / 10).unwrap();
        assert_eq!(p, 1_000);
        assert_eq!(i, 100);
    }
}
