//! Fixed-precision arithmetic shared by every calculator.
//!
//! Monetary amounts are quantized to cents with banker's rounding; rates and
//! ratios keep full precision until a result is reported.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::error::BizValError;
use crate::types::{Money, Percent, Rate};
use crate::BizValResult;

/// Decimal places for currency amounts.
pub const MONEY_DP: u32 = 2;

/// Decimal places for rates reported out of floating-point fits.
pub const RATE_DP: u32 = 10;

/// Quantize a monetary amount to cents (midpoint to even).
pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointNearestEven)
}

pub fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RATE_DP, RoundingStrategy::MidpointNearestEven)
}

/// 5.0 -> 0.05
pub fn pct_to_rate(pct: Percent) -> Rate {
    pct / dec!(100)
}

pub fn checked_div(numerator: Decimal, denominator: Decimal, context: &str) -> BizValResult<Decimal> {
    if denominator.is_zero() {
        return Err(BizValError::DivisionByZero {
            context: context.to_string(),
        });
    }
    numerator
        .checked_div(denominator)
        .ok_or_else(|| BizValError::NumericOverflow {
            context: context.to_string(),
        })
}

pub fn checked_mul(a: Decimal, b: Decimal, context: &str) -> BizValResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| BizValError::NumericOverflow {
        context: context.to_string(),
    })
}

/// Sum that reports overflow instead of panicking.
pub fn checked_sum<I>(values: I, context: &str) -> BizValResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v).ok_or_else(|| BizValError::NumericOverflow {
            context: context.to_string(),
        })
    })
}

/// `(1 + rate)^periods`
pub fn compound(rate: Rate, periods: u32, context: &str) -> BizValResult<Decimal> {
    (Decimal::ONE + rate)
        .checked_powu(u64::from(periods))
        .ok_or_else(|| BizValError::NumericOverflow {
            context: context.to_string(),
        })
}

pub fn mean(values: &[Decimal]) -> BizValResult<Decimal> {
    if values.is_empty() {
        return Err(BizValError::InsufficientData(
            "Cannot average an empty series".into(),
        ));
    }
    let total = checked_sum(values.iter().copied(), "mean")?;
    checked_div(total, Decimal::from(values.len()), "mean")
}

/// Population standard deviation (divides by n).
pub fn population_std(values: &[Decimal]) -> BizValResult<Decimal> {
    let avg = mean(values)?;
    let sum_sq = checked_sum(
        values
            .iter()
            .map(|v| checked_mul(*v - avg, *v - avg, "variance"))
            .collect::<BizValResult<Vec<_>>>()?,
        "variance",
    )?;
    let variance = checked_div(sum_sq, Decimal::from(values.len()), "variance")?;
    variance.sqrt().ok_or_else(|| BizValError::NumericOverflow {
        context: "standard deviation".into(),
    })
}

/// Leave the decimal domain. Only used at the model-fitting boundary.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Re-enter the decimal domain. Non-finite or out-of-range values are a
/// computation failure, not a silent zero.
pub fn from_f64(value: f64, context: &str) -> BizValResult<Decimal> {
    if !value.is_finite() {
        return Err(BizValError::NumericOverflow {
            context: format!("{context}: non-finite value"),
        });
    }
    Decimal::from_f64(value).ok_or_else(|| BizValError::NumericOverflow {
        context: context.to_string(),
    })
}

pub fn ensure_non_negative(field: &str, value: Decimal) -> BizValResult<()> {
    if value < Decimal::ZERO {
        return Err(BizValError::invalid(field, "Must be non-negative"));
    }
    Ok(())
}

pub fn ensure_unit_interval(field: &str, value: Decimal) -> BizValResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(BizValError::invalid(field, "Must be between 0 and 1"));
    }
    Ok(())
}

pub fn ensure_percentage(field: &str, value: Percent) -> BizValResult<()> {
    if value < Decimal::ZERO || value > dec!(100) {
        return Err(BizValError::invalid(field, "Must be between 0 and 100"));
    }
    Ok(())
}

/// Scale weights in [0, 1] so they sum to one.
pub fn normalize_weights(weights: &[Decimal]) -> BizValResult<Vec<Decimal>> {
    if weights.is_empty() {
        return Err(BizValError::InsufficientData(
            "At least one weight is required".into(),
        ));
    }
    for (i, w) in weights.iter().enumerate() {
        ensure_unit_interval(&format!("weights[{i}]"), *w)?;
    }
    let total: Decimal = weights.iter().copied().sum();
    if total.is_zero() {
        return Err(BizValError::invalid("weights", "At least one weight must be positive"));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}
