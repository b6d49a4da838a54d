use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{checked_div, checked_mul, checked_sum, ensure_non_negative, mean, round_money};
use crate::error::BizValError;
use crate::types::{with_metadata, ComputationOutput, Money, Percent};
use crate::BizValResult;

use super::{MethodValuation, ValuationMethodKind};

const MIN_HISTORY: usize = 3;

/// Capitalized-earnings valuation. Rates are percentage points (3.0 = 3%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsValueInput {
    pub historical_earnings: Vec<Money>,
    pub risk_free_rate: Percent,
    pub risk_premium: Percent,
    /// Blend two parts earnings value with one part asset value
    #[serde(default)]
    pub use_practitioner_method: bool,
    /// Required when `use_practitioner_method` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_value: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsValueDetails {
    pub historical_earnings: Vec<Money>,
    pub sustainable_earnings: Money,
    pub risk_free_rate: Percent,
    pub risk_premium: Percent,
    pub capitalization_rate: Percent,
    pub pure_earnings_value: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_value: Option<Money>,
    pub practitioner_adjustment: bool,
    pub final_value: Money,
}

pub type EarningsValueOutput = MethodValuation<EarningsValueDetails>;

impl EarningsValueInput {
    pub fn validate(&self) -> BizValResult<()> {
        if self.historical_earnings.len() < MIN_HISTORY {
            return Err(BizValError::InsufficientData(format!(
                "At least {MIN_HISTORY} years of historical earnings are required, got {}",
                self.historical_earnings.len()
            )));
        }
        ensure_non_negative("risk_free_rate", self.risk_free_rate)?;
        ensure_non_negative("risk_premium", self.risk_premium)?;
        if self.use_practitioner_method && self.asset_value.is_none() {
            return Err(BizValError::invalid(
                "asset_value",
                "Required when use_practitioner_method is set",
            ));
        }
        Ok(())
    }
}

/// Sustainable (average) earnings capitalized at risk-free rate plus premium.
pub fn calculate_earnings_value(
    input: &EarningsValueInput,
) -> BizValResult<ComputationOutput<EarningsValueOutput>> {
    input.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    // Full precision until the reported figures are rounded.
    let sustainable_earnings = mean(&input.historical_earnings)?;
    let capitalization_rate = input.risk_free_rate + input.risk_premium;
    let pure_earnings_value = checked_mul(
        checked_div(sustainable_earnings, capitalization_rate, "capitalization rate")?,
        dec!(100),
        "earnings value",
    )?;

    if input.historical_earnings.iter().any(|e| *e < Decimal::ZERO) {
        warnings.push("Historical earnings include losses; sustainable earnings may be overstated or understated".into());
    }
    if sustainable_earnings <= Decimal::ZERO {
        warnings.push("Sustainable earnings are not positive; earnings value is not meaningful".into());
    }

    let (final_value, asset_value) = match (input.use_practitioner_method, input.asset_value) {
        (true, Some(av)) => {
            let doubled = checked_mul(dec!(2), pure_earnings_value, "practitioner blend")?;
            let total = checked_sum([doubled, av], "practitioner blend")?;
            (
                round_money(checked_div(total, dec!(3), "practitioner blend")?),
                Some(av),
            )
        }
        (_, av) => (round_money(pure_earnings_value), av),
    };

    let output = EarningsValueOutput {
        method: ValuationMethodKind::EarningsValue,
        calculated_value: final_value,
        enterprise_value: None,
        equity_value: None,
        details: EarningsValueDetails {
            historical_earnings: input.historical_earnings.clone(),
            sustainable_earnings: round_money(sustainable_earnings),
            risk_free_rate: input.risk_free_rate,
            risk_premium: input.risk_premium,
            capitalization_rate,
            pure_earnings_value: round_money(pure_earnings_value),
            asset_value,
            practitioner_adjustment: input.use_practitioner_method,
            final_value,
        },
    };

    let methodology = if input.use_practitioner_method {
        "Capitalized earnings value blended 2:1 with asset value"
    } else {
        "Capitalized earnings value"
    };
    Ok(with_metadata(methodology, input, warnings, output))
}
