use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{checked_mul, ensure_non_negative, round_money};
use crate::error::BizValError;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Percent};
use crate::BizValResult;

use super::{EquityBridge, MethodValuation, ValuationMethodKind};

/// Growth above this many percentage points earns a premium.
const GROWTH_THRESHOLD: Percent = dec!(10);
const GROWTH_PREMIUM_PER_POINT: Decimal = dec!(0.015);
const MAX_GROWTH_FACTOR: Decimal = dec!(0.30);
const MAX_RISK_DISCOUNT: Decimal = dec!(0.30);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanySize {
    Micro,
    Small,
    Medium,
    Large,
}

impl CompanySize {
    pub fn size_factor(self) -> Decimal {
        match self {
            CompanySize::Micro => dec!(-0.20),
            CompanySize::Small => dec!(-0.10),
            CompanySize::Medium => Decimal::ZERO,
            CompanySize::Large => dec!(0.10),
        }
    }
}

impl fmt::Display for CompanySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompanySize::Micro => "micro",
            CompanySize::Small => "small",
            CompanySize::Medium => "medium",
            CompanySize::Large => "large",
        };
        f.write_str(s)
    }
}

/// Input for an EBITDA-multiple valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbitdaMultipleInput {
    /// Normalized EBITDA
    pub ebitda: Money,
    /// Sector base multiple before adjustments
    pub base_multiple: Multiple,
    /// Expected annual growth in percentage points (15 = 15%)
    pub growth_rate: Percent,
    /// 1 (lowest risk) to 10 (highest risk)
    pub risk_score: i32,
    pub company_size: CompanySize,
    #[serde(default)]
    pub cash: Money,
    #[serde(default)]
    pub debt: Money,
    #[serde(default)]
    pub non_operating_assets: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleAdjustments {
    pub growth_factor: Decimal,
    pub risk_factor: Decimal,
    pub size_factor: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbitdaMultipleDetails {
    pub ebitda_normalized: Money,
    pub base_multiple: Multiple,
    /// `base_multiple * (1 + growth - risk + size)`, unrounded
    pub adjusted_multiple: Multiple,
    pub adjustments: MultipleAdjustments,
    pub bridge: EquityBridge,
}

pub type EbitdaMultipleOutput = MethodValuation<EbitdaMultipleDetails>;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl EbitdaMultipleInput {
    pub fn validate(&self) -> BizValResult<()> {
        if !(1..=10).contains(&self.risk_score) {
            return Err(BizValError::invalid(
                "risk_score",
                format!("Must be between 1 and 10, got {}", self.risk_score),
            ));
        }
        if self.growth_rate < Decimal::ZERO {
            return Err(BizValError::invalid("growth_rate", "Must be non-negative"));
        }
        if self.base_multiple <= Decimal::ZERO {
            return Err(BizValError::invalid("base_multiple", "Must be positive"));
        }
        ensure_non_negative("cash", self.cash)?;
        ensure_non_negative("debt", self.debt)?;
        ensure_non_negative("non_operating_assets", self.non_operating_assets)?;
        Ok(())
    }
}

/// Growth premium: zero below 10%, then 1.5 points of multiple per point of
/// growth, capped at 30%.
pub fn growth_factor(growth_rate: Percent) -> Decimal {
    if growth_rate < GROWTH_THRESHOLD {
        return Decimal::ZERO;
    }
    ((growth_rate - GROWTH_THRESHOLD) * GROWTH_PREMIUM_PER_POINT).min(MAX_GROWTH_FACTOR)
}

/// Linear discount: score 1 maps to 0, score 10 to 30%.
pub fn risk_factor(risk_score: i32) -> Decimal {
    Decimal::from(risk_score - 1) / dec!(9) * MAX_RISK_DISCOUNT
}

/// Value a company as adjusted multiple times EBITDA, then bridge to equity.
pub fn calculate_ebitda_multiple(
    input: &EbitdaMultipleInput,
) -> BizValResult<ComputationOutput<EbitdaMultipleOutput>> {
    input.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    let adjustments = MultipleAdjustments {
        growth_factor: growth_factor(input.growth_rate),
        risk_factor: risk_factor(input.risk_score),
        size_factor: input.company_size.size_factor(),
    };
    let adjusted_multiple = checked_mul(
        input.base_multiple,
        Decimal::ONE + adjustments.growth_factor - adjustments.risk_factor
            + adjustments.size_factor,
        "adjusted multiple",
    )?;

    if input.ebitda < Decimal::ZERO {
        warnings.push(format!(
            "Negative EBITDA ({}) produces a negative enterprise value",
            input.ebitda
        ));
    }
    if adjustments.growth_factor == MAX_GROWTH_FACTOR {
        warnings.push(format!(
            "Growth premium capped at {}% of the base multiple",
            MAX_GROWTH_FACTOR * dec!(100)
        ));
    }

    let enterprise_value = round_money(checked_mul(
        input.ebitda,
        adjusted_multiple,
        "enterprise value",
    )?);
    let bridge = EquityBridge::from_enterprise_value(
        enterprise_value,
        input.cash,
        input.debt,
        input.non_operating_assets,
    )?;
    let equity_value = bridge.equity_value;

    let output = EbitdaMultipleOutput {
        method: ValuationMethodKind::EbitdaMultiple,
        calculated_value: equity_value,
        enterprise_value: Some(enterprise_value),
        equity_value: Some(equity_value),
        details: EbitdaMultipleDetails {
            ebitda_normalized: input.ebitda,
            base_multiple: input.base_multiple,
            adjusted_multiple,
            adjustments,
            bridge,
        },
    };

    Ok(with_metadata(
        &format!(
            "EBITDA Multiple ({} company, risk score {})",
            input.company_size, input.risk_score
        ),
        input,
        warnings,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
