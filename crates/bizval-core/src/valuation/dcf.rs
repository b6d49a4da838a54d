use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{checked_div, compound, ensure_non_negative, round_money};
use crate::error::BizValError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::BizValResult;

use super::{EquityBridge, MethodValuation, ValuationMethodKind};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input parameters for a Discounted Cash Flow valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfInput {
    /// Free cash flow per explicit forecast year, year 1 first
    pub fcf_projections: Vec<Money>,
    /// Discount rate (fraction)
    pub wacc: Rate,
    /// Perpetuity growth after the last projection year (fraction)
    pub terminal_growth_rate: Rate,
    #[serde(default)]
    pub cash: Money,
    #[serde(default)]
    pub debt: Money,
    #[serde(default)]
    pub non_operating_assets: Money,
}

/// One discounted projection year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfYear {
    pub year: u32,
    pub fcf: Money,
    /// `1 / (1 + wacc)^year`
    pub discount_factor: Decimal,
    pub present_value: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfDetails {
    pub wacc: Rate,
    pub terminal_growth_rate: Rate,
    pub forecast_period: u32,
    pub projections: Vec<DcfYear>,
    pub sum_pv_fcfs: Money,
    /// Gordon growth value at the end of the forecast period
    pub terminal_value: Money,
    pub pv_terminal_value: Money,
    /// Share of enterprise value coming from the terminal value
    pub terminal_value_pct: Rate,
    pub bridge: EquityBridge,
}

pub type DcfOutput = MethodValuation<DcfDetails>;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl DcfInput {
    pub fn validate(&self) -> BizValResult<()> {
        if self.fcf_projections.is_empty() {
            return Err(BizValError::InsufficientData(
                "At least one free cash flow projection is required".into(),
            ));
        }
        if u32::try_from(self.fcf_projections.len()).is_err() {
            return Err(BizValError::invalid("fcf_projections", "Too many projection years"));
        }
        if self.wacc <= Decimal::ZERO {
            return Err(BizValError::invalid("wacc", "WACC must be positive"));
        }
        if self.terminal_growth_rate < Decimal::ZERO {
            return Err(BizValError::invalid(
                "terminal_growth_rate",
                "Terminal growth rate cannot be negative",
            ));
        }
        if self.terminal_growth_rate >= self.wacc {
            return Err(BizValError::invalid(
                "terminal_growth_rate",
                format!(
                    "Terminal growth rate ({}) must be less than WACC ({})",
                    self.terminal_growth_rate, self.wacc
                ),
            ));
        }
        ensure_non_negative("cash", self.cash)?;
        ensure_non_negative("debt", self.debt)?;
        ensure_non_negative("non_operating_assets", self.non_operating_assets)?;
        Ok(())
    }
}

/// Discount explicit cash flows plus a Gordon growth terminal value.
pub fn calculate_dcf(input: &DcfInput) -> BizValResult<ComputationOutput<DcfOutput>> {
    input.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    let (projections, pv_total) = discount_projections(input)?;
    let n_years = projections.len() as u32;
    let last_fcf = input.fcf_projections[input.fcf_projections.len() - 1];

    if input.fcf_projections.iter().any(|f| *f < Decimal::ZERO) {
        warnings.push("One or more projected free cash flows are negative".into());
    }

    let terminal_value = compute_terminal_value(last_fcf, input.wacc, input.terminal_growth_rate)?;
    let tv_discount = compound(input.wacc, n_years, "terminal value discounting")?;
    let pv_terminal = checked_div(terminal_value, tv_discount, "terminal value discounting")?;

    let sum_pv_fcfs = round_money(pv_total);
    let pv_terminal_value = round_money(pv_terminal);
    let enterprise_value = sum_pv_fcfs + pv_terminal_value;

    let terminal_value_pct = if enterprise_value.is_zero() {
        Decimal::ZERO
    } else {
        pv_terminal_value / enterprise_value
    };
    if terminal_value_pct > dec!(0.75) {
        warnings.push(format!(
            "Terminal value represents {:.1}% of enterprise value; consider extending the explicit forecast period",
            terminal_value_pct * dec!(100)
        ));
    }

    let bridge = EquityBridge::from_enterprise_value(
        enterprise_value,
        input.cash,
        input.debt,
        input.non_operating_assets,
    )?;
    let equity_value = bridge.equity_value;

    let output = DcfOutput {
        method: ValuationMethodKind::Dcf,
        calculated_value: equity_value,
        enterprise_value: Some(enterprise_value),
        equity_value: Some(equity_value),
        details: DcfDetails {
            wacc: input.wacc,
            terminal_growth_rate: input.terminal_growth_rate,
            forecast_period: n_years,
            projections,
            sum_pv_fcfs,
            terminal_value: round_money(terminal_value),
            pv_terminal_value,
            terminal_value_pct,
            bridge,
        },
    };

    Ok(with_metadata(
        "DCF with Gordon growth terminal value (end-of-year discounting)",
        input,
        warnings,
        output,
    ))
}

/// Unlevered free cash flow from operating line items:
/// `EBIT * (1 - t) + D&A - CapEx - change in working capital`.
pub fn fcf_from_ebit(
    ebit: Money,
    tax_rate: Rate,
    depreciation: Money,
    capex: Money,
    working_capital_change: Money,
) -> BizValResult<Money> {
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
        return Err(BizValError::invalid("tax_rate", "Tax rate must be between 0 and 1"));
    }
    Ok(ebit * (Decimal::ONE - tax_rate) + depreciation - capex - working_capital_change)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Returns the per-year rows and the unrounded sum of present values.
fn discount_projections(input: &DcfInput) -> BizValResult<(Vec<DcfYear>, Money)> {
    let mut rows = Vec::with_capacity(input.fcf_projections.len());
    let mut pv_total = Decimal::ZERO;

    for (idx, fcf) in input.fcf_projections.iter().enumerate() {
        let year = idx as u32 + 1;
        let growth = compound(input.wacc, year, "FCF discounting")?;
        let pv = checked_div(*fcf, growth, "FCF discounting")?;
        pv_total += pv;
        rows.push(DcfYear {
            year,
            fcf: *fcf,
            discount_factor: checked_div(Decimal::ONE, growth, "discount factor")?,
            present_value: round_money(pv),
        });
    }

    Ok((rows, pv_total))
}

fn compute_terminal_value(last_fcf: Money, wacc: Rate, growth: Rate) -> BizValResult<Money> {
    let denom = wacc - growth;
    if denom <= Decimal::ZERO {
        return Err(BizValError::FinancialImpossibility(
            "WACC must exceed terminal growth rate".into(),
        ));
    }
    checked_div(last_fcf * (Decimal::ONE + growth), denom, "terminal value")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dcf_input() -> DcfInput {
        DcfInput {
            fcf_projections: vec![dec!(100), dec!(110), dec!(121)],
            wacc: dec!(0.10),
            terminal_growth_rate: dec!(0.02),
            cash: dec!(50),
            debt: dec!(200),
            non_operating_assets: Decimal::ZERO,
        }
    }

    #[test]
    fn test_basic_dcf() {
        let out = calculate_dcf(&sample_dcf_input()).unwrap().result;
        let d = &out.details;

        assert_eq!(d.forecast_period, 3);
        // Each year discounts to 90.909..., so PV sum = 272.73
        assert_eq!(d.sum_pv_fcfs, dec!(272.73));
        // TV = 121 * 1.02 / 0.08 = 1542.75
        assert_eq!(d.terminal_value, dec!(1542.75));
        // PV(TV) = 1542.75 / 1.331 = 1159.09
        assert_eq!(d.pv_terminal_value, dec!(1159.09));
        assert_eq!(out.enterprise_value, Some(dec!(1431.82)));
        assert_eq!(out.equity_value, Some(dec!(1281.82)));
        assert_eq!(out.calculated_value, dec!(1281.82));
    }

    #[test]
    fn test_details_reproduce_value() {
        let out = calculate_dcf(&sample_dcf_input()).unwrap().result;
        let d = &out.details;
        assert_eq!(
            out.enterprise_value.unwrap(),
            d.sum_pv_fcfs + d.pv_terminal_value
        );
        assert_eq!(
            out.calculated_value,
            d.bridge.enterprise_value + d.bridge.plus_cash + d.bridge.minus_debt
                + d.bridge.plus_non_operating
        );
    }

    #[test]
    fn test_discount_factors() {
        let out = calculate_dcf(&sample_dcf_input()).unwrap().result;
        let y2 = &out.details.projections[1];
        assert_eq!(y2.year, 2);
        assert_eq!(y2.present_value, dec!(90.91));
        assert!((y2.discount_factor - dec!(0.826446281)).abs() < dec!(0.000000001));
    }

    #[test]
    fn test_terminal_growth_equal_to_wacc_rejected() {
        let mut input = sample_dcf_input();
        input.terminal_growth_rate = dec!(0.10);
        assert!(matches!(
            calculate_dcf(&input),
            Err(BizValError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_negative_growth_rejected() {
        let mut input = sample_dcf_input();
        input.terminal_growth_rate = dec!(-0.01);
        assert!(calculate_dcf(&input).is_err());
    }

    #[test]
    fn test_zero_wacc_rejected() {
        let mut input = sample_dcf_input();
        input.wacc = Decimal::ZERO;
        input.terminal_growth_rate = Decimal::ZERO;
        assert!(calculate_dcf(&input).is_err());
    }

    #[test]
    fn test_empty_projections_rejected() {
        let mut input = sample_dcf_input();
        input.fcf_projections.clear();
        assert!(matches!(
            calculate_dcf(&input),
            Err(BizValError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_tv_share_warning() {
        let out = calculate_dcf(&sample_dcf_input()).unwrap();
        // 1159.09 / 1431.82 is about 81%
        assert!(out.result.details.terminal_value_pct > dec!(0.75));
        assert!(out.warnings.iter().any(|w| w.contains("Terminal value")));
    }

    #[test]
    fn test_fcf_from_ebit() {
        let fcf = fcf_from_ebit(dec!(1000), dec!(0.25), dec!(100), dec!(150), dec!(50)).unwrap();
        assert_eq!(fcf, dec!(650));
        assert!(fcf_from_ebit(dec!(1000), dec!(1.25), dec!(0), dec!(0), dec!(0)).is_err());
    }
}
