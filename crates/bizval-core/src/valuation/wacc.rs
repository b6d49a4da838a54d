use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::ensure_non_negative;
use crate::error::BizValError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::BizValResult;

/// Input parameters for a CAPM-based cost of capital. Rates are fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccInput {
    /// Risk-free rate (e.g. 10-year government bond yield)
    pub risk_free_rate: Rate,
    /// Levered equity beta
    pub beta: Decimal,
    /// Market risk premium over the risk-free rate
    pub market_risk_premium: Rate,
    #[serde(default)]
    pub size_premium: Rate,
    #[serde(default)]
    pub company_specific_risk: Rate,
    /// Pre-tax interest rate on debt
    pub interest_rate: Rate,
    /// Market value of equity
    pub equity_value: Money,
    /// Market value of debt
    pub debt_value: Money,
    pub tax_rate: Rate,
}

/// Output of the WACC calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccOutput {
    pub wacc: Rate,
    /// Rf + beta * MRP + size premium + company-specific risk
    pub cost_of_equity: Rate,
    pub after_tax_cost_of_debt: Rate,
    pub equity_weight: Rate,
    pub debt_weight: Rate,
}

/// Weighted average cost of capital from CAPM inputs and market-value weights.
///
/// When total capital is zero the firm is treated as all-equity.
pub fn calculate_wacc(input: &WaccInput) -> BizValResult<ComputationOutput<WaccOutput>> {
    validate_wacc_input(input)?;
    let mut warnings: Vec<String> = Vec::new();

    let cost_of_equity = input.risk_free_rate
        + input.beta * input.market_risk_premium
        + input.size_premium
        + input.company_specific_risk;
    let after_tax_cost_of_debt = input.interest_rate * (Decimal::ONE - input.tax_rate);

    let total_capital = input.equity_value + input.debt_value;
    let (equity_weight, debt_weight) = if total_capital > Decimal::ZERO {
        (
            input.equity_value / total_capital,
            input.debt_value / total_capital,
        )
    } else {
        warnings.push("No capital values supplied; assuming an all-equity structure".into());
        (Decimal::ONE, Decimal::ZERO)
    };

    let wacc = cost_of_equity * equity_weight + after_tax_cost_of_debt * debt_weight;

    if input.beta > dec!(3.0) {
        warnings.push(format!(
            "High beta ({}): verify market data; betas above 3.0 are unusual",
            input.beta
        ));
    }
    if input.market_risk_premium > dec!(0.10) {
        warnings.push(format!(
            "Market risk premium ({}) exceeds 10%; verify estimate",
            input.market_risk_premium
        ));
    }
    if wacc > dec!(0.20) {
        warnings.push(format!(
            "WACC of {wacc} exceeds 20%; appropriate for high-risk situations only"
        ));
    }

    let output = WaccOutput {
        wacc,
        cost_of_equity,
        after_tax_cost_of_debt,
        equity_weight,
        debt_weight,
    };

    Ok(with_metadata(
        "WACC via CAPM build-up (market-value weights)",
        input,
        warnings,
        output,
    ))
}

fn validate_wacc_input(input: &WaccInput) -> BizValResult<()> {
    ensure_non_negative("risk_free_rate", input.risk_free_rate)?;
    ensure_non_negative("market_risk_premium", input.market_risk_premium)?;
    ensure_non_negative("size_premium", input.size_premium)?;
    ensure_non_negative("company_specific_risk", input.company_specific_risk)?;
    ensure_non_negative("interest_rate", input.interest_rate)?;
    ensure_non_negative("equity_value", input.equity_value)?;
    ensure_non_negative("debt_value", input.debt_value)?;
    if input.beta <= Decimal::ZERO {
        return Err(BizValError::invalid("beta", "Beta must be positive"));
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        return Err(BizValError::invalid("tax_rate", "Tax rate must be between 0 and 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> WaccInput {
        WaccInput {
            risk_free_rate: dec!(0.02),
            beta: dec!(1.2),
            market_risk_premium: dec!(0.05),
            size_premium: dec!(0.01),
            company_specific_risk: Decimal::ZERO,
            interest_rate: dec!(0.04),
            equity_value: dec!(600),
            debt_value: dec!(400),
            tax_rate: dec!(0.20),
        }
    }

    #[test]
    fn test_basic_wacc() {
        let out = calculate_wacc(&sample_input()).unwrap().result;
        // Ke = 0.02 + 1.2 * 0.05 + 0.01 = 0.09
        assert_eq!(out.cost_of_equity, dec!(0.09));
        // Kd = 0.04 * 0.8 = 0.032
        assert_eq!(out.after_tax_cost_of_debt, dec!(0.032));
        assert_eq!(out.equity_weight, dec!(0.6));
        assert_eq!(out.debt_weight, dec!(0.4));
        // 0.09 * 0.6 + 0.032 * 0.4 = 0.054 + 0.0128
        assert_eq!(out.wacc, dec!(0.0668));
    }

    #[test]
    fn test_zero_capital_is_all_equity() {
        let mut input = sample_input();
        input.equity_value = Decimal::ZERO;
        input.debt_value = Decimal::ZERO;
        let out = calculate_wacc(&input).unwrap();
        assert_eq!(out.result.equity_weight, Decimal::ONE);
        assert_eq!(out.result.wacc, out.result.cost_of_equity);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_high_beta_warning() {
        let mut input = sample_input();
        input.beta = dec!(3.5);
        let out = calculate_wacc(&input).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("High beta")));
    }

    #[test]
    fn test_invalid_tax_rate() {
        let mut input = sample_input();
        input.tax_rate = dec!(1.5);
        assert!(calculate_wacc(&input).is_err());
    }

    #[test]
    fn test_non_positive_beta() {
        let mut input = sample_input();
        input.beta = Decimal::ZERO;
        assert!(calculate_wacc(&input).is_err());
    }
}
