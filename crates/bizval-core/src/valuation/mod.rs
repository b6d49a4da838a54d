//! Company valuation calculators.
//!
//! Each method is a pure function of its parameter struct and returns a
//! [`MethodValuation`] whose `details` carry every line item needed to
//! recompute `calculated_value`.

pub mod asset_value;
pub mod blend;
pub mod dcf;
pub mod earnings_value;
pub mod ebitda_multiple;
pub mod practitioner;
pub mod wacc;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decimal::{checked_sum, round_money};
use crate::types::{ComputationOutput, Money};
use crate::BizValResult;

use asset_value::AssetValueInput;
use dcf::DcfInput;
use earnings_value::EarningsValueInput;
use ebitda_multiple::EbitdaMultipleInput;
use practitioner::PractitionerInput;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMethodKind {
    EbitdaMultiple,
    Dcf,
    EarningsValue,
    AssetValue,
    Practitioner,
}

impl fmt::Display for ValuationMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValuationMethodKind::EbitdaMultiple => "ebitda_multiple",
            ValuationMethodKind::Dcf => "dcf",
            ValuationMethodKind::EarningsValue => "earnings_value",
            ValuationMethodKind::AssetValue => "asset_value",
            ValuationMethodKind::Practitioner => "practitioner",
        };
        f.write_str(name)
    }
}

/// Result of a single valuation method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodValuation<D> {
    pub method: ValuationMethodKind,
    /// The value a weighted blend uses.
    pub calculated_value: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise_value: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity_value: Option<Money>,
    pub details: D,
}

impl<D: Serialize> MethodValuation<D> {
    /// Convert structured details into a generic key-value tree for transport.
    pub fn into_untyped(self) -> BizValResult<MethodValuation<Value>> {
        Ok(MethodValuation {
            method: self.method,
            calculated_value: self.calculated_value,
            enterprise_value: self.enterprise_value,
            equity_value: self.equity_value,
            details: serde_json::to_value(&self.details)?,
        })
    }
}

/// Enterprise-to-equity bridge shared by the EV-based methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityBridge {
    pub enterprise_value: Money,
    pub plus_cash: Money,
    /// Reported as a negative number.
    pub minus_debt: Money,
    pub plus_non_operating: Money,
    pub equity_value: Money,
}

impl EquityBridge {
    /// `enterprise_value` must already be quantized.
    pub(crate) fn from_enterprise_value(
        enterprise_value: Money,
        cash: Money,
        debt: Money,
        non_operating_assets: Money,
    ) -> BizValResult<Self> {
        let equity_value = checked_sum(
            [enterprise_value, cash, -debt, non_operating_assets],
            "equity bridge",
        )?;
        Ok(EquityBridge {
            enterprise_value,
            plus_cash: cash,
            minus_debt: -debt,
            plus_non_operating: non_operating_assets,
            equity_value: round_money(equity_value),
        })
    }
}

/// Closed set of valuation methods, each with its typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "parameters", rename_all = "snake_case")]
pub enum ValuationMethod {
    EbitdaMultiple(EbitdaMultipleInput),
    Dcf(DcfInput),
    EarningsValue(EarningsValueInput),
    AssetValue(AssetValueInput),
    Practitioner(PractitionerInput),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl ValuationMethod {
    pub fn kind(&self) -> ValuationMethodKind {
        match self {
            ValuationMethod::EbitdaMultiple(_) => ValuationMethodKind::EbitdaMultiple,
            ValuationMethod::Dcf(_) => ValuationMethodKind::Dcf,
            ValuationMethod::EarningsValue(_) => ValuationMethodKind::EarningsValue,
            ValuationMethod::AssetValue(_) => ValuationMethodKind::AssetValue,
            ValuationMethod::Practitioner(_) => ValuationMethodKind::Practitioner,
        }
    }

    pub fn validate(&self) -> BizValResult<()> {
        match self {
            ValuationMethod::EbitdaMultiple(p) => p.validate(),
            ValuationMethod::Dcf(p) => p.validate(),
            ValuationMethod::EarningsValue(p) => p.validate(),
            ValuationMethod::AssetValue(p) => p.validate(),
            ValuationMethod::Practitioner(p) => p.validate(),
        }
    }

    /// Run the selected calculator and return its result with untyped details.
    pub fn calculate(&self) -> BizValResult<ComputationOutput<MethodValuation<Value>>> {
        match self {
            ValuationMethod::EbitdaMultiple(p) => {
                untyped(ebitda_multiple::calculate_ebitda_multiple(p)?)
            }
            ValuationMethod::Dcf(p) => untyped(dcf::calculate_dcf(p)?),
            ValuationMethod::EarningsValue(p) => {
                untyped(earnings_value::calculate_earnings_value(p)?)
            }
            ValuationMethod::AssetValue(p) => untyped(asset_value::calculate_asset_value(p)?),
            ValuationMethod::Practitioner(p) => untyped(practitioner::calculate_practitioner(p)?),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn untyped<D: Serialize>(
    output: ComputationOutput<MethodValuation<D>>,
) -> BizValResult<ComputationOutput<MethodValuation<Value>>> {
    let result = output.result.into_untyped()?;
    Ok(ComputationOutput {
        result,
        methodology: output.methodology,
        assumptions: output.assumptions,
        warnings: output.warnings,
        metadata: output.metadata,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_method_kind_display_matches_serde() {
        for kind in [
            ValuationMethodKind::EbitdaMultiple,
            ValuationMethodKind::Dcf,
            ValuationMethodKind::EarningsValue,
            ValuationMethodKind::AssetValue,
            ValuationMethodKind::Practitioner,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, Value::String(kind.to_string()));
        }
    }

    #[test]
    fn test_bridge_identity() {
        let bridge =
            EquityBridge::from_enterprise_value(dec!(1000.00), dec!(50), dec!(300), dec!(25.5))
                .unwrap();
        assert_eq!(bridge.minus_debt, dec!(-300));
        assert_eq!(bridge.equity_value, dec!(775.50));
        assert_eq!(
            bridge.equity_value,
            bridge.enterprise_value + bridge.plus_cash + bridge.minus_debt
                + bridge.plus_non_operating
        );
    }

    #[test]
    fn test_tagged_dispatch_from_json() {
        let json = serde_json::json!({
            "method": "practitioner",
            "parameters": {
                "earnings_value": "1000000",
                "asset_value": "700000",
                "earnings_weight": "0.67"
            }
        });
        let method: ValuationMethod = serde_json::from_value(json).unwrap();
        assert_eq!(method.kind(), ValuationMethodKind::Practitioner);
        let out = method.calculate().unwrap();
        assert_eq!(out.result.calculated_value, dec!(901000.00));
        assert_eq!(out.result.method, ValuationMethodKind::Practitioner);
        assert!(out.result.details.get("weighted_value").is_some());
    }

    #[test]
    fn test_unknown_method_rejected_at_parse() {
        let json = serde_json::json!({"method": "magic", "parameters": {}});
        assert!(serde_json::from_value::<ValuationMethod>(json).is_err());
    }
}
