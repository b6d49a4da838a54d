use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ValuationSettings;
use crate::decimal::{ensure_unit_interval, normalize_weights, round_money};
use crate::error::BizValError;
use crate::parallel::try_parallel_map;
use crate::types::{with_metadata, ComputationOutput, Currency, Money, Rate};
use crate::BizValResult;

use super::{MethodValuation, ValuationMethod};

fn default_weight() -> Rate {
    Decimal::ONE
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A method and its relative weight in the blend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedMethod {
    #[serde(flatten)]
    pub method: ValuationMethod,
    #[serde(default = "default_weight")]
    pub weight: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub methods: Vec<WeightedMethod>,
    /// Falls back to the configured default currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendedMethodResult {
    #[serde(flatten)]
    pub valuation: MethodValuation<Value>,
    /// Weight as supplied
    pub input_weight: Rate,
    /// Weight after normalization; these sum to one
    pub weight: Rate,
    pub contribution: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendedValuation {
    pub method_results: Vec<BlendedMethodResult>,
    pub final_value: Money,
    pub final_value_min: Money,
    pub final_value_max: Money,
    pub currency: Currency,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl ValuationRequest {
    /// Validates every method before anything is computed.
    pub fn validate(&self) -> BizValResult<()> {
        if self.methods.is_empty() {
            return Err(BizValError::InsufficientData(
                "At least one valuation method is required".into(),
            ));
        }
        for (i, m) in self.methods.iter().enumerate() {
            ensure_unit_interval(&format!("methods[{i}].weight"), m.weight)?;
            m.method.validate()?;
        }
        Ok(())
    }
}

/// Run every requested method and blend the results by normalized weight.
///
/// The value range is `final_value * (1 -/+ range_width)`.
pub fn run_valuation(
    request: &ValuationRequest,
    settings: &ValuationSettings,
) -> BizValResult<ComputationOutput<BlendedValuation>> {
    settings.validate()?;
    request.validate()?;

    let raw_weights: Vec<Rate> = request.methods.iter().map(|m| m.weight).collect();
    let weights = normalize_weights(&raw_weights)?;

    let outputs = try_parallel_map(&request.methods, |m| m.method.calculate())?;

    let mut warnings: Vec<String> = Vec::new();
    let mut method_results = Vec::with_capacity(outputs.len());
    let mut blended = Decimal::ZERO;

    for ((output, weight), input) in outputs.into_iter().zip(weights).zip(&request.methods) {
        let kind = output.result.method;
        for w in &output.warnings {
            warnings.push(format!("[{kind}] {w}"));
        }
        let contribution = output.result.calculated_value * weight;
        blended += contribution;
        method_results.push(BlendedMethodResult {
            valuation: output.result,
            input_weight: input.weight,
            weight,
            contribution: round_money(contribution),
        });
    }

    let final_value = round_money(blended);
    let low = round_money(final_value * (Decimal::ONE - settings.range_width));
    let high = round_money(final_value * (Decimal::ONE + settings.range_width));

    if final_value < Decimal::ZERO {
        warnings.push("Blended value is negative".into());
    }

    let output = BlendedValuation {
        method_results,
        final_value,
        final_value_min: low.min(high),
        final_value_max: low.max(high),
        currency: request
            .currency
            .clone()
            .unwrap_or_else(|| settings.default_currency.clone()),
    };

    Ok(with_metadata(
        "Weighted blend of valuation methods",
        request,
        warnings,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::asset_value::AssetValueInput;
    use crate::valuation::practitioner::PractitionerInput;
    use crate::valuation::ValuationMethodKind;
    use rust_decimal_macros::dec;

    fn practitioner(earnings: Decimal, assets: Decimal) -> ValuationMethod {
        ValuationMethod::Practitioner(PractitionerInput {
            earnings_value: earnings,
            asset_value: assets,
            earnings_weight: Decimal::ONE,
        })
    }

    fn request(items: Vec<(ValuationMethod, Decimal)>) -> ValuationRequest {
        ValuationRequest {
            methods: items
                .into_iter()
                .map(|(method, weight)| WeightedMethod { method, weight })
                .collect(),
            currency: None,
        }
    }

    #[test]
    fn test_weighted_blend() {
        let req = request(vec![
            (practitioner(dec!(1000), dec!(0)), dec!(0.5)),
            (practitioner(dec!(2000), dec!(0)), dec!(0.25)),
        ]);
        let out = run_valuation(&req, &ValuationSettings::default()).unwrap().result;
        // Normalized weights 2/3 and 1/3
        assert_eq!(out.final_value, dec!(1333.33));
        assert_eq!(out.final_value_min, dec!(1133.33));
        assert_eq!(out.final_value_max, dec!(1533.33));
        assert_eq!(out.currency, Currency::CHF);
        let total: Decimal = out.method_results.iter().map(|r| r.weight).sum();
        assert!((total - Decimal::ONE).abs() < dec!(0.0000000001));
    }

    #[test]
    fn test_range_contains_negative_value() {
        let req = request(vec![(
            ValuationMethod::AssetValue(AssetValueInput {
                real_estate_value: Decimal::ZERO,
                machinery_replacement_value: Decimal::ZERO,
                machinery_depreciation: Decimal::ZERO,
                inventory_value: Decimal::ZERO,
                receivables: Decimal::ZERO,
                receivables_risk: Decimal::ZERO,
                cash: dec!(100),
                intangible_assets: Decimal::ZERO,
                liabilities: dec!(1100),
            }),
            Decimal::ONE,
        )]);
        let out = run_valuation(&req, &ValuationSettings::default()).unwrap().result;
        assert_eq!(out.final_value, dec!(-1000));
        assert!(out.final_value_min <= out.final_value);
        assert!(out.final_value <= out.final_value_max);
    }

    #[test]
    fn test_zero_weights_rejected() {
        let req = request(vec![(practitioner(dec!(1), dec!(1)), Decimal::ZERO)]);
        assert!(run_valuation(&req, &ValuationSettings::default()).is_err());
    }

    #[test]
    fn test_weight_above_one_rejected() {
        let req = request(vec![(practitioner(dec!(1), dec!(1)), dec!(1.5))]);
        assert!(matches!(
            run_valuation(&req, &ValuationSettings::default()),
            Err(BizValError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_empty_request_rejected() {
        let req = request(vec![]);
        assert!(run_valuation(&req, &ValuationSettings::default()).is_err());
    }

    #[test]
    fn test_method_warnings_prefixed() {
        let req = request(vec![(practitioner(dec!(100), dec!(200)), Decimal::ONE)]);
        let out = run_valuation(&req, &ValuationSettings::default()).unwrap();
        assert!(out.warnings[0].starts_with("[practitioner]"));
        assert_eq!(
            out.result.method_results[0].valuation.method,
            ValuationMethodKind::Practitioner
        );
    }

    #[test]
    fn test_request_from_json_defaults_weight() {
        let json = serde_json::json!({
            "methods": [{
                "method": "practitioner",
                "parameters": {"earnings_value": "100", "asset_value": "50"}
            }]
        });
        let req: ValuationRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.methods[0].weight, Decimal::ONE);
    }
}
