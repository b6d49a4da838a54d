use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BizValError;
use crate::parallel::try_parallel_map;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::valuation::{
    asset_value, dcf, earnings_value, ebitda_multiple, practitioner, MethodValuation,
    ValuationMethod,
};
use crate::BizValResult;

pub const DEFAULT_STEPS: u32 = 20;
pub const MAX_STEPS: u32 = 100;

fn default_steps() -> u32 {
    DEFAULT_STEPS
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Linear sweep of one named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityParams {
    pub variable_name: String,
    pub min_value: Decimal,
    pub max_value: Decimal,
    /// Number of intervals; the sweep evaluates `steps + 1` points
    #[serde(default = "default_steps")]
    pub steps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub variable_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_value: Option<Money>,
    pub equity_value: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub variable_name: String,
    /// Value of the variable in the unmodified parameters
    pub base_value: Decimal,
    pub min_value: Decimal,
    pub max_value: Decimal,
    pub steps: u32,
    pub step_size: Decimal,
    pub results: Vec<SensitivityPoint>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl SensitivityParams {
    pub fn validate(&self) -> BizValResult<()> {
        if self.variable_name.trim().is_empty() {
            return Err(BizValError::invalid("variable_name", "Must not be empty"));
        }
        if self.min_value >= self.max_value {
            return Err(BizValError::invalid(
                "min_value",
                format!(
                    "min_value ({}) must be less than max_value ({})",
                    self.min_value, self.max_value
                ),
            ));
        }
        if self.steps < 2 || self.steps > MAX_STEPS {
            return Err(BizValError::invalid(
                "steps",
                format!("Must be between 2 and {MAX_STEPS}, got {}", self.steps),
            ));
        }
        Ok(())
    }

    pub fn step_size(&self) -> Decimal {
        (self.max_value - self.min_value) / Decimal::from(self.steps)
    }

    /// `min + i * step_size` for `i` in `0..=steps`.
    pub fn sweep_values(&self) -> Vec<Decimal> {
        let step = self.step_size();
        (0..=self.steps)
            .map(|i| self.min_value + step * Decimal::from(i))
            .collect()
    }
}

/// Re-run `valuation_fn` with `variable_name` replaced by each sweep value.
///
/// The parameter struct round-trips through its serde representation, so any
/// top-level numeric field can be swept. Integer fields only accept whole
/// sweep values. Points are evaluated independently and returned in
/// ascending order of the variable.
pub fn perform_analysis<P, D, F>(
    params: &SensitivityParams,
    base_params: &P,
    valuation_fn: F,
) -> BizValResult<ComputationOutput<SensitivityOutput>>
where
    P: Serialize + DeserializeOwned,
    D: Serialize,
    F: Fn(&P) -> BizValResult<ComputationOutput<MethodValuation<D>>> + Sync + Send,
{
    params.validate()?;

    let base = serde_json::to_value(base_params)?;
    let base_value = read_scalar(&base, &params.variable_name)?;
    let values = params.sweep_values();

    let results = try_parallel_map(&values, |value| {
        let overridden = override_field(&base, &params.variable_name, *value)?;
        let p: P = serde_json::from_value(overridden).map_err(|e| {
            BizValError::invalid(&params.variable_name, format!("Rejected sweep value {value}: {e}"))
        })?;
        let out = valuation_fn(&p)?.result;
        Ok(SensitivityPoint {
            variable_value: *value,
            enterprise_value: out.enterprise_value,
            equity_value: out.equity_value.unwrap_or(out.calculated_value),
        })
    })?;

    let output = SensitivityOutput {
        variable_name: params.variable_name.clone(),
        base_value,
        min_value: params.min_value,
        max_value: params.max_value,
        steps: params.steps,
        step_size: params.step_size(),
        results,
    };

    Ok(with_metadata(
        &format!("One-way sensitivity sweep of {}", params.variable_name),
        params,
        Vec::new(),
        output,
    ))
}

/// Sweep a field of whichever method payload is selected.
pub fn perform_method_analysis(
    params: &SensitivityParams,
    method: &ValuationMethod,
) -> BizValResult<ComputationOutput<SensitivityOutput>> {
    match method {
        ValuationMethod::EbitdaMultiple(p) => {
            perform_analysis(params, p, ebitda_multiple::calculate_ebitda_multiple)
        }
        ValuationMethod::Dcf(p) => perform_analysis(params, p, dcf::calculate_dcf),
        ValuationMethod::EarningsValue(p) => {
            perform_analysis(params, p, earnings_value::calculate_earnings_value)
        }
        ValuationMethod::AssetValue(p) => {
            perform_analysis(params, p, asset_value::calculate_asset_value)
        }
        ValuationMethod::Practitioner(p) => {
            perform_analysis(params, p, practitioner::calculate_practitioner)
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn field<'a>(params: &'a Value, name: &str) -> BizValResult<&'a Value> {
    params
        .as_object()
        .and_then(|m| m.get(name))
        .ok_or_else(|| BizValError::invalid(name, "Not a parameter of the selected method"))
}

fn read_scalar(params: &Value, name: &str) -> BizValResult<Decimal> {
    match field(params, name)? {
        Value::String(s) => Decimal::from_str(s)
            .map_err(|_| BizValError::invalid(name, "Parameter is not numeric")),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(|_| BizValError::invalid(name, "Parameter is not a finite number")),
        _ => Err(BizValError::invalid(
            name,
            "Only scalar numeric parameters can be swept",
        )),
    }
}

fn override_field(params: &Value, name: &str, value: Decimal) -> BizValResult<Value> {
    let replacement = match field(params, name)? {
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            if !value.fract().is_zero() {
                return Err(BizValError::invalid(
                    name,
                    format!("Integer parameter cannot take fractional value {value}"),
                ));
            }
            let int = value
                .to_i64()
                .ok_or_else(|| BizValError::invalid(name, "Value out of integer range"))?;
            Value::from(int)
        }
        Value::Number(_) => {
            let float = value
                .to_f64()
                .ok_or_else(|| BizValError::invalid(name, "Value out of range"))?;
            Value::from(float)
        }
        Value::String(_) => Value::String(value.to_string()),
        _ => {
            return Err(BizValError::invalid(
                name,
                "Only scalar numeric parameters can be swept",
            ))
        }
    };

    let mut updated = params.clone();
    if let Some(map) = updated.as_object_mut() {
        map.insert(name.to_string(), replacement);
    }
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::ebitda_multiple::{CompanySize, EbitdaMultipleInput};
    use crate::valuation::practitioner::PractitionerInput;
    use rust_decimal_macros::dec;

    fn ebitda_input() -> EbitdaMultipleInput {
        EbitdaMultipleInput {
            ebitda: dec!(1000000),
            base_multiple: dec!(5),
            growth_rate: dec!(15),
            risk_score: 5,
            company_size: CompanySize::Medium,
            cash: Decimal::ZERO,
            debt: Decimal::ZERO,
            non_operating_assets: Decimal::ZERO,
        }
    }

    fn params(name: &str, min: Decimal, max: Decimal, steps: u32) -> SensitivityParams {
        SensitivityParams {
            variable_name: name.into(),
            min_value: min,
            max_value: max,
            steps,
        }
    }

    #[test]
    fn test_sweep_point_count_and_spacing() {
        let p = params("base_multiple", dec!(4), dec!(6), 4);
        let out = perform_analysis(&p, &ebitda_input(), ebitda_multiple::calculate_ebitda_multiple)
            .unwrap()
            .result;
        assert_eq!(out.results.len(), 5);
        assert_eq!(out.step_size, dec!(0.5));
        assert_eq!(out.base_value, dec!(5));
        for pair in out.results.windows(2) {
            assert_eq!(pair[1].variable_value - pair[0].variable_value, out.step_size);
        }
        // Value rises with the multiple
        assert!(out.results[4].equity_value > out.results[0].equity_value);
        assert!(out.results[0].enterprise_value.is_some());
    }

    #[test]
    fn test_base_point_matches_direct_calculation() {
        let p = params("growth_rate", dec!(5), dec!(25), 4);
        let out = perform_analysis(&p, &ebitda_input(), ebitda_multiple::calculate_ebitda_multiple)
            .unwrap()
            .result;
        // growth 15 is the middle point
        assert_eq!(out.results[2].variable_value, dec!(15));
        assert_eq!(out.results[2].equity_value, dec!(4708333.33));
    }

    #[test]
    fn test_integer_field_sweep() {
        let p = params("risk_score", dec!(1), dec!(10), 9);
        let out = perform_analysis(&p, &ebitda_input(), ebitda_multiple::calculate_ebitda_multiple)
            .unwrap()
            .result;
        assert_eq!(out.results.len(), 10);
        assert!(out.results[0].equity_value > out.results[9].equity_value);
    }

    #[test]
    fn test_integer_field_rejects_fractions() {
        let p = params("risk_score", dec!(1), dec!(10), 4);
        assert!(matches!(
            perform_analysis(&p, &ebitda_input(), ebitda_multiple::calculate_ebitda_multiple),
            Err(BizValError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_out_of_domain_value_fails_sweep() {
        let p = params("risk_score", dec!(0), dec!(10), 10);
        assert!(perform_analysis(&p, &ebitda_input(), ebitda_multiple::calculate_ebitda_multiple)
            .is_err());
    }

    #[test]
    fn test_unknown_and_non_numeric_fields() {
        let p = params("no_such_field", dec!(1), dec!(2), 2);
        assert!(perform_analysis(&p, &ebitda_input(), ebitda_multiple::calculate_ebitda_multiple)
            .is_err());
        let p = params("company_size", dec!(1), dec!(2), 2);
        assert!(perform_analysis(&p, &ebitda_input(), ebitda_multiple::calculate_ebitda_multiple)
            .is_err());
    }

    #[test]
    fn test_invalid_sweep_params() {
        assert!(params("x", dec!(2), dec!(2), 5).validate().is_err());
        assert!(params("x", dec!(3), dec!(2), 5).validate().is_err());
        assert!(params("x", dec!(1), dec!(2), 1).validate().is_err());
        assert!(params("x", dec!(1), dec!(2), 101).validate().is_err());
        assert!(params("x", dec!(1), dec!(2), 2).validate().is_ok());
    }

    #[test]
    fn test_method_dispatch() {
        let method = ValuationMethod::Practitioner(PractitionerInput {
            earnings_value: dec!(1000),
            asset_value: dec!(500),
            earnings_weight: dec!(0.5),
        });
        let p = params("earnings_weight", dec!(0), dec!(1), 2);
        let out = perform_method_analysis(&p, &method).unwrap().result;
        let values: Vec<Decimal> = out.results.iter().map(|r| r.equity_value).collect();
        assert_eq!(values, vec![dec!(500), dec!(750), dec!(1000)]);
        assert!(out.results[0].enterprise_value.is_none());
    }

    #[test]
    fn test_default_steps() {
        let p: SensitivityParams = serde_json::from_str(
            r#"{"variable_name": "wacc", "min_value": "0.08", "max_value": "0.12"}"#,
        )
        .unwrap();
        assert_eq!(p.steps, 20);
        assert_eq!(p.sweep_values().len(), 21);
    }
}
