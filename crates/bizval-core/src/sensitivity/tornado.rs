use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BizValError;
use crate::parallel::try_parallel_map;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::valuation::ValuationMethod;
use crate::BizValResult;

use super::sweep::{perform_method_analysis, SensitivityOutput, SensitivityParams};

/// One bar of a tornado chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TornadoEntry {
    pub variable_name: String,
    pub base_valuation: Money,
    pub min_valuation: Money,
    pub max_valuation: Money,
    /// `|base - min|`
    pub downside_impact: Money,
    /// `|max - base|`
    pub upside_impact: Money,
    pub total_impact: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TornadoOutput {
    pub base_valuation: Money,
    /// Sorted by `total_impact`, largest first
    pub entries: Vec<TornadoEntry>,
    pub sweeps: Vec<SensitivityOutput>,
}

/// Rank swept variables by total swing in equity value.
///
/// The sort is stable: variables with equal impact keep their input order.
pub fn rank_by_impact(
    base_value: Money,
    sweeps: &[SensitivityOutput],
) -> BizValResult<Vec<TornadoEntry>> {
    let mut entries = Vec::with_capacity(sweeps.len());

    for sweep in sweeps {
        let values = sweep.results.iter().map(|r| r.equity_value);
        let (min_valuation, max_valuation) = match (values.clone().min(), values.max()) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => {
                return Err(BizValError::InsufficientData(format!(
                    "Sweep of '{}' has no results",
                    sweep.variable_name
                )))
            }
        };
        let downside_impact = (base_value - min_valuation).abs();
        let upside_impact = (max_valuation - base_value).abs();
        entries.push(TornadoEntry {
            variable_name: sweep.variable_name.clone(),
            base_valuation: base_value,
            min_valuation,
            max_valuation,
            downside_impact,
            upside_impact,
            total_impact: downside_impact + upside_impact,
        });
    }

    entries.sort_by(|a, b| b.total_impact.cmp(&a.total_impact));
    Ok(entries)
}

/// Value the base case, sweep each variable, and rank the drivers.
pub fn run_tornado(
    method: &ValuationMethod,
    sweeps: &[SensitivityParams],
) -> BizValResult<ComputationOutput<TornadoOutput>> {
    if sweeps.is_empty() {
        return Err(BizValError::InsufficientData(
            "At least one sweep variable is required".into(),
        ));
    }
    method.validate()?;
    for s in sweeps {
        s.validate()?;
    }

    let base = method.calculate()?;
    let base_valuation = base
        .result
        .equity_value
        .unwrap_or(base.result.calculated_value);

    let outputs = try_parallel_map(sweeps, |s| perform_method_analysis(s, method))?;
    let sweep_results: Vec<SensitivityOutput> = outputs.into_iter().map(|o| o.result).collect();
    let entries = rank_by_impact(base_valuation, &sweep_results)?;

    let mut warnings = base.warnings;
    if let Some(top) = entries.first() {
        if top.total_impact.is_zero() {
            warnings.push("No swept variable moves the valuation".into());
        }
    }

    let output = TornadoOutput {
        base_valuation,
        entries,
        sweeps: sweep_results,
    };

    Ok(with_metadata(
        &format!("Tornado analysis ({} method)", method.kind()),
        &serde_json::json!({
            "method": method.kind(),
            "variables": sweeps.iter().map(|s| s.variable_name.as_str()).collect::<Vec<_>>(),
        }),
        warnings,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensitivity::SensitivityPoint;
    use crate::valuation::practitioner::PractitionerInput;
    use rust_decimal_macros::dec;

    fn sweep(name: &str, values: &[Decimal]) -> SensitivityOutput {
        SensitivityOutput {
            variable_name: name.into(),
            base_value: Decimal::ZERO,
            min_value: Decimal::ZERO,
            max_value: Decimal::ONE,
            steps: values.len() as u32 - 1,
            step_size: Decimal::ONE,
            results: values
                .iter()
                .map(|v| SensitivityPoint {
                    variable_value: Decimal::ZERO,
                    enterprise_value: None,
                    equity_value: *v,
                })
                .collect(),
        }
    }

    #[test]
    fn test_ranking_and_impacts() {
        let sweeps = vec![
            sweep("small", &[dec!(95), dec!(100), dec!(105)]),
            sweep("large", &[dec!(60), dec!(100), dec!(150)]),
            sweep("one_sided", &[dec!(100), dec!(120), dec!(130)]),
        ];
        let entries = rank_by_impact(dec!(100), &sweeps).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.variable_name.as_str()).collect();
        assert_eq!(names, vec!["large", "one_sided", "small"]);

        assert_eq!(entries[0].downside_impact, dec!(40));
        assert_eq!(entries[0].upside_impact, dec!(50));
        assert_eq!(entries[0].total_impact, dec!(90));
        assert_eq!(entries[1].downside_impact, Decimal::ZERO);
        for e in &entries {
            assert_eq!(e.total_impact, e.downside_impact + e.upside_impact);
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let sweeps = vec![
            sweep("first", &[dec!(90), dec!(110)]),
            sweep("second", &[dec!(90), dec!(110)]),
        ];
        let entries = rank_by_impact(dec!(100), &sweeps).unwrap();
        assert_eq!(entries[0].variable_name, "first");
        assert_eq!(entries[1].variable_name, "second");
    }

    #[test]
    fn test_empty_sweep_rejected() {
        let sweeps = vec![sweep("empty", &[dec!(1)])];
        let mut empty = sweeps[0].clone();
        empty.results.clear();
        assert!(rank_by_impact(dec!(1), &[empty]).is_err());
    }

    #[test]
    fn test_run_tornado() {
        let method = ValuationMethod::Practitioner(PractitionerInput {
            earnings_value: dec!(1000),
            asset_value: dec!(500),
            earnings_weight: dec!(0.5),
        });
        let sweeps = vec![
            SensitivityParams {
                variable_name: "asset_value".into(),
                min_value: dec!(400),
                max_value: dec!(600),
                steps: 2,
            },
            SensitivityParams {
                variable_name: "earnings_value".into(),
                min_value: dec!(500),
                max_value: dec!(1500),
                steps: 2,
            },
        ];
        let out = run_tornado(&method, &sweeps).unwrap().result;
        assert_eq!(out.base_valuation, dec!(750));
        assert_eq!(out.entries[0].variable_name, "earnings_value");
        assert_eq!(out.entries[0].total_impact, dec!(500));
        assert_eq!(out.entries[1].total_impact, dec!(100));
        assert_eq!(out.sweeps.len(), 2);
    }

    #[test]
    fn test_run_tornado_requires_sweeps() {
        let method = ValuationMethod::Practitioner(PractitionerInput {
            earnings_value: dec!(1),
            asset_value: dec!(1),
            earnings_weight: dec!(0.5),
        });
        assert!(run_tornado(&method, &[]).is_err());
    }
}
