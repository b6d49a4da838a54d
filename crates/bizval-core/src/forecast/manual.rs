use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{checked_div, mean, population_std, round_money, round_rate};
use crate::error::BizValError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::BizValResult;

use super::scenarios::{self, ScenarioPolicy, ScenarioSet};
use super::series::{validate_history, validated_series, MAX_HORIZON};
use super::{DataQuality, ForecastMethodKind, ForecastResult, HistoricalPoint, Prediction, ScenarioKind};

/// Year-over-year change beyond this is flagged as implausible.
const EXTREME_GROWTH: Rate = dec!(0.5);

fn default_confidence_width() -> Rate {
    dec!(0.15)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// User-supplied projections checked against history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualForecastInput {
    pub historical_data: Vec<HistoricalPoint>,
    /// One value per projected year
    pub projections: Vec<HistoricalPoint>,
    /// Synthetic interval half-width as a fraction of each value
    #[serde(default = "default_confidence_width")]
    pub confidence_width: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlausibilityReport {
    pub is_plausible: bool,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_avg_growth: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualParameters {
    pub projection_count: usize,
    pub confidence_width: Rate,
}

/// Manual forecasts have no fit, so metrics describe the history instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSummary {
    pub historical_avg: Money,
    /// Population standard deviation
    pub historical_std: Money,
    pub coefficient_of_variation: Decimal,
}

pub type ManualForecastOutput = ForecastResult<ManualParameters, HistoricalSummary>;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl ManualForecastInput {
    pub fn validate(&self) -> BizValResult<()> {
        validate_history(&self.historical_data)?;
        validated_series(&self.projections, "projections", 1)?;
        if self.projections.len() > MAX_HORIZON as usize {
            return Err(BizValError::invalid(
                "projections",
                format!("At most {MAX_HORIZON} projected years are supported"),
            ));
        }
        if self.confidence_width < Decimal::ZERO || self.confidence_width >= Decimal::ONE {
            return Err(BizValError::invalid("confidence_width", "Must be in [0, 1)"));
        }
        Ok(())
    }
}

/// Compare each projected transition, starting from the last historical
/// value, with the historical growth record.
///
/// Transitions whose base is zero cannot be expressed as a growth rate and
/// are flagged when they move away from zero. A history made only of zeros
/// has no growth record at all and is rejected.
pub fn validate_plausibility(
    projections: &[HistoricalPoint],
    history: &[HistoricalPoint],
) -> BizValResult<PlausibilityReport> {
    let Some(last) = history.last() else {
        return Ok(PlausibilityReport {
            is_plausible: true,
            warnings: vec!["No historical data available for comparison".into()],
            historical_avg_growth: None,
        });
    };
    if history.iter().all(|p| p.value.is_zero()) {
        return Err(BizValError::DivisionByZero {
            context: "historical growth rates (all historical values are zero)".into(),
        });
    }

    let mut growth_rates = Vec::with_capacity(history.len());
    for pair in history.windows(2) {
        if !pair[0].value.is_zero() {
            growth_rates.push((pair[1].value - pair[0].value) / pair[0].value);
        }
    }
    let avg_growth = if growth_rates.is_empty() {
        Decimal::ZERO
    } else {
        mean(&growth_rates)?
    };

    let mut warnings = Vec::new();
    let mut previous = last.value;
    for p in projections {
        if previous.is_zero() {
            if !p.value.is_zero() {
                warnings.push(format!(
                    "Year {}: Growth from a zero base cannot be assessed",
                    p.year
                ));
            }
        } else {
            let growth = checked_div(p.value - previous, previous, "projected growth")?;
            if growth.abs() > EXTREME_GROWTH {
                warnings.push(format!(
                    "Year {}: Extreme growth rate of {:.1}% (historical average: {:.1}%)",
                    p.year,
                    (growth * dec!(100)).round_dp(1),
                    (avg_growth * dec!(100)).round_dp(1)
                ));
            }
        }
        if p.value < Decimal::ZERO {
            warnings.push(format!("Year {}: Negative value projected", p.year));
        }
        previous = p.value;
    }

    Ok(PlausibilityReport {
        is_plausible: warnings.is_empty(),
        warnings,
        historical_avg_growth: Some(round_rate(avg_growth)),
    })
}

/// Attach a symmetric interval of `width` around each projection.
pub fn confidence_intervals(projections: &[HistoricalPoint], width: Rate) -> Vec<Prediction> {
    projections
        .iter()
        .map(|p| Prediction {
            year: p.year,
            predicted_value: round_money(p.value),
            lower_bound: round_money(p.value * (Decimal::ONE - width)),
            upper_bound: round_money(p.value * (Decimal::ONE + width)),
            scenario: ScenarioKind::Base,
            trend: None,
            seasonal: None,
        })
        .collect()
}

pub fn calculate_manual(
    input: &ManualForecastInput,
) -> BizValResult<ComputationOutput<ManualForecastOutput>> {
    input.validate()?;
    let history = validate_history(&input.historical_data)?;
    let projections = validated_series(&input.projections, "projections", 1)?;

    let validation = validate_plausibility(&projections, &history)?;
    let predictions = confidence_intervals(&projections, input.confidence_width);

    let values: Vec<Decimal> = history.iter().map(|p| p.value).collect();
    let avg = mean(&values)?;
    let std = population_std(&values)?;
    let coefficient_of_variation = if avg > Decimal::ZERO {
        round_rate(std / avg)
    } else {
        Decimal::ZERO
    };

    let output = ManualForecastOutput {
        method: ForecastMethodKind::Manual,
        predictions,
        model_parameters: ManualParameters {
            projection_count: projections.len(),
            confidence_width: input.confidence_width,
        },
        model_metrics: HistoricalSummary {
            historical_avg: round_money(avg),
            historical_std: round_money(std),
            coefficient_of_variation,
        },
        data_quality: DataQuality {
            data_points: history.len(),
            outliers_detected: None,
            missing_values: 0,
            projection_points: Some(projections.len()),
        },
        validation: Some(validation.clone()),
    };

    Ok(with_metadata(
        "Manual projections with plausibility check",
        input,
        validation.warnings,
        output,
    ))
}

/// Best = base x 1.20, worst = base x 0.80.
pub fn generate_scenarios(base: &[Prediction]) -> BizValResult<ScenarioSet> {
    scenarios::generate_scenarios(base, &ScenarioPolicy::manual_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(items: &[(i32, Decimal)]) -> Vec<HistoricalPoint> {
        items
            .iter()
            .map(|(year, value)| HistoricalPoint {
                year: *year,
                value: *value,
            })
            .collect()
    }

    fn sample_input() -> ManualForecastInput {
        ManualForecastInput {
            historical_data: pts(&[(2021, dec!(100)), (2022, dec!(110)), (2023, dec!(121))]),
            projections: pts(&[(2024, dec!(133.1)), (2025, dec!(146.41))]),
            confidence_width: dec!(0.15),
        }
    }

    #[test]
    fn test_intervals_and_metrics() {
        let out = calculate_manual(&sample_input()).unwrap();
        let r = &out.result;
        assert_eq!(r.predictions.len(), 2);
        assert_eq!(r.predictions[0].predicted_value, dec!(133.10));
        assert_eq!(r.predictions[0].lower_bound, dec!(113.14));
        assert_eq!(r.predictions[0].upper_bound, dec!(153.06));
        assert_eq!(r.model_metrics.historical_avg, dec!(110.33));
        assert_eq!(r.model_parameters.projection_count, 2);
        assert_eq!(r.data_quality.projection_points, Some(2));
        assert!(r.validation.as_ref().unwrap().is_plausible);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_extreme_growth_flagged() {
        let mut input = sample_input();
        input.projections = pts(&[(2024, dec!(200)), (2025, dec!(210))]);
        let out = calculate_manual(&input).unwrap();
        let report = out.result.validation.unwrap();
        assert!(!report.is_plausible);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            report.warnings[0],
            "Year 2024: Extreme growth rate of 65.3% (historical average: 10.0%)"
        );
        assert_eq!(report.historical_avg_growth, Some(dec!(0.1)));
    }

    #[test]
    fn test_collapse_flagged() {
        let mut input = sample_input();
        input.projections = pts(&[(2024, dec!(50))]);
        let report = calculate_manual(&input).unwrap().result.validation.unwrap();
        assert!(report.warnings[0].starts_with("Year 2024: Extreme growth rate of -58.7%"));
    }

    #[test]
    fn test_no_history_is_plausible() {
        let report = validate_plausibility(&pts(&[(2024, dec!(10))]), &[]).unwrap();
        assert!(report.is_plausible);
        assert_eq!(report.warnings, vec!["No historical data available for comparison"]);
    }

    #[test]
    fn test_all_zero_history() {
        let mut input = sample_input();
        input.historical_data = pts(&[(2021, dec!(0)), (2022, dec!(0)), (2023, dec!(0))]);
        assert!(matches!(
            calculate_manual(&input),
            Err(BizValError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_zero_base_transition() {
        let history = pts(&[(2021, dec!(10)), (2022, dec!(5)), (2023, dec!(0))]);
        let report = validate_plausibility(&pts(&[(2024, dec!(8))]), &history).unwrap();
        assert_eq!(
            report.warnings,
            vec!["Year 2024: Growth from a zero base cannot be assessed"]
        );
    }

    #[test]
    fn test_negative_value_flagged_by_check() {
        let history = pts(&[(2021, dec!(10)), (2022, dec!(11)), (2023, dec!(12))]);
        let report = validate_plausibility(&pts(&[(2024, dec!(-1))]), &history).unwrap();
        assert!(report.warnings.iter().any(|w| w == "Year 2024: Negative value projected"));
    }

    #[test]
    fn test_validation_rules() {
        let mut input = sample_input();
        input.projections = pts(&[(2024, dec!(1)), (2024, dec!(2))]);
        assert!(calculate_manual(&input).is_err());

        let mut input = sample_input();
        input.projections.clear();
        assert!(calculate_manual(&input).is_err());

        let mut input = sample_input();
        input.projections = pts(&[(2024, dec!(-5))]);
        assert!(calculate_manual(&input).is_err());

        let mut input = sample_input();
        input.historical_data.truncate(2);
        assert!(matches!(
            calculate_manual(&input),
            Err(BizValError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_scenarios() {
        let out = calculate_manual(&sample_input()).unwrap().result;
        let set = generate_scenarios(&out.predictions).unwrap();
        for (b, best) in set.base.iter().zip(&set.best) {
            assert_eq!(best.predicted_value, b.predicted_value * dec!(1.20));
            assert_eq!(best.lower_bound, b.lower_bound);
            assert_eq!(best.upper_bound, b.upper_bound);
        }
        for (b, worst) in set.base.iter().zip(&set.worst) {
            assert_eq!(worst.predicted_value, b.predicted_value * dec!(0.80));
        }
    }
}
