//! Best/worst envelopes derived from a base forecast.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::BizValError;
use crate::BizValResult;

use super::{Prediction, ScenarioKind};

/// Rule for deriving best and worst cases from base predictions. Scenario
/// points keep the base interval unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ScenarioPolicy {
    /// best = predicted * best_factor, worst = predicted * worst_factor
    PointMultiplier {
        best_factor: Decimal,
        worst_factor: Decimal,
    },
    /// best = upper * (1 + v), worst = lower * (1 - v)
    BoundEnvelope { volatility_factor: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub base: Vec<Prediction>,
    pub best: Vec<Prediction>,
    pub worst: Vec<Prediction>,
}

impl ScenarioSet {
    pub fn get(&self, kind: ScenarioKind) -> &[Prediction] {
        match kind {
            ScenarioKind::Base => &self.base,
            ScenarioKind::Best => &self.best,
            ScenarioKind::Worst => &self.worst,
        }
    }
}

impl ScenarioPolicy {
    /// +/-20% around the point forecast.
    pub fn manual_default() -> Self {
        ScenarioPolicy::PointMultiplier {
            best_factor: dec!(1.20),
            worst_factor: dec!(0.80),
        }
    }

    /// 15% beyond the confidence bounds.
    pub fn interval_default() -> Self {
        ScenarioPolicy::BoundEnvelope {
            volatility_factor: dec!(0.15),
        }
    }

    pub fn validate(&self) -> BizValResult<()> {
        match self {
            ScenarioPolicy::PointMultiplier {
                best_factor,
                worst_factor,
            } => {
                if *worst_factor < Decimal::ZERO {
                    return Err(BizValError::invalid("worst_factor", "Must be non-negative"));
                }
                if best_factor < worst_factor {
                    return Err(BizValError::invalid(
                        "best_factor",
                        "Must be at least worst_factor",
                    ));
                }
            }
            ScenarioPolicy::BoundEnvelope { volatility_factor } => {
                if *volatility_factor < Decimal::ZERO || *volatility_factor >= Decimal::ONE {
                    return Err(BizValError::invalid(
                        "volatility_factor",
                        "Must be in [0, 1)",
                    ));
                }
            }
        }
        Ok(())
    }

    fn best_and_worst(&self, p: &Prediction) -> (Decimal, Decimal) {
        match self {
            ScenarioPolicy::PointMultiplier {
                best_factor,
                worst_factor,
            } => (p.predicted_value * best_factor, p.predicted_value * worst_factor),
            ScenarioPolicy::BoundEnvelope { volatility_factor } => (
                p.upper_bound * (Decimal::ONE + volatility_factor),
                p.lower_bound * (Decimal::ONE - volatility_factor),
            ),
        }
    }
}

/// Build `{base, best, worst}` over the same years as `base`.
pub fn generate_scenarios(
    base: &[Prediction],
    policy: &ScenarioPolicy,
) -> BizValResult<ScenarioSet> {
    policy.validate()?;

    let mut set = ScenarioSet {
        base: Vec::with_capacity(base.len()),
        best: Vec::with_capacity(base.len()),
        worst: Vec::with_capacity(base.len()),
    };

    for p in base {
        let (best, worst) = policy.best_and_worst(p);
        set.base.push(Prediction {
            scenario: ScenarioKind::Base,
            ..p.clone()
        });
        set.best.push(scenario_point(p, best, ScenarioKind::Best));
        set.worst.push(scenario_point(p, worst, ScenarioKind::Worst));
    }

    Ok(set)
}

fn scenario_point(base: &Prediction, value: Decimal, scenario: ScenarioKind) -> Prediction {
    Prediction {
        year: base.year,
        predicted_value: value,
        lower_bound: base.lower_bound,
        upper_bound: base.upper_bound,
        scenario,
        trend: None,
        seasonal: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<Prediction> {
        vec![
            Prediction {
                year: 2025,
                predicted_value: dec!(1000.00),
                lower_bound: dec!(850.00),
                upper_bound: dec!(1150.00),
                scenario: ScenarioKind::Base,
                trend: Some(dec!(990)),
                seasonal: Some(dec!(10)),
            },
            Prediction {
                year: 2026,
                predicted_value: dec!(1234.57),
                lower_bound: dec!(1000.00),
                upper_bound: dec!(1500.00),
                scenario: ScenarioKind::Base,
                trend: None,
                seasonal: None,
            },
        ]
    }

    #[test]
    fn test_point_multiplier() {
        let set = generate_scenarios(&base(), &ScenarioPolicy::manual_default()).unwrap();
        for (i, b) in set.base.iter().enumerate() {
            assert_eq!(set.best[i].predicted_value, b.predicted_value * dec!(1.20));
            assert_eq!(set.worst[i].predicted_value, b.predicted_value * dec!(0.80));
            assert_eq!(set.best[i].lower_bound, b.lower_bound);
            assert_eq!(set.worst[i].upper_bound, b.upper_bound);
            assert_eq!(set.best[i].year, b.year);
        }
        assert_eq!(set.best[0].scenario, ScenarioKind::Best);
        assert_eq!(set.get(ScenarioKind::Worst)[0].scenario, ScenarioKind::Worst);
    }

    #[test]
    fn test_bound_envelope() {
        let set = generate_scenarios(&base(), &ScenarioPolicy::interval_default()).unwrap();
        assert_eq!(set.best[0].predicted_value, dec!(1322.50));
        assert_eq!(set.worst[0].predicted_value, dec!(722.50));
        assert_eq!(set.best[1].upper_bound, dec!(1500.00));
    }

    #[test]
    fn test_invalid_policies() {
        let p = ScenarioPolicy::PointMultiplier {
            best_factor: dec!(0.5),
            worst_factor: dec!(0.8),
        };
        assert!(generate_scenarios(&base(), &p).is_err());
        let p = ScenarioPolicy::BoundEnvelope {
            volatility_factor: dec!(1),
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_policy_serde_tag() {
        let p: ScenarioPolicy = serde_json::from_str(
            r#"{"rule": "bound_envelope", "volatility_factor": "0.10"}"#,
        )
        .unwrap();
        assert_eq!(
            p,
            ScenarioPolicy::BoundEnvelope {
                volatility_factor: dec!(0.10)
            }
        );
    }
}
