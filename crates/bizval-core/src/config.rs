//! Engine tunables.
//!
//! Every field has a default, so an empty TOML table or JSON object is a
//! valid configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::BizValError;
use crate::types::{Currency, Rate};
use crate::BizValResult;

#[cfg(feature = "forecast")]
use crate::forecast::{scenarios::ScenarioPolicy, ForecastMethodKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub valuation: ValuationSettings,
    #[cfg(feature = "forecast")]
    pub scenarios: ScenarioSettings,
}

impl EngineSettings {
    pub fn validate(&self) -> BizValResult<()> {
        self.valuation.validate()?;
        #[cfg(feature = "forecast")]
        self.scenarios.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationSettings {
    /// Half-width of the blended value range as a fraction of the value
    pub range_width: Rate,
    pub default_currency: Currency,
}

impl Default for ValuationSettings {
    fn default() -> Self {
        Self {
            range_width: dec!(0.15),
            default_currency: Currency::default(),
        }
    }
}

impl ValuationSettings {
    pub fn validate(&self) -> BizValResult<()> {
        if self.range_width < Decimal::ZERO || self.range_width >= Decimal::ONE {
            return Err(BizValError::invalid(
                "valuation.range_width",
                "Must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

/// Best/worst envelope rule per forecast method.
#[cfg(feature = "forecast")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    pub manual: ScenarioPolicy,
    pub arima: ScenarioPolicy,
    pub trend_seasonal: ScenarioPolicy,
}

#[cfg(feature = "forecast")]
impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            manual: ScenarioPolicy::manual_default(),
            arima: ScenarioPolicy::interval_default(),
            trend_seasonal: ScenarioPolicy::interval_default(),
        }
    }
}

#[cfg(feature = "forecast")]
impl ScenarioSettings {
    pub fn policy_for(&self, kind: ForecastMethodKind) -> &ScenarioPolicy {
        match kind {
            ForecastMethodKind::Manual => &self.manual,
            ForecastMethodKind::Arima => &self.arima,
            ForecastMethodKind::TrendSeasonal => &self.trend_seasonal,
        }
    }

    pub fn validate(&self) -> BizValResult<()> {
        self.manual.validate()?;
        self.arima.validate()?;
        self.trend_seasonal.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.valuation.range_width, dec!(0.15));
        assert_eq!(settings.valuation.default_currency, Currency::CHF);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{"valuation": {"range_width": "0.10"}}"#).unwrap();
        assert_eq!(settings.valuation.range_width, dec!(0.10));
        assert_eq!(settings.valuation.default_currency, Currency::CHF);
    }

    #[test]
    fn test_invalid_range_width() {
        let mut settings = EngineSettings::default();
        settings.valuation.range_width = dec!(1.5);
        assert!(settings.validate().is_err());
    }

    #[cfg(feature = "forecast")]
    #[test]
    fn test_policy_lookup() {
        let settings = ScenarioSettings::default();
        assert_eq!(
            settings.policy_for(ForecastMethodKind::Manual),
            &ScenarioPolicy::manual_default()
        );
        assert_eq!(
            settings.policy_for(ForecastMethodKind::Arima),
            &ScenarioPolicy::interval_default()
        );
    }
}
