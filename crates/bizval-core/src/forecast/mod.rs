//! Annual time-series forecasting.
//!
//! Three calculators share one contract: a validated parameter struct goes
//! in, a [`ForecastResult`] comes out, and a best/worst [`ScenarioSet`] can
//! be derived from the base predictions. Model fitting happens in `f64`;
//! predictions leave the module as cents-rounded decimals.

pub mod arima;
pub mod linalg;
pub mod manual;
pub mod optimize;
pub mod scenarios;
pub mod series;
pub mod trend_seasonal;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ScenarioSettings;
use crate::types::{ComputationOutput, Money};
use crate::BizValResult;

use arima::ArimaInput;
use manual::{ManualForecastInput, PlausibilityReport};
use scenarios::{generate_scenarios, ScenarioSet};
use trend_seasonal::TrendSeasonalInput;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One observed year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub year: i32,
    pub value: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    Base,
    Best,
    Worst,
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScenarioKind::Base => "base",
            ScenarioKind::Best => "best",
            ScenarioKind::Worst => "worst",
        })
    }
}

/// A forecast value with its interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub year: i32,
    pub predicted_value: Money,
    pub lower_bound: Money,
    pub upper_bound: Money,
    pub scenario: ScenarioKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonal: Option<Money>,
}

/// Goodness of fit against the history the model could reproduce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Percent
    pub mape: f64,
    pub rmse: f64,
    pub mae: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlier_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub data_points: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outliers_detected: Option<usize>,
    pub missing_values: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_points: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethodKind {
    #[serde(alias = "prophet")]
    TrendSeasonal,
    Arima,
    Manual,
}

impl fmt::Display for ForecastMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ForecastMethodKind::TrendSeasonal => "trend_seasonal",
            ForecastMethodKind::Arima => "arima",
            ForecastMethodKind::Manual => "manual",
        })
    }
}

/// Output shared by all forecast calculators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult<P, M> {
    pub method: ForecastMethodKind,
    pub predictions: Vec<Prediction>,
    pub model_parameters: P,
    pub model_metrics: M,
    pub data_quality: DataQuality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<PlausibilityReport>,
}

impl<P: Serialize, M: Serialize> ForecastResult<P, M> {
    /// Flatten model-specific records into key-value trees for transport.
    pub fn into_untyped(self) -> BizValResult<ForecastResult<Value, Value>> {
        Ok(ForecastResult {
            method: self.method,
            predictions: self.predictions,
            model_parameters: serde_json::to_value(&self.model_parameters)?,
            model_metrics: serde_json::to_value(&self.model_metrics)?,
            data_quality: self.data_quality,
            validation: self.validation,
        })
    }
}

/// Closed set of forecast methods with their typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "parameters", rename_all = "snake_case")]
pub enum ForecastMethod {
    #[serde(alias = "prophet")]
    TrendSeasonal(TrendSeasonalInput),
    Arima(ArimaInput),
    Manual(ManualForecastInput),
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    #[serde(flatten)]
    pub method: ForecastMethod,
    #[serde(default = "default_true")]
    pub generate_scenarios: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRun {
    #[serde(flatten)]
    pub forecast: ForecastResult<Value, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<ScenarioSet>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl ForecastMethod {
    pub fn kind(&self) -> ForecastMethodKind {
        match self {
            ForecastMethod::TrendSeasonal(_) => ForecastMethodKind::TrendSeasonal,
            ForecastMethod::Arima(_) => ForecastMethodKind::Arima,
            ForecastMethod::Manual(_) => ForecastMethodKind::Manual,
        }
    }

    pub fn validate(&self) -> BizValResult<()> {
        match self {
            ForecastMethod::TrendSeasonal(p) => p.validate(),
            ForecastMethod::Arima(p) => p.validate(),
            ForecastMethod::Manual(p) => p.validate(),
        }
    }

    pub fn calculate(&self) -> BizValResult<ComputationOutput<ForecastResult<Value, Value>>> {
        match self {
            ForecastMethod::TrendSeasonal(p) => untyped(trend_seasonal::calculate_trend_seasonal(p)?),
            ForecastMethod::Arima(p) => untyped(arima::calculate_arima(p)?),
            ForecastMethod::Manual(p) => untyped(manual::calculate_manual(p)?),
        }
    }
}

/// Run the selected forecaster and, if requested, derive scenarios with the
/// policy configured for that method.
pub fn run_forecast(
    request: &ForecastRequest,
    settings: &ScenarioSettings,
) -> BizValResult<ComputationOutput<ForecastRun>> {
    settings.validate()?;
    let kind = request.method.kind();
    let output = request.method.calculate()?;

    let scenarios = if request.generate_scenarios {
        Some(generate_scenarios(
            &output.result.predictions,
            settings.policy_for(kind),
        )?)
    } else {
        None
    };

    Ok(output.map(|forecast| ForecastRun {
        forecast,
        scenarios,
    }))
}

fn untyped<P: Serialize, M: Serialize>(
    output: ComputationOutput<ForecastResult<P, M>>,
) -> BizValResult<ComputationOutput<ForecastResult<Value, Value>>> {
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
