use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use bizval_core::config::EngineSettings;
use bizval_core::forecast::scenarios::{self, ScenarioPolicy};
use bizval_core::forecast::{ForecastRequest, Prediction};
use bizval_core::sensitivity::SensitivityParams;
use bizval_core::valuation::ValuationMethod;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Parse optional engine settings; `None` or an empty string means defaults.
fn parse_settings(settings_json: Option<String>) -> NapiResult<EngineSettings> {
    let settings: EngineSettings = match settings_json.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => serde_json::from_str(s).map_err(to_napi_error)?,
        _ => EngineSettings::default(),
    };
    settings.validate().map_err(to_napi_error)?;
    Ok(settings)
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[napi]
pub fn valuate_method(input_json: String) -> NapiResult<String> {
    let method: ValuationMethod = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = method.calculate().map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn run_valuation(input_json: String, settings_json: Option<String>) -> NapiResult<String> {
    let request: bizval_core::valuation::blend::ValuationRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let settings = parse_settings(settings_json)?;
    let output = bizval_core::valuation::blend::run_valuation(&request, &settings.valuation)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_wacc(input_json: String) -> NapiResult<String> {
    let input: bizval_core::valuation::wacc::WaccInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = bizval_core::valuation::wacc::calculate_wacc(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Sensitivity
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SensitivityRequest {
    #[serde(flatten)]
    method: ValuationMethod,
    sensitivity: SensitivityParams,
}

#[derive(Deserialize)]
struct TornadoRequest {
    #[serde(flatten)]
    method: ValuationMethod,
    sweeps: Vec<SensitivityParams>,
}

/// `{"method": ..., "parameters": {...}, "sensitivity": {variable_name, min_value, max_value, steps}}`
#[napi]
pub fn sensitivity_analysis(input_json: String) -> NapiResult<String> {
    let request: SensitivityRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        bizval_core::sensitivity::perform_method_analysis(&request.sensitivity, &request.method)
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// `{"method": ..., "parameters": {...}, "sweeps": [...]}`
#[napi]
pub fn tornado_analysis(input_json: String) -> NapiResult<String> {
    let request: TornadoRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = bizval_core::sensitivity::run_tornado(&request.method, &request.sweeps)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Forecast
// ---------------------------------------------------------------------------

#[napi]
pub fn run_forecast(input_json: String, settings_json: Option<String>) -> NapiResult<String> {
    let request: ForecastRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let settings = parse_settings(settings_json)?;
    let output = bizval_core::forecast::run_forecast(&request, &settings.scenarios)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct ScenarioRequest {
    predictions: Vec<Prediction>,
    policy: ScenarioPolicy,
}

/// `{"predictions": [...], "policy": {"rule": "point_multiplier" | "bound_envelope", ...}}`
#[napi]
pub fn generate_scenarios(input_json: String) -> NapiResult<String> {
    let request: ScenarioRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = scenarios::generate_scenarios(&request.predictions, &request.policy)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
