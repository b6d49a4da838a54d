use clap::Args;
use serde_json::Value;
use tracing::info;

use bizval_core::config::EngineSettings;
use bizval_core::forecast::{run_forecast, ForecastRequest};

use crate::input;

/// Arguments for a forecast run
#[derive(Args)]
pub struct ForecastArgs {
    /// Path to a JSON or YAML file holding a tagged forecast request
    #[arg(long)]
    pub input: Option<String>,

    /// Skip best/worst scenario generation
    #[arg(long)]
    pub no_scenarios: bool,
}

pub fn run_forecast_cmd(
    args: ForecastArgs,
    settings: &EngineSettings,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: ForecastRequest = input::require(args.input.as_deref(), "forecast")?;
    if args.no_scenarios {
        request.generate_scenarios = false;
    }
    info!(
        method = %request.method.kind(),
        scenarios = request.generate_scenarios,
        "running forecast"
    );
    let result = run_forecast(&request, &settings.scenarios)?;
    Ok(serde_json::to_value(result)?)
}
