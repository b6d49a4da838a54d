use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;

use bizval_core::sensitivity::sweep::DEFAULT_STEPS;
use bizval_core::sensitivity::{perform_method_analysis, run_tornado, SensitivityParams};
use bizval_core::valuation::ValuationMethod;

use crate::input;

/// Arguments for a one-variable sweep
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SensitivityArgs {
    /// Field of the method parameters to vary (e.g. "ebitda", "wacc")
    #[arg(long)]
    pub variable: String,

    #[arg(long)]
    pub min: Decimal,

    #[arg(long)]
    pub max: Decimal,

    /// Number of intervals; steps + 1 points are evaluated
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    pub steps: u32,

    /// Path to a JSON or YAML file holding a tagged valuation method
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a tornado ranking
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct TornadoArgs {
    /// Sweep as name:min:max[:steps], repeatable
    /// (e.g. "ebitda:800000:1200000:4")
    #[arg(long, required = true)]
    pub sweep: Vec<String>,

    /// Path to a JSON or YAML file holding a tagged valuation method
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let method: ValuationMethod = input::require(args.input.as_deref(), "sensitivity")?;
    let params = SensitivityParams {
        variable_name: args.variable,
        min_value: args.min,
        max_value: args.max,
        steps: args.steps,
    };
    info!(method = %method.kind(), variable = %params.variable_name, "running sensitivity sweep");
    let result = perform_method_analysis(&params, &method)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_tornado_cmd(args: TornadoArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sweeps = args
        .sweep
        .iter()
        .map(|s| parse_sweep(s))
        .collect::<Result<Vec<_>, _>>()?;
    let method: ValuationMethod = input::require(args.input.as_deref(), "tornado")?;
    info!(method = %method.kind(), sweeps = sweeps.len(), "running tornado analysis");
    let result = run_tornado(&method, &sweeps)?;
    Ok(serde_json::to_value(result)?)
}

fn parse_sweep(spec: &str) -> Result<SensitivityParams, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(format!("Sweep must be name:min:max[:steps], got '{}'", spec).into());
    }
    if parts[0].is_empty() {
        return Err(format!("Sweep '{}' has no variable name", spec).into());
    }
    let steps = match parts.get(3) {
        Some(s) => s.parse()?,
        None => DEFAULT_STEPS,
    };
    Ok(SensitivityParams {
        variable_name: parts[0].to_string(),
        min_value: parts[1].parse()?,
        max_value: parts[2].parse()?,
        steps,
    })
}
