use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tracing::info;

use bizval_core::config::EngineSettings;
use bizval_core::valuation::asset_value::{self, AssetValueInput};
use bizval_core::valuation::blend::{self, ValuationRequest};
use bizval_core::valuation::dcf::{self, DcfInput};
use bizval_core::valuation::earnings_value::{self, EarningsValueInput};
use bizval_core::valuation::ebitda_multiple::{self, CompanySize, EbitdaMultipleInput};
use bizval_core::valuation::practitioner::{self, PractitionerInput};
use bizval_core::valuation::wacc::{self, WaccInput};
use bizval_core::valuation::ValuationMethod;

use crate::input;

/// Arguments for commands that only take a structured payload
#[derive(Args)]
pub struct PayloadArgs {
    /// Path to a JSON or YAML input file (stdin JSON is used if omitted)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for an EBITDA-multiple valuation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct EbitdaMultipleArgs {
    /// Normalized EBITDA
    #[arg(long)]
    pub ebitda: Option<Decimal>,

    /// Sector base multiple before adjustments
    #[arg(long)]
    pub base_multiple: Option<Decimal>,

    /// Expected annual growth in percentage points (15 = 15%)
    #[arg(long)]
    pub growth_rate: Option<Decimal>,

    /// Risk score from 1 (lowest) to 10 (highest)
    #[arg(long)]
    pub risk_score: Option<i32>,

    /// Company size: micro, small, medium, large
    #[arg(long, value_parser = ["micro", "small", "medium", "large"])]
    pub company_size: Option<String>,

    #[arg(long)]
    pub cash: Option<Decimal>,

    #[arg(long)]
    pub debt: Option<Decimal>,

    #[arg(long)]
    pub non_operating_assets: Option<Decimal>,

    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a DCF valuation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct DcfArgs {
    /// Free cash flow per projection year, comma separated
    #[arg(long, value_delimiter = ',')]
    pub fcf: Vec<Decimal>,

    /// Discount rate (e.g. 0.08 for 8%)
    #[arg(long)]
    pub wacc: Option<Decimal>,

    /// Perpetuity growth rate after the last projection year
    #[arg(long)]
    pub terminal_growth: Option<Decimal>,

    #[arg(long)]
    pub cash: Option<Decimal>,

    #[arg(long)]
    pub debt: Option<Decimal>,

    #[arg(long)]
    pub non_operating_assets: Option<Decimal>,

    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a capitalized-earnings valuation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct EarningsValueArgs {
    /// Historical earnings, comma separated
    #[arg(long, value_delimiter = ',')]
    pub earnings: Vec<Decimal>,

    /// Risk-free rate in percentage points (3.0 = 3%)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,

    /// Risk premium in percentage points
    #[arg(long)]
    pub risk_premium: Option<Decimal>,

    /// Blend with the asset value (requires --asset-value)
    #[arg(long)]
    pub practitioner: bool,

    #[arg(long)]
    pub asset_value: Option<Decimal>,

    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the practitioner blend
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct PractitionerArgs {
    #[arg(long)]
    pub earnings_value: Option<Decimal>,

    #[arg(long)]
    pub asset_value: Option<Decimal>,

    /// Weight on the earnings value (default 2/3)
    #[arg(long)]
    pub earnings_weight: Option<Decimal>,

    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for WACC calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct WaccArgs {
    /// Risk-free rate (e.g. 0.02 for 2%)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,

    /// Levered equity beta
    #[arg(long)]
    pub beta: Option<Decimal>,

    /// Market risk premium
    #[arg(long, alias = "mrp")]
    pub market_risk_premium: Option<Decimal>,

    #[arg(long)]
    pub size_premium: Option<Decimal>,

    #[arg(long)]
    pub company_specific_risk: Option<Decimal>,

    /// Pre-tax interest rate on debt
    #[arg(long)]
    pub interest_rate: Option<Decimal>,

    /// Market value of equity
    #[arg(long)]
    pub equity_value: Option<Decimal>,

    /// Market value of debt
    #[arg(long)]
    pub debt_value: Option<Decimal>,

    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_value(
    args: PayloadArgs,
    settings: &EngineSettings,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ValuationRequest = input::require(args.input.as_deref(), "value")?;
    info!(methods = request.methods.len(), "running blended valuation");
    let result = blend::run_valuation(&request, &settings.valuation)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_method(args: PayloadArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let method: ValuationMethod = input::require(args.input.as_deref(), "method")?;
    info!(method = %method.kind(), "running single valuation method");
    let result = method.calculate()?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_ebitda_multiple(args: EbitdaMultipleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params: EbitdaMultipleInput = match input::load(args.input.as_deref())? {
        Some(p) => p,
        None => EbitdaMultipleInput {
            ebitda: args
                .ebitda
                .ok_or("--ebitda is required (or provide --input)")?,
            base_multiple: args
                .base_multiple
                .ok_or("--base-multiple is required (or provide --input)")?,
            growth_rate: args.growth_rate.unwrap_or(Decimal::ZERO),
            risk_score: args.risk_score.unwrap_or(5),
            company_size: parse_company_size(args.company_size.as_deref().unwrap_or("medium"))?,
            cash: args.cash.unwrap_or_default(),
            debt: args.debt.unwrap_or_default(),
            non_operating_assets: args.non_operating_assets.unwrap_or_default(),
        },
    };

    let result = ebitda_multiple::calculate_ebitda_multiple(&params)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_dcf(args: DcfArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params: DcfInput = match input::load(args.input.as_deref())? {
        Some(p) => p,
        None => {
            if args.fcf.is_empty() {
                return Err("--fcf is required (or provide --input)".into());
            }
            DcfInput {
                fcf_projections: args.fcf,
                wacc: args.wacc.ok_or("--wacc is required (or provide --input)")?,
                terminal_growth_rate: args.terminal_growth.unwrap_or(dec!(0.02)),
                cash: args.cash.unwrap_or_default(),
                debt: args.debt.unwrap_or_default(),
                non_operating_assets: args.non_operating_assets.unwrap_or_default(),
            }
        }
    };

    let result = dcf::calculate_dcf(&params)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_earnings_value(args: EarningsValueArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params: EarningsValueInput = match input::load(args.input.as_deref())? {
        Some(p) => p,
        None => {
            if args.earnings.is_empty() {
                return Err("--earnings is required (or provide --input)".into());
            }
            EarningsValueInput {
                historical_earnings: args.earnings,
                risk_free_rate: args
                    .risk_free_rate
                    .ok_or("--risk-free-rate is required (or provide --input)")?,
                risk_premium: args
                    .risk_premium
                    .ok_or("--risk-premium is required (or provide --input)")?,
                use_practitioner_method: args.practitioner,
                asset_value: args.asset_value,
            }
        }
    };

    let result = earnings_value::calculate_earnings_value(&params)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_asset_value(args: PayloadArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params: AssetValueInput = input::require(args.input.as_deref(), "asset-value")?;
    let result = asset_value::calculate_asset_value(&params)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_practitioner(args: PractitionerArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params: PractitionerInput = match input::load(args.input.as_deref())? {
        Some(p) => p,
        None => {
            let earnings_value = args
                .earnings_value
                .ok_or("--earnings-value is required (or provide --input)")?;
            let asset_value = args
                .asset_value
                .ok_or("--asset-value is required (or provide --input)")?;
            // Routed through serde so an omitted weight takes the library default.
            let mut json = serde_json::json!({
                "earnings_value": earnings_value,
                "asset_value": asset_value,
            });
            if let (Some(w), Some(map)) = (args.earnings_weight, json.as_object_mut()) {
                map.insert("earnings_weight".into(), serde_json::to_value(w)?);
            }
            serde_json::from_value(json)?
        }
    };

    let result = practitioner::calculate_practitioner(&params)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_wacc(args: WaccArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params: WaccInput = match input::load(args.input.as_deref())? {
        Some(p) => p,
        None => WaccInput {
            risk_free_rate: args
                .risk_free_rate
                .ok_or("--risk-free-rate is required (or provide --input)")?,
            beta: args.beta.unwrap_or(dec!(1.0)),
            market_risk_premium: args
                .market_risk_premium
                .ok_or("--market-risk-premium is required (or provide --input)")?,
            size_premium: args.size_premium.unwrap_or_default(),
            company_specific_risk: args.company_specific_risk.unwrap_or_default(),
            interest_rate: args
                .interest_rate
                .ok_or("--interest-rate is required (or provide --input)")?,
            equity_value: args
                .equity_value
                .ok_or("--equity-value is required (or provide --input)")?,
            debt_value: args.debt_value.unwrap_or_default(),
            tax_rate: args
                .tax_rate
                .ok_or("--tax-rate is required (or provide --input)")?,
        },
    };

    let result = wacc::calculate_wacc(&params)?;
    Ok(serde_json::to_value(result)?)
}

fn parse_company_size(s: &str) -> Result<CompanySize, Box<dyn std::error::Error>> {
    Ok(serde_json::from_value(Value::String(s.to_string()))?)
}
