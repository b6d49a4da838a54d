mod commands;
mod config;
mod input;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bizval_core::BizValError;
use commands::forecast::ForecastArgs;
use commands::sensitivity::{SensitivityArgs, TornadoArgs};
use commands::valuation::{
    DcfArgs, EarningsValueArgs, EbitdaMultipleArgs, PayloadArgs, PractitionerArgs, WaccArgs,
};
use config::{ConfigError, LOG_LEVEL_ENV};

/// Business valuation and forecasting
#[derive(Parser)]
#[command(
    name = "bizval",
    version,
    about = "Business valuation and forecasting",
    long_about = "A CLI for valuing a business with decimal precision. Supports EBITDA \
                  multiples, DCF, capitalized earnings, net asset value, the practitioner \
                  blend, WACC, sensitivity and tornado analysis, and trend-seasonal, ARIMA \
                  and manual forecasts with best/worst scenarios."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Blend several valuation methods by weight
    Value(PayloadArgs),
    /// Run one tagged valuation method
    Method(PayloadArgs),
    /// Value a company from an adjusted EBITDA multiple
    EbitdaMultiple(EbitdaMultipleArgs),
    /// Run a Discounted Cash Flow valuation
    Dcf(DcfArgs),
    /// Capitalize sustainable earnings
    EarningsValue(EarningsValueArgs),
    /// Net asset (substance) value
    AssetValue(PayloadArgs),
    /// Weighted blend of earnings and asset value
    Practitioner(PractitionerArgs),
    /// Calculate Weighted Average Cost of Capital (CAPM build-up)
    Wacc(WaccArgs),
    /// Sweep one parameter of a valuation method
    Sensitivity(SensitivityArgs),
    /// Rank several parameters by their impact on value
    Tornado(TornadoArgs),
    /// Forecast an annual series with scenarios
    Forecast(ForecastArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let env_level = std::env::var(LOG_LEVEL_ENV).ok();
    let config = match config::build_config(
        cli.config.as_deref(),
        env_level.as_deref(),
        cli.log_level.as_deref(),
    ) {
        Ok(c) => c,
        Err(e) => fail(&e),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_filter_str())),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    debug!(level = %config.logging.level, "configuration loaded");

    let settings = &config.engine;
    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Value(args) => commands::valuation::run_value(args, settings),
        Commands::Method(args) => commands::valuation::run_method(args),
        Commands::EbitdaMultiple(args) => commands::valuation::run_ebitda_multiple(args),
        Commands::Dcf(args) => commands::valuation::run_dcf(args),
        Commands::EarningsValue(args) => commands::valuation::run_earnings_value(args),
        Commands::AssetValue(args) => commands::valuation::run_asset_value(args),
        Commands::Practitioner(args) => commands::valuation::run_practitioner(args),
        Commands::Wacc(args) => commands::valuation::run_wacc(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args),
        Commands::Tornado(args) => commands::sensitivity::run_tornado_cmd(args),
        Commands::Forecast(args) => commands::forecast::run_forecast_cmd(args, settings),
        Commands::Version => {
            println!("bizval {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => fail(e.as_ref()),
    }
}

fn fail(e: &(dyn std::error::Error + 'static)) -> ! {
    match category(e) {
        Some(cat) => eprintln!("{} [{}]: {}", "error".red().bold(), cat, e),
        None => eprintln!("{}: {}", "error".red().bold(), e),
    }
    process::exit(1);
}

fn category(e: &(dyn std::error::Error + 'static)) -> Option<String> {
    if let Some(err) = e.downcast_ref::<BizValError>() {
        return Some(err.kind().to_string());
    }
    if e.downcast_ref::<ConfigError>().is_some() {
        return Some("config".into());
    }
    None
}
