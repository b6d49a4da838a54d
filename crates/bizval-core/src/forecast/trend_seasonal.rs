//! Piecewise-linear trend plus yearly Fourier seasonality.
//!
//! Observations are dated at year end. Time is scaled to `[0, 1]` over the
//! history and values by their largest magnitude. The trend bends at
//! changepoints spread over the first 80 % of the history; their magnitudes
//! are shrunk toward zero by `changepoint_prior_scale`. Intervals come from a
//! seeded simulation of future trend changes and observation noise.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Laplace, Normal, Poisson};

use crate::decimal::to_f64;
use crate::error::BizValError;
use crate::types::{with_metadata_f64, ComputationOutput, Money};
use crate::BizValResult;

use super::linalg::solve;
use super::scenarios::{self, ScenarioPolicy, ScenarioSet};
use super::series::{
    fit_metrics, iqr_outliers, mean_f64, money, quantile, validate_confidence, validate_history,
    validate_horizon, values_f64,
};
use super::{
    DataQuality, ForecastMethodKind, ForecastResult, HistoricalPoint, ModelMetrics, Prediction,
    ScenarioKind,
};

const CHANGEPOINT_RANGE: f64 = 0.8;
const MAX_CHANGEPOINTS: usize = 25;
const FOURIER_ORDER: usize = 10;
const YEAR_DAYS: f64 = 365.25;
const TREND_PRIOR_SCALE: f64 = 5.0;
const SEASONALITY_PRIOR_SCALE: f64 = 10.0;
const NOISE_ITERATIONS: usize = 5;
const SIGMA2_FLOOR: f64 = 1e-6;

fn default_confidence() -> Decimal {
    dec!(0.95)
}

fn default_prior_scale() -> Decimal {
    dec!(0.05)
}

fn default_true() -> bool {
    true
}

fn default_samples() -> u32 {
    1000
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    #[default]
    Additive,
    Multiplicative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeasonalInput {
    pub historical_data: Vec<HistoricalPoint>,
    pub years: u32,
    #[serde(default = "default_confidence")]
    pub confidence_level: Decimal,
    /// Trend flexibility, 0.001 to 0.5
    #[serde(default = "default_prior_scale")]
    pub changepoint_prior_scale: Decimal,
    #[serde(default)]
    pub seasonality_mode: SeasonalityMode,
    #[serde(default = "default_true")]
    pub yearly_seasonality: bool,
    #[serde(default = "default_samples")]
    pub uncertainty_samples: u32,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changepoint {
    pub year: i32,
    /// Change in slope, money per year
    pub slope_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeasonalParameters {
    /// Initial slope, money per year
    pub base_growth: f64,
    pub offset: f64,
    pub changepoints: Vec<Changepoint>,
    pub changepoint_prior_scale: Decimal,
    pub seasonality_mode: SeasonalityMode,
    pub yearly_seasonality: bool,
    pub fourier_order: usize,
    /// Observation noise, money
    pub sigma_obs: f64,
    pub uncertainty_samples: u32,
    pub seed: u64,
    pub confidence_level: Decimal,
}

pub type TrendSeasonalOutput = ForecastResult<TrendSeasonalParameters, ModelMetrics>;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl TrendSeasonalInput {
    pub fn validate(&self) -> BizValResult<()> {
        validate_history(&self.historical_data)?;
        validate_horizon(self.years)?;
        validate_confidence(self.confidence_level)?;
        if self.changepoint_prior_scale < dec!(0.001) || self.changepoint_prior_scale > dec!(0.5)
        {
            return Err(BizValError::invalid(
                "changepoint_prior_scale",
                "Must be between 0.001 and 0.5",
            ));
        }
        if !(100..=10_000).contains(&self.uncertainty_samples) {
            return Err(BizValError::invalid(
                "uncertainty_samples",
                "Must be between 100 and 10000",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Design
// ---------------------------------------------------------------------------

fn year_end_days(year: i32) -> BizValResult<f64> {
    let date = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| BizValError::invalid("historical_data", format!("Invalid year {year}")))?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .ok_or_else(|| BizValError::invalid("historical_data", "Invalid epoch"))?;
    Ok(date.signed_duration_since(epoch).num_days() as f64)
}

/// History indices of the changepoints: evenly spaced over the first 80 %
/// of the series, excluding the first observation.
pub fn changepoint_indices(n: usize) -> Vec<usize> {
    let hist_size = (n as f64 * CHANGEPOINT_RANGE).floor() as usize;
    let count = MAX_CHANGEPOINTS.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }
    let last = (hist_size - 1) as f64;
    (1..=count)
        .map(|i| (last * i as f64 / count as f64).round() as usize)
        .collect()
}

fn fourier_terms(days: f64, order: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 * order);
    for i in 1..=order {
        let angle = 2.0 * std::f64::consts::PI * i as f64 * days / YEAR_DAYS;
        row.push(angle.sin());
        row.push(angle.cos());
    }
    row
}

/// Fitted model on the scaled axes.
struct Model {
    t_start: f64,
    t_span: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    /// `[k, m, deltas...]`
    trend: Vec<f64>,
    beta: Vec<f64>,
    seasonal_center: Vec<f64>,
    mode: SeasonalityMode,
    sigma: f64,
}

impl Model {
    fn t(&self, days: f64) -> f64 {
        (days - self.t_start) / self.t_span
    }

    fn trend_at(&self, t: f64) -> f64 {
        let mut g = self.trend[0] * t + self.trend[1];
        for (s, delta) in self.changepoints.iter().zip(&self.trend[2..]) {
            g += delta * (t - s).max(0.0);
        }
        g
    }

    fn seasonal_at(&self, days: f64) -> f64 {
        if self.beta.is_empty() {
            return 0.0;
        }
        fourier_terms(days, FOURIER_ORDER)
            .iter()
            .zip(&self.seasonal_center)
            .zip(&self.beta)
            .map(|((x, c), b)| (x - c) * b)
            .sum()
    }

    /// (trend, seasonal effect) on the scaled value axis.
    fn components(&self, days: f64, trend: f64) -> (f64, f64) {
        let s = self.seasonal_at(days);
        match self.mode {
            SeasonalityMode::Additive => (trend, s),
            SeasonalityMode::Multiplicative => (trend, trend * s),
        }
    }
}

fn trend_row(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = vec![t, 1.0];
    row.extend(changepoints.iter().map(|s| (t - s).max(0.0)));
    row
}

/// Penalised least squares: `(X'X + diag(penalty)) b = X'y`.
fn ridge(rows: &[Vec<f64>], y: &[f64], penalty: &[f64]) -> BizValResult<Vec<f64>> {
    let p = penalty.len();
    let mut a = vec![vec![0.0; p]; p];
    let mut b = vec![0.0; p];
    for (row, yi) in rows.iter().zip(y) {
        for i in 0..p {
            b[i] += row[i] * yi;
            for j in 0..p {
                a[i][j] += row[i] * row[j];
            }
        }
    }
    for (i, pen) in penalty.iter().enumerate() {
        a[i][i] += pen;
    }
    solve(a, b)
}

fn predict(rows: &[Vec<f64>], coef: &[f64]) -> Vec<f64> {
    rows.iter()
        .map(|r| r.iter().zip(coef).map(|(x, c)| x * c).sum())
        .collect()
}

fn mean_square(residuals: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = residuals.fold((0.0, 0usize), |(s, n), r| (s + r * r, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// MAP fit with the noise variance re-estimated a few times; the priors
/// scale with it so the penalty stays relative to the fit quality.
fn map_fit(
    rows: &[Vec<f64>],
    y: &[f64],
    prior_scales: &[f64],
) -> BizValResult<(Vec<f64>, f64)> {
    let mut sigma2 = mean_square(y.iter().map(|v| v - mean_f64(y))).max(SIGMA2_FLOOR);
    let mut coef = vec![0.0; prior_scales.len()];
    for _ in 0..NOISE_ITERATIONS {
        let penalty: Vec<f64> = prior_scales.iter().map(|s| sigma2 / (s * s)).collect();
        coef = ridge(rows, y, &penalty)?;
        let fitted = predict(rows, &coef);
        sigma2 = mean_square(y.iter().zip(&fitted).map(|(a, f)| a - f)).max(SIGMA2_FLOOR);
    }
    Ok((coef, sigma2))
}

fn fit_model(
    days: &[f64],
    y: &[f64],
    input: &TrendSeasonalInput,
) -> BizValResult<(Model, Vec<usize>)> {
    let n = y.len();
    let t_start = days[0];
    let t_span = days[n - 1] - t_start;
    let y_scale = y.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
    let ys: Vec<f64> = y.iter().map(|v| v / y_scale).collect();
    let ts: Vec<f64> = days.iter().map(|d| (d - t_start) / t_span).collect();

    let cp_index = changepoint_indices(n);
    let changepoints: Vec<f64> = cp_index.iter().map(|i| ts[*i]).collect();
    let tau = to_f64(input.changepoint_prior_scale);

    let trend_rows: Vec<Vec<f64>> = ts.iter().map(|t| trend_row(*t, &changepoints)).collect();
    let mut trend_priors = vec![TREND_PRIOR_SCALE, TREND_PRIOR_SCALE];
    trend_priors.extend(std::iter::repeat(tau).take(changepoints.len()));

    let seasonal_raw: Vec<Vec<f64>> = if input.yearly_seasonality {
        days.iter().map(|d| fourier_terms(*d, FOURIER_ORDER)).collect()
    } else {
        Vec::new()
    };
    let seasonal_center: Vec<f64> = (0..seasonal_raw.first().map_or(0, Vec::len))
        .map(|j| seasonal_raw.iter().map(|r| r[j]).sum::<f64>() / n as f64)
        .collect();
    let seasonal_rows: Vec<Vec<f64>> = seasonal_raw
        .iter()
        .map(|r| r.iter().zip(&seasonal_center).map(|(x, c)| x - c).collect())
        .collect();
    let seasonal_priors = vec![SEASONALITY_PRIOR_SCALE; seasonal_center.len()];

    let (trend, beta, sigma2) = match (input.seasonality_mode, seasonal_rows.is_empty()) {
        (_, true) => {
            let (trend, sigma2) = map_fit(&trend_rows, &ys, &trend_priors)?;
            (trend, Vec::new(), sigma2)
        }
        (SeasonalityMode::Additive, false) => {
            let rows: Vec<Vec<f64>> = trend_rows
                .iter()
                .zip(&seasonal_rows)
                .map(|(a, b)| a.iter().chain(b).copied().collect())
                .collect();
            let priors: Vec<f64> = trend_priors.iter().chain(&seasonal_priors).copied().collect();
            let (mut coef, sigma2) = map_fit(&rows, &ys, &priors)?;
            let beta = coef.split_off(trend_priors.len());
            (coef, beta, sigma2)
        }
        (SeasonalityMode::Multiplicative, false) => {
            let (trend, _) = map_fit(&trend_rows, &ys, &trend_priors)?;
            let g = predict(&trend_rows, &trend);
            let relative: Vec<f64> = ys
                .iter()
                .zip(&g)
                .map(|(v, g)| if g.abs() > 1e-9 { v / g - 1.0 } else { 0.0 })
                .collect();
            let (beta, _) = map_fit(&seasonal_rows, &relative, &seasonal_priors)?;
            let s = predict(&seasonal_rows, &beta);
            let sigma2 = mean_square(
                ys.iter()
                    .zip(g.iter().zip(&s))
                    .map(|(v, (g, s))| v - g * (1.0 + s)),
            )
            .max(SIGMA2_FLOOR);
            (trend, beta, sigma2)
        }
    };

    let model = Model {
        t_start,
        t_span,
        y_scale,
        changepoints,
        trend,
        beta,
        seasonal_center,
        mode: input.seasonality_mode,
        sigma: sigma2.sqrt(),
    };
    Ok((model, cp_index))
}

// ---------------------------------------------------------------------------
// Uncertainty
// ---------------------------------------------------------------------------

fn distribution_error(e: impl std::fmt::Display) -> BizValError {
    BizValError::ModelFit {
        model: "trend_seasonal".into(),
        reason: e.to_string(),
    }
}

/// Simulated (lower, upper) on the scaled axis for each future point.
fn simulate_intervals(
    model: &Model,
    future_days: &[f64],
    samples: u32,
    seed: u64,
    confidence: f64,
) -> BizValResult<Vec<(f64, f64)>> {
    let noise = Normal::new(0.0, model.sigma).map_err(distribution_error)?;
    let ts: Vec<f64> = future_days.iter().map(|d| model.t(*d)).collect();
    let t_max = ts.iter().copied().fold(1.0, f64::max);
    let deltas = &model.trend[2..];
    let rate = model.changepoints.len() as f64 * (t_max - 1.0);
    let mean_abs_delta = if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().map(|d| d.abs()).sum::<f64>() / deltas.len() as f64
    } + 1e-8;
    // No changepoints or no extrapolation leaves nothing to simulate.
    let change_count = if rate > 0.0 {
        Some(Poisson::new(rate).map_err(distribution_error)?)
    } else {
        None
    };
    let change_size = Laplace::new(0.0, mean_abs_delta).map_err(distribution_error)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut draws = vec![Vec::with_capacity(samples as usize); ts.len()];
    for _ in 0..samples {
        let changes = change_count
            .as_ref()
            .map_or(0, |d| rng.sample::<f64, _>(d) as usize);
        let new_points: Vec<(f64, f64)> = (0..changes)
            .map(|_| {
                let at = 1.0 + rng.gen::<f64>() * (t_max - 1.0);
                (at, rng.sample::<f64, _>(&change_size))
            })
            .collect();
        for (h, (t, days)) in ts.iter().zip(future_days).enumerate() {
            let shift: f64 = new_points
                .iter()
                .map(|(at, delta)| delta * (t - at).max(0.0))
                .sum();
            let (trend, seasonal) = model.components(*days, model.trend_at(*t) + shift);
            let value = trend + seasonal + rng.sample(noise);
            draws[h].push(value);
        }
    }

    let tail = (1.0 - confidence) / 2.0;
    Ok(draws
        .into_iter()
        .map(|mut d| {
            d.sort_by(f64::total_cmp);
            (quantile(&d, tail), quantile(&d, 1.0 - tail))
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn calculate_trend_seasonal(
    input: &TrendSeasonalInput,
) -> BizValResult<ComputationOutput<TrendSeasonalOutput>> {
    input.validate()?;
    let history = validate_history(&input.historical_data)?;
    let values = values_f64(&history);
    let days = history
        .iter()
        .map(|p| year_end_days(p.year))
        .collect::<BizValResult<Vec<f64>>>()?;
    let mut warnings = Vec::new();

    let outliers = iqr_outliers(&values).len();
    if outliers > 0 {
        warnings.push(format!(
            "{outliers} outlier(s) outside 1.5 IQR detected; kept in the fit"
        ));
    }

    let (model, cp_index) = fit_model(&days, &values, input)?;
    let scale = model.y_scale;

    let fitted: Vec<f64> = days
        .iter()
        .map(|d| {
            let (trend, seasonal) = model.components(*d, model.trend_at(model.t(*d)));
            (trend + seasonal) * scale
        })
        .collect();
    let mut model_metrics = fit_metrics(&values, &fitted);
    model_metrics.outlier_count = Some(outliers);

    let last_year = history.last().map_or(0, |p| p.year);
    let future_years: Vec<i32> = (1..=input.years as i32).map(|h| last_year + h).collect();
    let future_days = future_years
        .iter()
        .map(|y| year_end_days(*y))
        .collect::<BizValResult<Vec<f64>>>()?;
    let intervals = simulate_intervals(
        &model,
        &future_days,
        input.uncertainty_samples,
        input.seed,
        to_f64(input.confidence_level),
    )?;

    let mut predictions = Vec::with_capacity(future_years.len());
    for ((year, d), (lower, upper)) in future_years.iter().zip(&future_days).zip(&intervals) {
        let (trend, seasonal) = model.components(*d, model.trend_at(model.t(*d)));
        let trend: Money = money(trend * scale, "trend component")?;
        let seasonal: Money = money(seasonal * scale, "seasonal component")?;
        let predicted_value = trend + seasonal;
        predictions.push(Prediction {
            year: *year,
            predicted_value,
            lower_bound: money(lower * scale, "lower bound")?.min(predicted_value),
            upper_bound: money(upper * scale, "upper bound")?.max(predicted_value),
            scenario: ScenarioKind::Base,
            trend: Some(trend),
            seasonal: Some(seasonal),
        });
    }

    let span_years = model.t_span / YEAR_DAYS;
    let per_year = scale / span_years;
    let model_parameters = TrendSeasonalParameters {
        base_growth: model.trend[0] * per_year,
        offset: model.trend[1] * scale,
        changepoints: cp_index
            .iter()
            .zip(&model.trend[2..])
            .map(|(i, delta)| Changepoint {
                year: history[*i].year,
                slope_change: delta * per_year,
            })
            .collect(),
        changepoint_prior_scale: input.changepoint_prior_scale,
        seasonality_mode: input.seasonality_mode,
        yearly_seasonality: input.yearly_seasonality,
        fourier_order: if input.yearly_seasonality {
            FOURIER_ORDER
        } else {
            0
        },
        sigma_obs: model.sigma * scale,
        uncertainty_samples: input.uncertainty_samples,
        seed: input.seed,
        confidence_level: input.confidence_level,
    };

    let output = TrendSeasonalOutput {
        method: ForecastMethodKind::TrendSeasonal,
        predictions,
        model_parameters,
        model_metrics,
        data_quality: DataQuality {
            data_points: history.len(),
            outliers_detected: Some(outliers),
            missing_values: 0,
            projection_points: None,
        },
        validation: None,
    };

    Ok(with_metadata_f64(
        "Piecewise-linear trend with yearly Fourier seasonality (MAP fit)",
        input,
        warnings,
        output,
    ))
}

/// Best = upper bound x 1.15, worst = lower bound x 0.85.
pub fn generate_scenarios(base: &[Prediction]) -> BizValResult<ScenarioSet> {
    scenarios::generate_scenarios(base, &ScenarioPolicy::interval_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
