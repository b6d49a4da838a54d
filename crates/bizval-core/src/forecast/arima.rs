//! Autoregressive integrated moving-average forecaster.
//!
//! The differencing order comes from a Dickey-Fuller test on the levels.
//! ARMA coefficients are fitted by conditional sum of squares, searched with
//! Nelder-Mead over partial autocorrelations so every candidate stays
//! stationary and invertible.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::decimal::to_f64;
use crate::error::BizValError;
use crate::parallel::parallel_map;
use crate::types::{with_metadata_f64, ComputationOutput};
use crate::BizValResult;

use super::optimize::{nelder_mead, NelderMeadConfig};
use super::scenarios::{self, ScenarioPolicy, ScenarioSet};
use super::series::{
    fit_metrics, mean_f64, money, validate_confidence, validate_history, validate_horizon,
    values_f64, variance_f64, z_score,
};
use super::{
    DataQuality, ForecastMethodKind, ForecastResult, HistoricalPoint, ModelMetrics, Prediction,
    ScenarioKind,
};

const MAX_AUTO_P: usize = 3;
const MAX_AUTO_Q: usize = 3;
const MAX_MANUAL_PQ: usize = 5;
const MAX_MANUAL_D: usize = 2;
const SIGNIFICANCE: f64 = 0.05;
const SIGMA2_FLOOR: f64 = 1e-12;

// MacKinnon (2010) response surface, constant-only regression, one series.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];
const CRIT_1: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const CRIT_10: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

fn default_confidence() -> Decimal {
    dec!(0.95)
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaInput {
    pub historical_data: Vec<HistoricalPoint>,
    /// Forecast horizon in years
    pub years: u32,
    #[serde(default = "default_confidence")]
    pub confidence_level: Decimal,
    #[serde(default = "default_true")]
    pub auto_order: bool,
    /// Required when `auto_order` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<ArimaOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

/// Dickey-Fuller regression of the first difference on the lagged level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityTest {
    /// None when the regression is degenerate (constant or perfectly fitted series)
    pub statistic: Option<f64>,
    pub p_value: f64,
    pub critical_values: CriticalValues,
    pub observations: usize,
    pub is_stationary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaParameters {
    pub order: ArimaOrder,
    pub ar_coefficients: Vec<f64>,
    pub ma_coefficients: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub auto_selected: bool,
    pub candidates_evaluated: usize,
    pub candidates_converged: usize,
    pub confidence_level: Decimal,
    pub stationarity_test: StationarityTest,
}

pub type ArimaOutput = ForecastResult<ArimaParameters, ModelMetrics>;

/// A fitted model on the levels it was estimated from.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedArima {
    pub order: ArimaOrder,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub mean: Option<f64>,
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    /// Residuals for the tail of the series the model can explain
    pub residuals: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl ArimaInput {
    pub fn validate(&self) -> BizValResult<()> {
        validate_history(&self.historical_data)?;
        validate_horizon(self.years)?;
        validate_confidence(self.confidence_level)?;
        match (self.auto_order, self.order) {
            (false, None) => Err(BizValError::invalid(
                "order",
                "Order must be specified when auto_order is false",
            )),
            (false, Some(o)) if o.p > MAX_MANUAL_PQ || o.q > MAX_MANUAL_PQ => {
                Err(BizValError::invalid(
                    "order",
                    format!("p and q must not exceed {MAX_MANUAL_PQ}"),
                ))
            }
            (false, Some(o)) if o.d > MAX_MANUAL_D => Err(BizValError::invalid(
                "order",
                format!("d must not exceed {MAX_MANUAL_D}"),
            )),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Stationarity
// ---------------------------------------------------------------------------

fn poly_ascending(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn standard_normal_cdf(x: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(n) => n.cdf(x),
        Err(_) => f64::NAN,
    }
}

/// MacKinnon approximate p-value for a constant-only unit-root test.
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic > TAU_MAX {
        1.0
    } else if statistic < TAU_MIN {
        0.0
    } else if statistic <= TAU_STAR {
        standard_normal_cdf(poly_ascending(&SMALL_P, statistic))
    } else {
        standard_normal_cdf(poly_ascending(&LARGE_P, statistic))
    }
}

/// Finite-sample critical values at the 1 %, 5 % and 10 % levels.
pub fn critical_values(observations: usize) -> CriticalValues {
    let n = observations.max(1) as f64;
    let at = |c: &[f64; 4]| c[0] + c[1] / n + c[2] / (n * n) + c[3] / (n * n * n);
    CriticalValues {
        one_percent: at(&CRIT_1),
        five_percent: at(&CRIT_5),
        ten_percent: at(&CRIT_10),
    }
}

pub fn check_stationarity(values: &[f64]) -> StationarityTest {
    let observations = values.len().saturating_sub(1);
    let statistic = dickey_fuller_statistic(values);
    let p_value = statistic.map_or(1.0, mackinnon_p_value);
    StationarityTest {
        statistic,
        p_value,
        critical_values: critical_values(observations),
        observations,
        is_stationary: p_value < SIGNIFICANCE,
    }
}

/// t-statistic of gamma in `dy_t = alpha + gamma * y_{t-1} + e_t`.
fn dickey_fuller_statistic(values: &[f64]) -> Option<f64> {
    if values.len() < 4 {
        return None;
    }
    let lagged = &values[..values.len() - 1];
    let delta: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let m = delta.len() as f64;

    let x_bar = mean_f64(lagged);
    let z_bar = mean_f64(&delta);
    let sxx: f64 = lagged.iter().map(|x| (x - x_bar).powi(2)).sum();
    if sxx <= f64::EPSILON * (1.0 + x_bar * x_bar) {
        return None;
    }
    let sxz: f64 = lagged
        .iter()
        .zip(&delta)
        .map(|(x, z)| (x - x_bar) * (z - z_bar))
        .sum();
    let gamma = sxz / sxx;
    let alpha = z_bar - gamma * x_bar;
    let sse: f64 = lagged
        .iter()
        .zip(&delta)
        .map(|(x, z)| (z - alpha - gamma * x).powi(2))
        .sum();
    let s2 = sse / (m - 2.0);
    let scale = delta.iter().map(|z| z * z).sum::<f64>() / m;
    if s2 <= 1e-12 * (1.0 + scale) {
        return None;
    }
    let t = gamma / (s2 / sxx).sqrt();
    t.is_finite().then_some(t)
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

pub fn difference(values: &[f64], d: usize) -> Vec<f64> {
    let mut out = values.to_vec();
    for _ in 0..d {
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// Map unconstrained reals to coefficients of a stationary polynomial
/// `1 - a_1 L - ... - a_k L^k` via partial autocorrelations.
fn constrain(raw: &[f64]) -> Vec<f64> {
    let mut a: Vec<f64> = Vec::with_capacity(raw.len());
    for (k, r) in raw.iter().map(|x| x.tanh()).enumerate() {
        let prev = a.clone();
        for j in 0..k {
            a[j] = prev[j] - r * prev[k - 1 - j];
        }
        a.push(r);
    }
    a
}

/// Conditional residuals; the first `ar.len()` observations only seed lags.
fn css_residuals(w: &[f64], ar: &[f64], ma: &[f64], mu: f64) -> Vec<f64> {
    let p = ar.len();
    let x: Vec<f64> = w.iter().map(|v| v - mu).collect();
    let mut e = vec![0.0; x.len()];
    for t in p..x.len() {
        let ar_part: f64 = ar.iter().enumerate().map(|(i, phi)| phi * x[t - 1 - i]).sum();
        let ma_part: f64 = ma
            .iter()
            .enumerate()
            .filter(|(j, _)| t > *j)
            .map(|(j, theta)| theta * e[t - 1 - j])
            .sum();
        e[t] = x[t] - ar_part - ma_part;
    }
    e.split_off(p.min(e.len()))
}

struct Layout {
    p: usize,
    q: usize,
    with_mean: bool,
    center: f64,
    scale: f64,
}

impl Layout {
    fn free_parameters(&self) -> usize {
        self.p + self.q + usize::from(self.with_mean)
    }

    fn decode(&self, raw: &[f64]) -> (Vec<f64>, Vec<f64>, f64) {
        let ar = constrain(&raw[..self.p]);
        let ma: Vec<f64> = constrain(&raw[self.p..self.p + self.q])
            .into_iter()
            .map(|a| -a)
            .collect();
        let mu = if self.with_mean {
            self.center + raw[self.p + self.q] * self.scale
        } else {
            0.0
        };
        (ar, ma, mu)
    }
}

fn optimizer_config(free: usize) -> NelderMeadConfig {
    NelderMeadConfig {
        max_iterations: 1_000 + 500 * free as u32,
        tolerance: 1e-9,
        initial_step: 0.1,
    }
}

/// Fit one order by conditional sum of squares.
pub fn fit(values: &[f64], order: ArimaOrder) -> BizValResult<FittedArima> {
    let w = difference(values, order.d);
    let with_mean = order.d == 0;
    let variance = variance_f64(&w);
    let layout = Layout {
        p: order.p,
        q: order.q,
        with_mean,
        center: mean_f64(&w),
        scale: if variance > 0.0 { variance.sqrt() } else { 1.0 },
    };
    let free = layout.free_parameters();
    let n_eff = w.len().saturating_sub(order.p);
    if n_eff <= free {
        return Err(BizValError::InsufficientData(format!(
            "{order} needs more than {free} usable observations, got {n_eff}"
        )));
    }

    let sse = |raw: &[f64]| {
        let (ar, ma, mu) = layout.decode(raw);
        css_residuals(&w, &ar, &ma, mu).iter().map(|e| e * e).sum::<f64>()
    };
    let best = nelder_mead(sse, &vec![0.0; free], &optimizer_config(free))?;
    let (ar, ma, mu) = layout.decode(&best.point);
    let residuals = css_residuals(&w, &ar, &ma, mu);

    let n = n_eff as f64;
    let sigma2 = (best.value / n).max(SIGMA2_FLOOR);
    let log_likelihood = -0.5 * n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
    let k = (free + 1) as f64;
    if !log_likelihood.is_finite() {
        return Err(BizValError::ModelFit {
            model: order.to_string(),
            reason: "log-likelihood is not finite".into(),
        });
    }

    Ok(FittedArima {
        order,
        ar,
        ma,
        mean: with_mean.then_some(mu),
        sigma2,
        log_likelihood,
        aic: -2.0 * log_likelihood + 2.0 * k,
        bic: -2.0 * log_likelihood + k * n.ln(),
        residuals,
    })
}

/// Closed-form random walk (d = 1, 2) or white noise around the mean (d = 0).
fn fit_baseline(values: &[f64], d: usize) -> BizValResult<FittedArima> {
    let w = difference(values, d);
    if w.is_empty() {
        return Err(BizValError::InsufficientData(format!(
            "ARIMA(0,{d},0) needs more than {d} observations"
        )));
    }
    let mu = if d == 0 { mean_f64(&w) } else { 0.0 };
    let residuals: Vec<f64> = w.iter().map(|v| v - mu).collect();
    let n = residuals.len() as f64;
    let sigma2 = (residuals.iter().map(|e| e * e).sum::<f64>() / n).max(SIGMA2_FLOOR);
    let log_likelihood = -0.5 * n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
    let k = if d == 0 { 2.0 } else { 1.0 };
    Ok(FittedArima {
        order: ArimaOrder { p: 0, d, q: 0 },
        ar: Vec::new(),
        ma: Vec::new(),
        mean: (d == 0).then_some(mu),
        sigma2,
        log_likelihood,
        aic: -2.0 * log_likelihood + 2.0 * k,
        bic: -2.0 * log_likelihood + k * n.ln(),
        residuals,
    })
}

struct Selection {
    model: FittedArima,
    evaluated: usize,
    converged: usize,
    fallback: bool,
}

/// Grid search over p, q in 0..=3 by AIC. Ties keep the earlier candidate.
fn select_order(values: &[f64], d: usize) -> BizValResult<Selection> {
    let grid: Vec<ArimaOrder> = (0..=MAX_AUTO_P)
        .flat_map(|p| (0..=MAX_AUTO_Q).map(move |q| ArimaOrder { p, d, q }))
        .collect();
    let fits = parallel_map(&grid, |order| fit(values, *order).ok());
    let converged: Vec<FittedArima> = fits.into_iter().flatten().collect();
    let count = converged.len();

    let best = converged
        .into_iter()
        .fold(None::<FittedArima>, |best, candidate| match best {
            Some(b) if b.aic <= candidate.aic => Some(b),
            _ => Some(candidate),
        });

    match best {
        Some(model) => Ok(Selection {
            model,
            evaluated: grid.len(),
            converged: count,
            fallback: false,
        }),
        None => Ok(Selection {
            model: fit_baseline(values, d)?,
            evaluated: grid.len(),
            converged: 0,
            fallback: true,
        }),
    }
}

// ---------------------------------------------------------------------------
// Forecasting
// ---------------------------------------------------------------------------

impl FittedArima {
    /// Point forecasts on the original scale.
    pub fn forecast(&self, values: &[f64], steps: usize) -> Vec<f64> {
        let w = difference(values, self.order.d);
        let mu = self.mean.unwrap_or(0.0);
        let mut x: Vec<f64> = w.iter().map(|v| v - mu).collect();
        let mut e = vec![0.0; x.len() - self.residuals.len()];
        e.extend_from_slice(&self.residuals);

        for _ in 0..steps {
            let t = x.len();
            let ar_part: f64 = self
                .ar
                .iter()
                .enumerate()
                .filter(|(i, _)| t > *i)
                .map(|(i, phi)| phi * x[t - 1 - i])
                .sum();
            let ma_part: f64 = self
                .ma
                .iter()
                .enumerate()
                .filter(|(j, _)| t > *j)
                .map(|(j, theta)| theta * e[t - 1 - j])
                .sum();
            x.push(ar_part + ma_part);
            e.push(0.0);
        }
        let differenced: Vec<f64> = x[w.len()..].iter().map(|v| v + mu).collect();
        integrate(values, self.order.d, differenced)
    }

    /// Forecast standard errors from the psi-weights of the integrated model.
    pub fn standard_errors(&self, steps: usize) -> Vec<f64> {
        let psi = psi_weights(&self.ar, &self.ma, self.order.d, steps);
        let mut acc = 0.0;
        psi.iter()
            .map(|p| {
                acc += p * p;
                (self.sigma2 * acc).sqrt()
            })
            .collect()
    }

    /// In-sample (actual, fitted) pairs aligned to the tail of the series.
    pub fn in_sample(&self, values: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let start = values.len() - self.residuals.len();
        let actual = values[start..].to_vec();
        let fitted = actual
            .iter()
            .zip(&self.residuals)
            .map(|(a, e)| a - e)
            .collect();
        (actual, fitted)
    }
}

fn integrate(values: &[f64], d: usize, mut forecasts: Vec<f64>) -> Vec<f64> {
    let mut levels = vec![values.to_vec()];
    for k in 0..d {
        let next = difference(&levels[k], 1);
        levels.push(next);
    }
    for level in levels[..d].iter().rev() {
        let mut prev = level.last().copied().unwrap_or(0.0);
        forecasts = forecasts
            .into_iter()
            .map(|f| {
                prev += f;
                prev
            })
            .collect();
    }
    forecasts
}

fn psi_weights(ar: &[f64], ma: &[f64], d: usize, steps: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    poly.extend(ar.iter().map(|a| -a));
    for _ in 0..d {
        let mut next = poly.clone();
        next.push(0.0);
        for i in 1..next.len() {
            next[i] -= poly[i - 1];
        }
        poly = next;
    }
    let phi: Vec<f64> = poly[1..].iter().map(|c| -c).collect();

    let mut psi = Vec::with_capacity(steps);
    for j in 0..steps {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut v = ma.get(j - 1).copied().unwrap_or(0.0);
        for i in 1..=j.min(phi.len()) {
            v += phi[i - 1] * psi[j - i];
        }
        psi.push(v);
    }
    psi
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn calculate_arima(input: &ArimaInput) -> BizValResult<ComputationOutput<ArimaOutput>> {
    input.validate()?;
    let history = validate_history(&input.historical_data)?;
    let values = values_f64(&history);
    let mut warnings = Vec::new();

    let stationarity_test = check_stationarity(&values);
    if stationarity_test.statistic.is_none() {
        warnings.push(
            "Stationarity test is degenerate for this series; treating it as non-stationary"
                .into(),
        );
    }

    let selection = match (input.auto_order, input.order) {
        (false, Some(order)) => Selection {
            model: fit(&values, order)?,
            evaluated: 1,
            converged: 1,
            fallback: false,
        },
        _ => {
            let d = usize::from(!stationarity_test.is_stationary);
            select_order(&values, d)?
        }
    };
    if selection.fallback {
        warnings.push(format!(
            "No candidate order converged; using closed-form {}",
            selection.model.order
        ));
    }
    let model = selection.model;

    let steps = input.years as usize;
    let confidence = to_f64(input.confidence_level);
    let z = z_score(confidence)?;
    let points = model.forecast(&values, steps);
    let errors = model.standard_errors(steps);
    let last_year = history.last().map_or(0, |p| p.year);

    let mut predictions = Vec::with_capacity(steps);
    for (h, (point, se)) in points.iter().zip(&errors).enumerate() {
        predictions.push(Prediction {
            year: last_year + h as i32 + 1,
            predicted_value: money(*point, "ARIMA forecast")?,
            lower_bound: money(point - z * se, "ARIMA lower bound")?,
            upper_bound: money(point + z * se, "ARIMA upper bound")?,
            scenario: ScenarioKind::Base,
            trend: None,
            seasonal: None,
        });
    }
    if predictions.iter().any(|p| p.lower_bound < Decimal::ZERO) {
        warnings.push("Lower confidence bound falls below zero".into());
    }

    let (actual, fitted) = model.in_sample(&values);
    let model_metrics = fit_metrics(&actual, &fitted);

    let output = ArimaOutput {
        method: ForecastMethodKind::Arima,
        predictions,
        model_parameters: ArimaParameters {
            order: model.order,
            ar_coefficients: model.ar,
            ma_coefficients: model.ma,
            mean: model.mean,
            sigma2: model.sigma2,
            log_likelihood: model.log_likelihood,
            aic: model.aic,
            bic: model.bic,
            auto_selected: input.auto_order,
            candidates_evaluated: selection.evaluated,
            candidates_converged: selection.converged,
            confidence_level: input.confidence_level,
            stationarity_test,
        },
        model_metrics,
        data_quality: DataQuality {
            data_points: history.len(),
            outliers_detected: None,
            missing_values: 0,
            projection_points: None,
        },
        validation: None,
    };

    Ok(with_metadata_f64(
        "ARIMA forecast (CSS estimation, AIC order selection)",
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
