//! Input checks and descriptive statistics shared by the forecasters.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::decimal::{from_f64, round_money, to_f64};
use crate::error::BizValError;
use crate::types::Money;
use crate::BizValResult;

use super::{HistoricalPoint, ModelMetrics};

pub const MIN_HISTORY: usize = 3;
pub const MAX_HORIZON: u32 = 10;
pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

/// Check years and values, then return the points sorted by year.
pub fn validated_series(
    points: &[HistoricalPoint],
    field: &str,
    min_points: usize,
) -> BizValResult<Vec<HistoricalPoint>> {
    if points.len() < min_points {
        return Err(BizValError::InsufficientData(format!(
            "{field}: at least {min_points} points are required, got {}",
            points.len()
        )));
    }
    let mut seen = BTreeSet::new();
    for p in points {
        if !(MIN_YEAR..=MAX_YEAR).contains(&p.year) {
            return Err(BizValError::invalid(
                field,
                format!("Year {} outside {MIN_YEAR}-{MAX_YEAR}", p.year),
            ));
        }
        if p.value < Decimal::ZERO {
            return Err(BizValError::invalid(
                field,
                format!("Year {}: value cannot be negative", p.year),
            ));
        }
        if !seen.insert(p.year) {
            return Err(BizValError::invalid(
                field,
                format!("Duplicate year {}", p.year),
            ));
        }
    }
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.year);
    Ok(sorted)
}

pub fn validate_history(points: &[HistoricalPoint]) -> BizValResult<Vec<HistoricalPoint>> {
    validated_series(points, "historical_data", MIN_HISTORY)
}

pub fn validate_horizon(years: u32) -> BizValResult<()> {
    if years == 0 || years > MAX_HORIZON {
        return Err(BizValError::invalid(
            "years",
            format!("Forecast horizon must be between 1 and {MAX_HORIZON} years"),
        ));
    }
    Ok(())
}

pub fn validate_confidence(level: Decimal) -> BizValResult<()> {
    if level <= Decimal::ZERO || level >= Decimal::ONE {
        return Err(BizValError::invalid(
            "confidence_level",
            "Must be strictly between 0 and 1",
        ));
    }
    Ok(())
}

pub fn values_f64(points: &[HistoricalPoint]) -> Vec<f64> {
    points.iter().map(|p| to_f64(p.value)).collect()
}

/// Two-sided standard normal quantile for a confidence level.
pub fn z_score(confidence_level: f64) -> BizValResult<f64> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| BizValError::ModelFit {
        model: "normal".into(),
        reason: e.to_string(),
    })?;
    Ok(normal.inverse_cdf(0.5 + confidence_level / 2.0))
}

/// Linear-interpolation quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

/// Indices of values outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
pub fn iqr_outliers(values: &[f64]) -> Vec<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < lower || **v > upper)
        .map(|(i, _)| i)
        .collect()
}

/// MAPE skips zero actuals; it is zero when every actual is zero.
pub fn fit_metrics(actual: &[f64], fitted: &[f64]) -> ModelMetrics {
    let n = actual.len().min(fitted.len());
    if n == 0 {
        return ModelMetrics {
            mape: 0.0,
            rmse: 0.0,
            mae: 0.0,
            outlier_count: None,
        };
    }
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut pct_n = 0usize;
    for (a, f) in actual.iter().zip(fitted).take(n) {
        let e = a - f;
        abs_sum += e.abs();
        sq_sum += e * e;
        if *a != 0.0 {
            pct_sum += (e / a).abs();
            pct_n += 1;
        }
    }
    ModelMetrics {
        mape: if pct_n == 0 {
            0.0
        } else {
            pct_sum / pct_n as f64 * 100.0
        },
        rmse: (sq_sum / n as f64).sqrt(),
        mae: abs_sum / n as f64,
        outlier_count: None,
    }
}

/// Quantize a model output to cents.
pub fn money(value: f64, context: &str) -> BizValResult<Money> {
    Ok(round_money(from_f64(value, context)?))
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn variance_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean_f64(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}
