//! Derivative-free minimisation for likelihood-style objectives.

use crate::error::BizValError;
use crate::BizValResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadConfig {
    pub max_iterations: u32,
    /// Relative spread of simplex values at which to stop
    pub tolerance: f64,
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            tolerance: 1e-10,
            initial_step: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: u32,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Nelder-Mead simplex search.
///
/// A zero-dimensional start point is evaluated once and returned. Objectives
/// returning NaN or infinity at the start point are rejected; later
/// non-finite values are treated as +inf so the simplex moves away from them.
pub fn nelder_mead<F>(f: F, x0: &[f64], config: &NelderMeadConfig) -> BizValResult<Minimum>
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let start = f(x0);
    if !start.is_finite() {
        return Err(BizValError::ModelFit {
            model: "nelder-mead".into(),
            reason: "objective is not finite at the start point".into(),
        });
    }
    let n = x0.len();
    if n == 0 {
        return Ok(Minimum {
            point: Vec::new(),
            value: start,
            iterations: 0,
        });
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((x0.to_vec(), start));
    for i in 0..n {
        let mut x = x0.to_vec();
        x[i] += if x[i].abs() > 1e-8 {
            config.initial_step * x[i].abs().max(1.0)
        } else {
            config.initial_step
        };
        let v = eval(&x);
        simplex.push((x, v));
    }

    let mut last_delta = f64::INFINITY;
    for iteration in 0..config.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let best = simplex[0].1;
        let worst = simplex[n].1;
        last_delta = (worst - best).abs();
        if last_delta <= config.tolerance * (1.0 + best.abs()) {
            let (point, value) = simplex.swap_remove(0);
            return Ok(Minimum {
                point,
                value,
                iterations: iteration,
            });
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
            .collect();
        let toward = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n].0)
                .map(|(c, w)| c + coef * (c - w))
                .collect()
        };

        let reflected = toward(REFLECT);
        let fr = eval(&reflected);
        if fr < simplex[0].1 {
            let expanded = toward(EXPAND);
            let fe = eval(&expanded);
            simplex[n] = if fe < fr {
                (expanded, fe)
            } else {
                (reflected, fr)
            };
            continue;
        }
        if fr < simplex[n - 1].1 {
            simplex[n] = (reflected, fr);
            continue;
        }

        let (contracted, fc) = if fr < simplex[n].1 {
            let x = toward(REFLECT * CONTRACT);
            let v = eval(&x);
            (x, v)
        } else {
            let x = toward(-CONTRACT);
            let v = eval(&x);
            (x, v)
        };
        if fc < simplex[n].1.min(fr) {
            simplex[n] = (contracted, fc);
            continue;
        }

        let anchor = simplex[0].0.clone();
        for (x, v) in simplex.iter_mut().skip(1) {
            for (xi, ai) in x.iter_mut().zip(&anchor) {
                *xi = ai + SHRINK * (*xi - ai);
            }
            *v = eval(x);
        }
    }

    Err(BizValError::ConvergenceFailure {
        function: "nelder_mead".into(),
        iterations: config.max_iterations,
        last_delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quadratic_bowl() {
        let f = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2);
        let m = nelder_mead(f, &[0.0, 0.0], &NelderMeadConfig::default()).unwrap();
        assert_relative_eq!(m.point[0], 3.0, epsilon = 1e-3);
        assert_relative_eq!(m.point[1], -1.0, epsilon = 1e-3);
        assert!(m.value < 1e-6);
    }

    #[test]
    fn test_rosenbrock() {
        let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let config = NelderMeadConfig {
            max_iterations: 10_000,
            tolerance: 1e-14,
            initial_step: 0.5,
        };
        let m = nelder_mead(f, &[-1.2, 1.0], &config).unwrap();
        assert_relative_eq!(m.point[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(m.point[1], 1.0, epsilon = 2e-2);
    }

    #[test]
    fn test_iteration_cap() {
        let f = |x: &[f64]| (x[0] - 100.0).powi(2);
        let config = NelderMeadConfig {
            max_iterations: 3,
            tolerance: 1e-14,
            initial_step: 0.1,
        };
        assert!(matches!(
            nelder_mead(f, &[0.0], &config),
            Err(BizValError::ConvergenceFailure { iterations: 3, .. })
        ));
    }

    #[test]
    fn test_non_finite_start() {
        let f = |_: &[f64]| f64::NAN;
        assert!(matches!(
            nelder_mead(f, &[1.0], &NelderMeadConfig::default()),
            Err(BizValError::ModelFit { .. })
        ));
    }

    #[test]
    fn test_empty_point() {
        let m = nelder_mead(|_| 4.0, &[], &NelderMeadConfig::default()).unwrap();
        assert_eq!(m.value, 4.0);
        assert!(m.point.is_empty());
    }
}
