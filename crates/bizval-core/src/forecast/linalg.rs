//! Small dense solver for the normal equations of the trend fit.

use crate::error::BizValError;
use crate::BizValResult;

const PIVOT_EPS: f64 = 1e-12;

/// Solve `a x = b` by Gaussian elimination with partial pivoting.
///
/// `a` is row-major and square. Both arguments are consumed as scratch.
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> BizValResult<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(BizValError::ModelFit {
            model: "linear system".into(),
            reason: format!("expected a {n}x{n} matrix"),
        });
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPS || !a[pivot][col].is_finite() {
            return Err(BizValError::ModelFit {
                model: "linear system".into(),
                reason: "matrix is singular".into(),
            });
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}
