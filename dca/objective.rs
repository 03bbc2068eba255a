use crate::geometry::centered_projected_distance;
use crate::types::{DcaError, ProjectedDistance};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis, Zip};
use rayon::prelude::*;

/// Sign with `sign(0) = 0`, the tie convention of the subgradient.
#[inline]
fn tie_sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn check_square_pair(
    context: &'static str,
    rx: ArrayView2<f64>,
    ry: ArrayView2<f64>,
) -> Result<usize, DcaError> {
    let (n, m) = rx.dim();
    if n != m {
        return Err(DcaError::ShapeMismatch {
            context,
            expected: (n, n),
            found: (n, m),
        });
    }
    if ry.dim() != rx.dim() {
        return Err(DcaError::ShapeMismatch {
            context,
            expected: rx.dim(),
            found: ry.dim(),
        });
    }
    if n == 0 {
        return Err(DcaError::InvalidParameter(format!(
            "{context}: distance matrices are empty"
        )));
    }
    Ok(n)
}

fn check_gradient_inputs(
    context: &'static str,
    u: ArrayView1<f64>,
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
) -> Result<(), DcaError> {
    let (n, p) = x.dim();
    if u.len() != p {
        return Err(DcaError::ShapeMismatch {
            context,
            expected: (p, 1),
            found: (u.len(), 1),
        });
    }
    if ry.dim() != (n, n) {
        return Err(DcaError::ShapeMismatch {
            context,
            expected: (n, n),
            found: ry.dim(),
        });
    }
    if n == 0 {
        return Err(DcaError::InvalidParameter(format!(
            "{context}: design matrix has no observations"
        )));
    }
    Ok(())
}

/// Empirical squared distance covariance `sum(Rx * Ry) / N²` of two centered
/// distance matrices.
pub fn squared_distance_covariance(
    rx: ArrayView2<f64>,
    ry: ArrayView2<f64>,
) -> Result<f64, DcaError> {
    let n = check_square_pair("squared_distance_covariance", rx, ry)?;
    // Rows in parallel, summed in order so the result does not depend on scheduling.
    let row_sums: Vec<f64> = rx
        .axis_iter(Axis(0))
        .into_par_iter()
        .zip(ry.axis_iter(Axis(0)).into_par_iter())
        .map(|(a, b)| a.dot(&b))
        .collect();
    let total: f64 = row_sums.iter().sum();
    Ok(total / (n * n) as f64)
}

/// Squared distance variance, `squared_distance_covariance(r, r)`. Never negative.
pub fn distance_variance(r: ArrayView2<f64>) -> Result<f64, DcaError> {
    squared_distance_covariance(r, r)
}

/// Squared distance correlation `dCov²(X, Y) / sqrt(dVar²(X) dVar²(Y))`, in [0, 1].
///
/// Returns 0 when either variable has zero distance variance.
pub fn squared_distance_correlation(
    rx: ArrayView2<f64>,
    ry: ArrayView2<f64>,
) -> Result<f64, DcaError> {
    let cov = squared_distance_covariance(rx, ry)?;
    let denom = distance_variance(rx)? * distance_variance(ry)?;
    if denom <= 0.0 {
        return Ok(0.0);
    }
    Ok(cov / denom.sqrt())
}

/// Score of direction `u`: squared distance covariance between `ry` and the
/// centered pairwise matrix of the projection `x·u`.
pub fn projected_score(
    u: ArrayView1<f64>,
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
    kind: ProjectedDistance,
) -> Result<f64, DcaError> {
    let rx = centered_projected_distance(u, x, kind)?;
    squared_distance_covariance(ry, rx.view())
}

/// Accumulates `delta_ij = sign((x_i - x_j)·u) (x_i - x_j)` over `j` for one
/// fixed row `i`, returning `(sum_j delta_ij, sum_j ry[i, j] delta_ij)`.
fn pair_terms_for_row(
    i: usize,
    x: ArrayView2<f64>,
    z: ArrayView1<f64>,
    ry_row: ArrayView1<f64>,
) -> (Array1<f64>, Array1<f64>) {
    let p = x.ncols();
    let mut delta_sum = Array1::<f64>::zeros(p);
    let mut weighted = Array1::<f64>::zeros(p);
    let xi = x.row(i);
    for (j, xj) in x.outer_iter().enumerate() {
        let s = tie_sign(z[i] - z[j]);
        if s == 0.0 {
            continue;
        }
        let weight = ry_row[j];
        Zip::from(&mut delta_sum)
            .and(&mut weighted)
            .and(&xi)
            .and(&xj)
            .for_each(|acc, w, &a, &b| {
                let delta = s * (a - b);
                *acc += delta;
                *w += weight * delta;
            });
    }
    (delta_sum, weighted)
}

/// Full-batch gradient of the projected squared distance covariance with
/// respect to `u`.
///
/// The pairwise terms `delta_ij` are double-centered over `i` and `j` before
/// being contracted with `ry`. Because `delta_ij = delta_ji`, the mean over `i`
/// for a fixed `j` equals the mean over `j` for fixed `i`, so one set of row
/// means serves both. Ties contribute zero.
pub fn squared_distance_covariance_grad(
    u: ArrayView1<f64>,
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
) -> Result<Array1<f64>, DcaError> {
    check_gradient_inputs("squared_distance_covariance_grad", u, x, ry)?;
    let (n, p) = x.dim();
    let inv_n = 1.0 / n as f64;
    let z = x.dot(&u);

    let partials: Vec<(Array1<f64>, Array1<f64>)> = (0..n)
        .into_par_iter()
        .map(|i| {
            let (delta_sum, weighted) = pair_terms_for_row(i, x, z.view(), ry.row(i));
            (delta_sum * inv_n, weighted)
        })
        .collect();

    let ry_row_sums = ry.sum_axis(Axis(1));
    let ry_col_sums = ry.sum_axis(Axis(0));
    let ry_total = ry_row_sums.sum();

    let mut grad = Array1::<f64>::zeros(p);
    let mut grand_mean = Array1::<f64>::zeros(p);
    for (i, (row_mean, weighted)) in partials.iter().enumerate() {
        grad += weighted;
        grad.scaled_add(-(ry_row_sums[i] + ry_col_sums[i]), row_mean);
        grand_mean.scaled_add(inv_n, row_mean);
    }
    grad.scaled_add(ry_total, &grand_mean);
    Ok(grad * (inv_n * inv_n))
}

/// Single-index estimator of `squared_distance_covariance_grad` in O(NP).
///
/// This is a two-term estimator, not the four-term double-centered form used
/// by the batch gradient. Only the terms involving the fixed index `sample`
/// are formed: the pair terms `delta_sj` and their mean over `j`. The
/// column-mean and grand-mean terms are left out. When `ry` is double-centered
/// those terms average to zero over `sample`, so the mean of this estimator
/// over all samples still equals the batch gradient. For a single sample the
/// two forms differ.
pub fn squared_distance_covariance_grad_stochastic(
    u: ArrayView1<f64>,
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
    sample: usize,
) -> Result<Array1<f64>, DcaError> {
    check_gradient_inputs("squared_distance_covariance_grad_stochastic", u, x, ry)?;
    let n = x.nrows();
    if sample >= n {
        return Err(DcaError::InvalidParameter(format!(
            "stochastic sample index {sample} is out of range for {n} observations"
        )));
    }
    let inv_n = 1.0 / n as f64;
    let z = x.dot(&u);
    let ry_row = ry.row(sample);
    let (delta_sum, mut grad) = pair_terms_for_row(sample, x, z.view(), ry_row);
    grad.scaled_add(-ry_row.sum() * inv_n, &delta_sum);
    Ok(grad * inv_n)
}
