//! Pairwise distance matrices and their double-centered forms.
//!
//! Every primitive here fills its output row by row, with each row depending
//! only on the inputs, so the rows are computed in parallel without any
//! shared accumulator.

use crate::types::{DcaError, ProjectedDistance};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis, Zip};

#[inline]
fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Builds the N × N Euclidean distance matrix of the rows of `points`.
///
/// The result is symmetric with an exactly zero diagonal: the squared
/// differences are summed in the same order for `(i, j)` and `(j, i)`.
pub fn distance_matrix(points: ArrayView2<f64>) -> Array2<f64> {
    let n = points.nrows();
    let mut d = Array2::<f64>::zeros((n, n));
    Zip::indexed(&mut d).par_for_each(|(i, j), dij| {
        if i != j {
            *dij = euclidean(points.row(i), points.row(j));
        }
    });
    d
}

/// Builds the N × N × P tensor of unit pairwise difference directions.
///
/// Entry `[i, j, ..]` is `(x_i - x_j) / ||x_i - x_j||`, the gradient of the
/// pairwise Euclidean norm with respect to `x_i`. Coincident rows store the
/// raw (zero) difference.
///
/// The optimizer does not consume this tensor. The gradient routines in
/// `objective` form the signed pair terms `sign((x_i - x_j)·u) (x_i - x_j)` row
/// by row and center them directly, which avoids materializing N²P values.
pub fn distance_matrix_diff(points: ArrayView2<f64>) -> Array3<f64> {
    let (n, p) = points.dim();
    let mut out = Array3::<f64>::zeros((n, n, p));
    Zip::from(out.outer_iter_mut())
        .and(points.outer_iter())
        .par_for_each(|mut plane, xi| {
            for (j, xj) in points.outer_iter().enumerate() {
                let diff = &xi - &xj;
                let norm = diff.dot(&diff).sqrt();
                let mut target = plane.row_mut(j);
                if norm == 0.0 {
                    target.assign(&diff);
                } else {
                    target.assign(&(diff / norm));
                }
            }
        });
    out
}

/// Double-centers a square matrix:
/// `R[i, j] = D[i, j] - rowMean[i] - colMean[j] + grandMean`.
///
/// Means are taken over `d` as given. Row and column sums of the result are
/// zero up to rounding, and centering an already centered matrix returns it
/// unchanged.
pub fn centered_distance(d: ArrayView2<f64>) -> Result<Array2<f64>, DcaError> {
    let (rows, cols) = d.dim();
    if rows != cols {
        return Err(DcaError::ShapeMismatch {
            context: "centered_distance",
            expected: (rows, rows),
            found: (rows, cols),
        });
    }
    let n = rows;
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    let inv_n = 1.0 / n as f64;
    let row_mean = d.sum_axis(Axis(1)) * inv_n;
    let col_mean = d.sum_axis(Axis(0)) * inv_n;
    let grand_mean = row_mean.sum() * inv_n;

    let mut r = Array2::<f64>::zeros((n, n));
    Zip::indexed(&mut r)
        .and(&d)
        .par_for_each(|(i, j), rij, &dij| {
            *rij = dij - row_mean[i] - col_mean[j] + grand_mean;
        });
    Ok(r)
}

/// Signed pairwise differences `A[i, j] = z[i] - z[j]` of a 1-D projection.
pub fn signed_difference_matrix(z: ArrayView1<f64>) -> Array2<f64> {
    let n = z.len();
    Array2::from_shape_fn((n, n), |(i, j)| z[i] - z[j])
}

/// Pairwise matrix of a 1-D projection in the requested form.
pub fn projected_distance_matrix(z: ArrayView1<f64>, kind: ProjectedDistance) -> Array2<f64> {
    let signed = signed_difference_matrix(z);
    match kind {
        ProjectedDistance::Signed => signed,
        ProjectedDistance::Absolute => signed.mapv_into(f64::abs),
    }
}

/// Projects `x` onto `u` and returns the double-centered 1-D pairwise matrix.
pub fn centered_projected_distance(
    u: ArrayView1<f64>,
    x: ArrayView2<f64>,
    kind: ProjectedDistance,
) -> Result<Array2<f64>, DcaError> {
    if u.len() != x.ncols() {
        return Err(DcaError::ShapeMismatch {
            context: "centered_projected_distance",
            expected: (x.ncols(), 1),
            found: (u.len(), 1),
        });
    }
    let z = x.dot(&u);
    centered_distance(projected_distance_matrix(z.view(), kind).view())
}
