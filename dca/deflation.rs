use crate::faer_ndarray::orthonormal_columns;
use crate::geometry::{centered_distance, distance_matrix};
use crate::optimizer::{k_test, normalize, optimize_direction_from, random_unit_direction};
use crate::types::{DcaConfig, DcaError, DcaFit};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Removes from each row of `x` its component in the span of the orthonormal
/// columns of `q`: `X - X Q Qᵀ`.
pub fn deflate(x: ArrayView2<f64>, q: ArrayView2<f64>) -> Array2<f64> {
    let coords = x.dot(&q);
    &x - &coords.dot(&q.t())
}

/// Projects `u` onto the orthogonal complement of span(`q`) and renormalizes.
fn orthogonalize(u: Array1<f64>, q: ArrayView2<f64>) -> Result<Array1<f64>, DcaError> {
    let coords = q.t().dot(&u);
    normalize(u - q.dot(&coords))
}

fn validate_inputs(
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    config: &DcaConfig,
) -> Result<(), DcaError> {
    config.validate()?;
    let (n, p) = x.dim();
    if n == 0 {
        return Err(DcaError::InvalidParameter(
            "design matrix has no observations".to_string(),
        ));
    }
    if y.nrows() != n {
        return Err(DcaError::ShapeMismatch {
            context: "fit_dca",
            expected: (n, y.ncols()),
            found: y.dim(),
        });
    }
    if config.target_dim > p {
        return Err(DcaError::InvalidParameter(format!(
            "requested {} directions but the data has only {} features",
            config.target_dim, p
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(DcaError::InvalidParameter(
            "inputs contain NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Extracts up to `config.target_dim` orthonormal directions of `x` that
/// maximize squared distance covariance with `y`, one at a time.
///
/// The distance structure of `y` is built once. After each accepted direction
/// the data are deflated onto the orthogonal complement of all accepted
/// directions, and the next search starts from a random direction in that
/// complement. When `config.enforce_significance` is set, a direction that
/// fails `k_test` ends the fit early and is not kept.
pub fn fit_dca(
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    config: &DcaConfig,
) -> Result<DcaFit, DcaError> {
    validate_inputs(x, y, config)?;
    let p = x.ncols();
    let target = config.target_dim;
    if target == 0 {
        return Ok(DcaFit {
            basis: Array2::zeros((p, 0)),
            scores: Array1::zeros(0),
        });
    }

    log::info!(
        "Fitting DCA: {} observations, {} features, {} response columns, up to {} directions",
        x.nrows(),
        p,
        y.ncols(),
        target
    );

    let ry = centered_distance(distance_matrix(y).view())?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut basis = Array2::<f64>::zeros((p, target));
    let mut scores: Vec<f64> = Vec::with_capacity(target);
    let mut x_proj = x.to_owned();
    let mut q = Array2::<f64>::zeros((p, 0));

    for k in 0..target {
        let u0 = orthogonalize(random_unit_direction(p, &mut rng)?, q.view())?;
        let result = optimize_direction_from(u0, x_proj.view(), ry.view(), config, &mut rng)?;

        if config.enforce_significance
            && !k_test(&scores, result.score, k, config.significance_p)
        {
            log::warn!(
                "Direction {} rejected by the significance gate (score {:.6e}); keeping {} directions",
                k + 1,
                result.score,
                k
            );
            break;
        }

        let direction = orthogonalize(result.direction, q.view())?;
        log::info!(
            "Direction {} accepted: score {:.6e} after {} iterations",
            k + 1,
            result.score,
            result.iterations
        );
        basis.column_mut(k).assign(&direction);
        scores.push(result.score);

        q = orthonormal_columns(&basis.slice(s![.., ..=k]))?;
        x_proj = deflate(x_proj.view(), q.view());
    }

    let found = scores.len();
    Ok(DcaFit {
        basis: basis.slice(s![.., ..found]).to_owned(),
        scores: Array1::from(scores),
    })
}

/// `fit_dca` for a scalar response.
pub fn fit_dca_vector(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    config: &DcaConfig,
) -> Result<DcaFit, DcaError> {
    fit_dca(x, y.insert_axis(Axis(1)), config)
}
