use crate::objective::{
    projected_score, squared_distance_covariance_grad, squared_distance_covariance_grad_stochastic,
};
use crate::types::{DcaConfig, DcaError, DirectionResult, OptimizerMode};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::StandardNormal;

/// Scales `u` to unit Euclidean norm.
pub fn normalize(u: Array1<f64>) -> Result<Array1<f64>, DcaError> {
    let norm = u.dot(&u).sqrt();
    if !(norm.is_finite() && norm > 0.0) {
        return Err(DcaError::DegenerateDirection);
    }
    Ok(u / norm)
}

/// Draws a direction uniformly on the unit sphere in `dim` dimensions.
pub fn random_unit_direction<R: Rng + ?Sized>(
    dim: usize,
    rng: &mut R,
) -> Result<Array1<f64>, DcaError> {
    if dim == 0 {
        return Err(DcaError::InvalidParameter(
            "cannot draw a direction in a zero-dimensional feature space".to_string(),
        ));
    }
    let draw: Array1<f64> = (0..dim).map(|_| rng.sample(StandardNormal)).collect();
    normalize(draw)
}

/// Significance gate between successive directions.
///
/// The first direction is always accepted. Later ones are accepted only when
/// `score` exceeds more than a `1 - p` fraction of the first `k` scores in
/// `history`.
pub fn k_test(history: &[f64], score: f64, k: usize, p: f64) -> bool {
    if k == 0 {
        return true;
    }
    let prior = &history[..k.min(history.len())];
    if prior.is_empty() {
        return true;
    }
    let exceeded = prior.iter().filter(|&&v| score > v).count();
    exceeded as f64 / prior.len() as f64 > 1.0 - p
}

fn check_inputs(
    u: ArrayView1<f64>,
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
) -> Result<(), DcaError> {
    let (n, p) = x.dim();
    if n == 0 {
        return Err(DcaError::InvalidParameter(
            "design matrix has no observations".to_string(),
        ));
    }
    if u.len() != p {
        return Err(DcaError::ShapeMismatch {
            context: "optimize_direction",
            expected: (p, 1),
            found: (u.len(), 1),
        });
    }
    if ry.dim() != (n, n) {
        return Err(DcaError::ShapeMismatch {
            context: "optimize_direction",
            expected: (n, n),
            found: ry.dim(),
        });
    }
    Ok(())
}

/// Projected gradient ascent on the unit sphere.
///
/// Each step moves along `gradient`, renormalizes, and rescores. The search
/// ends once the squared change in score is at most `config.tolerance`, or
/// fails with `NonConvergence` after `config.max_iterations` steps.
fn ascend<F>(
    u0: Array1<f64>,
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
    config: &DcaConfig,
    mut gradient: F,
) -> Result<DirectionResult, DcaError>
where
    F: FnMut(ArrayView1<f64>) -> Result<Array1<f64>, DcaError>,
{
    let kind = config.projected_distance;
    let mut u = normalize(u0)?;
    let mut score = projected_score(u.view(), x, ry, kind)?;
    let mut last_delta = f64::INFINITY;

    for iteration in 1..=config.max_iterations {
        let grad = gradient(u.view())?;
        u.scaled_add(config.learning_rate, &grad);
        u = normalize(u)?;
        let next_score = projected_score(u.view(), x, ry, kind)?;
        last_delta = (next_score - score).powi(2);
        log::trace!(
            "iteration {iteration}: score {next_score:.6e}, squared change {last_delta:.3e}"
        );
        if last_delta <= config.tolerance {
            log::debug!(
                "Direction converged after {iteration} iterations with score {next_score:.6e}"
            );
            return Ok(DirectionResult {
                direction: u,
                score: next_score,
                iterations: iteration,
            });
        }
        score = next_score;
    }

    log::warn!(
        "Direction search stopped at the iteration cap ({}) with squared score change {:.3e}",
        config.max_iterations,
        last_delta
    );
    Err(DcaError::NonConvergence {
        iterations: config.max_iterations,
        last_delta,
    })
}

/// Batch projected gradient ascent starting from `u0`.
pub fn optimize_batch(
    u0: Array1<f64>,
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
    config: &DcaConfig,
) -> Result<DirectionResult, DcaError> {
    check_inputs(u0.view(), x, ry)?;
    ascend(u0, x, ry, config, |u| squared_distance_covariance_grad(u, x, ry))
}

/// Stochastic projected gradient ascent starting from `u0`. A fresh sample
/// index is drawn from `rng` at every step.
pub fn optimize_stochastic<R: Rng + ?Sized>(
    u0: Array1<f64>,
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
    config: &DcaConfig,
    rng: &mut R,
) -> Result<DirectionResult, DcaError> {
    check_inputs(u0.view(), x, ry)?;
    let n = x.nrows();
    ascend(u0, x, ry, config, |u| {
        let sample = rng.gen_range(0..n);
        squared_distance_covariance_grad_stochastic(u, x, ry, sample)
    })
}

/// Runs the direction search from a given starting direction, in the mode
/// selected by `config`.
pub fn optimize_direction_from<R: Rng + ?Sized>(
    u0: Array1<f64>,
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
    config: &DcaConfig,
    rng: &mut R,
) -> Result<DirectionResult, DcaError> {
    config.validate()?;
    match config.mode {
        OptimizerMode::Batch => optimize_batch(u0, x, ry, config),
        OptimizerMode::Stochastic => optimize_stochastic(u0, x, ry, config, rng),
    }
}

/// Finds a unit direction maximizing the squared distance covariance between
/// `x·u` and the response whose centered distance matrix is `ry`, starting
/// from a random direction drawn from `rng`.
pub fn optimize_direction<R: Rng + ?Sized>(
    x: ArrayView2<f64>,
    ry: ArrayView2<f64>,
    config: &DcaConfig,
    rng: &mut R,
) -> Result<DirectionResult, DcaError> {
    let u0 = random_unit_direction(x.ncols(), rng)?;
    optimize_direction_from(u0, x, ry, config, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{centered_distance, distance_matrix};
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, Axis, array};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::Distribution;

    fn problem(seed: u64) -> (Array2<f64>, Array2<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let x: Array2<f64> =
            Array2::from_shape_fn((30, 3), |_| StandardNormal.sample(&mut rng));
        let y = x.column(0).mapv(|v| v.abs()).insert_axis(Axis(1));
        let ry = centered_distance(distance_matrix(y.view()).view()).unwrap();
        (x, ry)
    }

    #[test]
    fn k_test_accepts_first_and_dominant_scores() {
        assert!(k_test(&[], 0.0, 0, 0.1));
        assert!(k_test(&[0.5, 0.4], 0.6, 2, 0.1));
        assert!(!k_test(&[0.5, 0.4], 0.45, 2, 0.1));
        // With p = 0.6 exceeding half of the history is enough.
        assert!(k_test(&[0.5, 0.4], 0.45, 2, 0.6));
        // Only the first k entries are consulted.
        assert!(k_test(&[0.5, 0.9], 0.6, 1, 0.1));
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        assert_eq!(
            normalize(Array1::zeros(3)).unwrap_err(),
            DcaError::DegenerateDirection
        );
        let u = normalize(array![3.0, 4.0]).unwrap();
        assert_abs_diff_eq!(u[0], 0.6, epsilon = 1e-15);
    }

    #[test]
    fn batch_search_returns_unit_direction() {
        let (x, ry) = problem(3);
        let config = DcaConfig {
            learning_rate: 0.5,
            tolerance: 1e-8,
            ..DcaConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        let result = optimize_direction(x.view(), ry.view(), &config, &mut rng).unwrap();
        assert_abs_diff_eq!(result.direction.dot(&result.direction), 1.0, epsilon = 1e-12);
        assert!(result.score > 0.0);
        assert!(result.iterations >= 1);
    }

    #[test]
    fn stochastic_search_returns_unit_direction() {
        let (x, ry) = problem(4);
        let config = DcaConfig {
            mode: OptimizerMode::Stochastic,
            learning_rate: 0.05,
            tolerance: 1e-6,
            ..DcaConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(10);
        let result = optimize_direction(x.view(), ry.view(), &config, &mut rng).unwrap();
        assert_abs_diff_eq!(result.direction.dot(&result.direction), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn iteration_cap_surfaces_non_convergence() {
        let (x, ry) = problem(5);
        let config = DcaConfig {
            learning_rate: 0.5,
            tolerance: f64::MIN_POSITIVE,
            max_iterations: 1,
            ..DcaConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let u0 = array![1.0, 1.0, 1.0];
        let err = optimize_direction_from(u0, x.view(), ry.view(), &config, &mut rng).unwrap_err();
        assert!(matches!(err, DcaError::NonConvergence { iterations: 1, .. }));
    }

    #[test]
    fn mismatched_response_is_rejected() {
        let (x, _) = problem(6);
        let ry = Array2::<f64>::zeros((5, 5));
        let mut rng = StdRng::seed_from_u64(2);
        assert!(matches!(
            optimize_direction(x.view(), ry.view(), &DcaConfig::default(), &mut rng),
            Err(DcaError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn non_positive_learning_rate_is_rejected() {
        let (x, ry) = problem(7);
        let config = DcaConfig {
            learning_rate: 0.0,
            ..DcaConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            optimize_direction(x.view(), ry.view(), &config, &mut rng),
            Err(DcaError::InvalidParameter(_))
        ));
    }
}
