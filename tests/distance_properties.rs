use approx::assert_abs_diff_eq;
use dcorr::{
    centered_distance, distance_matrix, distance_variance, squared_distance_correlation,
    squared_distance_covariance,
};
use ndarray::{Array2, Axis, array};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn uniform_points(rows: usize, cols: usize, rng: &mut StdRng) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-5.0..5.0))
}

#[test]
fn right_triangle_distance_matrix() {
    let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    let d = distance_matrix(x.view());
    let expected = array![
        [0.0, 1.0, 1.0],
        [1.0, 0.0, 2.0_f64.sqrt()],
        [1.0, 2.0_f64.sqrt(), 0.0]
    ];
    for (a, b) in d.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-15);
    }
}

#[test]
fn centering_properties_hold_on_random_inputs() {
    let mut rng = StdRng::seed_from_u64(0x5EED_DCA);
    for trial in 0..10 {
        let n = rng.gen_range(2..25);
        let p = rng.gen_range(1..5);
        let x = uniform_points(n, p, &mut rng);
        let d = distance_matrix(x.view());

        for i in 0..n {
            assert_eq!(d[[i, i]], 0.0, "trial {trial}");
            for j in 0..n {
                assert_eq!(d[[i, j]], d[[j, i]], "trial {trial}");
            }
        }

        let r = centered_distance(d.view()).unwrap();
        for s in r.sum_axis(Axis(0)).iter().chain(r.sum_axis(Axis(1)).iter()) {
            assert_abs_diff_eq!(*s, 0.0, epsilon = 1e-10);
        }

        let again = centered_distance(r.view()).unwrap();
        for (a, b) in r.iter().zip(again.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }

        assert!(distance_variance(r.view()).unwrap() >= 0.0);
    }
}

#[test]
fn covariance_is_symmetric_on_random_inputs() {
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..10 {
        let n = rng.gen_range(2..20);
        let x = uniform_points(n, 3, &mut rng);
        let y = uniform_points(n, 1, &mut rng);
        let rx = centered_distance(distance_matrix(x.view()).view()).unwrap();
        let ry = centered_distance(distance_matrix(y.view()).view()).unwrap();
        let xy = squared_distance_covariance(rx.view(), ry.view()).unwrap();
        let yx = squared_distance_covariance(ry.view(), rx.view()).unwrap();
        assert_abs_diff_eq!(xy, yx, epsilon = 1e-12);

        let r = squared_distance_correlation(rx.view(), ry.view()).unwrap();
        assert!((-1e-12..=1.0 + 1e-12).contains(&r));
    }
}

#[test]
fn duplicated_rows_keep_the_matrix_well_formed() {
    let x = array![[2.0, -1.0], [0.0, 0.0], [2.0, -1.0], [3.0, 4.0]];
    let d = distance_matrix(x.view());
    assert_eq!(d[[0, 2]], 0.0);
    assert_eq!(d[[2, 0]], 0.0);
    assert_abs_diff_eq!(d[[1, 3]], 5.0, epsilon = 1e-15);
    let r = centered_distance(d.view()).unwrap();
    assert!(r.iter().all(|v| v.is_finite()));
}
