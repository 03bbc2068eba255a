use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use dcorr::{
    centered_distance, distance_matrix, squared_distance_covariance,
    squared_distance_covariance_grad, squared_distance_covariance_grad_stochastic,
};
use ndarray::{Array1, Array2, Axis};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_matrix(rows: usize, cols: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(0x5EED_DCA + rows as u64);
    Array2::from_shape_fn((rows, cols), |_| rng.sample(Standard))
}

fn unit_direction(dim: usize) -> Array1<f64> {
    Array1::from_elem(dim, 1.0 / (dim as f64).sqrt())
}

fn benchmark_statistic(c: &mut Criterion) {
    let sizes = [50_usize, 100, 200];
    let mut group = c.benchmark_group("distance_covariance");
    for &n in &sizes {
        let x = random_matrix(n, 5);
        let y = x.column(0).mapv(f64::abs).insert_axis(Axis(1));
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_with_input(BenchmarkId::new("full", n), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let rx = centered_distance(distance_matrix(black_box(x.view())).view()).unwrap();
                let ry = centered_distance(distance_matrix(black_box(y.view())).view()).unwrap();
                black_box(squared_distance_covariance(rx.view(), ry.view()).unwrap());
            });
        });
    }
    group.finish();
}

fn benchmark_gradient(c: &mut Criterion) {
    let sizes = [50_usize, 100, 200];
    let mut group = c.benchmark_group("gradient");
    for &n in &sizes {
        let x = random_matrix(n, 5);
        let y = x.column(1).mapv(|v| v * v).insert_axis(Axis(1));
        let ry = centered_distance(distance_matrix(y.view()).view()).unwrap();
        let u = unit_direction(x.ncols());

        group.bench_with_input(BenchmarkId::new("batch", n), &n, |b, _| {
            b.iter(|| {
                let grad =
                    squared_distance_covariance_grad(black_box(u.view()), x.view(), ry.view())
                        .unwrap();
                black_box(grad);
            });
        });

        group.bench_with_input(BenchmarkId::new("stochastic", n), &n, |b, &rows| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| {
                let sample = rng.gen_range(0..rows);
                let grad = squared_distance_covariance_grad_stochastic(
                    black_box(u.view()),
                    x.view(),
                    ry.view(),
                    sample,
                )
                .unwrap();
                black_box(grad);
            });
        });
    }
    group.finish();
}

criterion_group!(distance_covariance, benchmark_statistic, benchmark_gradient);
criterion_main!(distance_covariance);
