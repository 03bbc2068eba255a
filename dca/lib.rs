#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Distance Covariance Analysis.
//!
//! DCA finds orthogonal directions `u` of a feature matrix `X` whose 1-D
//! projections `X·u` have maximal squared distance covariance with a
//! response `Y`. Directions are found one at a time by projected gradient
//! ascent on the unit sphere, deflating the data between searches.

pub mod deflation;
pub mod faer_ndarray;
pub mod geometry;
pub mod objective;
pub mod optimizer;
pub mod types;

pub use deflation::{deflate, fit_dca, fit_dca_vector};
pub use geometry::{
    centered_distance, centered_projected_distance, distance_matrix, distance_matrix_diff,
    projected_distance_matrix, signed_difference_matrix,
};
pub use objective::{
    distance_variance, projected_score, squared_distance_correlation, squared_distance_covariance,
    squared_distance_covariance_grad, squared_distance_covariance_grad_stochastic,
};
pub use optimizer::{
    k_test, optimize_batch, optimize_direction, optimize_direction_from, optimize_stochastic,
};
pub use types::{
    ConfigError, DcaConfig, DcaError, DcaFit, DirectionResult, OptimizerMode, ProjectedDistance,
};
