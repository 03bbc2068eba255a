use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Which gradient estimator drives the direction search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerMode {
    /// Full-batch analytic gradient, O(N²P) per step.
    Batch,
    /// Single-sample estimator with a fresh sample index each step, O(NP) per step.
    Stochastic,
}

/// How the 1-D projection `X·u` is turned into a pairwise matrix before centering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectedDistance {
    /// `|z_i - z_j|`, the Euclidean distance on the projected line.
    /// The ascent gradient is the subgradient of this form.
    Absolute,
    /// `z_i - z_j`, the signed difference. Its double-centered form vanishes
    /// identically, so the objective is flat under this choice.
    Signed,
}

/// Hyperparameters for a DCA fit.
///
/// Every field has a default, so a TOML file only needs to name the values it
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DcaConfig {
    /// Number of directions to extract (K). Must not exceed the feature count.
    pub target_dim: usize,
    pub learning_rate: f64,
    /// Threshold on the squared change of the score between two iterations.
    pub tolerance: f64,
    /// Hard cap on ascent steps per direction.
    pub max_iterations: usize,
    pub mode: OptimizerMode,
    /// Level of the significance gate, in (0, 1).
    pub significance_p: f64,
    /// When false every extracted direction is kept, regardless of `k_test`.
    pub enforce_significance: bool,
    pub seed: u64,
    pub projected_distance: ProjectedDistance,
}

impl Default for DcaConfig {
    fn default() -> Self {
        Self {
            target_dim: 1,
            learning_rate: 1e-1,
            tolerance: 1e-5,
            max_iterations: 10_000,
            mode: OptimizerMode::Batch,
            significance_p: 0.1,
            enforce_significance: false,
            seed: 42,
            projected_distance: ProjectedDistance::Absolute,
        }
    }
}

impl DcaConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks the parameters that do not depend on the data.
    pub fn validate(&self) -> Result<(), DcaError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(DcaError::InvalidParameter(format!(
                "learning rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(DcaError::InvalidParameter(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(DcaError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.significance_p > 0.0 && self.significance_p < 1.0) {
            return Err(DcaError::InvalidParameter(format!(
                "significance level must lie in (0, 1), got {}",
                self.significance_p
            )));
        }
        Ok(())
    }
}

/// Errors raised by the numerical engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DcaError {
    #[error("Shape mismatch in {context}: expected {expected:?}, found {found:?}.")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(
        "Direction search did not converge within {iterations} iterations (last squared score change {last_delta:e})."
    )]
    NonConvergence { iterations: usize, last_delta: f64 },

    #[error("Ascent step produced a direction with zero or non-finite norm.")]
    DegenerateDirection,

    #[error("Linear algebra backend failed: {0}")]
    Linalg(String),
}

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] DcaError),
}

/// A converged unit direction and the score it achieves.
#[derive(Debug, Clone)]
pub struct DirectionResult {
    pub direction: Array1<f64>,
    pub score: f64,
    pub iterations: usize,
}

/// The output of `fit_dca`: a P × k basis and one score per column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcaFit {
    /// Columns are the extracted directions, in extraction order.
    pub basis: Array2<f64>,
    /// Squared distance covariance achieved by each direction on the deflated data.
    pub scores: Array1<f64>,
}

impl DcaFit {
    pub fn n_components(&self) -> usize {
        self.basis.ncols()
    }

    /// Projects observations onto the extracted basis, returning an N × k matrix.
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, DcaError> {
        if x.ncols() != self.basis.nrows() {
            return Err(DcaError::ShapeMismatch {
                context: "DcaFit::transform",
                expected: (x.nrows(), self.basis.nrows()),
                found: x.dim(),
            });
        }
        Ok(x.dot(&self.basis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn toml_overrides_only_named_fields() {
        let config = DcaConfig::from_toml_str(
            "target_dim = 3\nmode = \"stochastic\"\nenforce_significance = true\n",
        )
        .unwrap();
        assert_eq!(config.target_dim, 3);
        assert_eq!(config.mode, OptimizerMode::Stochastic);
        assert!(config.enforce_significance);
        assert_eq!(config.max_iterations, DcaConfig::default().max_iterations);
        assert_eq!(config.projected_distance, ProjectedDistance::Absolute);
    }

    #[test]
    fn invalid_toml_values_are_rejected() {
        let err = DcaConfig::from_toml_str("learning_rate = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(DcaError::InvalidParameter(_))));
        let err = DcaConfig::from_toml_str("significance_p = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(DcaError::InvalidParameter(_))));
        assert!(matches!(
            DcaConfig::from_toml_str("mode = \"sideways\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn transform_checks_feature_count() {
        let fit = DcaFit {
            basis: array![[1.0], [0.0]],
            scores: array![0.5],
        };
        let projected = fit.transform(array![[2.0, 3.0], [4.0, 5.0]].view()).unwrap();
        assert_eq!(projected, array![[2.0], [4.0]]);
        assert!(fit.transform(array![[1.0, 2.0, 3.0]].view()).is_err());
    }
}
