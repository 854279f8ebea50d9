//! Non-negative Matrix Factorization
//!
//! Decomposes the dense rating matrix X (users × items) into
//! W (users × k) and H (k × items) with X ≈ W·H and every entry ≥ 0, using
//! the Lee & Seung multiplicative update rules. Unrated cells are fitted as
//! zeros.

use crate::error::{RecommendError, Result};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-10;
/// Iterations between convergence checks.
const CHECK_INTERVAL: usize = 10;

/// NMF training parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NmfConfig {
    /// Number of latent components (k)
    pub components: usize,
    /// Upper bound on update iterations
    pub max_iterations: usize,
    /// Seed for the factor initialisation
    pub seed: u64,
    /// Relative error improvement below which training stops early
    pub tolerance: f64,
}

impl Default for NmfConfig {
    fn default() -> Self {
        Self {
            components: 10,
            max_iterations: 200,
            seed: 42,
            tolerance: 1e-4,
        }
    }
}

impl NmfConfig {
    pub fn validate(&self) -> Result<()> {
        if self.components == 0 {
            return Err(RecommendError::InvalidParameter(
                "components must be greater than 0".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(RecommendError::InvalidParameter(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(RecommendError::InvalidParameter(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Fitted factor matrices
#[derive(Debug, Clone, PartialEq)]
pub struct Factorization {
    /// User latent factors: [num_users x k]
    pub user_factors: Array2<f64>,
    /// Item latent factors: [k x num_items]
    pub item_factors: Array2<f64>,
    /// Update iterations actually run
    pub iterations: usize,
    /// Frobenius norm of X - W·H after the last iteration
    pub reconstruction_error: f64,
}

impl Factorization {
    pub fn components(&self) -> usize {
        self.user_factors.ncols()
    }

    /// Predicted score for one user-item pair.
    pub fn predict(&self, user_idx: usize, item_idx: usize) -> f64 {
        self.user_factors
            .row(user_idx)
            .dot(&self.item_factors.column(item_idx))
    }

    /// Predicted scores of one user for every item, in column order.
    pub fn user_scores(&self, user_idx: usize) -> Array1<f64> {
        self.user_factors.row(user_idx).dot(&self.item_factors)
    }
}

/// Factorize `x` into non-negative factors.
///
/// Deterministic for a given `config.seed`. Running out of iterations
/// before the tolerance is met is not an error.
pub fn fit(x: &Array2<f64>, config: &NmfConfig) -> Result<Factorization> {
    config.validate()?;

    let (num_users, num_items) = x.dim();
    if num_users == 0 || num_items == 0 {
        return Err(RecommendError::EmptyDataset);
    }
    if x.iter().any(|&v| v < 0.0 || !v.is_finite()) {
        return Err(RecommendError::InvalidInput(
            "NMF input must be finite and non-negative".to_string(),
        ));
    }

    let k = config.components;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let scale = (x.mean().unwrap_or(0.0) / k as f64).sqrt().max(EPSILON);

    let mut w = Array2::<f64>::zeros((num_users, k));
    let mut h = Array2::<f64>::zeros((k, num_items));
    w.mapv_inplace(|_| scale * rng.gen_range(0.01..1.0));
    h.mapv_inplace(|_| scale * rng.gen_range(0.01..1.0));

    let initial_error = reconstruction_error(x, &w, &h);
    let mut previous_error = initial_error;
    let mut iterations = 0;

    for iteration in 1..=config.max_iterations {
        // H <- H * (W^T X) / (W^T W H)
        let numerator = w.t().dot(x);
        let denominator = w.t().dot(&w).dot(&h) + EPSILON;
        h *= &(numerator / denominator);

        // W <- W * (X H^T) / (W H H^T)
        let numerator = x.dot(&h.t());
        let denominator = w.dot(&h.dot(&h.t())) + EPSILON;
        w *= &(numerator / denominator);

        iterations = iteration;

        if iteration % CHECK_INTERVAL == 0 {
            let error = reconstruction_error(x, &w, &h);
            tracing::debug!(iteration, error, "NMF convergence check");

            if initial_error > 0.0 && (previous_error - error) / initial_error < config.tolerance {
                break;
            }
            previous_error = error;
        }
    }

    let reconstruction_error = reconstruction_error(x, &w, &h);
    tracing::debug!(
        iterations,
        reconstruction_error,
        components = k,
        "NMF finished"
    );

    Ok(Factorization {
        user_factors: w,
        item_factors: h,
        iterations,
        reconstruction_error,
    })
}

/// Frobenius norm of `x - w·h`.
pub fn reconstruction_error(x: &Array2<f64>, w: &Array2<f64>, h: &Array2<f64>) -> f64 {
    let residual = x - &w.dot(h);
    residual.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_matrix() -> Array2<f64> {
        array![
            [5.0, 3.0, 0.0, 1.0],
            [4.0, 0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0, 5.0],
            [1.0, 0.0, 0.0, 4.0],
            [0.0, 1.0, 5.0, 4.0],
        ]
    }

    #[test]
    fn test_config_validation() {
        assert!(NmfConfig::default().validate().is_ok());

        let zero_components = NmfConfig {
            components: 0,
            ..NmfConfig::default()
        };
        assert!(matches!(
            zero_components.validate(),
            Err(RecommendError::InvalidParameter(_))
        ));

        let zero_iterations = NmfConfig {
            max_iterations: 0,
            ..NmfConfig::default()
        };
        assert!(zero_iterations.validate().is_err());

        let bad_tolerance = NmfConfig {
            tolerance: f64::NAN,
            ..NmfConfig::default()
        };
        assert!(bad_tolerance.validate().is_err());
    }

    #[test]
    fn test_fit_shapes_and_non_negativity() {
        let x = sample_matrix();
        let config = NmfConfig {
            components: 2,
            ..NmfConfig::default()
        };

        let model = fit(&x, &config).unwrap();

        assert_eq!(model.user_factors.dim(), (5, 2));
        assert_eq!(model.item_factors.dim(), (2, 4));
        assert_eq!(model.components(), 2);
        assert!(model.user_factors.iter().all(|&v| v >= 0.0));
        assert!(model.item_factors.iter().all(|&v| v >= 0.0));
        assert!(model.iterations >= 1 && model.iterations <= config.max_iterations);
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let x = sample_matrix();
        let config = NmfConfig {
            components: 3,
            ..NmfConfig::default()
        };

        let a = fit(&x, &config).unwrap();
        let b = fit(&x, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fit_reduces_error() {
        let x = sample_matrix();
        let config = NmfConfig {
            components: 3,
            max_iterations: 500,
            tolerance: 0.0,
            ..NmfConfig::default()
        };

        let model = fit(&x, &config).unwrap();
        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();

        assert!(model.reconstruction_error < 0.5 * norm);
    }

    #[test]
    fn test_error_never_increases_between_checks() {
        let ratings = crate::dataset::synthetic_ratings(42).unwrap();
        let matrix = crate::matrix::RatingMatrix::from_ratings(&ratings).unwrap();

        let mut previous = f64::INFINITY;
        for max_iterations in (CHECK_INTERVAL..=200).step_by(CHECK_INTERVAL) {
            let config = NmfConfig {
                max_iterations,
                tolerance: 0.0,
                ..NmfConfig::default()
            };
            let model = fit(matrix.values(), &config).unwrap();
            assert!(
                model.reconstruction_error <= previous + 1e-9,
                "error rose to {} after {} iterations (was {})",
                model.reconstruction_error,
                max_iterations,
                previous
            );
            previous = model.reconstruction_error;
        }
    }

    #[test]
    fn test_prediction_matches_product() {
        let x = sample_matrix();
        let model = fit(
            &x,
            &NmfConfig {
                components: 2,
                ..NmfConfig::default()
            },
        )
        .unwrap();

        let product = model.user_factors.dot(&model.item_factors);
        let scores = model.user_scores(2);
        for item in 0..4 {
            assert!((model.predict(2, item) - product[[2, item]]).abs() < 1e-12);
            assert!((scores[item] - product[[2, item]]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_fit_rejects_negative_input() {
        let x = array![[1.0, -1.0], [0.0, 2.0]];
        let result = fit(&x, &NmfConfig::default());
        assert!(matches!(result, Err(RecommendError::InvalidInput(_))));
    }
}
