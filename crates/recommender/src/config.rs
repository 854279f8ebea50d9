//! Configuration loader for the recommender
//!
//! All settings come from environment variables with the `RECOMMENDER_`
//! prefix, optionally seeded from a `.env` file via dotenvy. Override
//! hierarchy: defaults < .env < environment.
//!
//! # Example
//!
//! ```no_run
//! use storefront_recommender::config::{load_dotenv, ConfigLoader, RecommenderConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! load_dotenv();
//! let config = RecommenderConfig::from_env()?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::RecommendError;
use crate::nmf::NmfConfig;
use crate::observability::LogFormat;
use std::path::PathBuf;

/// Configuration loader trait
///
/// Provides standardized methods for loading and validating configuration from
/// environment variables.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if a value cannot be parsed.
    fn from_env() -> Result<Self, RecommendError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if any validation check fails.
    fn validate(&self) -> Result<(), RecommendError>;
}

/// Recommender configuration
///
/// # Environment Variables
///
/// - `RECOMMENDER_MODEL_PATH` (optional): Model bundle location (default: "recommendation_model.bin")
/// - `RECOMMENDER_RATINGS_PATH` (optional): JSON ratings file; synthetic data when unset
/// - `RECOMMENDER_COMPONENTS` (optional): NMF latent components (default: 10)
/// - `RECOMMENDER_MAX_ITERATIONS` (optional): NMF iteration cap (default: 200)
/// - `RECOMMENDER_SEED` (optional): Seed for factor initialisation and synthetic data (default: 42)
/// - `RECOMMENDER_TOLERANCE` (optional): NMF early-stop tolerance (default: 1e-4)
/// - `RECOMMENDER_DEFAULT_COUNT` (optional): Default result count (default: 10)
/// - `RECOMMENDER_MIN_RATINGS` (optional): Popularity threshold for cold-start fallback (default: 5)
/// - `RECOMMENDER_LOG_LEVEL` (optional): Log level (default: "info")
/// - `RECOMMENDER_LOG_FORMAT` (optional): "pretty" or "json" (default: "pretty")
#[derive(Debug, Clone, PartialEq)]
pub struct RecommenderConfig {
    pub model_path: PathBuf,
    pub ratings_path: Option<PathBuf>,
    pub components: usize,
    pub max_iterations: usize,
    pub seed: u64,
    pub tolerance: f64,
    pub default_count: usize,
    pub min_ratings: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        let nmf = NmfConfig::default();
        Self {
            model_path: PathBuf::from("recommendation_model.bin"),
            ratings_path: None,
            components: nmf.components,
            max_iterations: nmf.max_iterations,
            seed: nmf.seed,
            tolerance: nmf.tolerance,
            default_count: 10,
            min_ratings: 5,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl RecommenderConfig {
    /// NMF parameters derived from this configuration.
    pub fn nmf(&self) -> NmfConfig {
        NmfConfig {
            components: self.components,
            max_iterations: self.max_iterations,
            seed: self.seed,
            tolerance: self.tolerance,
        }
    }
}

impl ConfigLoader for RecommenderConfig {
    fn from_env() -> Result<Self, RecommendError> {
        let defaults = RecommenderConfig::default();

        let model_path = std::env::var("RECOMMENDER_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);

        let ratings_path = std::env::var("RECOMMENDER_RATINGS_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let log_format = match std::env::var("RECOMMENDER_LOG_FORMAT") {
            Ok(value) => value.parse::<LogFormat>().map_err(|message| {
                RecommendError::Configuration {
                    message,
                    key: Some("RECOMMENDER_LOG_FORMAT".to_string()),
                }
            })?,
            Err(_) => defaults.log_format,
        };

        Ok(Self {
            model_path,
            ratings_path,
            components: parse_env_var("RECOMMENDER_COMPONENTS", defaults.components)?,
            max_iterations: parse_env_var("RECOMMENDER_MAX_ITERATIONS", defaults.max_iterations)?,
            seed: parse_env_var("RECOMMENDER_SEED", defaults.seed)?,
            tolerance: parse_env_var("RECOMMENDER_TOLERANCE", defaults.tolerance)?,
            default_count: parse_env_var("RECOMMENDER_DEFAULT_COUNT", defaults.default_count)?,
            min_ratings: parse_env_var("RECOMMENDER_MIN_RATINGS", defaults.min_ratings)?,
            log_level: std::env::var("RECOMMENDER_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
        })
    }

    fn validate(&self) -> Result<(), RecommendError> {
        if self.components == 0 {
            return Err(RecommendError::Configuration {
                message: "components must be greater than 0".to_string(),
                key: Some("RECOMMENDER_COMPONENTS".to_string()),
            });
        }

        if self.max_iterations == 0 {
            return Err(RecommendError::Configuration {
                message: "max_iterations must be greater than 0".to_string(),
                key: Some("RECOMMENDER_MAX_ITERATIONS".to_string()),
            });
        }

        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(RecommendError::Configuration {
                message: format!("tolerance must be a non-negative number, got {}", self.tolerance),
                key: Some("RECOMMENDER_TOLERANCE".to_string()),
            });
        }

        if self.default_count == 0 {
            return Err(RecommendError::Configuration {
                message: "default_count must be greater than 0".to_string(),
                key: Some("RECOMMENDER_DEFAULT_COUNT".to_string()),
            });
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(RecommendError::Configuration {
                message: format!(
                    "Invalid log_level '{}'. Must be one of: {}",
                    self.log_level,
                    valid_log_levels.join(", ")
                ),
                key: Some("RECOMMENDER_LOG_LEVEL".to_string()),
            });
        }

        Ok(())
    }
}

/// Parse an environment variable, returning `default` when it is unset.
///
/// # Errors
///
/// Returns a `Configuration` error if the value cannot be parsed
fn parse_env_var<T>(key: &str, default: T) -> Result<T, RecommendError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>().map_err(|e| RecommendError::Configuration {
                message: format!("Failed to parse {}: {}", key, e),
                key: Some(key.to_string()),
            })
        })
        .unwrap_or(Ok(default))
}

/// Load .env file if present
///
/// A missing .env file is not an error.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}
