//! Storefront Recommendation Engine
//!
//! Rating-based product recommendations for an online storefront:
//! Non-negative Matrix Factorization over a user × item rating matrix,
//! item-to-item cosine similarity, popularity ranking with a cold-start
//! fallback, and bincode model persistence.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod nmf;
pub mod observability;
pub mod persistence;
pub mod popularity;
pub mod similarity;
pub mod snapshot;
pub mod types;

// Re-export key types
pub use config::{load_dotenv, ConfigLoader, RecommenderConfig};
pub use engine::{EngineConfig, RecommendationEngine};
pub use error::{RecommendError, Result};
pub use matrix::RatingMatrix;
pub use nmf::{Factorization, NmfConfig};
pub use observability::{init_logging, LogConfig, LogFormat};
pub use snapshot::{ModelSnapshot, PreparedData};
pub use types::*;

#[cfg(test)]
mod tests;
