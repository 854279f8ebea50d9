//! Shared value types for ratings, query results and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lowest valid rating on the storefront scale.
pub const MIN_RATING: u8 = 1;
/// Highest valid rating on the storefront scale.
pub const MAX_RATING: u8 = 5;
/// Midpoint of the rating scale, used when nothing better is known.
pub const DEFAULT_RATING: f64 = 3.0;

/// A single explicit rating of an item by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: String,
    pub item_id: String,
    pub rating: u8,
}

impl Rating {
    pub fn new(user_id: impl Into<String>, item_id: impl Into<String>, rating: u8) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            rating,
        }
    }

    pub fn is_valid(&self) -> bool {
        (MIN_RATING..=MAX_RATING).contains(&self.rating)
    }
}

/// Why a query was answered by a fallback policy instead of the factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    UnknownUser,
    UnknownItem,
    UnknownUserAndItem,
}

/// Where a predicted rating came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum PredictionSource {
    Fresh,
    Fallback(FallbackReason),
}

/// Personalized candidate produced from the latent factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: String,
    pub predicted_rating: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarItem {
    pub item_id: String,
    pub similarity_score: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularItem {
    pub item_id: String,
    pub average_rating: f64,
    pub rating_count: usize,
    pub weighted_score: f64,
}

/// Result of a personalized recommendation request.
///
/// Unknown users are answered with the popularity ranking; that is a normal
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserRecommendations {
    Personalized {
        user_id: String,
        items: Vec<ScoredItem>,
        total_available: usize,
        excluded_rated: usize,
    },
    Fallback {
        user_id: String,
        reason: FallbackReason,
        items: Vec<PopularItem>,
    },
}

impl UserRecommendations {
    pub fn is_fallback(&self) -> bool {
        matches!(self, UserRecommendations::Fallback { .. })
    }

    pub fn len(&self) -> usize {
        match self {
            UserRecommendations::Personalized { items, .. } => items.len(),
            UserRecommendations::Fallback { items, .. } => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recommended item ids in rank order, whichever policy produced them.
    pub fn item_ids(&self) -> Vec<&str> {
        match self {
            UserRecommendations::Personalized { items, .. } => {
                items.iter().map(|i| i.item_id.as_str()).collect()
            }
            UserRecommendations::Fallback { items, .. } => {
                items.iter().map(|i| i.item_id.as_str()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarItems {
    pub item_id: String,
    pub items: Vec<SimilarItem>,
    pub total_available: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularItems {
    pub items: Vec<PopularItem>,
    pub min_ratings: usize,
    pub total_qualifying: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub user_id: String,
    pub item_id: String,
    /// Always within [1, 5].
    pub predicted_rating: f64,
    pub source: PredictionSource,
    pub confidence: f64,
}

impl Prediction {
    pub fn was_fallback(&self) -> bool {
        matches!(self.source, PredictionSource::Fallback(_))
    }
}

/// Outcome of `prepare`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub users: usize,
    pub items: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub algorithm: String,
    pub users: usize,
    pub items: usize,
    /// Non-zero cells of the rating matrix.
    pub ratings: usize,
    pub sparsity: f64,
    pub components: usize,
    pub iterations: usize,
    pub reconstruction_error: f64,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub model_type: String,
    pub users: usize,
    pub items: usize,
    pub ratings: usize,
    pub rating_scale: (u8, u8),
    pub global_mean: f64,
    pub sparsity: f64,
    pub components: usize,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub path: PathBuf,
    pub bytes: u64,
}

impl StatusReport {
    pub fn success(path: PathBuf, bytes: u64) -> Self {
        Self {
            status: "success".to_string(),
            path,
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_validity() {
        assert!(Rating::new("u1", "A", 1).is_valid());
        assert!(Rating::new("u1", "A", 5).is_valid());
        assert!(!Rating::new("u1", "A", 0).is_valid());
        assert!(!Rating::new("u1", "A", 6).is_valid());
    }

    #[test]
    fn test_prediction_source_serialization() {
        let json = serde_json::to_value(PredictionSource::Fallback(FallbackReason::UnknownUser))
            .unwrap();
        assert_eq!(json["kind"], "fallback");
        assert_eq!(json["reason"], "unknown_user");

        let json = serde_json::to_value(PredictionSource::Fresh).unwrap();
        assert_eq!(json["kind"], "fresh");
    }

    #[test]
    fn test_user_recommendations_accessors() {
        let fallback = UserRecommendations::Fallback {
            user_id: "new_user".to_string(),
            reason: FallbackReason::UnknownUser,
            items: vec![PopularItem {
                item_id: "Lavender Oil".to_string(),
                average_rating: 4.5,
                rating_count: 10,
                weighted_score: 4.5 * 11f64.ln(),
            }],
        };

        assert!(fallback.is_fallback());
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback.item_ids(), vec!["Lavender Oil"]);
    }
}
