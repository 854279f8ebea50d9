//! Prepared rating data and immutable trained model snapshots
//!
//! A `ModelSnapshot` never changes after it is built. Training and restoring
//! produce a new snapshot which the engine swaps in, so readers holding the
//! previous one keep a consistent view.

use crate::error::{RecommendError, Result};
use crate::matrix::RatingMatrix;
use crate::nmf::{self, Factorization, NmfConfig};
use crate::popularity;
use crate::similarity::{clamp_rating, cosine_similarity, rank_descending, rating_confidence};
use crate::types::{
    FallbackReason, ModelStats, PopularItems, PrepareSummary, Prediction, PredictionSource,
    Rating, ScoredItem, SimilarItem, SimilarItems, TrainingReport, UserRecommendations,
    DEFAULT_RATING, MAX_RATING, MIN_RATING,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

pub const ALGORITHM: &str = "NMF";

/// Validated ratings and the matrix pivoted from them.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
    /// Ratings that passed validation, in input order. Repeated (user, item)
    /// pairs are all kept here; the matrix holds only the last of them.
    pub ratings: Vec<Rating>,
    pub matrix: RatingMatrix,
}

impl PreparedData {
    pub fn new(ratings: Vec<Rating>) -> Result<Self> {
        let matrix = RatingMatrix::from_ratings(&ratings)?;
        let ratings = ratings.into_iter().filter(Rating::is_valid).collect();
        Ok(Self { ratings, matrix })
    }

    pub fn summary(&self, rejected: usize) -> PrepareSummary {
        PrepareSummary {
            accepted: self.ratings.len(),
            rejected,
            users: self.matrix.num_users(),
            items: self.matrix.num_items(),
        }
    }

    /// Items whose rating columns point the same way as `item_id`'s.
    pub fn similar_items(&self, item_id: &str, count: usize) -> Result<SimilarItems> {
        let target = self
            .matrix
            .item_idx(item_id)
            .ok_or_else(|| RecommendError::UnknownItem(item_id.to_string()))?;
        let target_vector = self.matrix.item_column(target);

        let mut similar: Vec<SimilarItem> = self
            .matrix
            .items()
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != target)
            .map(|(idx, other_id)| {
                let similarity_score =
                    cosine_similarity(target_vector, self.matrix.item_column(idx));
                SimilarItem {
                    item_id: other_id.clone(),
                    similarity_score,
                    confidence: similarity_score.abs(),
                }
            })
            .collect();

        rank_descending(&mut similar, |item| item.similarity_score);
        let total_available = similar.len();
        similar.truncate(count);

        tracing::debug!(item_id, returned = similar.len(), "Computed similar items");

        Ok(SimilarItems {
            item_id: item_id.to_string(),
            items: similar,
            total_available,
        })
    }

    pub fn popular_items(&self, count: usize, min_ratings: usize) -> PopularItems {
        popularity::popular_items(&self.matrix, count, min_ratings)
    }
}

/// A trained model together with the data it was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSnapshot {
    data: Arc<PreparedData>,
    factorization: Factorization,
    config: NmfConfig,
    trained_at: DateTime<Utc>,
}

impl ModelSnapshot {
    /// Fit NMF on prepared data. CPU-bound; callers on an async runtime
    /// should run this on a blocking worker.
    pub fn train(data: Arc<PreparedData>, config: &NmfConfig) -> Result<Self> {
        let factorization = nmf::fit(data.matrix.values(), config)?;
        Ok(Self {
            data,
            factorization,
            config: *config,
            trained_at: Utc::now(),
        })
    }

    /// Reassemble a snapshot from restored parts.
    pub fn from_parts(
        data: Arc<PreparedData>,
        factorization: Factorization,
        config: NmfConfig,
        trained_at: DateTime<Utc>,
    ) -> Result<Self> {
        let (users, items) = data.matrix.values().dim();
        let k = factorization.components();
        if factorization.user_factors.dim() != (users, k)
            || factorization.item_factors.dim() != (k, items)
        {
            return Err(RecommendError::InvalidInput(format!(
                "factor shapes {:?} and {:?} do not fit a {}x{} matrix",
                factorization.user_factors.dim(),
                factorization.item_factors.dim(),
                users,
                items
            )));
        }

        Ok(Self {
            data,
            factorization,
            config,
            trained_at,
        })
    }

    pub fn data(&self) -> &Arc<PreparedData> {
        &self.data
    }

    pub fn matrix(&self) -> &RatingMatrix {
        &self.data.matrix
    }

    pub fn factorization(&self) -> &Factorization {
        &self.factorization
    }

    pub fn config(&self) -> &NmfConfig {
        &self.config
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn report(&self) -> TrainingReport {
        let matrix = self.matrix();
        TrainingReport {
            algorithm: ALGORITHM.to_string(),
            users: matrix.num_users(),
            items: matrix.num_items(),
            ratings: matrix.nonzero_count(),
            sparsity: matrix.sparsity(),
            components: self.factorization.components(),
            iterations: self.factorization.iterations,
            reconstruction_error: self.factorization.reconstruction_error,
            trained_at: self.trained_at,
        }
    }

    pub fn stats(&self) -> ModelStats {
        let matrix = self.matrix();
        ModelStats {
            model_type: ALGORITHM.to_string(),
            users: matrix.num_users(),
            items: matrix.num_items(),
            ratings: matrix.nonzero_count(),
            rating_scale: (MIN_RATING, MAX_RATING),
            global_mean: matrix.global_mean().unwrap_or(DEFAULT_RATING),
            sparsity: matrix.sparsity(),
            components: self.factorization.components(),
            trained_at: self.trained_at,
        }
    }

    /// Personalized ranking for a user, or the popularity ranking when the
    /// user is not in the trained matrix.
    pub fn recommend_for_user(
        &self,
        user_id: &str,
        count: usize,
        exclude_rated: bool,
        fallback_min_ratings: usize,
    ) -> UserRecommendations {
        let matrix = self.matrix();
        let Some(user_idx) = matrix.user_idx(user_id) else {
            tracing::debug!(user_id, "Unknown user, falling back to popular items");
            return UserRecommendations::Fallback {
                user_id: user_id.to_string(),
                reason: FallbackReason::UnknownUser,
                items: self.data.popular_items(count, fallback_min_ratings).items,
            };
        };

        let rated: HashSet<usize> = if exclude_rated {
            matrix
                .user_row(user_idx)
                .iter()
                .enumerate()
                .filter(|(_, value)| **value > 0.0)
                .map(|(idx, _)| idx)
                .collect()
        } else {
            HashSet::new()
        };

        let scores = self.factorization.user_scores(user_idx);
        let mut candidates: Vec<(usize, f64)> = scores
            .iter()
            .enumerate()
            .filter(|(idx, _)| !rated.contains(idx))
            .map(|(idx, &score)| (idx, score))
            .collect();

        rank_descending(&mut candidates, |(_, score)| *score);
        let total_available = candidates.len();

        let items: Vec<ScoredItem> = candidates
            .into_iter()
            .take(count)
            .map(|(idx, score)| {
                let predicted_rating = clamp_rating(score);
                ScoredItem {
                    item_id: matrix.items()[idx].clone(),
                    predicted_rating,
                    confidence: rating_confidence(predicted_rating),
                }
            })
            .collect();

        UserRecommendations::Personalized {
            user_id: user_id.to_string(),
            items,
            total_available,
            excluded_rated: rated.len(),
        }
    }

    /// Predicted rating for one user-item pair, clamped to the rating scale.
    pub fn predict(&self, user_id: &str, item_id: &str) -> Prediction {
        let matrix = self.matrix();
        let user_idx = matrix.user_idx(user_id);
        let item_idx = matrix.item_idx(item_id);

        let (raw, source) = match (user_idx, item_idx) {
            (Some(u), Some(i)) => (self.factorization.predict(u, i), PredictionSource::Fresh),
            (None, Some(i)) => (
                matrix.item_mean(i).unwrap_or(DEFAULT_RATING),
                PredictionSource::Fallback(FallbackReason::UnknownUser),
            ),
            (Some(u), None) => (
                matrix.user_mean(u).unwrap_or(DEFAULT_RATING),
                PredictionSource::Fallback(FallbackReason::UnknownItem),
            ),
            (None, None) => (
                DEFAULT_RATING,
                PredictionSource::Fallback(FallbackReason::UnknownUserAndItem),
            ),
        };

        let predicted_rating = clamp_rating(raw);
        Prediction {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            predicted_rating,
            source,
            confidence: rating_confidence(predicted_rating),
        }
    }
}
