//! Recommendation engine service
//!
//! Holds the prepared rating data and the currently served model snapshot
//! behind swappable `Arc`s. Readers take a short read lock to clone the
//! `Arc` and compute outside it. Training and restoring build a new
//! snapshot off to the side and only take the write lock to swap it in, so
//! in-flight queries never observe a partially trained model.
//!
//! Every `prepare` and `restore` starts a new generation. A model is only
//! swapped in if no model from a later generation is already served, so a
//! slow training run on old data cannot replace a model of newer data.

use crate::error::{RecommendError, Result};
use crate::nmf::NmfConfig;
use crate::persistence;
use crate::snapshot::{ModelSnapshot, PreparedData};
use crate::types::{
    ModelStats, PopularItems, PrepareSummary, Prediction, Rating, SimilarItems, StatusReport,
    TrainingReport, UserRecommendations,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Engine-level defaults that are not NMF parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Popularity threshold used for the cold-start fallback
    pub fallback_min_ratings: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_min_ratings: 5,
        }
    }
}

/// A shared value tagged with the generation of data it was built from.
#[derive(Debug, Clone)]
struct Generation<T> {
    id: u64,
    value: Arc<T>,
}

/// Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct RecommendationEngine {
    config: EngineConfig,
    prepared: Arc<RwLock<Option<Generation<PreparedData>>>>,
    active: Arc<RwLock<Option<Generation<ModelSnapshot>>>>,
    generations: Arc<AtomicU64>,
}

impl RecommendationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            prepared: Arc::new(RwLock::new(None)),
            active: Arc::new(RwLock::new(None)),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pivot ratings into a fresh rating matrix, replacing any previously
    /// prepared data. The served model is untouched until the next `train`.
    ///
    /// On error nothing is replaced: previously prepared data stays in place.
    #[instrument(skip(self, ratings), fields(ratings = ratings.len()))]
    pub async fn prepare(&self, ratings: Vec<Rating>) -> Result<PrepareSummary> {
        let total = ratings.len();
        let data = PreparedData::new(ratings)?;
        let summary = data.summary(total - data.ratings.len());

        *self.prepared.write().await = Some(Generation {
            id: self.next_generation(),
            value: Arc::new(data),
        });

        info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            users = summary.users,
            items = summary.items,
            "Data prepared"
        );
        Ok(summary)
    }

    /// Train on the prepared data and swap the new model in.
    ///
    /// The factorization runs on a blocking worker thread. Fails with
    /// `Superseded`, discarding the model, when a model of more recently
    /// prepared or restored data was swapped in while this one trained.
    #[instrument(skip(self), fields(components = config.components))]
    pub async fn train(&self, config: NmfConfig) -> Result<TrainingReport> {
        config.validate()?;
        let data = self.prepared_generation().await?;
        let generation = data.id;

        let snapshot =
            tokio::task::spawn_blocking(move || ModelSnapshot::train(data.value, &config))
                .await
                .map_err(|e| RecommendError::Worker(e.to_string()))??;

        let report = snapshot.report();
        self.serve(generation, snapshot).await?;

        info!(
            users = report.users,
            items = report.items,
            ratings = report.ratings,
            sparsity = report.sparsity,
            iterations = report.iterations,
            reconstruction_error = report.reconstruction_error,
            "Model trained successfully with NMF"
        );
        Ok(report)
    }

    /// Start training without waiting for it; poll or await the handle.
    pub fn spawn_background_training(&self, config: NmfConfig) -> JoinHandle<Result<TrainingReport>> {
        let engine = self.clone();
        tokio::spawn(async move { engine.train(config).await })
    }

    pub async fn is_trained(&self) -> bool {
        self.active.read().await.is_some()
    }

    pub async fn snapshot(&self) -> Option<Arc<ModelSnapshot>> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|model| Arc::clone(&model.value))
    }

    #[instrument(skip(self))]
    pub async fn recommend_for_user(
        &self,
        user_id: &str,
        count: usize,
        exclude_rated: bool,
    ) -> Result<UserRecommendations> {
        let model = self.active_model().await?;
        let recommendations = model.recommend_for_user(
            user_id,
            count,
            exclude_rated,
            self.config.fallback_min_ratings,
        );

        info!(
            fallback = recommendations.is_fallback(),
            returned = recommendations.len(),
            "Generated recommendations"
        );
        Ok(recommendations)
    }

    #[instrument(skip(self))]
    pub async fn similar_items(&self, item_id: &str, count: usize) -> Result<SimilarItems> {
        let data = self.serving_data().await?;
        let similar = data.similar_items(item_id, count)?;
        info!(returned = similar.items.len(), "Generated similar items");
        Ok(similar)
    }

    #[instrument(skip(self))]
    pub async fn popular_items(&self, count: usize, min_ratings: usize) -> Result<PopularItems> {
        let data = self.serving_data().await?;
        let popular = data.popular_items(count, min_ratings);
        info!(
            returned = popular.items.len(),
            qualifying = popular.total_qualifying,
            "Generated popular items"
        );
        Ok(popular)
    }

    #[instrument(skip(self))]
    pub async fn predict(&self, user_id: &str, item_id: &str) -> Result<Prediction> {
        let model = self.active_model().await?;
        let prediction = model.predict(user_id, item_id);
        info!(
            predicted_rating = prediction.predicted_rating,
            fallback = prediction.was_fallback(),
            "Predicted rating"
        );
        Ok(prediction)
    }

    pub async fn stats(&self) -> Result<ModelStats> {
        Ok(self.active_model().await?.stats())
    }

    /// Persist the served model to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<StatusReport> {
        let model = self.active_model().await?;
        let path: PathBuf = path.as_ref().to_path_buf();

        tokio::task::spawn_blocking(move || persistence::save(&model, &path))
            .await
            .map_err(|e| RecommendError::Worker(e.to_string()))?
    }

    /// Load a model from `path` and serve it. Its rating data also becomes
    /// the prepared data, so retraining uses the restored ratings.
    pub async fn restore(&self, path: impl AsRef<Path>) -> Result<StatusReport> {
        let path: PathBuf = path.as_ref().to_path_buf();

        let (snapshot, status) = tokio::task::spawn_blocking(move || persistence::load(&path))
            .await
            .map_err(|e| RecommendError::Worker(e.to_string()))??;

        let data = Arc::clone(snapshot.data());
        let snapshot = Arc::new(snapshot);
        {
            let mut prepared = self.prepared.write().await;
            let mut active = self.active.write().await;
            let id = self.next_generation();
            *prepared = Some(Generation { id, value: data });
            *active = Some(Generation {
                id,
                value: snapshot,
            });
        }

        Ok(status)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Swap in a model trained on data of `generation`, unless a model of a
    /// later generation is already served.
    async fn serve(&self, generation: u64, snapshot: ModelSnapshot) -> Result<()> {
        let mut active = self.active.write().await;
        if let Some(current) = active.as_ref() {
            if current.id > generation {
                warn!(
                    generation,
                    served_generation = current.id,
                    "Discarding model trained on superseded data"
                );
                return Err(RecommendError::Superseded);
            }
        }

        *active = Some(Generation {
            id: generation,
            value: Arc::new(snapshot),
        });
        Ok(())
    }

    async fn prepared_generation(&self) -> Result<Generation<PreparedData>> {
        self.prepared
            .read()
            .await
            .clone()
            .ok_or(RecommendError::NotPrepared)
    }

    async fn prepared_data(&self) -> Result<Arc<PreparedData>> {
        Ok(self.prepared_generation().await?.value)
    }

    async fn active_model(&self) -> Result<Arc<ModelSnapshot>> {
        if let Some(model) = self.snapshot().await {
            return Ok(model);
        }
        if self.prepared.read().await.is_some() {
            Err(RecommendError::NotTrained)
        } else {
            Err(RecommendError::NotPrepared)
        }
    }

    /// Data behind the served model, or the prepared data before any
    /// training has happened.
    async fn serving_data(&self) -> Result<Arc<PreparedData>> {
        if let Some(model) = self.active.read().await.as_ref() {
            return Ok(Arc::clone(model.value.data()));
        }
        self.prepared_data().await
    }
}
