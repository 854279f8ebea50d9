//! Storefront recommender - offline training job
//!
//! Loads ratings (a JSON file, or the seeded synthetic catalogue), trains the
//! NMF model, writes the model bundle and prints the reports as JSON.

use anyhow::{Context, Result};
use serde_json::json;
use storefront_recommender::{
    dataset, init_logging, load_dotenv, ConfigLoader, EngineConfig, LogConfig,
    RecommendationEngine, RecommenderConfig,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    let config = RecommenderConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_logging(&LogConfig {
        level: config.log_level.clone(),
        format: config.log_format,
    })
    .context("Failed to initialize logging")?;

    info!(
        model_path = %config.model_path.display(),
        components = config.components,
        "Starting recommender training"
    );

    let ratings = match &config.ratings_path {
        Some(path) => dataset::load_ratings(path)
            .with_context(|| format!("Failed to load ratings from {}", path.display()))?,
        None => {
            info!(seed = config.seed, "No ratings file configured, using synthetic data");
            dataset::synthetic_ratings(config.seed).context("Failed to generate ratings")?
        }
    };

    let engine = RecommendationEngine::new(EngineConfig {
        fallback_min_ratings: config.min_ratings,
    });

    let summary = engine.prepare(ratings).await.context("Failed to prepare data")?;
    let training = engine
        .train(config.nmf())
        .await
        .context("Failed to train model")?;
    let saved = engine
        .save(&config.model_path)
        .await
        .context("Failed to save model")?;

    let popular = engine
        .popular_items(config.default_count, config.min_ratings)
        .await
        .context("Failed to rank popular items")?;

    let output = json!({
        "prepare": summary,
        "training": training,
        "save": saved,
        "popular": popular,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    info!("Training job complete");
    Ok(())
}
