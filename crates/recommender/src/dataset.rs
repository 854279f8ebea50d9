//! Rating sources
//!
//! - a seeded synthetic storefront catalogue for demos and tests
//! - JSON rating files (an array of `{ "user_id", "item_id", "rating" }`)

use crate::error::{RecommendError, Result};
use crate::types::Rating;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::Path;

const NUM_USERS: usize = 100;
const MIN_RATINGS_PER_USER: usize = 10;
const MAX_RATINGS_PER_USER: usize = 20;

pub const PRODUCTS: [&str; 30] = [
    "Turmeric CO2 Extract",
    "Clove Essential Oil",
    "Black Pepper Oleoresin",
    "Lavender Oil",
    "Tea Tree Oil",
    "Eucalyptus Oil",
    "Peppermint Oil",
    "Rosemary Extract",
    "Ginger Extract",
    "Garlic Extract",
    "Aloe Vera Gel",
    "Coconut Oil",
    "Argan Oil",
    "Jojoba Oil",
    "Sweet Almond Oil",
    "Frankincense Oil",
    "Lemon Oil",
    "Orange Oil",
    "Bergamot Oil",
    "Ylang Ylang Oil",
    "Sandalwood Oil",
    "Cedarwood Oil",
    "Pine Oil",
    "Chamomile Extract",
    "Green Tea Extract",
    "Vitamin E Oil",
    "Moringa Powder",
    "Spirulina Powder",
    "Wheatgrass Powder",
    "Ashwagandha Extract",
];

/// Best sellers, rated 4 or 5.
const FAVOURITES: [&str; 3] = ["Turmeric CO2 Extract", "Lavender Oil", "Tea Tree Oil"];
/// Reliable staples, rated 3 to 5.
const STAPLES: [&str; 3] = ["Coconut Oil", "Aloe Vera Gel", "Peppermint Oil"];

const FAVOURITE_WEIGHTS: [(u8, f64); 2] = [(4, 0.3), (5, 0.7)];
const STAPLE_WEIGHTS: [(u8, f64); 3] = [(3, 0.2), (4, 0.4), (5, 0.4)];
const DEFAULT_WEIGHTS: [(u8, f64); 5] = [(1, 0.05), (2, 0.1), (3, 0.3), (4, 0.35), (5, 0.2)];

/// Generate a storefront rating set: 100 users each rating 10-20 distinct
/// products, with a few products biased towards high ratings.
///
/// The same seed always produces the same ratings.
pub fn synthetic_ratings(seed: u64) -> Result<Vec<Rating>> {
    let mut rng = StdRng::seed_from_u64(seed);

    let favourite = weighted(&FAVOURITE_WEIGHTS)?;
    let staple = weighted(&STAPLE_WEIGHTS)?;
    let default = weighted(&DEFAULT_WEIGHTS)?;

    let mut ratings = Vec::new();
    for user in 1..=NUM_USERS {
        let user_id = format!("user_{}", user);
        let num_ratings = rng.gen_range(MIN_RATINGS_PER_USER..=MAX_RATINGS_PER_USER);

        let products: Vec<&str> = PRODUCTS
            .choose_multiple(&mut rng, num_ratings)
            .copied()
            .collect();

        for product in products {
            let (values, distribution) = if FAVOURITES.contains(&product) {
                &favourite
            } else if STAPLES.contains(&product) {
                &staple
            } else {
                &default
            };
            let rating = values[distribution.sample(&mut rng)];
            ratings.push(Rating::new(user_id.clone(), product, rating));
        }
    }

    tracing::debug!(
        seed,
        ratings = ratings.len(),
        users = NUM_USERS,
        "Generated synthetic ratings"
    );

    Ok(ratings)
}

fn weighted(table: &[(u8, f64)]) -> Result<(Vec<u8>, WeightedIndex<f64>)> {
    let values = table.iter().map(|(value, _)| *value).collect();
    let distribution = WeightedIndex::new(table.iter().map(|(_, weight)| *weight))
        .map_err(|e| RecommendError::InvalidParameter(format!("bad rating weights: {}", e)))?;
    Ok((values, distribution))
}

/// Load ratings from a JSON file.
pub fn load_ratings(path: &Path) -> Result<Vec<Rating>> {
    let contents = std::fs::read_to_string(path)?;
    let ratings: Vec<Rating> = serde_json::from_str(&contents).map_err(|e| {
        RecommendError::InvalidInput(format!("invalid ratings file {}: {}", path.display(), e))
    })?;

    tracing::info!(path = %path.display(), ratings = ratings.len(), "Loaded ratings");
    Ok(ratings)
}
