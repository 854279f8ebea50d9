//! Popularity ranking
//!
//! Ranks items by `average_rating * ln(rating_count + 1)`, so volume helps
//! but cannot outweigh quality indefinitely. Serves as the cold-start
//! fallback for users the model has never seen.

use crate::matrix::RatingMatrix;
use crate::similarity::rank_descending;
use crate::types::{PopularItem, PopularItems};

/// Score an item from its mean rating and number of ratings.
pub fn weighted_score(average_rating: f64, rating_count: usize) -> f64 {
    average_rating * (rating_count as f64 + 1.0).ln()
}

/// Top `count` items with at least `min_ratings` ratings.
///
/// Items below the threshold are left out rather than penalised. An item
/// with no ratings at all never qualifies.
pub fn popular_items(matrix: &RatingMatrix, count: usize, min_ratings: usize) -> PopularItems {
    let mut qualifying: Vec<PopularItem> = matrix
        .items()
        .iter()
        .enumerate()
        .filter_map(|(idx, item_id)| {
            let (rating_count, average) = matrix.item_stats(idx);
            let average_rating = average?;
            (rating_count >= min_ratings).then(|| PopularItem {
                item_id: item_id.clone(),
                average_rating,
                rating_count,
                weighted_score: weighted_score(average_rating, rating_count),
            })
        })
        .collect();

    rank_descending(&mut qualifying, |item| item.weighted_score);
    let total_qualifying = qualifying.len();
    qualifying.truncate(count);

    PopularItems {
        items: qualifying,
        min_ratings,
        total_qualifying,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rating;

    fn matrix() -> RatingMatrix {
        RatingMatrix::from_ratings(&[
            Rating::new("u1", "A", 5),
            Rating::new("u1", "B", 1),
            Rating::new("u2", "A", 4),
            Rating::new("u2", "B", 2),
            Rating::new("u2", "C", 5),
        ])
        .unwrap()
    }

    #[test]
    fn test_weighted_score() {
        assert!((weighted_score(4.5, 2) - 4.5 * 3f64.ln()).abs() < 1e-12);
        assert_eq!(weighted_score(5.0, 0), 0.0);
    }

    #[test]
    fn test_threshold_excludes_sparse_items() {
        let popular = popular_items(&matrix(), 2, 2);

        let ids: Vec<&str> = popular.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(popular.total_qualifying, 2);
        assert_eq!(popular.min_ratings, 2);

        let a = &popular.items[0];
        assert_eq!(a.rating_count, 2);
        assert!((a.average_rating - 4.5).abs() < 1e-12);
        assert!((a.weighted_score - 4.5 * 3f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_volume_is_damped() {
        // C has a perfect single rating; A has 4.5 over two ratings
        let popular = popular_items(&matrix(), 10, 0);

        let ids: Vec<&str> = popular.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_truncation_and_empty_result() {
        assert_eq!(popular_items(&matrix(), 1, 0).items.len(), 1);
        assert_eq!(popular_items(&matrix(), 1, 0).total_qualifying, 3);
        assert!(popular_items(&matrix(), 5, 3).items.is_empty());
        assert!(popular_items(&matrix(), 0, 0).items.is_empty());
    }
}
