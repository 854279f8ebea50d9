//! Dense user-item rating matrix
//!
//! Pivots a rating list into a users × items table. Rows and columns are
//! ordered by identifier so the same input always yields the same layout.
//! Unrated cells hold 0.0, which is indistinguishable from a rating of zero.

use crate::error::{RecommendError, Result};
use crate::types::Rating;
use ndarray::{Array2, ArrayView1};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct RatingMatrix {
    users: Vec<String>,
    items: Vec<String>,
    user_index: HashMap<String, usize>,
    item_index: HashMap<String, usize>,
    /// [num_users x num_items]
    values: Array2<f64>,
}

impl RatingMatrix {
    /// Build the matrix from ratings. Ratings outside 1..=5 are skipped and
    /// duplicate (user, item) pairs keep the last value.
    pub fn from_ratings(ratings: &[Rating]) -> Result<Self> {
        let valid: Vec<&Rating> = ratings.iter().filter(|r| r.is_valid()).collect();
        let skipped = ratings.len() - valid.len();
        if skipped > 0 {
            tracing::warn!(skipped, "Ignoring ratings outside the 1-5 scale");
        }
        if valid.is_empty() {
            return Err(RecommendError::EmptyDataset);
        }

        let users: Vec<String> = valid
            .iter()
            .map(|r| r.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let items: Vec<String> = valid
            .iter()
            .map(|r| r.item_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let user_index = index_of(&users);
        let item_index = index_of(&items);

        let mut values = Array2::<f64>::zeros((users.len(), items.len()));
        for rating in valid {
            let u = user_index[&rating.user_id];
            let i = item_index[&rating.item_id];
            values[[u, i]] = f64::from(rating.rating);
        }

        Ok(Self {
            users,
            items,
            user_index,
            item_index,
            values,
        })
    }

    /// Reassemble a matrix from its persisted parts.
    pub fn from_parts(users: Vec<String>, items: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (users.len(), items.len()) {
            return Err(RecommendError::InvalidInput(format!(
                "matrix shape {:?} does not match {} users x {} items",
                values.dim(),
                users.len(),
                items.len()
            )));
        }

        let user_index = index_of(&users);
        let item_index = index_of(&items);
        if user_index.len() != users.len() || item_index.len() != items.len() {
            return Err(RecommendError::InvalidInput(
                "duplicate user or item identifiers".to_string(),
            ));
        }

        Ok(Self {
            users,
            items,
            user_index,
            item_index,
            values,
        })
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn user_idx(&self, user_id: &str) -> Option<usize> {
        self.user_index.get(user_id).copied()
    }

    pub fn item_idx(&self, item_id: &str) -> Option<usize> {
        self.item_index.get(item_id).copied()
    }

    pub fn get(&self, user_idx: usize, item_idx: usize) -> f64 {
        self.values[[user_idx, item_idx]]
    }

    pub fn user_row(&self, user_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(user_idx)
    }

    /// All users' ratings of one item; the item's feature vector for similarity.
    pub fn item_column(&self, item_idx: usize) -> ArrayView1<'_, f64> {
        self.values.column(item_idx)
    }

    pub fn nonzero_count(&self) -> usize {
        self.values.iter().filter(|&&v| v != 0.0).count()
    }

    /// Fraction of user-item pairs without a rating.
    pub fn sparsity(&self) -> f64 {
        let cells = self.num_users() * self.num_items();
        if cells == 0 {
            return 0.0;
        }
        1.0 - self.nonzero_count() as f64 / cells as f64
    }

    /// Number of ratings and their mean for one item, ignoring unset cells.
    pub fn item_stats(&self, item_idx: usize) -> (usize, Option<f64>) {
        nonzero_stats(self.item_column(item_idx))
    }

    pub fn item_mean(&self, item_idx: usize) -> Option<f64> {
        self.item_stats(item_idx).1
    }

    pub fn user_mean(&self, user_idx: usize) -> Option<f64> {
        nonzero_stats(self.user_row(user_idx)).1
    }

    pub fn global_mean(&self) -> Option<f64> {
        let (sum, count) = self
            .values
            .iter()
            .filter(|&&v| v != 0.0)
            .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

fn index_of(ids: &[String]) -> HashMap<String, usize> {
    ids.iter()
        .enumerate()
        .map(|(idx, id)| (id.clone(), idx))
        .collect()
}

fn nonzero_stats(values: ArrayView1<'_, f64>) -> (usize, Option<f64>) {
    let (sum, count) = values
        .iter()
        .filter(|&&v| v != 0.0)
        .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
    let mean = (count > 0).then(|| sum / count as f64);
    (count, mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Rating> {
        vec![
            Rating::new("u2", "B", 2),
            Rating::new("u1", "A", 5),
            Rating::new("u1", "B", 1),
            Rating::new("u2", "A", 4),
            Rating::new("u2", "C", 5),
        ]
    }

    #[test]
    fn test_pivot_orders_ids() {
        let matrix = RatingMatrix::from_ratings(&sample()).unwrap();

        assert_eq!(matrix.users(), &["u1".to_string(), "u2".to_string()]);
        assert_eq!(
            matrix.items(),
            &["A".to_string(), "B".to_string(), "C".to_string()]
        );
        assert_eq!(matrix.get(0, 0), 5.0);
        assert_eq!(matrix.get(0, 2), 0.0);
        assert_eq!(matrix.get(1, 2), 5.0);
    }

    #[test]
    fn test_last_write_wins() {
        let ratings = vec![Rating::new("u1", "A", 2), Rating::new("u1", "A", 4)];
        let matrix = RatingMatrix::from_ratings(&ratings).unwrap();
        assert_eq!(matrix.get(0, 0), 4.0);
        assert_eq!(matrix.nonzero_count(), 1);
    }

    #[test]
    fn test_invalid_ratings_skipped() {
        let ratings = vec![
            Rating::new("u1", "A", 0),
            Rating::new("u1", "B", 9),
            Rating::new("u2", "A", 3),
        ];
        let matrix = RatingMatrix::from_ratings(&ratings).unwrap();

        assert_eq!(matrix.num_users(), 1);
        assert_eq!(matrix.num_items(), 1);
        assert!(matrix.user_idx("u1").is_none());
    }

    #[test]
    fn test_empty_input() {
        let result = RatingMatrix::from_ratings(&[Rating::new("u1", "A", 0)]);
        assert!(matches!(result, Err(RecommendError::EmptyDataset)));
    }

    #[test]
    fn test_statistics() {
        let matrix = RatingMatrix::from_ratings(&sample()).unwrap();

        assert_eq!(matrix.nonzero_count(), 5);
        assert!((matrix.sparsity() - (1.0 - 5.0 / 6.0)).abs() < 1e-12);
        assert_eq!(matrix.item_stats(0), (2, Some(4.5)));
        assert_eq!(matrix.user_mean(0), Some(3.0));
        assert_eq!(matrix.item_mean(2), Some(5.0));
        assert_eq!(matrix.global_mean(), Some(17.0 / 5.0));
    }

    #[test]
    fn test_from_parts_shape_mismatch() {
        let result = RatingMatrix::from_parts(
            vec!["u1".to_string()],
            vec!["A".to_string(), "B".to_string()],
            Array2::zeros((2, 2)),
        );
        assert!(matches!(result, Err(RecommendError::InvalidInput(_))));
    }
}
