//! Scoring helpers shared by the query paths.

use crate::types::{MAX_RATING, MIN_RATING};
use ndarray::ArrayView1;

/// Cosine similarity between two vectors.
///
/// Zero-norm vectors (items nobody rated) and any non-finite result give 0.0.
pub fn cosine_similarity(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Closeness of a predicted rating to the nearest whole star, in [0.5, 1].
pub fn rating_confidence(predicted: f64) -> f64 {
    1.0 - (predicted - predicted.round()).abs()
}

pub fn clamp_rating(value: f64) -> f64 {
    if value.is_nan() {
        return f64::from(MIN_RATING);
    }
    value.clamp(f64::from(MIN_RATING), f64::from(MAX_RATING))
}

/// Stable sort by descending score; equal scores keep their input order.
pub fn rank_descending<T>(entries: &mut [T], score: impl Fn(&T) -> f64) {
    entries.sort_by(|a, b| score(b).total_cmp(&score(a)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cosine_similarity() {
        let a = array![1.0, 0.0, 0.0];
        let b = array![1.0, 0.0, 0.0];
        assert!((cosine_similarity(a.view(), b.view()) - 1.0).abs() < 1e-12);

        let c = array![1.0, 0.0, 0.0];
        let d = array![0.0, 1.0, 0.0];
        assert!(cosine_similarity(c.view(), d.view()).abs() < 1e-12);

        let e = array![5.0, 4.0];
        let f = array![1.0, 2.0];
        let expected = 13.0 / (41f64.sqrt() * 5f64.sqrt());
        assert!((cosine_similarity(e.view(), f.view()) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_similarity_zero_norm() {
        let a = array![0.0, 0.0, 0.0];
        let b = array![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(a.view(), b.view()), 0.0);
        assert_eq!(cosine_similarity(a.view(), a.view()), 0.0);
    }

    #[test]
    fn test_rating_confidence() {
        assert_eq!(rating_confidence(4.0), 1.0);
        assert!((rating_confidence(4.25) - 0.75).abs() < 1e-12);
        assert!((rating_confidence(3.5) - 0.5).abs() < 1e-12);
        assert!((rating_confidence(2.9) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_rating() {
        assert_eq!(clamp_rating(0.2), 1.0);
        assert_eq!(clamp_rating(7.3), 5.0);
        assert_eq!(clamp_rating(3.3), 3.3);
        assert_eq!(clamp_rating(f64::NAN), 1.0);
    }

    #[test]
    fn test_rank_descending_is_stable() {
        let mut entries = vec![("a", 1.0), ("b", 3.0), ("c", 1.0), ("d", 3.0), ("e", 2.0)];
        rank_descending(&mut entries, |e| e.1);

        let order: Vec<&str> = entries.iter().map(|e| e.0).collect();
        assert_eq!(order, vec!["b", "d", "e", "a", "c"]);
    }
}
