//! Model bundle persistence
//!
//! A trained snapshot is written as one bincode-encoded `ModelBundle`:
//! - the validated rating list
//! - the rating matrix (ids + row-major values)
//! - both NMF factor matrices (shape + row-major values)
//! - the NMF parameters and training timestamp
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! crash mid-save never leaves a half-written model at the target path.

use crate::error::{RecommendError, Result};
use crate::matrix::RatingMatrix;
use crate::nmf::{Factorization, NmfConfig};
use crate::snapshot::{ModelSnapshot, PreparedData};
use crate::types::{Rating, StatusReport};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Bumped whenever the bundle layout changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializableMatrix {
    shape: (usize, usize),
    data: Vec<f64>,
}

impl SerializableMatrix {
    fn from_array(array: &Array2<f64>) -> Self {
        Self {
            shape: array.dim(),
            data: array.iter().copied().collect(),
        }
    }

    fn to_array(&self) -> Result<Array2<f64>> {
        Array2::from_shape_vec(self.shape, self.data.clone())
            .map_err(|e| RecommendError::InvalidInput(format!("bad matrix shape: {}", e)))
    }
}

/// On-disk representation of a `ModelSnapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelBundle {
    format_version: u32,
    ratings: Vec<Rating>,
    users: Vec<String>,
    items: Vec<String>,
    rating_matrix: SerializableMatrix,
    user_factors: SerializableMatrix,
    item_factors: SerializableMatrix,
    iterations: usize,
    reconstruction_error: f64,
    config: NmfConfig,
    trained_at: DateTime<Utc>,
}

impl ModelBundle {
    fn from_snapshot(snapshot: &ModelSnapshot) -> Self {
        let data = snapshot.data();
        let factorization = snapshot.factorization();

        Self {
            format_version: FORMAT_VERSION,
            ratings: data.ratings.clone(),
            users: data.matrix.users().to_vec(),
            items: data.matrix.items().to_vec(),
            rating_matrix: SerializableMatrix::from_array(data.matrix.values()),
            user_factors: SerializableMatrix::from_array(&factorization.user_factors),
            item_factors: SerializableMatrix::from_array(&factorization.item_factors),
            iterations: factorization.iterations,
            reconstruction_error: factorization.reconstruction_error,
            config: *snapshot.config(),
            trained_at: snapshot.trained_at(),
        }
    }

    fn into_snapshot(self) -> Result<ModelSnapshot> {
        if self.format_version != FORMAT_VERSION {
            return Err(RecommendError::InvalidInput(format!(
                "unsupported bundle format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }

        let values = self.rating_matrix.to_array()?;
        let matrix = RatingMatrix::from_parts(self.users, self.items, values)?;
        let factorization = Factorization {
            user_factors: self.user_factors.to_array()?,
            item_factors: self.item_factors.to_array()?,
            iterations: self.iterations,
            reconstruction_error: self.reconstruction_error,
        };
        let data = Arc::new(PreparedData {
            ratings: self.ratings,
            matrix,
        });

        ModelSnapshot::from_parts(data, factorization, self.config, self.trained_at)
    }
}

/// Encode a snapshot to bytes.
pub fn encode(snapshot: &ModelSnapshot) -> Result<Vec<u8>> {
    bincode::serialize(&ModelBundle::from_snapshot(snapshot))
        .map_err(|e| RecommendError::InvalidInput(format!("failed to serialize model: {}", e)))
}

/// Decode a snapshot previously produced by [`encode`]. Every failure is
/// reported as `CorruptModel` against `path`.
pub fn decode(bytes: &[u8], path: &Path) -> Result<ModelSnapshot> {
    let corrupt = |reason: String| RecommendError::CorruptModel {
        path: path.to_path_buf(),
        reason,
    };

    let bundle: ModelBundle =
        bincode::deserialize(bytes).map_err(|e| corrupt(format!("failed to deserialize: {}", e)))?;

    bundle.into_snapshot().map_err(|e| match e {
        RecommendError::InvalidInput(reason) => corrupt(reason),
        other => other,
    })
}

/// Write a snapshot to `path`.
pub fn save(snapshot: &ModelSnapshot, path: &Path) -> Result<StatusReport> {
    let start = Instant::now();
    let bytes = encode(snapshot)?;

    let tmp_path = temporary_path(path);
    std::fs::write(&tmp_path, &bytes)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    tracing::info!(
        path = %path.display(),
        bytes = bytes.len(),
        elapsed = ?start.elapsed(),
        "Model saved"
    );

    Ok(StatusReport::success(path.to_path_buf(), bytes.len() as u64))
}

/// Read a snapshot from `path`.
///
/// A missing file is `ModelNotFound`; anything unreadable as a bundle is
/// `CorruptModel`.
pub fn load(path: &Path) -> Result<(ModelSnapshot, StatusReport)> {
    let start = Instant::now();

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RecommendError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let snapshot = decode(&bytes, path)?;

    tracing::info!(
        path = %path.display(),
        bytes = bytes.len(),
        elapsed = ?start.elapsed(),
        "Model loaded"
    );

    Ok((
        snapshot,
        StatusReport::success(path.to_path_buf(), bytes.len() as u64),
    ))
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot() -> ModelSnapshot {
        let data = PreparedData::new(vec![
            Rating::new("u1", "A", 5),
            Rating::new("u1", "B", 1),
            Rating::new("u2", "A", 4),
            Rating::new("u2", "B", 2),
            Rating::new("u2", "C", 5),
        ])
        .unwrap();
        let config = NmfConfig {
            components: 2,
            ..NmfConfig::default()
        };
        ModelSnapshot::train(Arc::new(data), &config).unwrap()
    }

    #[test]
    fn test_bincode_serialization_round_trip() {
        let original = snapshot();
        let bytes = encode(&original).unwrap();
        let restored = decode(&bytes, Path::new("memory")).unwrap();

        assert_eq!(restored, original);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        let original = snapshot();

        let saved = save(&original, &path).unwrap();
        assert_eq!(saved.status, "success");
        assert!(saved.bytes > 0);
        assert!(!temporary_path(&path).exists());

        let (restored, loaded) = load(&path).unwrap();
        assert_eq!(loaded.bytes, saved.bytes);
        assert_eq!(restored.predict("u1", "C"), original.predict("u1", "C"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load(&dir.path().join("absent.bin"));
        assert!(matches!(result, Err(RecommendError::ModelNotFound { .. })));
    }

    #[test]
    fn test_load_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"definitely not a model").unwrap();

        let result = load(&path);
        assert!(matches!(result, Err(RecommendError::CorruptModel { .. })));
    }

    #[test]
    fn test_decode_rejects_wrong_version() {
        let mut bundle = ModelBundle::from_snapshot(&snapshot());
        bundle.format_version = FORMAT_VERSION + 1;
        let bytes = bincode::serialize(&bundle).unwrap();

        let result = decode(&bytes, Path::new("future.bin"));
        assert!(matches!(result, Err(RecommendError::CorruptModel { .. })));
    }

    #[test]
    fn test_decode_rejects_inconsistent_shapes() {
        let mut bundle = ModelBundle::from_snapshot(&snapshot());
        bundle.user_factors.shape = (3, 2);
        let bytes = bincode::serialize(&bundle).unwrap();

        let result = decode(&bytes, Path::new("broken.bin"));
        assert!(matches!(result, Err(RecommendError::CorruptModel { .. })));
    }
}
