use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("Data not prepared. Call prepare() first")]
    NotPrepared,

    #[error("Model not trained. Train or restore a model first")]
    NotTrained,

    #[error("Item {0} not found in training data")]
    UnknownItem(String),

    #[error("Model file not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("Corrupt model file {}: {reason}", path.display())]
    CorruptModel { path: PathBuf, reason: String },

    #[error("No valid ratings in input")]
    EmptyDataset,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String, key: Option<String> },

    #[error("Training worker failed: {0}")]
    Worker(String),

    #[error("Model discarded: newer data was trained or restored meanwhile")]
    Superseded,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecommendError {
    /// Whether retraining (rather than retrying the load) is the sensible
    /// recovery for a failed restore.
    pub fn requires_retraining(&self) -> bool {
        matches!(
            self,
            RecommendError::ModelNotFound { .. } | RecommendError::CorruptModel { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RecommendError::UnknownItem("Lavender Oil".to_string()).to_string(),
            "Item Lavender Oil not found in training data"
        );
        assert_eq!(
            RecommendError::ModelNotFound {
                path: PathBuf::from("/tmp/model.bin")
            }
            .to_string(),
            "Model file not found: /tmp/model.bin"
        );
    }

    #[test]
    fn test_requires_retraining() {
        assert!(RecommendError::ModelNotFound {
            path: PathBuf::from("missing.bin")
        }
        .requires_retraining());
        assert!(RecommendError::CorruptModel {
            path: PathBuf::from("bad.bin"),
            reason: "truncated".to_string()
        }
        .requires_retraining());
        assert!(!RecommendError::NotPrepared.requires_retraining());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: RecommendError = io.into();
        assert!(matches!(err, RecommendError::Io(_)));
    }
}
