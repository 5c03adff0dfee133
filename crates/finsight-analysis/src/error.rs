use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The embedding model could not be loaded. Not retried within a request.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// A vector did not match the established dimension of the index or model.
    #[error("vector dimension mismatch: expected {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("top-k must be at least 1")]
    InvalidTopK,

    #[error("document parse error: {0}")]
    DocumentParse(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Db(#[from] finsight_db::DbError),
}

impl AnalysisError {
    /// Invariant and input-contract violations that must reach the caller.
    #[must_use]
    pub fn is_hard_failure(&self) -> bool {
        matches!(
            self,
            AnalysisError::DimensionMismatch { .. } | AnalysisError::InvalidTopK
        )
    }
}
