//! In-memory vector index for transcript chunks.
//!
//! One index is shared by every request in the process. Entries are kept in
//! insertion order behind a read/write lock; embedding happens before the write
//! lock is taken so a slow embedder never blocks concurrent readers.
//!
//! Distance is squared Euclidean (L2). Results ascend by distance and
//! equidistant entries keep insertion order.

use std::sync::Arc;

use finsight_core::TranscriptChunk;
use tokio::sync::RwLock;

use crate::embeddings::EmbeddingProvider;
use crate::error::AnalysisError;

struct IndexEntry {
    id: String,
    text: String,
    vector: Vec<f32>,
}

#[derive(Default)]
struct IndexState {
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub distance: f32,
}

pub struct VectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    #[must_use]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Embed and append `chunks`. Identifiers are not deduplicated.
    ///
    /// The first non-empty batch fixes the index dimension. Returns the number
    /// of entries added.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::DimensionMismatch`] if the batch does not match the
    ///   index dimension (or is internally inconsistent).
    /// - [`AnalysisError::ModelUnavailable`] / [`AnalysisError::Embedding`]
    ///   from the embedder.
    pub async fn add(&self, chunks: &[TranscriptChunk]) -> Result<usize, AnalysisError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(AnalysisError::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let batch_dimension = vectors[0].len();
        if batch_dimension == 0 {
            return Err(AnalysisError::Embedding(
                "embedder returned an empty vector".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != batch_dimension) {
            return Err(AnalysisError::DimensionMismatch {
                expected: batch_dimension,
                actual: bad.len(),
            });
        }

        let mut state = self.state.write().await;
        let current = state.dimension;
        match current {
            Some(expected) if expected != batch_dimension => {
                return Err(AnalysisError::DimensionMismatch {
                    expected,
                    actual: batch_dimension,
                });
            }
            Some(_) => {}
            None => state.dimension = Some(batch_dimension),
        }

        state
            .entries
            .extend(chunks.iter().zip(vectors).map(|(chunk, vector)| IndexEntry {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                vector,
            }));

        tracing::debug!(
            added = chunks.len(),
            total = state.entries.len(),
            "vector index updated"
        );
        Ok(chunks.len())
    }

    /// Nearest entries to `text`, at most `k`, closest first.
    ///
    /// An index that has never been populated yields an empty result without
    /// calling the embedder.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::InvalidTopK`] if `k == 0`.
    /// - [`AnalysisError::DimensionMismatch`] if the query vector does not
    ///   match the index.
    /// - Embedder errors.
    pub async fn search(&self, text: &str, k: usize) -> Result<Vec<SearchHit>, AnalysisError> {
        if k == 0 {
            return Err(AnalysisError::InvalidTopK);
        }
        if self.is_empty().await {
            return Ok(Vec::new());
        }

        let query = self
            .embedder
            .embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AnalysisError::Embedding("embedder returned no vectors".to_string()))?;

        let state = self.state.read().await;
        // reset may have raced with the embed call
        let Some(dimension) = state.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(AnalysisError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = state
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, squared_l2(&entry.vector, &query)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| {
                let entry = &state.entries[position];
                SearchHit {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    distance,
                }
            })
            .collect())
    }

    /// Texts of the `k` nearest entries, closest first.
    ///
    /// # Errors
    ///
    /// Same as [`VectorIndex::search`].
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<String>, AnalysisError> {
        Ok(self
            .search(text, k)
            .await?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Dimension fixed by the first batch, `None` while empty.
    pub async fn dimension(&self) -> Option<usize> {
        self.state.read().await.dimension
    }

    /// Width the embedder produces, if it is known before any entry exists.
    #[must_use]
    pub fn model_dimension(&self) -> Option<usize> {
        self.embedder.dimension_hint()
    }

    /// Drop every entry and forget the dimension. Returns how many were removed.
    pub async fn reset(&self) -> usize {
        let mut state = self.state.write().await;
        let removed = state.entries.len();
        *state = IndexState::default();
        tracing::info!(removed, "vector index reset");
        removed
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
