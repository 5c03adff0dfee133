//! Embedding providers: a TEI (Text Embeddings Inference) HTTP client and an
//! offline feature-hashing fallback.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::error::AnalysisError;

/// Maximum number of texts per /embed call.
const BATCH_SIZE: usize = 64;

/// Text embedded once to load the model and learn its dimension.
const WARMUP_TEXT: &str = "embedding model warmup";

/// Maps text to fixed-dimension vectors, one per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::ModelUnavailable`] if the model cannot be
    /// loaded, [`AnalysisError::DimensionMismatch`] if the model starts
    /// returning vectors of another width, or [`AnalysisError::Embedding`] if
    /// a call fails afterwards.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AnalysisError>;

    /// Vector dimension, if already known.
    fn dimension_hint(&self) -> Option<usize>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
}

/// TEI HTTP client.
///
/// The model is "loaded" by a warmup request on first use. The warmup runs at
/// most once at a time; concurrent first callers wait on the same request. A
/// failed warmup is not cached, so a later call tries again.
pub struct TeiEmbedder {
    client: reqwest::Client,
    url: String,
    dimension: OnceCell<usize>,
}

impl TeiEmbedder {
    /// Create a new `TeiEmbedder` pointed at `tei_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the HTTP client cannot be built.
    pub fn new(tei_url: &str, timeout_secs: u64) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/embed", tei_url.trim_end_matches('/')),
            dimension: OnceCell::new(),
        })
    }

    async fn loaded_dimension(&self) -> Result<usize, AnalysisError> {
        self.dimension
            .get_or_try_init(|| async {
                let warmup = self
                    .post_batch(&[WARMUP_TEXT])
                    .await
                    .map_err(|e| AnalysisError::ModelUnavailable(e.to_string()))?;
                let dimension = warmup.first().map_or(0, Vec::len);
                if dimension == 0 {
                    return Err(AnalysisError::ModelUnavailable(
                        "TEI warmup returned an empty vector".to_string(),
                    ));
                }
                tracing::info!(url = %self.url, dimension, "TEI embedding model loaded");
                Ok(dimension)
            })
            .await
            .copied()
    }

    async fn post_batch(&self, chunk: &[&str]) -> Result<Vec<Vec<f32>>, AnalysisError> {
        let request = EmbedRequest { inputs: chunk };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Embedding(format!("TEI request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AnalysisError::Embedding(format!(
                "TEI returned status {}",
                response.status()
            )));
        }

        let embeddings: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| AnalysisError::Embedding(format!("TEI response parse error: {e}")))?;

        if embeddings.len() != chunk.len() {
            return Err(AnalysisError::Embedding(format!(
                "TEI returned {} embeddings for {} inputs",
                embeddings.len(),
                chunk.len()
            )));
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for TeiEmbedder {
    /// Texts are batched into groups of [`BATCH_SIZE`] (64) per request.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AnalysisError> {
        let dimension = self.loaded_dimension().await?;
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let embeddings = self.post_batch(chunk).await?;
            if let Some(bad) = embeddings.iter().find(|v| v.len() != dimension) {
                return Err(AnalysisError::DimensionMismatch {
                    expected: dimension,
                    actual: bad.len(),
                });
            }
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn dimension_hint(&self) -> Option<usize> {
        self.dimension.get().copied()
    }
}

/// Deterministic feature-hashing embedder.
///
/// Lower-cased alphanumeric tokens are hashed with SHA-256 into a bucket and a
/// sign; the resulting vector is L2-normalized. Needs no model or network.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    #[must_use]
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = Sha256::digest(token.to_lowercase().as_bytes());
            let bytes: [u8; 8] = [
                hash[0], hash[1], hash[2], hash[3], hash[4], hash[5], hash[6], hash[7],
            ];
            // the remainder is below `dimension`, so it fits back into usize
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (u64::from_be_bytes(bytes) % self.dimension as u64) as usize;
            let sign = if hash[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AnalysisError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension_hint(&self) -> Option<usize> {
        Some(self.dimension)
    }
}
