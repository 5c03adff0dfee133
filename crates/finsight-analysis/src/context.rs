//! Process-wide wiring: one orchestrator, one shared index, built once from
//! configuration and handed to every request handler.

use std::sync::Arc;

use finsight_core::AppConfig;
use sqlx::PgPool;

use crate::documents::ReportReader;
use crate::embeddings::{EmbeddingProvider, HashingEmbedder, TeiEmbedder};
use crate::error::AnalysisError;
use crate::extractor::MetricExtractor;
use crate::llm::{OpenAiChatClient, SynthesisCapability, UnavailableCapability};
use crate::persistence::{
    DocumentArchive, PgDocumentArchive, PgRequestLog, RequestLog, TracingDocumentArchive,
    TracingRequestLog,
};
use crate::pipeline::{ForecastOrchestrator, OrchestratorSettings};
use crate::qualitative::QualitativeSynthesizer;
use crate::vector_store::VectorIndex;

pub struct ForecastContext {
    orchestrator: ForecastOrchestrator,
    pool: Option<PgPool>,
}

impl ForecastContext {
    #[must_use]
    pub fn new(orchestrator: ForecastOrchestrator, pool: Option<PgPool>) -> Self {
        Self { orchestrator, pool }
    }

    /// Wire every collaborator from `config`.
    ///
    /// With a pool, archival and request logging go to Postgres; without one
    /// they are logged through `tracing`. Without an API key the synthesis
    /// capability is [`UnavailableCapability`]; without a TEI URL the
    /// embedder is [`HashingEmbedder`].
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if an HTTP client cannot be built.
    pub fn build(config: &AppConfig, pool: Option<PgPool>) -> Result<Self, AnalysisError> {
        let embedder: Arc<dyn EmbeddingProvider> = match config.tei_url.as_deref() {
            Some(url) => Arc::new(TeiEmbedder::new(url, config.llm_timeout_secs)?),
            None => Arc::new(HashingEmbedder::new(config.hash_embedding_dim)),
        };

        let capability: Arc<dyn SynthesisCapability> = match config.openai_api_key.as_deref() {
            Some(key) => Arc::new(OpenAiChatClient::new(
                key,
                &config.llm_base_url,
                &config.llm_model,
                config.llm_timeout_secs,
            )?),
            None => {
                tracing::warn!("OPENAI_API_KEY not set; forecasts will be degraded");
                Arc::new(UnavailableCapability)
            }
        };

        let (archive, request_log): (Arc<dyn DocumentArchive>, Arc<dyn RequestLog>) =
            match pool.clone() {
                Some(pool) => (
                    Arc::new(PgDocumentArchive::new(pool.clone())),
                    Arc::new(PgRequestLog::new(pool)),
                ),
                None => (Arc::new(TracingDocumentArchive), Arc::new(TracingRequestLog)),
            };

        let extractor = MetricExtractor::new(capability.clone(), archive, Arc::new(ReportReader))
            .with_char_budget(config.extraction_char_budget);
        let synthesizer = QualitativeSynthesizer::new(capability.clone(), config.qualitative_mode)
            .with_max_snippets(config.qualitative_max_snippets);
        let settings = OrchestratorSettings {
            top_k: config.retrieval_top_k,
            context_char_budget: config.context_char_budget,
            extract_concurrency: config.extract_concurrency,
        };

        let orchestrator = ForecastOrchestrator::new(
            extractor,
            Arc::new(VectorIndex::new(embedder)),
            synthesizer,
            capability,
            request_log,
            settings,
        );

        tracing::info!(
            embedder = if config.tei_url.is_some() { "tei" } else { "hashing" },
            qualitative_mode = %config.qualitative_mode,
            persistence = if pool.is_some() { "postgres" } else { "tracing" },
            "forecast context ready"
        );

        Ok(Self::new(orchestrator, pool))
    }

    #[must_use]
    pub fn orchestrator(&self) -> &ForecastOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub fn index(&self) -> &Arc<VectorIndex> {
        self.orchestrator.index()
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }
}
