//! Forecast orchestration.

use std::sync::Arc;

use chrono::Utc;
use finsight_core::{
    DocumentMetrics, DocumentRef, ForecastMetadata, ForecastRecord, QualitativeSynthesis,
    Transcript, TranscriptChunk,
};
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::extractor::MetricExtractor;
use crate::json_span::parse_first_object;
use crate::llm::{truncate_chars, SynthesisCapability};
use crate::persistence::{discard_failure, RequestLog};
use crate::qualitative::QualitativeSynthesizer;
use crate::vector_store::VectorIndex;

pub const NOT_CONFIGURED_SUMMARY: &str =
    "Language model not configured; forecast synthesis unavailable.";

const MAX_OUTPUT_TOKENS: u32 = 900;

const FORECAST_PROMPT: &str = "You are a senior financial analyst. Use the numeric metrics and \
qualitative analysis to produce a structured financial forecast.

Return ONLY valid JSON with keys:
- financial_trends: object of short observations with simple numbers (growth, QoQ, YoY)
- management_outlook: object summarising management tone
- risks: list of the top risks
- opportunities: list of the top opportunities
- forecast_summary: 2-3 sentence forecast for the next quarter";

/// Tunables for one orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Snippets retrieved per query. Must be at least 1.
    pub top_k: usize,
    /// Characters of serialized context sent to the model.
    pub context_char_budget: usize,
    /// Documents extracted concurrently.
    pub extract_concurrency: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_char_budget: 12_000,
            extract_concurrency: 4,
        }
    }
}

/// The five model-produced fields of a forecast record.
#[derive(Debug, Clone, PartialEq)]
struct ForecastFields {
    financial_trends: Value,
    management_outlook: Value,
    risks: Vec<Value>,
    opportunities: Vec<Value>,
    forecast_summary: String,
}

impl ForecastFields {
    fn degraded(summary: String) -> Self {
        Self {
            financial_trends: json!({}),
            management_outlook: json!({}),
            risks: Vec::new(),
            opportunities: Vec::new(),
            forecast_summary: summary,
        }
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let container = |key: &str| match object.get(key) {
            None | Some(Value::Null) => json!({}),
            Some(v) => v.clone(),
        };
        let list = |key: &str| match object.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        };
        let forecast_summary = match object.get("forecast_summary") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Self {
            financial_trends: container("financial_trends"),
            management_outlook: container("management_outlook"),
            risks: list("risks"),
            opportunities: list("opportunities"),
            forecast_summary,
        }
    }
}

/// Sequences extraction, retrieval and synthesis into one forecast record.
pub struct ForecastOrchestrator {
    extractor: MetricExtractor,
    index: Arc<VectorIndex>,
    synthesizer: QualitativeSynthesizer,
    capability: Arc<dyn SynthesisCapability>,
    request_log: Arc<dyn RequestLog>,
    settings: OrchestratorSettings,
}

impl ForecastOrchestrator {
    #[must_use]
    pub fn new(
        extractor: MetricExtractor,
        index: Arc<VectorIndex>,
        synthesizer: QualitativeSynthesizer,
        capability: Arc<dyn SynthesisCapability>,
        request_log: Arc<dyn RequestLog>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            extractor,
            index,
            synthesizer,
            capability,
            request_log,
            settings,
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    #[must_use]
    pub fn extractor(&self) -> &MetricExtractor {
        &self.extractor
    }

    #[must_use]
    pub fn settings(&self) -> OrchestratorSettings {
        self.settings
    }

    /// Produce a forecast for `query` from `documents` and `transcripts`.
    ///
    /// 1. Extract metrics from every document (bounded concurrency, input order).
    /// 2. Add the transcripts to the shared index.
    /// 3. Retrieve the top-k snippets for `query`.
    /// 4. Synthesize themes and sentiment from the snippets.
    /// 5. Ask the model for the five forecast fields, degrading on failure.
    /// 6. Log the record (best effort) and return it.
    ///
    /// Embedding failures during steps 2 and 3 leave the forecast without
    /// snippets; model and persistence failures degrade their own stage.
    ///
    /// # Errors
    ///
    /// Only [`AnalysisError::DimensionMismatch`] and
    /// [`AnalysisError::InvalidTopK`] are returned.
    pub async fn generate(
        &self,
        query: &str,
        documents: &[DocumentRef],
        transcripts: &[Transcript],
    ) -> Result<ForecastRecord, AnalysisError> {
        let request_id = Uuid::new_v4();
        tracing::info!(
            request_id = %request_id,
            documents = documents.len(),
            transcripts = transcripts.len(),
            "forecast started"
        );

        let extractions: Vec<_> = documents
            .iter()
            .map(|document| self.extractor.extract_document(document))
            .collect();
        let extracted_metrics: Vec<DocumentMetrics> = stream::iter(extractions)
            .buffered(self.settings.extract_concurrency.max(1))
            .collect()
            .await;

        self.ingest(request_id, transcripts).await?;
        let snippets = self.retrieve(request_id, query).await?;

        let qualitative = self.synthesizer.synthesize(&snippets).await;

        let context = build_context(
            query,
            &extracted_metrics,
            &qualitative,
            documents.len(),
            transcripts.len(),
        );
        let fields = self
            .synthesize_forecast(
                request_id,
                truncate_chars(&context, self.settings.context_char_budget),
            )
            .await;

        let record = ForecastRecord {
            request_id,
            financial_trends: fields.financial_trends,
            management_outlook: fields.management_outlook,
            risks: fields.risks,
            opportunities: fields.opportunities,
            forecast_summary: fields.forecast_summary,
            metadata: ForecastMetadata {
                extracted_metrics,
                qualitative,
                retrieved_snippets: snippets.len(),
                generated_at: Utc::now(),
            },
        };

        match serde_json::to_string(&record) {
            Ok(payload) => discard_failure(
                "request log",
                self.request_log.log(request_id, query, &payload).await,
            ),
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "forecast record serialization failed");
            }
        }

        tracing::info!(request_id = %request_id, snippets = snippets.len(), "forecast finished");
        Ok(record)
    }

    async fn ingest(&self, request_id: Uuid, transcripts: &[Transcript]) -> Result<(), AnalysisError> {
        let chunks: Vec<TranscriptChunk> = transcripts
            .iter()
            .enumerate()
            .map(|(position, transcript)| TranscriptChunk {
                id: format!("{request_id}:{position}:{}", transcript.title),
                text: transcript.text.clone(),
            })
            .collect();

        match self.index.add(&chunks).await {
            Ok(added) => {
                tracing::debug!(request_id = %request_id, added, "transcripts indexed");
                Ok(())
            }
            Err(e) if e.is_hard_failure() => Err(e),
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "transcript ingestion failed");
                Ok(())
            }
        }
    }

    async fn retrieve(&self, request_id: Uuid, query: &str) -> Result<Vec<String>, AnalysisError> {
        match self.index.query(query, self.settings.top_k).await {
            Ok(snippets) => Ok(snippets),
            Err(e) if e.is_hard_failure() => Err(e),
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "snippet retrieval failed");
                Ok(Vec::new())
            }
        }
    }

    async fn synthesize_forecast(&self, request_id: Uuid, context: &str) -> ForecastFields {
        if !self.capability.is_available() {
            return ForecastFields::degraded(NOT_CONFIGURED_SUMMARY.to_string());
        }

        let prompt = format!(
            "{FORECAST_PROMPT}\n\nContext:\n{context}\n\nReturn ONLY a JSON object."
        );

        match self.capability.complete(&prompt, MAX_OUTPUT_TOKENS).await {
            Ok(response) => {
                if let Some(object) = parse_first_object(&response) {
                    ForecastFields::from_object(&object)
                } else {
                    tracing::warn!(request_id = %request_id, "forecast response held no JSON object");
                    ForecastFields::degraded(failure_summary("response contained no JSON object"))
                }
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "forecast synthesis failed");
                let reason = match e {
                    AnalysisError::SynthesisUnavailable(reason) => reason,
                    other => other.to_string(),
                };
                ForecastFields::degraded(failure_summary(&reason))
            }
        }
    }
}

fn failure_summary(reason: &str) -> String {
    format!("Forecast synthesis failed: {}.", reason.trim_end_matches('.'))
}

/// Pretty-printed JSON context handed to the forecast prompt.
fn build_context(
    query: &str,
    extracted_metrics: &[DocumentMetrics],
    qualitative: &QualitativeSynthesis,
    num_docs: usize,
    num_transcripts: usize,
) -> String {
    let context = json!({
        "query": query,
        "metrics": extracted_metrics,
        "qualitative": qualitative,
        "num_docs": num_docs,
        "num_transcripts": num_transcripts,
    });
    serde_json::to_string_pretty(&context).unwrap_or_else(|_| context.to_string())
}
