//! Retrieval-augmented forecasting pipeline for finsight.
//!
//! Extracts headline metrics from quarterly reports, indexes earnings-call
//! transcripts for similarity retrieval, condenses the retrieved snippets into
//! themes and sentiment, and asks a language model for a structured forecast.
//! Every external capability sits behind a trait so each stage can degrade to a
//! well-formed result when its collaborator is missing or failing.

pub mod context;
pub mod documents;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod json_span;
pub mod keywords;
pub mod llm;
pub mod persistence;
pub mod pipeline;
pub mod qualitative;
pub mod sources;
pub mod vector_store;

pub use context::ForecastContext;
pub use documents::{without_nul, DocumentReader, PdfTextReader, PlainTextReader, ReportReader};
pub use embeddings::{EmbeddingProvider, HashingEmbedder, TeiEmbedder};
pub use error::AnalysisError;
pub use extractor::{ExtractionOutcome, MetricExtractor};
pub use json_span::{first_balanced_object, parse_first_object};
pub use llm::{OpenAiChatClient, SynthesisCapability, UnavailableCapability};
pub use persistence::{
    DocumentArchive, PgDocumentArchive, PgRequestLog, RequestLog, TracingDocumentArchive,
    TracingRequestLog,
};
pub use pipeline::{ForecastOrchestrator, OrchestratorSettings};
pub use qualitative::QualitativeSynthesizer;
pub use sources::{DocumentLink, SourcingClient};
pub use vector_store::{SearchHit, VectorIndex};
