//! Shared domain types and configuration for finsight.

pub mod app_config;
pub mod config;
pub mod forecast;
pub mod transcripts;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, QualitativeMode};
pub use config::{load_app_config, load_app_config_from_env};
pub use forecast::{
    DocumentMetrics, DocumentRef, ExtractionMethod, ForecastMetadata, ForecastRecord,
    ForecastRequest, MetricSet, QualitativeSynthesis, Sentiment, SynthesisSource, Transcript,
    TranscriptChunk, METRIC_NAMES,
};
pub use transcripts::{default_transcripts, load_transcripts, load_transcripts_or_default};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read transcripts file {path}: {source}")]
    TranscriptsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse transcripts file: {0}")]
    TranscriptsFileParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),
}
