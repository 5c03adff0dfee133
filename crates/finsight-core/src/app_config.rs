use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How the qualitative synthesizer turns snippets into themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualitativeMode {
    /// Ask the synthesis capability, degrading to a sentinel on failure.
    LanguageModel,
    /// Deterministic keyword extraction; never calls out.
    Keyword,
}

impl std::fmt::Display for QualitativeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualitativeMode::LanguageModel => write!(f, "language-model"),
            QualitativeMode::Keyword => write!(f, "keyword"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub openai_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub tei_url: Option<String>,
    pub hash_embedding_dim: usize,
    pub retrieval_top_k: usize,
    pub extraction_char_budget: usize,
    pub context_char_budget: usize,
    pub qualitative_max_snippets: usize,
    pub qualitative_mode: QualitativeMode,
    pub extract_concurrency: usize,
    pub documents_dir: PathBuf,
    pub screener_url: Option<String>,
    pub transcripts_path: PathBuf,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("tei_url", &self.tei_url)
            .field("hash_embedding_dim", &self.hash_embedding_dim)
            .field("retrieval_top_k", &self.retrieval_top_k)
            .field("extraction_char_budget", &self.extraction_char_budget)
            .field("context_char_budget", &self.context_char_budget)
            .field("qualitative_max_snippets", &self.qualitative_max_snippets)
            .field("qualitative_mode", &self.qualitative_mode)
            .field("extract_concurrency", &self.extract_concurrency)
            .field("documents_dir", &self.documents_dir)
            .field("screener_url", &self.screener_url)
            .field("transcripts_path", &self.transcripts_path)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .finish()
    }
}
