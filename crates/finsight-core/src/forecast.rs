//! Domain types flowing through the forecasting pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Names of the metrics the extractor looks for, in reporting order.
pub const METRIC_NAMES: [&str; 3] = ["total_revenue", "net_profit", "operating_margin"];

/// A source document to run metric extraction on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub path: PathBuf,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl DocumentRef {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            url: None,
            title: None,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// File name used when archiving the document's text.
    #[must_use]
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Which tier of the extractor produced a metric set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    Pattern,
    LanguageModel,
    None,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMethod::Pattern => write!(f, "pattern"),
            ExtractionMethod::LanguageModel => write!(f, "language-model"),
            ExtractionMethod::None => write!(f, "none"),
        }
    }
}

/// The three headline metrics; `None` means the metric was not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSet {
    pub total_revenue: Option<String>,
    pub net_profit: Option<String>,
    pub operating_margin: Option<String>,
}

impl MetricSet {
    /// Number of metrics present.
    #[must_use]
    pub fn count(&self) -> usize {
        [
            &self.total_revenue,
            &self.net_profit,
            &self.operating_margin,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Look a metric up by its wire name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "total_revenue" => self.total_revenue.as_deref(),
            "net_profit" => self.net_profit.as_deref(),
            "operating_margin" => self.operating_margin.as_deref(),
            _ => None,
        }
    }

    /// Set a metric by its wire name. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: Option<String>) {
        match name {
            "total_revenue" => self.total_revenue = value,
            "net_profit" => self.net_profit = value,
            "operating_margin" => self.operating_margin = value,
            _ => {}
        }
    }
}

/// Extraction result for one document, as reported in forecast metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetrics {
    pub source: DocumentRef,
    pub metrics: MetricSet,
    pub extraction_method: ExtractionMethod,
}

/// An earnings-call transcript as delivered by sourcing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub title: String,
    pub text: String,
}

/// A unit of text stored in the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptChunk {
    pub id: String,
    pub text: String,
}

/// Management sentiment. Known labels map to variants; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sentiment {
    Positive,
    Cautious,
    Negative,
    Neutral,
    Unknown,
    Other(String),
}

impl From<String> for Sentiment {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "cautious" => Sentiment::Cautious,
            "negative" => Sentiment::Negative,
            "neutral" => Sentiment::Neutral,
            "unknown" | "" => Sentiment::Unknown,
            _ => Sentiment::Other(value.trim().to_string()),
        }
    }
}

impl From<Sentiment> for String {
    fn from(value: Sentiment) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Cautious => write!(f, "cautious"),
            Sentiment::Negative => write!(f, "negative"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Unknown => write!(f, "unknown"),
            Sentiment::Other(s) => write!(f, "{s}"),
        }
    }
}

/// How a qualitative synthesis was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesisSource {
    /// No snippets; nothing was asked.
    Skipped,
    LanguageModel,
    /// The language model failed or answered with something unparseable.
    Degraded,
    Keyword,
}

/// Themes, sentiment and forward-looking statements drawn from transcript snippets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitativeSynthesis {
    pub themes: Vec<String>,
    pub sentiment: Sentiment,
    pub forward_looking: Vec<String>,
    pub source: SynthesisSource,
}

impl QualitativeSynthesis {
    /// The fixed result for an empty snippet set.
    #[must_use]
    pub fn neutral_default() -> Self {
        Self {
            themes: Vec::new(),
            sentiment: Sentiment::Neutral,
            forward_looking: Vec::new(),
            source: SynthesisSource::Skipped,
        }
    }

    /// The sentinel returned when the language model cannot be used.
    #[must_use]
    pub fn degraded() -> Self {
        Self {
            themes: Vec::new(),
            sentiment: Sentiment::Unknown,
            forward_looking: Vec::new(),
            source: SynthesisSource::Degraded,
        }
    }
}

/// Extra detail attached to every forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetadata {
    pub extracted_metrics: Vec<DocumentMetrics>,
    pub qualitative: QualitativeSynthesis,
    pub retrieved_snippets: usize,
    pub generated_at: DateTime<Utc>,
}

/// The final output of one forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub request_id: Uuid,
    pub financial_trends: Value,
    pub management_outlook: Value,
    pub risks: Vec<Value>,
    pub opportunities: Vec<Value>,
    pub forecast_summary: String,
    pub metadata: ForecastMetadata,
}

fn default_quarters() -> u32 {
    3
}

/// Body of the public forecast endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub query: String,
    #[serde(default = "default_quarters")]
    pub quarters: u32,
    #[serde(default)]
    pub include_market_data: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_set_counts_present_values() {
        let mut metrics = MetricSet::default();
        assert!(metrics.is_empty());
        metrics.set("total_revenue", Some("64,259 crore".to_string()));
        metrics.set("operating_margin", Some("24.5%".to_string()));
        metrics.set("unknown_metric", Some("1".to_string()));
        assert_eq!(metrics.count(), 2);
        assert_eq!(metrics.get("total_revenue"), Some("64,259 crore"));
        assert_eq!(metrics.get("net_profit"), None);
    }

    #[test]
    fn metric_set_serializes_missing_values_as_null() {
        let metrics = MetricSet {
            total_revenue: Some("500 cr".to_string()),
            ..MetricSet::default()
        };
        let json = serde_json::to_value(&metrics).expect("serialize");
        assert_eq!(json["total_revenue"], "500 cr");
        assert!(json["net_profit"].is_null());
        assert!(json["operating_margin"].is_null());
    }

    #[test]
    fn extraction_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&ExtractionMethod::LanguageModel).unwrap(),
            "\"language-model\""
        );
        assert_eq!(serde_json::to_string(&ExtractionMethod::Pattern).unwrap(), "\"pattern\"");
        assert_eq!(serde_json::to_string(&ExtractionMethod::None).unwrap(), "\"none\"");
    }

    #[test]
    fn sentiment_maps_known_labels_case_insensitively() {
        assert_eq!(Sentiment::from("Cautious".to_string()), Sentiment::Cautious);
        assert_eq!(Sentiment::from(" positive ".to_string()), Sentiment::Positive);
        assert_eq!(Sentiment::from(String::new()), Sentiment::Unknown);
    }

    #[test]
    fn sentiment_keeps_free_text() {
        let s = Sentiment::from("Cautiously optimistic about demand".to_string());
        assert_eq!(
            s,
            Sentiment::Other("Cautiously optimistic about demand".to_string())
        );
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "\"Cautiously optimistic about demand\"");
    }

    #[test]
    fn neutral_default_serializes_expected_shape() {
        let json = serde_json::to_value(QualitativeSynthesis::neutral_default()).unwrap();
        assert_eq!(json["sentiment"], "neutral");
        assert_eq!(json["themes"], serde_json::json!([]));
        assert_eq!(json["forward_looking"], serde_json::json!([]));
        assert_eq!(json["source"], "skipped");
    }

    #[test]
    fn forecast_request_applies_defaults() {
        let req: ForecastRequest =
            serde_json::from_str(r#"{"query":"next quarter outlook"}"#).unwrap();
        assert_eq!(req.quarters, 3);
        assert!(!req.include_market_data);
    }

    #[test]
    fn document_ref_filename_uses_last_component() {
        let doc = DocumentRef::new("data/q3-results.pdf").with_url("https://example.com/q3.pdf");
        assert_eq!(doc.filename(), "q3-results.pdf");
        assert_eq!(doc.url.as_deref(), Some("https://example.com/q3.pdf"));
    }
}
