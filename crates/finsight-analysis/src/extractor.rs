//! Two-tier metric extraction: label patterns first, language model second.
//!
//! The pattern tier is trusted only when it finds at least
//! [`MIN_PATTERN_HITS`] of the three metrics. Otherwise the pattern hits are
//! discarded and a prefix of the document is sent to the synthesis capability.
//! Any failure in that second tier ends as [`ExtractionOutcome::Empty`].

use std::sync::{Arc, LazyLock};

use finsight_core::{DocumentMetrics, DocumentRef, ExtractionMethod, MetricSet, METRIC_NAMES};
use regex::Regex;
use serde_json::{Map, Value};

use crate::documents::{without_nul, DocumentReader};
use crate::error::AnalysisError;
use crate::json_span::parse_first_object;
use crate::llm::{truncate_chars, SynthesisCapability};
use crate::persistence::{discard_failure, DocumentArchive};
use crate::sources::file_name_for_url;

/// Pattern hits needed before the language model is skipped.
pub const MIN_PATTERN_HITS: usize = 2;

pub const DEFAULT_EXTRACTION_CHAR_BUDGET: usize = 15_000;

const MAX_OUTPUT_TOKENS: u32 = 600;

/// Source kind recorded for archived report text.
const ARCHIVE_SOURCE_KIND: &str = "pdf";

static TOTAL_REVENUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:total\s+revenue|net\s+revenue|revenue)[^\d\n\r]{0,40}(\d[\d,.]*(?:[ \t]*(?:(?:crore|cr|rs|inr)\b|₹))?)",
    )
    .expect("valid revenue regex")
});

static NET_PROFIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:net\s+profit|profit\s+after\s+tax|pat)\b[^\d\n\r]{0,40}(\d[\d,.]*(?:[ \t]*(?:(?:crore|cr|rs|inr)\b|₹))?)",
    )
    .expect("valid profit regex")
});

static OPERATING_MARGIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:operating\s+margin|op\.?\s*margin|ebitda\s+margin)[^\d\n\r]{0,40}(\d[\d.]*\s?%)",
    )
    .expect("valid margin regex")
});

/// Result of one extraction, tagged by the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Pattern(MetricSet),
    LanguageModel(MetricSet),
    /// Neither tier found anything.
    Empty,
}

impl ExtractionOutcome {
    #[must_use]
    pub fn method(&self) -> ExtractionMethod {
        match self {
            ExtractionOutcome::Pattern(_) => ExtractionMethod::Pattern,
            ExtractionOutcome::LanguageModel(_) => ExtractionMethod::LanguageModel,
            ExtractionOutcome::Empty => ExtractionMethod::None,
        }
    }

    #[must_use]
    pub fn into_metrics(self) -> MetricSet {
        match self {
            ExtractionOutcome::Pattern(m) | ExtractionOutcome::LanguageModel(m) => m,
            ExtractionOutcome::Empty => MetricSet::default(),
        }
    }
}

/// Run every label pattern independently; first match per label wins.
#[must_use]
pub fn pattern_metrics(text: &str) -> MetricSet {
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| clean_value(m.as_str()))
            .filter(|v| !v.is_empty())
    };

    MetricSet {
        total_revenue: capture(&TOTAL_REVENUE_RE),
        net_profit: capture(&NET_PROFIT_RE),
        operating_margin: capture(&OPERATING_MARGIN_RE),
    }
}

/// Whether pattern hits are enough to skip the language model.
#[must_use]
pub fn pattern_is_decisive(hits: &MetricSet) -> bool {
    hits.count() >= MIN_PATTERN_HITS
}

/// Read the three metrics out of a parsed model response. Numbers are kept as
/// their JSON text; nulls, blanks and other shapes count as missing.
#[must_use]
pub fn metrics_from_object(object: &Map<String, Value>) -> MetricSet {
    let mut metrics = MetricSet::default();
    for name in METRIC_NAMES {
        let value = match object.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        metrics.set(name, value);
    }
    metrics
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| c == ',' || c == '.')
        .trim()
        .to_string()
}

fn extraction_prompt(text: &str) -> String {
    format!(
        "You are a financial data extractor.\n\
         From the quarterly report text below, extract:\n\
         - Total Revenue\n\
         - Net Profit (PAT)\n\
         - Operating Margin\n\n\
         Return ONLY valid JSON with keys:\n\
         total_revenue, net_profit, operating_margin.\n\
         Use null for missing values.\n\n\
         TEXT:\n{text}\n\nJSON:"
    )
}

fn filename_from_url(url: Option<&str>) -> String {
    url.map_or_else(|| "document".to_string(), file_name_for_url)
}

pub struct MetricExtractor {
    capability: Arc<dyn SynthesisCapability>,
    archive: Arc<dyn DocumentArchive>,
    reader: Arc<dyn DocumentReader>,
    char_budget: usize,
}

impl MetricExtractor {
    #[must_use]
    pub fn new(
        capability: Arc<dyn SynthesisCapability>,
        archive: Arc<dyn DocumentArchive>,
        reader: Arc<dyn DocumentReader>,
    ) -> Self {
        Self {
            capability,
            archive,
            reader,
            char_budget: DEFAULT_EXTRACTION_CHAR_BUDGET,
        }
    }

    /// Characters of document text sent to the language model.
    #[must_use]
    pub fn with_char_budget(mut self, char_budget: usize) -> Self {
        self.char_budget = char_budget;
        self
    }

    /// Archive `text` and extract metrics from it. Never fails; failures of
    /// the second tier surface as [`ExtractionOutcome::Empty`].
    pub async fn extract(&self, text: &str, source_url: Option<&str>) -> ExtractionOutcome {
        self.archive_text(&filename_from_url(source_url), source_url, text)
            .await;
        self.run_tiers(text).await
    }

    /// Read one document from disk, archive its text, and extract metrics.
    ///
    /// A read failure yields the `none` method without consulting the model.
    pub async fn extract_document(&self, document: &DocumentRef) -> DocumentMetrics {
        let text = match self.reader.read_text(&document.path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    path = %document.path.display(),
                    error = %e,
                    "document read failed; no metrics extracted"
                );
                return DocumentMetrics {
                    source: document.clone(),
                    metrics: MetricSet::default(),
                    extraction_method: ExtractionMethod::None,
                };
            }
        };

        self.archive_text(&document.filename(), document.url.as_deref(), &text)
            .await;
        let outcome = self.run_tiers(&text).await;

        tracing::debug!(
            path = %document.path.display(),
            method = %outcome.method(),
            "metrics extracted"
        );

        DocumentMetrics {
            source: document.clone(),
            extraction_method: outcome.method(),
            metrics: outcome.into_metrics(),
        }
    }

    async fn archive_text(&self, filename: &str, source_url: Option<&str>, text: &str) {
        let text = without_nul(text);
        discard_failure(
            "document archive",
            self.archive
                .save(ARCHIVE_SOURCE_KIND, source_url, filename, &text)
                .await,
        );
    }

    async fn run_tiers(&self, text: &str) -> ExtractionOutcome {
        let hits = pattern_metrics(text);
        if pattern_is_decisive(&hits) {
            return ExtractionOutcome::Pattern(hits);
        }

        match self.language_model_metrics(text).await {
            Ok(metrics) if !metrics.is_empty() => ExtractionOutcome::LanguageModel(metrics),
            Ok(_) => ExtractionOutcome::Empty,
            Err(e) => {
                tracing::warn!(error = %e, "language-model metric extraction failed");
                ExtractionOutcome::Empty
            }
        }
    }

    async fn language_model_metrics(&self, text: &str) -> Result<MetricSet, AnalysisError> {
        if !self.capability.is_available() {
            tracing::debug!("no language model configured; skipping extraction fallback");
            return Ok(MetricSet::default());
        }

        let prompt = extraction_prompt(truncate_chars(text, self.char_budget));
        let response = self.capability.complete(&prompt, MAX_OUTPUT_TOKENS).await?;
        let object = parse_first_object(&response).ok_or_else(|| {
            AnalysisError::SynthesisUnavailable("response held no JSON object".to_string())
        })?;
        Ok(metrics_from_object(&object))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::documents::PlainTextReader;
    use crate::persistence::TracingDocumentArchive;

    struct StubCapability {
        response: Result<String, String>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl StubCapability {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(reason.to_string()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SynthesisCapability for StubCapability {
        async fn complete(&self, prompt: &str, _max: u32) -> Result<String, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.response
                .clone()
                .map_err(AnalysisError::SynthesisUnavailable)
        }
    }

    #[derive(Default)]
    struct RecordingArchive {
        saved: Mutex<Vec<(String, Option<String>, String)>>,
        contents: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentArchive for RecordingArchive {
        async fn save(
            &self,
            source_kind: &str,
            source_url: Option<&str>,
            filename: &str,
            content: &str,
        ) -> Result<(), AnalysisError> {
            self.contents.lock().unwrap().push(content.to_string());
            self.saved.lock().unwrap().push((
                source_kind.to_string(),
                source_url.map(str::to_string),
                filename.to_string(),
            ));
            Ok(())
        }
    }

    struct FailingArchive;

    #[async_trait]
    impl DocumentArchive for FailingArchive {
        async fn save(
            &self,
            _source_kind: &str,
            _source_url: Option<&str>,
            _filename: &str,
            _content: &str,
        ) -> Result<(), AnalysisError> {
            Err(AnalysisError::PersistenceFailure("connection refused".to_string()))
        }
    }

    fn extractor(capability: Arc<dyn SynthesisCapability>) -> MetricExtractor {
        MetricExtractor::new(
            capability,
            Arc::new(TracingDocumentArchive),
            Arc::new(PlainTextReader),
        )
    }

    const TWO_LABELS: &str = "Total revenue for the quarter was 64,259 crore. \
                              Net profit stood at 12,040 cr.";
    const NO_LABELS: &str = "The board met on a sunny day and discussed the weather.";

    #[test]
    fn patterns_find_each_label_independently() {
        let text = "Revenue: ₹ 1,000.5 cr\nPAT of 200 crore\nEBITDA margin at 24.5 %";
        let hits = pattern_metrics(text);
        assert_eq!(hits.total_revenue.as_deref(), Some("1,000.5 cr"));
        assert_eq!(hits.net_profit.as_deref(), Some("200 crore"));
        assert_eq!(hits.operating_margin.as_deref(), Some("24.5 %"));
    }

    #[test]
    fn currency_suffix_needs_a_word_boundary() {
        let hits = pattern_metrics("Revenue 100 credit facility was renewed");
        assert_eq!(hits.total_revenue.as_deref(), Some("100"));
        let hits = pattern_metrics("PAT 250 crores");
        assert_eq!(hits.net_profit.as_deref(), Some("250"));
        let hits = pattern_metrics("Net revenue 75 Rs. in lakh");
        assert_eq!(hits.total_revenue.as_deref(), Some("75 Rs"));
    }

    #[test]
    fn pat_label_requires_word_boundary() {
        let hits = pattern_metrics("patient inflow rose 40 percent");
        assert!(hits.net_profit.is_none());
    }

    #[test]
    fn label_window_is_bounded() {
        let far = format!("revenue{}100 cr", " x".repeat(30));
        assert!(pattern_metrics(&far).total_revenue.is_none());
    }

    #[test]
    fn decision_rule_needs_two_hits() {
        let mut hits = MetricSet::default();
        hits.set("net_profit", Some("1".to_string()));
        assert!(!pattern_is_decisive(&hits));
        hits.set("operating_margin", Some("2%".to_string()));
        assert!(pattern_is_decisive(&hits));
    }

    #[test]
    fn model_object_numbers_become_strings() {
        let object = parse_first_object(
            r#"{"total_revenue": 500, "net_profit": " ", "operating_margin": null}"#,
        )
        .expect("object");
        let metrics = metrics_from_object(&object);
        assert_eq!(metrics.total_revenue.as_deref(), Some("500"));
        assert!(metrics.net_profit.is_none());
        assert!(metrics.operating_margin.is_none());
    }

    #[tokio::test]
    async fn two_pattern_hits_skip_the_model() {
        let capability = StubCapability::replying("{}");
        let outcome = extractor(capability.clone()).extract(TWO_LABELS, None).await;

        assert_eq!(outcome.method(), ExtractionMethod::Pattern);
        let metrics = outcome.into_metrics();
        assert_eq!(metrics.total_revenue.as_deref(), Some("64,259 crore"));
        assert_eq!(metrics.net_profit.as_deref(), Some("12,040 cr"));
        assert!(metrics.operating_margin.is_none());
        assert_eq!(capability.calls(), 0);
    }

    #[tokio::test]
    async fn model_fallback_result_is_used() {
        let capability = StubCapability::replying(
            "Here you go: {\"total_revenue\": \"500 cr\", \"net_profit\": null, \"operating_margin\": \"25%\"}",
        );
        let outcome = extractor(capability.clone()).extract(NO_LABELS, None).await;

        assert_eq!(outcome.method(), ExtractionMethod::LanguageModel);
        let metrics = outcome.into_metrics();
        assert_eq!(metrics.total_revenue.as_deref(), Some("500 cr"));
        assert!(metrics.net_profit.is_none());
        assert_eq!(metrics.operating_margin.as_deref(), Some("25%"));
        assert_eq!(capability.calls(), 1);
    }

    #[tokio::test]
    async fn single_pattern_hit_is_discarded_when_model_is_empty() {
        let capability = StubCapability::replying(
            r#"{"total_revenue": null, "net_profit": null, "operating_margin": null}"#,
        );
        let outcome = extractor(capability.clone())
            .extract("Net profit rose to 900 cr", None)
            .await;

        assert_eq!(outcome, ExtractionOutcome::Empty);
        assert_eq!(capability.calls(), 1);
    }

    #[tokio::test]
    async fn model_failure_yields_empty() {
        let capability = StubCapability::failing("connection reset");
        let outcome = extractor(capability).extract(NO_LABELS, None).await;
        assert_eq!(outcome.method(), ExtractionMethod::None);
        assert!(outcome.into_metrics().is_empty());
    }

    #[tokio::test]
    async fn non_json_model_reply_yields_empty() {
        let capability = StubCapability::replying("I could not find any figures.");
        let outcome = extractor(capability).extract(NO_LABELS, None).await;
        assert_eq!(outcome, ExtractionOutcome::Empty);
    }

    #[tokio::test]
    async fn prompt_is_truncated_to_budget() {
        let capability = StubCapability::replying("{}");
        let text = "x".repeat(50);
        extractor(capability.clone())
            .with_char_budget(10)
            .extract(&text, None)
            .await;

        let prompts = capability.prompts.lock().unwrap();
        assert!(prompts[0].contains(&format!("TEXT:\n{}\n\nJSON:", "x".repeat(10))));
    }

    #[tokio::test]
    async fn archive_failure_does_not_abort_extraction() {
        let extractor = MetricExtractor::new(
            StubCapability::replying("{}"),
            Arc::new(FailingArchive),
            Arc::new(PlainTextReader),
        );
        let outcome = extractor.extract(TWO_LABELS, Some("https://x.test/q1.pdf")).await;
        assert_eq!(outcome.method(), ExtractionMethod::Pattern);
    }

    #[tokio::test]
    async fn extract_archives_with_url_when_known() {
        let archive = Arc::new(RecordingArchive::default());
        let extractor = MetricExtractor::new(
            StubCapability::replying("{}"),
            archive.clone(),
            Arc::new(PlainTextReader),
        );

        extractor
            .extract(TWO_LABELS, Some("https://x.test/files/q1.pdf?dl=1"))
            .await;
        extractor.extract(TWO_LABELS, None).await;

        let saved = archive.saved.lock().unwrap();
        assert_eq!(
            saved[0],
            (
                "pdf".to_string(),
                Some("https://x.test/files/q1.pdf?dl=1".to_string()),
                "q1.pdf".to_string()
            )
        );
        assert_eq!(saved[1], ("pdf".to_string(), None, "document".to_string()));
    }

    #[tokio::test]
    async fn unreadable_document_skips_model_and_archive() {
        let capability = StubCapability::replying("{\"total_revenue\": \"1\"}");
        let archive = Arc::new(RecordingArchive::default());
        let extractor =
            MetricExtractor::new(capability.clone(), archive.clone(), Arc::new(PlainTextReader));

        let result = extractor
            .extract_document(&DocumentRef::new("/no/such/finsight/q9.pdf"))
            .await;

        assert_eq!(result.extraction_method, ExtractionMethod::None);
        assert!(result.metrics.is_empty());
        assert_eq!(capability.calls(), 0);
        assert!(archive.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extract_document_reads_and_tags_source() {
        let path = std::env::temp_dir().join(format!("finsight-q1-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, TWO_LABELS).await.expect("fixture");

        let archive = Arc::new(RecordingArchive::default());
        let extractor = MetricExtractor::new(
            StubCapability::replying("{}"),
            archive.clone(),
            Arc::new(PlainTextReader),
        );
        let document = DocumentRef::new(&path).with_url("https://x.test/q1.pdf");
        let result = extractor.extract_document(&document).await;

        assert_eq!(result.source, document);
        assert_eq!(result.extraction_method, ExtractionMethod::Pattern);
        assert_eq!(result.metrics.count(), 2);
        assert_eq!(
            archive.saved.lock().unwrap()[0].1.as_deref(),
            Some("https://x.test/q1.pdf")
        );

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn archived_text_has_no_nul_characters() {
        let archive = Arc::new(RecordingArchive::default());
        let extractor = MetricExtractor::new(
            StubCapability::replying("{}"),
            archive.clone(),
            Arc::new(PlainTextReader),
        );

        let outcome = extractor
            .extract("Total revenue 500 cr\0\nNet profit\0 90 cr", None)
            .await;

        assert_eq!(outcome.method(), ExtractionMethod::Pattern);
        let contents = archive.contents.lock().unwrap();
        assert_eq!(contents[0], "Total revenue 500 cr\nNet profit 90 cr");
    }

    #[tokio::test]
    async fn malformed_pdf_yields_no_metrics() {
        let path = std::env::temp_dir().join(format!("finsight-q3-{}.pdf", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"%PDF-1.4\ntruncated").await.expect("fixture");

        let capability = StubCapability::replying("{\"total_revenue\": \"1\"}");
        let archive = Arc::new(RecordingArchive::default());
        let extractor = MetricExtractor::new(
            capability.clone(),
            archive.clone(),
            Arc::new(crate::documents::ReportReader),
        );
        let result = extractor.extract_document(&DocumentRef::new(&path)).await;

        assert_eq!(result.extraction_method, ExtractionMethod::None);
        assert!(result.metrics.is_empty());
        assert_eq!(capability.calls(), 0);
        assert!(archive.saved.lock().unwrap().is_empty());

        tokio::fs::remove_file(&path).await.ok();
    }
}
