//! Turns retrieved transcript snippets into themes, sentiment and
//! forward-looking statements.

use std::sync::Arc;

use finsight_core::{QualitativeMode, QualitativeSynthesis, Sentiment, SynthesisSource};
use serde_json::{Map, Value};

use crate::json_span::parse_first_object;
use crate::keywords::top_keywords;
use crate::llm::SynthesisCapability;

pub const DEFAULT_MAX_SNIPPETS: usize = 6;

/// Number of keyword themes reported in keyword mode.
pub const KEYWORD_THEME_COUNT: usize = 8;

const MAX_OUTPUT_TOKENS: u32 = 500;

pub struct QualitativeSynthesizer {
    capability: Arc<dyn SynthesisCapability>,
    mode: QualitativeMode,
    max_snippets: usize,
}

impl QualitativeSynthesizer {
    #[must_use]
    pub fn new(capability: Arc<dyn SynthesisCapability>, mode: QualitativeMode) -> Self {
        Self {
            capability,
            mode,
            max_snippets: DEFAULT_MAX_SNIPPETS,
        }
    }

    #[must_use]
    pub fn with_max_snippets(mut self, max_snippets: usize) -> Self {
        self.max_snippets = max_snippets.max(1);
        self
    }

    /// Synthesize `snippets` (order preserved). Never fails.
    ///
    /// - No snippets: the neutral default, with no external call.
    /// - Keyword mode, or no model configured: keyword themes, neutral.
    /// - Model call or parse failure: the degraded sentinel (`unknown`).
    pub async fn synthesize(&self, snippets: &[String]) -> QualitativeSynthesis {
        if snippets.is_empty() {
            return QualitativeSynthesis::neutral_default();
        }

        match self.mode {
            QualitativeMode::Keyword => keyword_synthesis(snippets),
            QualitativeMode::LanguageModel if !self.capability.is_available() => {
                tracing::debug!("no language model configured; using keyword synthesis");
                keyword_synthesis(snippets)
            }
            QualitativeMode::LanguageModel => self.language_model_synthesis(snippets).await,
        }
    }

    async fn language_model_synthesis(&self, snippets: &[String]) -> QualitativeSynthesis {
        let capped = &snippets[..snippets.len().min(self.max_snippets)];
        let prompt = synthesis_prompt(capped);

        match self.capability.complete(&prompt, MAX_OUTPUT_TOKENS).await {
            Ok(response) => {
                if let Some(object) = parse_first_object(&response) {
                    synthesis_from_object(&object)
                } else {
                    tracing::warn!("qualitative synthesis response held no JSON object");
                    QualitativeSynthesis::degraded()
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "qualitative synthesis failed");
                QualitativeSynthesis::degraded()
            }
        }
    }
}

/// Deterministic synthesis: top keywords as themes, neutral sentiment.
#[must_use]
pub fn keyword_synthesis(snippets: &[String]) -> QualitativeSynthesis {
    QualitativeSynthesis {
        themes: top_keywords(snippets, KEYWORD_THEME_COUNT),
        sentiment: Sentiment::Neutral,
        forward_looking: Vec::new(),
        source: SynthesisSource::Keyword,
    }
}

fn synthesis_prompt(snippets: &[String]) -> String {
    format!(
        "You are an analyst. Given these excerpts from earnings call transcripts, list 3 to 5 \
         short recurring themes, the overall management sentiment (positive, cautious, negative \
         or neutral) and any explicit forward-looking statements.\n\
         Return ONLY JSON with keys: themes (list of strings), sentiment (string), \
         forward_looking (list of strings).\n\n\
         Snippets:\n{}\n\nJSON:",
        snippets.join("\n\n")
    )
}

fn synthesis_from_object(object: &Map<String, Value>) -> QualitativeSynthesis {
    let sentiment = match object.get("sentiment") {
        Some(Value::String(s)) => Sentiment::from(s.clone()),
        _ => Sentiment::Unknown,
    };

    QualitativeSynthesis {
        themes: string_list(object.get("themes")),
        sentiment,
        forward_looking: string_list(object.get("forward_looking")),
        source: SynthesisSource::LanguageModel,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(s.trim().to_string()),
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}
