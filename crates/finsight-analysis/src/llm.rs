//! Synthesis capability: a chat-completions client bounded by a per-call
//! timeout, plus a stand-in used when no API key is configured.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::AnalysisError;

/// A language model that turns a prompt into text. Implementations sample at
/// temperature 0.
#[async_trait]
pub trait SynthesisCapability: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AnalysisError::SynthesisUnavailable`] on timeout, transport
    /// failure, non-success status, or a response without message content.
    async fn complete(&self, prompt: &str, max_output_tokens: u32)
        -> Result<String, AnalysisError>;

    /// `false` when no model is configured at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiChatClient {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, AnalysisError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        tracing::info!(base_url, model, timeout_secs, "chat completions client configured");

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    async fn send(&self, prompt: &str, max_output_tokens: u32) -> Result<String, AnalysisError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0,
            "max_tokens": max_output_tokens,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::SynthesisUnavailable(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AnalysisError::SynthesisUnavailable(format!(
                "chat completions returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AnalysisError::SynthesisUnavailable(format!("response parse error: {e}"))
        })?;

        body.get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AnalysisError::SynthesisUnavailable("response had no message content".to_string())
            })
    }
}

#[async_trait]
impl SynthesisCapability for OpenAiChatClient {
    async fn complete(
        &self,
        prompt: &str,
        max_output_tokens: u32,
    ) -> Result<String, AnalysisError> {
        match tokio::time::timeout(self.timeout, self.send(prompt, max_output_tokens)).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::SynthesisUnavailable(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Stand-in used when no language model is configured. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCapability;

#[async_trait]
impl SynthesisCapability for UnavailableCapability {
    async fn complete(
        &self,
        _prompt: &str,
        _max_output_tokens: u32,
    ) -> Result<String, AnalysisError> {
        Err(AnalysisError::SynthesisUnavailable(
            "language model not configured".to_string(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// The first `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}
