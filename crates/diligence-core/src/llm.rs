//! Language model abstraction and the Google Gemini implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::{AgentConfig, SecretValue};
use crate::DiligenceError;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Text completion used by the ReAct loop.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model(&self) -> &str;

    /// Complete `prompt`, cutting the output at the first of `stop`.
    async fn complete(&self, prompt: &str, stop: &[&str]) -> Result<String, DiligenceError>;
}

pub struct GeminiModel {
    client: reqwest::Client,
    model: String,
    base_url: String,
    api_key: SecretValue,
}

impl GeminiModel {
    pub fn new(client: reqwest::Client, model: impl Into<String>, api_key: SecretValue) -> Self {
        Self {
            client,
            model: model.into(),
            base_url: GEMINI_API_URL.to_string(),
            api_key,
        }
    }

    pub fn from_config(client: reqwest::Client, config: &AgentConfig) -> Result<Self, DiligenceError> {
        let mut model = Self::new(client, config.model.clone(), config.llm_api_key()?);
        if let Some(base_url) = &config.llm_base_url {
            model.base_url = base_url.trim_end_matches('/').to_string();
        }
        Ok(model)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(name = "llm.gemini", skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str, stop: &[&str]) -> Result<String, DiligenceError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "stopSequences": stop },
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| DiligenceError::Llm(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DiligenceError::Llm(format!("HTTP {status}: {text}")));
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|err| DiligenceError::Llm(format!("malformed response: {err}")))?;

        let candidate = payload.candidates.into_iter().next().ok_or_else(|| {
            DiligenceError::Llm(format!(
                "no candidates returned (feedback: {})",
                payload
                    .prompt_feedback
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "none".into())
            ))
        })?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown"),
            chars = text.len(),
            "gemini completion received"
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_configured_base_url() {
        let config = AgentConfig {
            llm_base_url: Some("http://localhost:9999/".into()),
            ..AgentConfig::default()
        };
        let mut model = GeminiModel::new(reqwest::Client::new(), &config.model, SecretValue::new("k"));
        model.base_url = config.llm_base_url.clone().unwrap().trim_end_matches('/').to_string();

        assert_eq!(
            model.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }

    #[test]
    fn decodes_candidate_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Thought: a"},{"text":"\nAction: b"}]},"finishReason":"STOP"}]}"#;
        let payload: GenerateResponse = serde_json::from_str(raw).unwrap();
        let parts: String = payload.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .filter_map(|part| part.text.clone())
            .collect();
        assert_eq!(parts, "Thought: a\nAction: b");
    }
}
