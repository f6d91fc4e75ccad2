//! Tools the agent may call, plus the Tavily web search client.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::{AgentConfig, SecretValue};
use crate::DiligenceError;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn invoke(&self, input: &str) -> Result<String, DiligenceError>;
}

/// Named set of tools offered to the model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|tool| tool.name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    /// `name: description` lines for the prompt.
    pub fn render_descriptions(&self) -> String {
        self.tools
            .iter()
            .map(|tool| format!("{}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct TavilySearch {
    client: reqwest::Client,
    api_key: SecretValue,
    endpoint: String,
    max_results: u8,
}

impl TavilySearch {
    pub fn new(client: reqwest::Client, api_key: SecretValue, max_results: u8) -> Self {
        Self {
            client,
            api_key,
            endpoint: TAVILY_API_URL.to_string(),
            max_results,
        }
    }

    pub fn from_config(client: reqwest::Client, config: &AgentConfig) -> Result<Self, DiligenceError> {
        Ok(Self::new(
            client,
            config.search_api_key()?,
            config.search_max_results,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted results. \
Useful for finding technical documentation, repositories, engineering blogs and news. \
Input should be a search query."
    }

    #[instrument(name = "tool.tavily", skip(self))]
    async fn invoke(&self, input: &str) -> Result<String, DiligenceError> {
        let body = json!({
            "query": input,
            "max_results": self.max_results,
            "search_depth": "basic",
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| DiligenceError::tool(self.name(), err))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DiligenceError::tool(
                self.name(),
                format!("HTTP {status}: {text}"),
            ));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|err| DiligenceError::tool(self.name(), err))?;

        debug!(hits = payload.results.len(), "search results received");
        Ok(format_results(&payload))
    }
}

fn format_results(payload: &SearchResponse) -> String {
    if payload.results.is_empty() && payload.answer.is_none() {
        return "No results found.".to_string();
    }

    let mut output = String::new();
    if let Some(answer) = payload.answer.as_deref().filter(|a| !a.trim().is_empty()) {
        let _ = writeln!(output, "Summary: {}", answer.trim());
    }
    for (idx, hit) in payload.results.iter().enumerate() {
        let _ = writeln!(output, "[{}] {} ({})", idx + 1, hit.title.trim(), hit.url);
        let _ = writeln!(output, "{}", hit.content.trim());
    }
    output.trim_end().to_string()
}
