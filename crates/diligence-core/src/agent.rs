//! Agent factory and the run abstraction consumed by the front ends.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::AgentConfig;
use crate::input::TaskDescription;
use crate::llm::{GeminiModel, LanguageModel};
use crate::relay::AgentObserver;
use crate::schema::{AgentResponse, parse_agent_response};
use crate::tools::{TavilySearch, ToolRegistry};
use crate::workflow::{ReactLoop, run_react_loop};
use crate::DiligenceError;

/// One agent run: task in, observed steps out, structured result at the end.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(
        &self,
        task: TaskDescription,
        observer: Arc<dyn AgentObserver>,
        cancel: CancellationToken,
    ) -> Result<AgentResponse, DiligenceError>;
}

/// ReAct agent whose final answer is parsed into an [`AgentResponse`].
#[derive(Clone)]
pub struct ReactAgent {
    llm: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    max_iterations: u32,
}

impl ReactAgent {
    pub fn new(llm: Arc<dyn LanguageModel>, tools: ToolRegistry) -> Self {
        Self {
            llm,
            tools,
            max_iterations: AgentConfig::default().max_iterations,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }
}

#[async_trait]
impl AgentRunner for ReactAgent {
    #[instrument(name = "agent.run", skip_all, fields(model = %self.llm.model()))]
    async fn run(
        &self,
        task: TaskDescription,
        observer: Arc<dyn AgentObserver>,
        cancel: CancellationToken,
    ) -> Result<AgentResponse, DiligenceError> {
        let react = ReactLoop {
            llm: self.llm.clone(),
            tools: self.tools.clone(),
            observer,
            cancel: cancel.clone(),
            max_iterations: self.max_iterations,
        };

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DiligenceError::Cancelled),
            output = run_react_loop(react, task.as_str()) => output?,
        };

        let response = parse_agent_response(&output)?;
        info!(verdict = %response.verdict, sources = response.sources.len(), "agent run completed");
        Ok(response)
    }
}

/// Build the production agent: Gemini for reasoning, Tavily for search.
pub fn build_agent(config: &AgentConfig) -> Result<ReactAgent, DiligenceError> {
    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|err| DiligenceError::InvalidConfiguration(format!("http client: {err}")))?;

    let llm = GeminiModel::from_config(client.clone(), config)?;
    let search = TavilySearch::from_config(client, config)?;
    let tools = ToolRegistry::new().with_tool(Arc::new(search));

    Ok(ReactAgent::new(Arc::new(llm), tools).with_max_iterations(config.max_iterations))
}
