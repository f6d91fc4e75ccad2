use thiserror::Error;

/// Core error type for the due diligence agent.
#[derive(Debug, Error)]
pub enum DiligenceError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("language model error: {0}")]
    Llm(String),
    #[error("tool `{tool}` failed: {message}")]
    Tool { tool: String, message: String },
    #[error("could not parse agent output: {0}")]
    OutputParsing(String),
    #[error("agent stopped after reaching the iteration limit of {0}")]
    IterationLimit(u32),
    #[error("agent run cancelled")]
    Cancelled,
    #[error("agent run failed: {0}")]
    AgentFailed(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DiligenceError {
    pub fn tool(tool: impl Into<String>, message: impl ToString) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error came from the caller's input rather than the run itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

pub type Result<T, E = DiligenceError> = std::result::Result<T, E>;
