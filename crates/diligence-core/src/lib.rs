//! Core of the technical due diligence agent.
//!
//! A ReAct loop built on `graph_flow` researches a company with web search,
//! reports every step through an [`AgentObserver`], and finishes with a
//! schema-validated [`AgentResponse`]. [`EventRelay`] turns the observed
//! steps into an ordered stream of human-readable messages.

mod agent;
mod config;
mod error;
mod input;
mod llm;
mod prompt;
mod react;
mod relay;
mod schema;
mod tasks;
mod telemetry;
mod tools;
mod workflow;

pub use agent::{AgentRunner, ReactAgent, build_agent};
pub use config::{AgentConfig, SecretValue, require_env};
pub use error::{DiligenceError, Result};
pub use input::{CompanyInput, TaskDescription};
pub use llm::{GeminiModel, LanguageModel};
pub use prompt::render_prompt;
pub use react::{AgentStep, FINAL_ANSWER_MARKER, STOP_SEQUENCE, StepParseError, parse_step};
pub use relay::{
    ACTION_MARKER, AgentAction, AgentObserver, EventRelay, NoopObserver, RelayKind, RelayMessage,
    RelayReceiver, describe_action,
};
pub use schema::{
    AgentResponse, format_instructions, is_web_url, parse_agent_response, response_schema,
};
pub use tasks::EXCEPTION_TOOL;
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use tools::{TavilySearch, Tool, ToolRegistry};
pub use workflow::{ReactLoop, run_react_loop};
