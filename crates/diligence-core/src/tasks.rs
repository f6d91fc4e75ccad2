use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::llm::LanguageModel;
use crate::prompt::render_prompt;
use crate::react::{AgentStep, STOP_SEQUENCE, parse_step};
use crate::relay::{AgentAction, AgentObserver};
use crate::tools::ToolRegistry;

pub(crate) const KEY_INPUT: &str = "react.input";
pub(crate) const KEY_SCRATCHPAD: &str = "react.scratchpad";
pub(crate) const KEY_ITERATIONS: &str = "react.iterations";
pub(crate) const KEY_PENDING: &str = "react.pending";
pub(crate) const KEY_FINISHED: &str = "react.finished";
pub(crate) const KEY_OUTPUT: &str = "react.output";
pub(crate) const KEY_LIMIT_REACHED: &str = "react.limit_reached";

/// Tool name used when the model's output could not be parsed.
pub const EXCEPTION_TOOL: &str = "_Exception";

fn cancelled() -> GraphError {
    GraphError::TaskExecutionFailed("run cancelled".into())
}

/// Calls the model and decides between acting and finishing.
pub struct ReasonTask {
    pub(crate) llm: Arc<dyn LanguageModel>,
    pub(crate) tools: ToolRegistry,
    pub(crate) observer: Arc<dyn AgentObserver>,
    pub(crate) cancel: CancellationToken,
    pub(crate) max_iterations: u32,
}

#[async_trait]
impl Task for ReasonTask {
    fn id(&self) -> &str {
        "reason"
    }

    #[instrument(name = "task.reason", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }

        let iterations: u32 = context.get(KEY_ITERATIONS).await.unwrap_or(0);
        if iterations >= self.max_iterations {
            warn!(iterations, "iteration limit reached before a final answer");
            context.set(KEY_LIMIT_REACHED, true).await;
            context.set_sync(KEY_FINISHED, true);
            return Ok(TaskResult::new(
                Some("iteration limit reached".to_string()),
                NextAction::ContinueAndExecute,
            ));
        }

        let input: String = context.get(KEY_INPUT).await.unwrap_or_default();
        let scratchpad: String = context.get(KEY_SCRATCHPAD).await.unwrap_or_default();
        let prompt = render_prompt(&self.tools, &input, &scratchpad);

        let text = self
            .llm
            .complete(&prompt, &[STOP_SEQUENCE])
            .await
            .map_err(|err| GraphError::TaskExecutionFailed(err.to_string()))?;
        context.set(KEY_ITERATIONS, iterations + 1).await;

        debug!(iteration = iterations + 1, chars = text.len(), "model turn received");

        let message = match parse_step(&text) {
            Ok(AgentStep::Act(action)) => {
                info!(tool = %action.tool, iteration = iterations + 1, "agent chose an action");
                self.observer.on_action_started(&action);
                let message = format!("invoking {}", action.tool);
                context.set(KEY_PENDING, &action).await;
                context.set_sync(KEY_FINISHED, false);
                message
            }
            Ok(AgentStep::Finish { output, .. }) => {
                info!(iteration = iterations + 1, "agent produced a final answer");
                context.set(KEY_OUTPUT, output).await;
                context.set_sync(KEY_FINISHED, true);
                "final answer ready".to_string()
            }
            Err(err) => {
                warn!(reason = %err.reason, "model output did not follow the ReAct format");
                let action = AgentAction::new(EXCEPTION_TOOL, err.reason.clone(), err.text);
                self.observer.on_action_started(&action);
                context.set(KEY_PENDING, &action).await;
                context.set_sync(KEY_FINISHED, false);
                "recovering from malformed output".to_string()
            }
        };

        Ok(TaskResult::new(Some(message), NextAction::ContinueAndExecute))
    }
}

/// Executes the pending tool call and records the observation.
pub struct ActTask {
    pub(crate) tools: ToolRegistry,
    pub(crate) observer: Arc<dyn AgentObserver>,
    pub(crate) cancel: CancellationToken,
}

impl ActTask {
    async fn observe(&self, action: &AgentAction) -> String {
        if action.tool == EXCEPTION_TOOL {
            return action.tool_input.clone();
        }

        match self.tools.get(&action.tool) {
            Some(tool) => match tool.invoke(&action.tool_input).await {
                Ok(output) => output,
                Err(err) => {
                    warn!(tool = %action.tool, error = %err, "tool call failed");
                    format!("Tool error: {err}")
                }
            },
            None => format!(
                "{} is not a valid tool, try one of [{}].",
                action.tool,
                self.tools.names().join(", ")
            ),
        }
    }
}

#[async_trait]
impl Task for ActTask {
    fn id(&self) -> &str {
        "act"
    }

    #[instrument(name = "task.act", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }

        let action: AgentAction = context.get(KEY_PENDING).await.ok_or_else(|| {
            GraphError::TaskExecutionFailed("no pending action to execute".into())
        })?;

        let observation = self.observe(&action).await;
        self.observer.on_action_finished(&observation);

        let mut scratchpad: String = context.get(KEY_SCRATCHPAD).await.unwrap_or_default();
        scratchpad.push_str(&action.log);
        scratchpad.push_str("\nObservation: ");
        scratchpad.push_str(&observation);
        scratchpad.push_str("\nThought: ");
        context.set(KEY_SCRATCHPAD, scratchpad).await;

        debug!(tool = %action.tool, observation_chars = observation.len(), "observation recorded");

        Ok(TaskResult::new(
            Some(format!("{} finished", action.tool)),
            NextAction::ContinueAndExecute,
        ))
    }
}

#[derive(Default)]
pub struct FinishTask;

#[async_trait]
impl Task for FinishTask {
    fn id(&self) -> &str {
        "finalize"
    }

    #[instrument(name = "task.finish", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let iterations: u32 = context.get(KEY_ITERATIONS).await.unwrap_or(0);
        info!(iterations, "agent loop finished");
        Ok(TaskResult::new(None, NextAction::End))
    }
}
