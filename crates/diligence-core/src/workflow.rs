use std::sync::Arc;

use anyhow::anyhow;
use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
    Task,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::DiligenceError;
use crate::llm::LanguageModel;
use crate::relay::AgentObserver;
use crate::tasks::{
    ActTask, FinishTask, KEY_FINISHED, KEY_INPUT, KEY_LIMIT_REACHED, KEY_OUTPUT, ReasonTask,
};
use crate::tools::ToolRegistry;

/// Everything one ReAct loop needs.
pub struct ReactLoop {
    pub llm: Arc<dyn LanguageModel>,
    pub tools: ToolRegistry,
    pub observer: Arc<dyn AgentObserver>,
    pub cancel: CancellationToken,
    pub max_iterations: u32,
}

fn build_graph(config: &ReactLoop) -> (Arc<graph_flow::Graph>, String) {
    let reason = Arc::new(ReasonTask {
        llm: config.llm.clone(),
        tools: config.tools.clone(),
        observer: config.observer.clone(),
        cancel: config.cancel.clone(),
        max_iterations: config.max_iterations,
    });
    let act = Arc::new(ActTask {
        tools: config.tools.clone(),
        observer: config.observer.clone(),
        cancel: config.cancel.clone(),
    });
    let finish = Arc::new(FinishTask);

    let graph = GraphBuilder::new("react_loop")
        .add_task(reason.clone())
        .add_task(act.clone())
        .add_task(finish.clone())
        .add_conditional_edge(
            reason.id(),
            |ctx| ctx.get_sync::<bool>(KEY_FINISHED).unwrap_or(false),
            finish.id(),
            act.id(),
        )
        .add_edge(act.id(), reason.id())
        .set_start_task(reason.id())
        .build();

    (Arc::new(graph), reason.id().to_string())
}

/// Drive the loop until the model gives a final answer; returns its raw text.
pub async fn run_react_loop(config: ReactLoop, input: &str) -> Result<String, DiligenceError> {
    let (graph, start_task) = build_graph(&config);

    let storage = Arc::new(InMemorySessionStorage::new());
    let runner = FlowRunner::new(graph, storage.clone());

    let session_id = format!("react-{}", Uuid::new_v4());
    let session = Session::new_from_task(session_id.clone(), &start_task);
    session.context.set(KEY_INPUT, input.to_string()).await;

    storage
        .save(session)
        .await
        .map_err(|err| anyhow!("failed to persist session: {err}"))?;

    loop {
        let result = runner.run(&session_id).await.map_err(|err| {
            if config.cancel.is_cancelled() {
                DiligenceError::Cancelled
            } else {
                DiligenceError::AgentFailed(err.to_string())
            }
        })?;

        match result.status {
            ExecutionStatus::Completed => break,
            ExecutionStatus::WaitingForInput => {
                debug!(%session_id, "graph paused between steps; resuming");
                continue;
            }
            ExecutionStatus::Error(message) => return Err(DiligenceError::AgentFailed(message)),
        }
    }

    let session = storage
        .get(&session_id)
        .await
        .map_err(|err| anyhow!("failed to reload session: {err}"))?
        .ok_or_else(|| anyhow!("session missing after execution"))?;

    if session
        .context
        .get::<bool>(KEY_LIMIT_REACHED)
        .await
        .unwrap_or(false)
    {
        return Err(DiligenceError::IterationLimit(config.max_iterations));
    }

    session
        .context
        .get::<String>(KEY_OUTPUT)
        .await
        .ok_or_else(|| DiligenceError::AgentFailed("no final answer recorded".into()))
}
