//! Streams one agent run to the client.
//!
//! The run executes as a background task with an [`EventRelay`] as its
//! observer. The driver drains the relay with a bounded wait, forwarding each
//! message as a `log` frame, and only concludes once the run has finished and
//! the relay is empty. The last frame is either `final` (rendered report) or
//! `error`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::response::sse::Event;
use diligence_core::{AgentResponse, CompanyInput, DiligenceError, EventRelay, RelayReceiver};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use crate::metrics;
use crate::state::AppState;
use crate::templates::ReportTemplates;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    Log,
    Final,
    Error,
}

/// Payload of one SSE `data:` line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFrame {
    #[serde(rename = "type")]
    pub kind: FrameType,
    pub content: String,
}

impl StreamFrame {
    pub fn log(content: impl Into<String>) -> Self {
        Self {
            kind: FrameType::Log,
            content: content.into(),
        }
    }

    pub fn final_report(content: impl Into<String>) -> Self {
        Self {
            kind: FrameType::Final,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            kind: FrameType::Error,
            content: content.into(),
        }
    }

    pub fn into_sse_event(self) -> Event {
        let data = serde_json::to_string(&self).unwrap_or_else(|_| {
            serde_json::json!({
                "type": FrameType::Error,
                "content": "failed to serialize stream frame",
            })
            .to_string()
        });

        Event::default().data(data)
    }
}

type RunHandle = JoinHandle<Result<AgentResponse, DiligenceError>>;

enum Phase {
    Relaying,
    Concluding,
    Done,
}

struct Driver {
    run_id: Uuid,
    input: CompanyInput,
    receiver: RelayReceiver,
    handle: Option<RunHandle>,
    templates: Arc<ReportTemplates>,
    poll_interval: Duration,
    phase: Phase,
    frames: usize,
    _cancel_on_drop: DropGuard,
}

/// Start an agent run for `input` and return the frames it produces.
///
/// Dropping the stream (client disconnect) cancels the run.
pub fn report_stream(state: &AppState, input: CompanyInput) -> impl Stream<Item = StreamFrame> + Send + use<> {
    let run_id = Uuid::new_v4();
    let cancel = CancellationToken::new();
    let (relay, receiver) = EventRelay::new();

    let runs = state.runs();
    let running = runs.register(run_id, &input.company_name, cancel.clone());
    metrics::run_started(&run_id.to_string(), &input.company_name, running);

    let agent = state.agent();
    let task = input.task_description();
    let token = cancel.clone();
    let span = info_span!("agent_run", %run_id, company = %input.company_name);
    let handle = tokio::spawn(
        async move {
            let _finish = runs.finish_on_drop(run_id);
            let started = Instant::now();
            let result = agent.run(task, Arc::new(relay), token).await;

            let elapsed_ms = started.elapsed().as_millis() as u64;
            let id = run_id.to_string();
            match &result {
                Ok(response) => {
                    metrics::run_completed(&id, &response.verdict, response.red_flags.len(), elapsed_ms)
                }
                Err(DiligenceError::Cancelled) => metrics::run_cancelled(&id, elapsed_ms),
                Err(err) => metrics::run_failed(&id, &err.to_string(), elapsed_ms),
            }
            result
        }
        .instrument(span),
    );

    metrics::stream_opened(&run_id.to_string());

    let driver = Driver {
        run_id,
        input,
        receiver,
        handle: Some(handle),
        templates: state.templates(),
        poll_interval: state.poll_interval(),
        phase: Phase::Relaying,
        frames: 0,
        _cancel_on_drop: cancel.drop_guard(),
    };

    futures::stream::unfold(driver, |mut driver| async move {
        driver.next_frame().await.map(|frame| (frame, driver))
    })
}

impl Driver {
    fn run_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    fn emit(&mut self, frame: StreamFrame) -> Option<StreamFrame> {
        self.frames += 1;
        Some(frame)
    }

    async fn next_frame(&mut self) -> Option<StreamFrame> {
        loop {
            match self.phase {
                Phase::Relaying => match timeout(self.poll_interval, self.receiver.recv()).await {
                    Ok(Some(message)) => return self.emit(StreamFrame::log(message.to_string())),
                    // Every relay handle is gone, so the run is over and the queue is empty.
                    Ok(None) => self.phase = Phase::Concluding,
                    Err(_) => {
                        if !self.run_finished() {
                            continue;
                        }
                        match self.receiver.try_recv() {
                            Ok(message) => return self.emit(StreamFrame::log(message.to_string())),
                            Err(_) => self.phase = Phase::Concluding,
                        }
                    }
                },
                Phase::Concluding => {
                    self.phase = Phase::Done;
                    let frame = self.conclude().await;
                    return self.emit(frame);
                }
                Phase::Done => return None,
            }
        }
    }

    async fn conclude(&mut self) -> StreamFrame {
        let Some(handle) = self.handle.take() else {
            return StreamFrame::error("agent run already concluded");
        };

        match handle.await {
            Ok(Ok(response)) => match self.templates.render_report(
                &self.input.company_name,
                &self.input.url,
                &response,
            ) {
                Ok(html) => StreamFrame::final_report(html),
                Err(err) => {
                    error!(run_id = %self.run_id, error = %err, "report rendering failed");
                    StreamFrame::error("the report could not be rendered")
                }
            },
            Ok(Err(err)) => {
                warn!(run_id = %self.run_id, error = %err, "agent run ended without a report");
                StreamFrame::error(err.to_string())
            }
            Err(join_error) => {
                error!(run_id = %self.run_id, error = %join_error, "agent task aborted");
                StreamFrame::error("the agent run aborted unexpectedly")
            }
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        metrics::stream_closed(&self.run_id.to_string(), self.frames);
    }
}
