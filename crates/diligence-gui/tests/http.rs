use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use diligence_core::{
    AgentAction, AgentObserver, AgentResponse, AgentRunner, DiligenceError, TaskDescription,
};
use diligence_gui::config::AppConfig;
use diligence_gui::routes::build_router;
use diligence_gui::state::AppState;
use diligence_gui::stream::{FrameType, StreamFrame};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Replays one research step, then returns a fixed outcome.
struct ScriptedAgent {
    verdict: Option<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    fn succeeding(verdict: &'static str) -> Arc<Self> {
        Arc::new(Self {
            verdict: Some(verdict),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            verdict: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AgentRunner for ScriptedAgent {
    async fn run(
        &self,
        task: TaskDescription,
        observer: Arc<dyn AgentObserver>,
        _cancel: CancellationToken,
    ) -> Result<AgentResponse, DiligenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(
            task.as_str(),
            "Perform technical due diligence on Acme at https://acme.example."
        );

        observer.on_action_started(&AgentAction::new(
            "search",
            "Acme funding",
            "Thought: checking site\nAction:",
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        observer.on_action_finished("Series A, 2023");

        match self.verdict {
            Some(verdict) => Ok(AgentResponse {
                value_proposition_analysis: "Ships a real compiler".into(),
                technical: "Proprietary".into(),
                developer_sentiment: "Positive on forums".into(),
                red_flags: vec!["Small team".into()],
                verdict: verdict.into(),
                sources: vec!["https://acme.example/blog".into()],
            }),
            None => Err(DiligenceError::OutputParsing(
                "expected value at line 1 column 1".into(),
            )),
        }
    }
}

fn server(agent: Arc<ScriptedAgent>) -> TestServer {
    let config = AppConfig {
        listen_addr: "127.0.0.1:0".into(),
        poll_interval: Duration::from_millis(10),
    };
    let state = AppState::try_new(&config, agent).expect("state initialization failed");
    TestServer::new(build_router(state)).unwrap()
}

fn frames(body: &str) -> Vec<StreamFrame> {
    body.split("\n\n")
        .filter_map(|chunk| {
            let data: Vec<&str> = chunk
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect();
            if data.is_empty() {
                return None;
            }
            Some(serde_json::from_str(&data.join("\n")).expect("frame is JSON"))
        })
        .collect()
}

#[tokio::test]
async fn index_serves_form() {
    let server = server(ScriptedAgent::succeeding("Promising"));

    let response = server.get("/").await;
    assert_eq!(response.status_code(), 200);
    let body = response.text();
    assert!(body.contains("<form"));
    assert!(body.contains("name=\"company_name\""));
}

#[tokio::test]
async fn streams_steps_then_final_report() {
    let agent = ScriptedAgent::succeeding("Promising");
    let server = server(agent.clone());

    let response = server
        .post("/")
        .form(&json!({ "company_name": "Acme", "url": "https://acme.example" }))
        .await;
    assert_eq!(response.status_code(), 200);
    assert!(
        response
            .header("content-type")
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let frames = frames(&response.text());
    let logs: Vec<&str> = frames
        .iter()
        .filter(|frame| frame.kind == FrameType::Log)
        .map(|frame| frame.content.as_str())
        .collect();
    assert_eq!(
        logs,
        vec![
            "THOUGHT: checking site",
            "ACTION: Invoking search with input Acme funding",
            "OBSERVATION: Data retrieved successfully.",
        ]
    );

    let finals: Vec<&StreamFrame> = frames
        .iter()
        .filter(|frame| frame.kind == FrameType::Final)
        .collect();
    assert_eq!(finals.len(), 1, "exactly one final frame");
    assert_eq!(frames.last().map(|frame| frame.kind), Some(FrameType::Final));
    assert!(finals[0].content.contains("Promising"));
    assert!(finals[0].content.contains("Small team"));
    assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_run_ends_with_error_frame() {
    let server = server(ScriptedAgent::failing());

    let response = server
        .post("/")
        .form(&json!({ "company_name": "Acme", "url": "https://acme.example" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let frames = frames(&response.text());
    assert_eq!(frames.len(), 4);
    let last = frames.last().unwrap();
    assert_eq!(last.kind, FrameType::Error);
    assert!(last.content.contains("could not parse agent output"));
    assert!(frames.iter().all(|frame| frame.kind != FrameType::Final));
}

#[tokio::test]
async fn rejects_invalid_input_before_running() {
    let agent = ScriptedAgent::succeeding("Promising");
    let server = server(agent.clone());

    let response = server
        .post("/")
        .form(&json!({ "company_name": "Acme", "url": "a.b" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 422);
    let body = response.json::<serde_json::Value>();
    assert!(body["error"].as_str().unwrap().contains("url"));

    let response = server
        .post("/")
        .form(&json!({ "company_name": "", "url": "https://acme.example" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 422);

    let response = server
        .post("/")
        .form(&json!({ "company_name": "Acme" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 422);
    assert!(response.json::<serde_json::Value>()["error"].is_string());

    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn health_reports_running_runs() {
    let server = server(ScriptedAgent::succeeding("Promising"));

    let response = server.get("/health/live").await;
    assert_eq!(response.status_code(), 200);
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["running_runs"], 0);

    let response = server.get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
}
