//! Relay between the agent loop and whoever is watching it.
//!
//! The agent reports each step through [`AgentObserver`]. [`EventRelay`]
//! turns those callbacks into short human-readable [`RelayMessage`]s and
//! pushes them onto an unbounded FIFO channel drained by a single consumer
//! (the SSE driver or the CLI printer).

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Separates the model's thought from the action it picked.
pub const ACTION_MARKER: &str = "Action:";
const THOUGHT_LABEL: &str = "Thought:";
const OBSERVATION_TEXT: &str = "Data retrieved successfully.";

/// A step the agent is about to take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: String,
    /// Raw model text that produced this action.
    pub log: String,
}

impl AgentAction {
    pub fn new(tool: impl Into<String>, tool_input: impl Into<String>, log: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            tool_input: tool_input.into(),
            log: log.into(),
        }
    }
}

/// Hooks invoked by the agent loop. Implementations must not fail or block.
pub trait AgentObserver: Send + Sync {
    fn on_action_started(&self, action: &AgentAction);

    fn on_action_finished(&self, output: &str);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AgentObserver for NoopObserver {
    fn on_action_started(&self, _action: &AgentAction) {}

    fn on_action_finished(&self, _output: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    Thought,
    Action,
    Observation,
    Log,
}

impl RelayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayKind::Thought => "THOUGHT",
            RelayKind::Action => "ACTION",
            RelayKind::Observation => "OBSERVATION",
            RelayKind::Log => "LOG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub kind: RelayKind,
    pub text: String,
}

impl RelayMessage {
    pub fn new(kind: RelayKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for RelayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.text)
    }
}

pub type RelayReceiver = mpsc::UnboundedReceiver<RelayMessage>;

/// Producer half of the relay hand-off.
#[derive(Clone)]
pub struct EventRelay {
    sender: mpsc::UnboundedSender<RelayMessage>,
}

impl EventRelay {
    pub fn new() -> (Self, RelayReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn push(&self, message: RelayMessage) {
        if let Err(e) = self.sender.send(message) {
            tracing::warn!(message = %e.0, "relay consumer gone; dropping message");
        }
    }
}

impl AgentObserver for EventRelay {
    fn on_action_started(&self, action: &AgentAction) {
        for message in describe_action(action) {
            self.push(message);
        }
    }

    fn on_action_finished(&self, _output: &str) {
        self.push(RelayMessage::new(RelayKind::Observation, OBSERVATION_TEXT));
    }
}

/// Messages announcing `action`: an optional thought plus the action, or a
/// single raw log line when the text has no action marker.
pub fn describe_action(action: &AgentAction) -> Vec<RelayMessage> {
    let Some((before_marker, _)) = action.log.split_once(ACTION_MARKER) else {
        return vec![RelayMessage::new(RelayKind::Log, action.log.trim())];
    };

    let mut messages = Vec::with_capacity(2);
    let thought = before_marker.replace(THOUGHT_LABEL, "");
    let thought = thought.trim();
    if !thought.is_empty() {
        messages.push(RelayMessage::new(RelayKind::Thought, thought));
    }
    messages.push(RelayMessage::new(
        RelayKind::Action,
        format!("Invoking {} with input {}", action.tool, action.tool_input),
    ));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(receiver: &mut RelayReceiver) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            out.push(message.to_string());
        }
        out
    }

    #[test]
    fn thought_then_action_when_marker_present() {
        let (relay, mut rx) = EventRelay::new();
        relay.on_action_started(&AgentAction::new(
            "search",
            "Acme funding",
            "Thought: checking site\nAction:",
        ));

        assert_eq!(
            drain(&mut rx),
            vec![
                "THOUGHT: checking site".to_string(),
                "ACTION: Invoking search with input Acme funding".to_string(),
            ]
        );
    }

    #[test]
    fn empty_thought_is_skipped() {
        let (relay, mut rx) = EventRelay::new();
        relay.on_action_started(&AgentAction::new(
            "tavily_search",
            "acme github",
            "Thought:   \nAction: tavily_search\nAction Input: acme github",
        ));

        assert_eq!(
            drain(&mut rx),
            vec!["ACTION: Invoking tavily_search with input acme github".to_string()]
        );
    }

    #[test]
    fn only_text_before_first_marker_counts_as_thought() {
        let messages = describe_action(&AgentAction::new(
            "search",
            "x",
            "Thought: compare Thought: notes\nAction: search\nAction: again",
        ));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "compare  notes");
    }

    #[test]
    fn log_fallback_without_marker() {
        let (relay, mut rx) = EventRelay::new();
        relay.on_action_started(&AgentAction::new(
            "_Exception",
            "Invalid Format",
            "  I think the answer is obvious.  \n",
        ));

        assert_eq!(drain(&mut rx), vec!["LOG: I think the answer is obvious.".to_string()]);
    }

    #[test]
    fn observation_ignores_tool_output() {
        let (relay, mut rx) = EventRelay::new();
        relay.on_action_finished("");
        relay.on_action_finished("{\"results\": [1, 2, 3]}");

        assert_eq!(
            drain(&mut rx),
            vec![
                "OBSERVATION: Data retrieved successfully.".to_string(),
                "OBSERVATION: Data retrieved successfully.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn delivery_preserves_callback_order_across_tasks() {
        let (relay, mut rx) = EventRelay::new();

        let producer = tokio::spawn(async move {
            for step in 0..20 {
                relay.on_action_started(&AgentAction::new(
                    "search",
                    format!("query {step}"),
                    format!("Thought: step {step}\nAction: search"),
                ));
                tokio::task::yield_now().await;
                relay.on_action_finished("ignored");
            }
        });

        let mut received = Vec::new();
        while let Some(message) = rx.recv().await {
            received.push(message.to_string());
        }
        producer.await.unwrap();

        assert_eq!(received.len(), 60);
        for step in 0..20 {
            let base = step * 3;
            assert_eq!(received[base], format!("THOUGHT: step {step}"));
            assert_eq!(
                received[base + 1],
                format!("ACTION: Invoking search with input query {step}")
            );
            assert_eq!(received[base + 2], "OBSERVATION: Data retrieved successfully.");
        }
    }

    #[test]
    fn closed_consumer_does_not_panic() {
        let (relay, rx) = EventRelay::new();
        drop(rx);
        relay.on_action_started(&AgentAction::new("search", "x", "no marker"));
        relay.on_action_finished("done");
    }
}
