//! Parsing of a single ReAct model turn.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::relay::AgentAction;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
/// Cut generation before the model invents its own observation.
pub const STOP_SEQUENCE: &str = "\nObservation:";

static ACTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("invalid action regex")
});
static ACTION_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)").expect("invalid action regex"));
static ACTION_INPUT_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)").expect("invalid action regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStep {
    Act(AgentAction),
    Finish { output: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepParseError {
    pub reason: String,
    /// Model text that failed to parse.
    pub text: String,
}

impl std::fmt::Display for StepParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for StepParseError {}

pub fn parse_step(text: &str) -> Result<AgentStep, StepParseError> {
    let includes_answer = text.contains(FINAL_ANSWER_MARKER);

    if let Some(caps) = ACTION_PATTERN.captures(text) {
        if includes_answer {
            return Err(StepParseError {
                reason: "Parsing LLM output produced both a final answer and a parse-able action"
                    .into(),
                text: text.to_string(),
            });
        }

        let tool = caps[1].trim().to_string();
        let tool_input = caps[2]
            .trim_matches(' ')
            .trim_matches('"')
            .trim()
            .to_string();
        return Ok(AgentStep::Act(AgentAction::new(tool, tool_input, text)));
    }

    if let Some((_, answer)) = text.split_once(FINAL_ANSWER_MARKER) {
        return Ok(AgentStep::Finish {
            output: answer.trim().to_string(),
        });
    }

    let reason = if !ACTION_ONLY.is_match(text) {
        "Invalid Format: Missing 'Action:' after 'Thought:'".to_string()
    } else if !ACTION_INPUT_ONLY.is_match(text) {
        "Invalid Format: Missing 'Action Input:' after 'Action:'".to_string()
    } else {
        format!("Could not parse LLM output: `{text}`")
    };
    Err(StepParseError {
        reason,
        text: text.to_string(),
    })
}
