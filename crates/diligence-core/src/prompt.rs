//! ReAct prompt for the due diligence analyst.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::schema::format_instructions;
use crate::tools::ToolRegistry;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(tools|tool_names|format_instructions|input|agent_scratchpad)\}")
        .expect("invalid placeholder regex")
});

const REACT_TEMPLATE: &str = r#"
You are a Senior Technical Due Diligence Analyst working for a venture capital fund.
Your job is an evidence-based account of how defensible a company's technology really is.

GROUND RULES:
1. SKEPTICISM: marketing claims are hypotheses. Look for technical proof such as source repositories, documentation or engineering blogs.
2. NO HALLUCINATION: when a search returns nothing useful, say the information is unavailable and try another search angle instead of guessing.
3. REASONING: every Thought must say why the next tool call is needed and how the last Observation changed your view of the company.

Answer the question below as well as you can. You have access to these tools:

{tools}

Use exactly this format:
Question: the question you must answer
Thought: what you should do next and why
Action: the action to take, one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (Thought/Action/Action Input/Observation may repeat N times)

Thought: I have gathered enough technical evidence to write the assessment.
Final Answer: the answer to the original question, formatted according to these instructions: {format_instructions}

Begin!

Question: {input}
Thought: {agent_scratchpad}
"#;

/// Fill the ReAct template for one model call.
///
/// Substitution is single-pass, so placeholder-like text inside the user's
/// input or the scratchpad is left untouched.
pub fn render_prompt(tools: &ToolRegistry, input: &str, scratchpad: &str) -> String {
    let descriptions = tools.render_descriptions();
    let names = tools.names().join(", ");
    let instructions = format_instructions();

    PLACEHOLDER
        .replace_all(REACT_TEMPLATE, |caps: &Captures| match &caps[1] {
            "tools" => descriptions.clone(),
            "tool_names" => names.clone(),
            "format_instructions" => instructions.clone(),
            "input" => input.to_string(),
            _ => scratchpad.to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_placeholder() {
        let prompt = render_prompt(
            &ToolRegistry::new(),
            "Perform technical due diligence on Acme at https://acme.example.",
            "checking docs\nObservation: ok\nThought: ",
        );

        assert!(!prompt.contains("{tools}"));
        assert!(!prompt.contains("{tool_names}"));
        assert!(!prompt.contains("{format_instructions}"));
        assert!(!prompt.contains("{input}"));
        assert!(!prompt.contains("{agent_scratchpad}"));
        assert!(prompt.contains("Question: Perform technical due diligence on Acme"));
        assert!(prompt.trim_end().ends_with("Thought: checking docs\nObservation: ok\nThought:"));
    }

    #[test]
    fn user_text_is_not_re_expanded() {
        let prompt = render_prompt(&ToolRegistry::new(), "Acme {agent_scratchpad}", "");
        assert!(prompt.contains("Question: Acme {agent_scratchpad}"));
    }
}
