//! Structured result of a due diligence run.
//!
//! The agent is asked to finish with a JSON document matching
//! [`AgentResponse`]; [`parse_agent_response`] extracts and validates it.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::DiligenceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// What the company claims versus what its technology supports.
    pub value_proposition_analysis: String,
    /// Proprietary code, a unique dataset, or a wrapper around someone else's model.
    pub technical: String,
    /// What the engineering community says about the technology.
    pub developer_sentiment: String,
    #[serde(default)]
    pub red_flags: Vec<String>,
    pub verdict: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// JSON schema describing [`AgentResponse`], embedded into the prompt.
pub fn response_schema() -> serde_json::Value {
    json!({
        "title": "AgentResponse",
        "type": "object",
        "properties": {
            "value_proposition_analysis": {
                "type": "string",
                "description": "A summary of what the company claims vs what their tech supports"
            },
            "technical": {
                "type": "string",
                "description": "Is it proprietary code, a unique dataset, or a wrapper?"
            },
            "developer_sentiment": {
                "type": "string",
                "description": "What the engineering community says about their tech"
            },
            "red_flags": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Any potential issues or concerns"
            },
            "verdict": {
                "type": "string",
                "description": "The final verdict from a technical perspective"
            },
            "sources": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Full, valid web URLs (starting with http:// or https://) used in the research. No placeholder text."
            }
        },
        "required": [
            "value_proposition_analysis",
            "technical",
            "developer_sentiment",
            "verdict"
        ]
    })
}

/// Instructions telling the model how to shape its final answer.
pub fn format_instructions() -> String {
    let schema = serde_json::to_string(&response_schema()).unwrap_or_default();
    format!(
        "Respond with a single JSON object that validates against the JSON schema below. \
Return the object itself, not the schema.\n\nSchema:\n```\n{schema}\n```"
    )
}

/// Extract the JSON document from the agent's final answer and validate it.
pub fn parse_agent_response(text: &str) -> Result<AgentResponse, DiligenceError> {
    let candidate = extract_json(text).ok_or_else(|| {
        DiligenceError::OutputParsing(format!("no JSON object found in: {}", excerpt(text)))
    })?;

    let mut response: AgentResponse = serde_json::from_str(candidate)
        .map_err(|err| DiligenceError::OutputParsing(format!("{err} in: {}", excerpt(text))))?;

    response.value_proposition_analysis = response.value_proposition_analysis.trim().to_string();
    response.technical = response.technical.trim().to_string();
    response.developer_sentiment = response.developer_sentiment.trim().to_string();
    response.verdict = response.verdict.trim().to_string();
    response.red_flags = response
        .red_flags
        .into_iter()
        .map(|flag| flag.trim().to_string())
        .filter(|flag| !flag.is_empty())
        .collect();

    if response.verdict.is_empty() {
        return Err(DiligenceError::OutputParsing("verdict must not be empty".into()));
    }

    let (sources, rejected): (Vec<String>, Vec<String>) = response
        .sources
        .into_iter()
        .map(|source| source.trim().to_string())
        .partition(|source| is_web_url(source));
    if !rejected.is_empty() {
        warn!(rejected = ?rejected, "dropping sources that are not web URLs");
    }
    response.sources = sources;

    Ok(response)
}

fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|idx| idx + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// Whether `value` is an absolute `http://` or `https://` URL.
pub fn is_web_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://"))
        && value.len() > "https://".len()
        && !value.contains(char::is_whitespace)
}

fn excerpt(text: &str) -> String {
    const LIMIT: usize = 160;
    let trimmed = text.trim();
    match trimmed.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "value_proposition_analysis": "Claims custom models; evidence shows fine-tuned open weights.",
        "technical": "Wrapper with a proprietary eval dataset",
        "developer_sentiment": "Mixed",
        "red_flags": ["No public repos", "  "],
        "verdict": "Promising",
        "sources": ["https://acme.example/blog", "N/A"]
    }"#;

    #[test]
    fn parses_bare_object_and_cleans_fields() {
        let response = parse_agent_response(VALID).expect("valid response");
        assert_eq!(response.verdict, "Promising");
        assert_eq!(response.red_flags, vec!["No public repos".to_string()]);
        assert_eq!(response.sources, vec!["https://acme.example/blog".to_string()]);
    }

    #[test]
    fn parses_fenced_block_with_surrounding_prose() {
        let text = format!("Here is the report:\n```json\n{VALID}\n```\nThanks.");
        let response = parse_agent_response(&text).expect("fenced response");
        assert_eq!(response.technical, "Wrapper with a proprietary eval dataset");
    }

    #[test]
    fn optional_lists_default_to_empty() {
        let text = r#"{"value_proposition_analysis":"a","technical":"b","developer_sentiment":"c","verdict":"Pass"}"#;
        let response = parse_agent_response(text).expect("minimal response");
        assert!(response.red_flags.is_empty());
        assert!(response.sources.is_empty());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let text = r#"{"technical":"b","developer_sentiment":"c","verdict":"Pass"}"#;
        let err = parse_agent_response(text).unwrap_err();
        assert!(matches!(err, DiligenceError::OutputParsing(_)));
    }

    #[test]
    fn empty_verdict_is_rejected() {
        let text = r#"{"value_proposition_analysis":"a","technical":"b","developer_sentiment":"c","verdict":"  "}"#;
        assert!(parse_agent_response(text).is_err());
    }

    #[test]
    fn prose_without_json_is_rejected() {
        let err = parse_agent_response("Agent stopped due to iteration limit.").unwrap_err();
        assert!(err.to_string().contains("no JSON object"));
    }

    #[test]
    fn instructions_embed_every_field() {
        let instructions = format_instructions();
        for field in [
            "value_proposition_analysis",
            "technical",
            "developer_sentiment",
            "red_flags",
            "verdict",
            "sources",
        ] {
            assert!(instructions.contains(field), "missing {field}");
        }
    }
}
