use std::env;
use std::time::Duration;

use crate::DiligenceError;

const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_LLM_KEY_ENV: &str = "GOOGLE_API_KEY";
const DEFAULT_SEARCH_KEY_ENV: &str = "TAVILY_API_KEY";
const DEFAULT_MAX_ITERATIONS: u32 = 15;
const DEFAULT_SEARCH_MAX_RESULTS: u8 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Wrapper around API keys so they never end up in logs.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Read a non-empty secret from the environment.
pub fn require_env(var: &str) -> Result<SecretValue, DiligenceError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretValue(value.trim().to_string())),
        _ => Err(DiligenceError::MissingSecret(var.to_string())),
    }
}

/// Settings for the language model, the search tool and the ReAct loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub llm_base_url: Option<String>,
    pub llm_api_key_env: String,
    pub search_api_key_env: String,
    pub max_iterations: u32,
    pub search_max_results: u8,
    pub http_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            llm_base_url: None,
            llm_api_key_env: DEFAULT_LLM_KEY_ENV.to_string(),
            search_api_key_env: DEFAULT_SEARCH_KEY_ENV.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            search_max_results: DEFAULT_SEARCH_MAX_RESULTS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, DiligenceError> {
        let defaults = Self::default();

        let model = non_empty_var("DILIGENCE_LLM_MODEL").unwrap_or(defaults.model);
        let llm_base_url = non_empty_var("DILIGENCE_LLM_BASE_URL");
        let llm_api_key_env =
            non_empty_var("DILIGENCE_LLM_API_KEY_ENV").unwrap_or(defaults.llm_api_key_env);
        let search_api_key_env =
            non_empty_var("DILIGENCE_SEARCH_API_KEY_ENV").unwrap_or(defaults.search_api_key_env);

        let max_iterations = parse_positive::<u32>("DILIGENCE_MAX_ITERATIONS")?
            .unwrap_or(defaults.max_iterations);
        let search_max_results = parse_positive::<u8>("DILIGENCE_SEARCH_MAX_RESULTS")?
            .unwrap_or(defaults.search_max_results);
        let http_timeout = parse_positive::<u64>("DILIGENCE_HTTP_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        Ok(Self {
            model,
            llm_base_url,
            llm_api_key_env,
            search_api_key_env,
            max_iterations,
            search_max_results,
            http_timeout,
        })
    }

    pub fn llm_api_key(&self) -> Result<SecretValue, DiligenceError> {
        require_env(&self.llm_api_key_env)
    }

    pub fn search_api_key(&self) -> Result<SecretValue, DiligenceError> {
        require_env(&self.search_api_key_env)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_positive<T>(name: &str) -> Result<Option<T>, DiligenceError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = non_empty_var(name) else {
        return Ok(None);
    };
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Ok(Some(value)),
        _ => Err(DiligenceError::InvalidConfiguration(format!(
            "{name} must be a positive integer, got `{raw}`"
        ))),
    }
}
