use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DiligenceError;

const COMPANY_NAME_CHARS: (usize, usize) = (1, 100);
const URL_CHARS: (usize, usize) = (4, 200);

/// Company submitted for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInput {
    pub company_name: String,
    pub url: String,
}

impl CompanyInput {
    /// Validate field lengths (counted in characters) and build the input.
    pub fn new(company_name: impl Into<String>, url: impl Into<String>) -> Result<Self, DiligenceError> {
        let input = Self {
            company_name: company_name.into(),
            url: url.into(),
        };
        check_length("company_name", &input.company_name, COMPANY_NAME_CHARS)?;
        check_length("url", &input.url, URL_CHARS)?;
        Ok(input)
    }

    pub fn task_description(&self) -> TaskDescription {
        TaskDescription(format!(
            "Perform technical due diligence on {} at {}.",
            self.company_name, self.url
        ))
    }
}

fn check_length(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), DiligenceError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(DiligenceError::InvalidInput(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

/// Instruction handed to the agent for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescription(String);

impl TaskDescription {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_task_description() {
        let input = CompanyInput::new("Acme", "https://acme.example").unwrap();
        assert_eq!(
            input.task_description().as_str(),
            "Perform technical due diligence on Acme at https://acme.example."
        );
    }

    #[test]
    fn enforces_length_bounds() {
        assert!(CompanyInput::new("", "https://acme.example").is_err());
        assert!(CompanyInput::new("Acme", "a.b").is_err());
        assert!(CompanyInput::new("x".repeat(101), "https://acme.example").is_err());
        assert!(CompanyInput::new("Acme", "h".repeat(201)).is_err());
        assert!(CompanyInput::new("x".repeat(100), "a.io").is_ok());
    }

    #[test]
    fn counts_characters_not_bytes() {
        let name = "é".repeat(100);
        assert!(CompanyInput::new(name, "https://acme.example").is_ok());
    }
}
