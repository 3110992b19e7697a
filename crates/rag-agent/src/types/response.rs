//! Result of a single agent query

use serde::{Deserialize, Serialize};

/// Response from the RAG agent for one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The input text as given
    pub input: String,
    /// Generated answer (empty on failure)
    pub output: String,
    /// Number of retrieved chunks stuffed into the prompt
    pub source_documents: usize,
    /// Failure description, absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    /// Create a successful response
    pub fn success(input: impl Into<String>, output: impl Into<String>, source_documents: usize) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            source_documents,
            error: None,
        }
    }

    /// Create a failed response; output is empty and no sources are counted
    pub fn failure(input: impl Into<String>, error: impl ToString) -> Self {
        Self {
            input: input.into(),
            output: String::new(),
            source_documents: 0,
            error: Some(error.to_string()),
        }
    }

    /// True when no error was recorded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_failure_shape() {
        let response = AgentResponse::failure("What is X?", Error::llm("connection refused"));

        assert!(!response.is_success());
        assert_eq!(response.output, "");
        assert_eq!(response.source_documents, 0);
        assert_eq!(response.error.as_deref(), Some("LLM error: connection refused"));
    }

    #[test]
    fn test_success_omits_error_in_json() {
        let response = AgentResponse::success("q", "a", 2);
        let json = serde_json::to_value(&response).unwrap();

        assert!(response.is_success());
        assert!(json.get("error").is_none());
        assert_eq!(json["source_documents"], 2);
    }
}
