//! Chat prompt templates for RAG generation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::PromptsConfig;
use crate::error::{Error, Result};
use crate::types::Document;

/// Placeholder name for retrieved context in the system template
pub const CONTEXT_VAR: &str = "context";

/// Placeholder name for the user's input in the human template
pub const INPUT_VAR: &str = "input";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single chat message sent to the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// A text template with `{name}` placeholders; `{{` and `}}` render as literal braces
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Raw template text
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the template, failing on any placeholder without a value
    pub fn render(&self, values: &HashMap<&str, &str>) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.template) {
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            out.push_str(&self.template[last..whole.start()]);

            match caps.get(1) {
                Some(name) => {
                    let value = values.get(name.as_str()).ok_or_else(|| {
                        Error::Prompt(format!(
                            "missing value for placeholder '{{{}}}'",
                            name.as_str()
                        ))
                    })?;
                    out.push_str(value);
                }
                None => out.push_str(&whole.as_str()[..1]),
            }
            last = whole.end();
        }

        out.push_str(&self.template[last..]);
        Ok(out)
    }
}

/// Two-part chat prompt: system instructions plus the human message
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPromptTemplate {
    pub system: PromptTemplate,
    pub human: PromptTemplate,
}

impl ChatPromptTemplate {
    pub fn new(system: impl Into<String>, human: impl Into<String>) -> Self {
        Self {
            system: PromptTemplate::new(system),
            human: PromptTemplate::new(human),
        }
    }

    pub fn from_config(prompts: &PromptsConfig) -> Self {
        Self::new(prompts.system.clone(), prompts.human.clone())
    }

    /// Render both messages with the same set of values
    pub fn format_messages(&self, values: &HashMap<&str, &str>) -> Result<Vec<ChatMessage>> {
        Ok(vec![
            ChatMessage::system(self.system.render(values)?),
            ChatMessage::user(self.human.render(values)?),
        ])
    }

    /// Render with retrieved context and the user's input
    pub fn format_rag(&self, context: &str, input: &str) -> Result<Vec<ChatMessage>> {
        let mut values = HashMap::new();
        values.insert(CONTEXT_VAR, context);
        values.insert(INPUT_VAR, input);
        self.format_messages(&values)
    }
}

/// Concatenate retrieved documents into a single context block
pub fn stuff_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_escapes() {
        let template = PromptTemplate::new("Answer as JSON {{\"a\": 1}} using {context}.");
        let mut values = HashMap::new();
        values.insert("context", "the docs");

        assert_eq!(
            template.render(&values).unwrap(),
            "Answer as JSON {\"a\": 1} using the docs."
        );
    }

    #[test]
    fn test_missing_placeholder_fails() {
        let template = PromptTemplate::new("Hello {name}, see {context}");
        let mut values = HashMap::new();
        values.insert("context", "x");

        let err = template.render(&values).unwrap_err();
        assert!(matches!(err, Error::Prompt(_)));
        assert!(err.to_string().contains("{name}"));
    }

    #[test]
    fn test_format_rag() {
        let prompt = ChatPromptTemplate::new("Use this:\n{context}", "Q: {input}");
        let docs = vec![Document::new("first"), Document::new("second")];
        let messages = prompt.format_rag(&stuff_context(&docs), "What?").unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system("Use this:\nfirst\n\nsecond"));
        assert_eq!(messages[1], ChatMessage::user("Q: What?"));
    }

    #[test]
    fn test_repeated_placeholder() {
        let template = PromptTemplate::new("{input} / {input}");
        let mut values = HashMap::new();
        values.insert("input", "x");

        assert_eq!(template.render(&values).unwrap(), "x / x");
    }
}
