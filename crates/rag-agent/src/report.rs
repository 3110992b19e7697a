//! Plain-text run report printed by the binary

use std::fmt::Display;
use std::io::{self, Write};

use crate::config::AgentConfig;
use crate::types::AgentResponse;

const WIDTH: usize = 80;

/// Write the banner, one block per test case and the closing rule
pub fn write_report<W: Write>(out: &mut W, config: &AgentConfig, results: &[AgentResponse]) -> io::Result<()> {
    let rule = "=".repeat(WIDTH);
    writeln!(out, "\n{}", rule)?;
    writeln!(out, "{}", config.name.to_uppercase())?;
    writeln!(out, "{}", config.description)?;
    writeln!(out, "{}\n", rule)?;

    for (i, result) in results.iter().enumerate() {
        write_result(out, i + 1, result)?;
    }

    writeln!(out, "\n{}\n", rule)
}

/// One test case block; `number` is 1-based
pub fn write_result<W: Write>(out: &mut W, number: usize, result: &AgentResponse) -> io::Result<()> {
    let rule = "─".repeat(WIDTH);
    writeln!(out, "\n{}", rule)?;
    writeln!(out, "Test Case {}:", number)?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "Input: {}", result.input)?;

    match &result.error {
        None => {
            writeln!(out, "\nOutput:\n{}", result.output)?;
            writeln!(out, "\nSources used: {} document chunks", result.source_documents)
        }
        Some(error) => writeln!(out, "\nError: {}", error),
    }
}

/// Fatal setup error line
pub fn write_error<W: Write>(out: &mut W, error: &dyn Display) -> io::Result<()> {
    writeln!(out, "\nError: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn render(config: &AgentConfig, results: &[AgentResponse]) -> String {
        let mut out = Vec::new();
        write_report(&mut out, config, results).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_banner_and_cases() {
        let mut config = AgentConfig::default();
        config.name = "Docs Bot".to_string();
        config.description = "Answers from docs".to_string();

        let results = vec![
            AgentResponse::success("What is X?", "X is a tool.", 3),
            AgentResponse::failure("What is Y?", Error::llm("model not found")),
        ];
        let text = render(&config, &results);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "=".repeat(80));
        assert_eq!(lines[2], "DOCS BOT");
        assert_eq!(lines[3], "Answers from docs");
        assert!(text.contains("Test Case 1:\n"));
        assert!(text.contains("Input: What is X?\n\nOutput:\nX is a tool.\n\nSources used: 3 document chunks\n"));
        assert!(text.contains("Test Case 2:\n"));
        assert!(text.contains("Input: What is Y?\n\nError: LLM error: model not found\n"));
        assert!(!text.contains("Sources used: 0"));
        assert!(text.ends_with(&format!("\n{}\n\n", "=".repeat(80))));
    }

    #[test]
    fn test_no_cases_prints_banner_only() {
        let text = render(&AgentConfig::default(), &[]);

        assert!(text.contains("RAG AGENT"));
        assert!(!text.contains("Test Case"));
    }

    #[test]
    fn test_error_line() {
        let mut out = Vec::new();
        write_error(&mut out, &Error::ConfigNotFound("missing.yaml".into())).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\nError: Configuration file not found: missing.yaml\n"
        );
    }
}
