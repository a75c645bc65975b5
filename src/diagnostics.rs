// ABOUTME: Diagnostic rendering: code, message, source excerpt, caret, help

use crate::error::LispError;
use crate::reader::Position;
use std::fmt;

/// One renderable report: the error, where it happened, and the
/// offending source line when the reader still has it.
pub struct Diagnostic {
    pub error: LispError,
    pub file: String,
    pub position: Position,
    pub source_line: Option<String>,
}

impl Diagnostic {
    pub fn new(
        error: LispError,
        file: impl Into<String>,
        position: Position,
        source_line: Option<&str>,
    ) -> Self {
        Diagnostic {
            error,
            file: file.into(),
            position,
            source_line: source_line.map(str::to_string),
        }
    }

    /// The formatted report: header with the canonical code, the
    /// location, the line excerpt with a caret at the column, and the
    /// help text for the kind.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self.error.code() {
            Some(code) => out.push_str(&format!("Error[{}]: {}\n", code, self.error)),
            None => out.push_str(&format!("Error: {}\n", self.error)),
        }
        out.push_str(&format!(
            "  --> {}:{}:{}\n",
            self.file, self.position.line, self.position.column
        ));
        if let Some(line) = &self.source_line {
            out.push_str(&format!("{:>4} | {}\n", self.position.line, line));
            out.push_str(&format!(
                "     | {}^\n",
                " ".repeat(self.position.column.saturating_sub(1))
            ));
        }
        if let Some(help) = self.error.help() {
            out.push_str(&format!("  Help: {}\n", help));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_code_location_caret_and_help() {
        let diag = Diagnostic::new(
            LispError::NotFound("Unbound identifier x".to_string()),
            "repl",
            Position { line: 3, column: 8 },
            Some("(print x)"),
        );
        let report = diag.render();
        assert!(report.starts_with("Error[E200]: Unbound identifier x"));
        assert!(report.contains("--> repl:3:8"));
        assert!(report.contains("   3 | (print x)"));
        let caret_line = format!("     | {}^", " ".repeat(7));
        assert!(report.lines().any(|l| l == caret_line));
        assert!(report.contains("Help:"));
    }

    #[test]
    fn test_render_without_excerpt() {
        let diag = Diagnostic::new(
            LispError::PoorlyFormedExpression,
            "m.mlisp",
            Position { line: 1, column: 1 },
            None,
        );
        let report = diag.render();
        assert!(report.contains("--> m.mlisp:1:1"));
        assert!(!report.contains(" | "));
    }
}
