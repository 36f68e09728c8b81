//! Core types for lint findings.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Severity levels for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Rule categories, in listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bugs,
    Style,
    Perf,
    Security,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bugs => "bugs",
            Category::Style => "style",
            Category::Perf => "perf",
            Category::Security => "security",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved source position. Lines and columns are 1-indexed; columns count bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A single finding produced by a rule.
///
/// Diagnostics are immutable once created. Build them through
/// [`AnalysisContext::diagnostic`](super::AnalysisContext::diagnostic) so the
/// positions always refer to the file being analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule: String,
    pub category: Category,
    pub severity: Severity,
    pub start: Position,
    pub end: Position,
    pub message: String,
}

impl Diagnostic {
    /// Replace the severity, for rules that grade findings individually.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Report ordering: file, then line, then column.
    pub fn cmp_position(&self, other: &Diagnostic) -> Ordering {
        (&self.start.file, self.start.line, self.start.column).cmp(&(
            &other.start.file,
            other.start.line,
            other.start.column,
        ))
    }
}

/// Sort diagnostics into stable report order.
///
/// The sort is stable, so diagnostics sharing a position keep the order the
/// walker produced them in.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| a.cmp_position(b));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(rule: &str, file: &str, line: usize, column: usize) -> Diagnostic {
        Diagnostic {
            rule: rule.to_string(),
            category: Category::Bugs,
            severity: Severity::Warning,
            start: Position::new(file, line, column),
            end: Position::new(file, line, column + 1),
            message: "m".to_string(),
        }
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("error".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!("WARN".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_sort_by_file_line_column() {
        let mut diags = vec![
            diag("a", "b.go", 1, 1),
            diag("b", "a.go", 10, 2),
            diag("c", "a.go", 2, 9),
            diag("d", "a.go", 2, 3),
        ];
        sort_diagnostics(&mut diags);

        let order: Vec<_> = diags.iter().map(|d| d.rule.as_str()).collect();
        assert_eq!(order, vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_sort_is_stable_for_same_position() {
        let mut diags = vec![diag("second", "x.go", 3, 1), diag("first", "x.go", 1, 1)];
        diags.push(diag("third", "x.go", 3, 1));
        sort_diagnostics(&mut diags);

        let order: Vec<_> = diags.iter().map(|d| d.rule.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new("main.go", 4, 2).to_string(), "main.go:4:2");
    }
}
