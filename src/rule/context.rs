//! Per-file analysis context handed to every rule invocation.

use std::path::Path;

use tree_sitter::{Node, Tree};

use super::{Diagnostic, Position, Rule};
use crate::parser::{SemanticFacts, SourceFile};

/// Byte offset to line/column resolution for one source file.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset at which each line starts. Always begins with 0.
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &[u8]) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .iter()
                .enumerate()
                .filter(|(_, &b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// Resolve a byte offset to a 1-indexed (line, column) pair.
    ///
    /// Offsets past the end of the file clamp to the end.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.len);
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        (line, column)
    }

    /// Byte offset of the first byte of a 1-indexed line.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        line.checked_sub(1)
            .and_then(|idx| self.line_starts.get(idx))
            .copied()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Read-only bundle describing the file under analysis.
///
/// A context is built once per file and shared by every rule that runs on
/// that file. Rules never mutate it; they communicate only by returning
/// diagnostics.
pub struct AnalysisContext<'a> {
    path: &'a Path,
    file: String,
    tree: &'a Tree,
    source: &'a [u8],
    lines: &'a LineIndex,
    semantics: Option<&'a SemanticFacts>,
    content_hash: &'a str,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        path: &'a Path,
        tree: &'a Tree,
        source: &'a [u8],
        lines: &'a LineIndex,
        content_hash: &'a str,
    ) -> Self {
        Self {
            path,
            file: path.to_string_lossy().to_string(),
            tree,
            source,
            lines,
            semantics: None,
            content_hash,
        }
    }

    /// Build a context over a file loaded by a source provider.
    pub fn from_source(source: &'a SourceFile) -> Self {
        Self::new(
            &source.path,
            &source.tree,
            &source.source,
            &source.lines,
            &source.content_hash,
        )
        .with_semantics(source.semantics.as_deref())
    }

    pub fn with_semantics(mut self, semantics: Option<&'a SemanticFacts>) -> Self {
        self.semantics = semantics;
        self
    }

    pub fn path(&self) -> &'a Path {
        self.path
    }

    /// The path as it appears in diagnostics.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn root(&self) -> Node<'a> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &'a [u8] {
        self.source
    }

    pub fn source_str(&self) -> &'a str {
        std::str::from_utf8(self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }

    /// Semantic facts, present only when the active rule set asked for them.
    pub fn semantics(&self) -> Option<&'a SemanticFacts> {
        self.semantics
    }

    pub fn content_hash(&self) -> &'a str {
        self.content_hash
    }

    pub fn lines(&self) -> &'a LineIndex {
        self.lines
    }

    /// Resolve a byte offset within this file to a position.
    pub fn position(&self, offset: usize) -> Position {
        let (line, column) = self.lines.line_col(offset);
        Position::new(self.file.clone(), line, column)
    }

    /// Create a diagnostic for `rule` spanning `node`.
    pub fn diagnostic(
        &self,
        rule: &dyn Rule,
        node: Node<'_>,
        message: impl Into<String>,
    ) -> Diagnostic {
        self.diagnostic_at(rule, node.start_byte(), node.end_byte(), message)
    }

    /// Create a diagnostic for `rule` spanning a byte range.
    pub fn diagnostic_at(
        &self,
        rule: &dyn Rule,
        start: usize,
        end: usize,
        message: impl Into<String>,
    ) -> Diagnostic {
        Diagnostic {
            rule: rule.name().to_string(),
            category: rule.category(),
            severity: rule.severity(),
            start: self.position(start),
            end: self.position(end),
            message: message.into(),
        }
    }
}
