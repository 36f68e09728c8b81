//! Source model provider: turns file paths into syntax trees and semantic facts.
//!
//! This module provides:
//! - `SourceProvider` trait: the contract the engine consumes
//! - `GoProvider`: tree-sitter-go implementation
//! - `SemanticFacts`: package-level facts for rules that need more than syntax
//! - `tree`: traversal helpers
//!
//! Loading is fail-fast. If any requested file cannot be read or parsed the
//! whole load fails, because rules given partial package information produce
//! unreliable results.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tree_sitter::Tree;

use crate::rule::LineIndex;

mod go;
mod semantics;
pub mod tree;

pub use go::GoProvider;
pub use semantics::{SemanticFacts, Signature};

/// Failure to produce a source model for a requested file.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in {}:{line}:{column}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
    },

    #[error("parser produced no tree for {}", path.display())]
    NoTree { path: PathBuf },

    #[error("loading grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("compiling query: {0}")]
    Query(#[from] tree_sitter::QueryError),
}

/// One parsed source file, ready for analysis.
pub struct SourceFile {
    pub path: PathBuf,
    /// The bytes the tree was parsed from.
    pub source: Vec<u8>,
    pub tree: Tree,
    pub lines: LineIndex,
    /// Content hash of `source`.
    pub content_hash: String,
    /// Facts for the file's package, when requested.
    pub semantics: Option<Arc<SemanticFacts>>,
}

impl SourceFile {
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }
}

/// Supplies syntax trees (and optionally semantic facts) for a set of files.
pub trait SourceProvider: Send + Sync {
    /// Load every file in `files`.
    ///
    /// Returns one `SourceFile` per input path, in input order. Semantic facts
    /// are resolved only when `need_semantics` is set.
    fn load(&self, files: &[PathBuf], need_semantics: bool)
        -> Result<Vec<SourceFile>, ProviderError>;
}
