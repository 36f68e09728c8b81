//! Go source provider using tree-sitter.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tree_sitter::{Language, Parser, Query};

use super::semantics::SIGNATURE_QUERY;
use super::tree::first_error;
use super::{ProviderError, SemanticFacts, SourceFile, SourceProvider};
use crate::engine::hash_content;
use crate::rule::LineIndex;

/// Provides tree-sitter-go syntax trees and per-package semantic facts.
pub struct GoProvider {
    language: Language,
}

impl GoProvider {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_go::LANGUAGE.into(),
        }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Create a new parser for this thread.
    ///
    /// tree_sitter::Parser is not Sync, so each worker builds its own.
    fn create_parser(&self) -> Result<Parser, ProviderError> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    /// Parse source bytes that were already read.
    pub fn parse_source(&self, path: &Path, source: Vec<u8>) -> Result<SourceFile, ProviderError> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| ProviderError::NoTree {
                path: path.to_path_buf(),
            })?;

        if let Some(err) = first_error(tree.root_node()) {
            let pos = err.start_position();
            return Err(ProviderError::Syntax {
                path: path.to_path_buf(),
                line: pos.row + 1,
                column: pos.column + 1,
            });
        }

        Ok(SourceFile {
            path: path.to_path_buf(),
            lines: LineIndex::new(&source),
            content_hash: hash_content(&source),
            source,
            tree,
            semantics: None,
        })
    }

    fn load_file(&self, path: &Path) -> Result<SourceFile, ProviderError> {
        let source = fs::read(path).map_err(|source| ProviderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_source(path, source)
    }

    /// Attach shared package facts to every file, grouping files by directory.
    fn resolve_semantics(&self, files: &mut [SourceFile]) -> Result<(), ProviderError> {
        let query = Query::new(&self.language, SIGNATURE_QUERY)?;

        let mut packages: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
        for (idx, file) in files.iter().enumerate() {
            let dir = file.path.parent().map(Path::to_path_buf).unwrap_or_default();
            packages.entry(dir).or_default().push(idx);
        }

        for (dir, members) in packages {
            let facts = Arc::new(SemanticFacts::extract(
                &query,
                members
                    .iter()
                    .map(|&i| (files[i].path.as_path(), &files[i].tree, files[i].source.as_slice())),
            ));
            tracing::debug!(
                package = ?facts.package(),
                dir = %dir.display(),
                files = members.len(),
                "resolved package facts"
            );
            for i in members {
                files[i].semantics = Some(Arc::clone(&facts));
            }
        }

        Ok(())
    }
}

impl Default for GoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceProvider for GoProvider {
    fn load(
        &self,
        files: &[PathBuf],
        need_semantics: bool,
    ) -> Result<Vec<SourceFile>, ProviderError> {
        let mut sources = files
            .par_iter()
            .map(|path| self.load_file(path))
            .collect::<Result<Vec<_>, _>>()?;

        if need_semantics {
            self.resolve_semantics(&mut sources)?;
        }

        Ok(sources)
    }
}
