//! glint - fast, pluggable static analysis for Go.
//!
//! glint parses Go sources with tree-sitter and runs a set of rules over
//! each syntax tree in a single traversal, dispatching every node only to the
//! rules registered for its kind. Per-file results are cached on disk, keyed
//! by file content and the active rule set, so unchanged files are answered
//! without re-analysis.
//!
//! # Architecture
//!
//! - `rule`: diagnostics, the `Rule`/`FileRule` traits and the analysis context
//! - `registry`: named rule registration
//! - `parser`: the source provider (tree-sitter-go) and semantic facts
//! - `engine`: walker, result cache, runner and the `Engine` façade
//! - `rules`: built-in rules
//! - `config`, `files`, `report`, `cli`: the command-line tool
//!
//! # Adding a Rule
//!
//! Implement `Rule` (and `FileRule` for whole-file checks), then register an
//! instance with a `Registry` before building the `Engine`.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod files;
pub mod parser;
pub mod registry;
pub mod report;
pub mod rule;
pub mod rules;

pub use config::Config;
pub use engine::{CancellationToken, Engine, RunOutcome, RunStats};
pub use error::EngineError;
pub use parser::{GoProvider, SourceFile, SourceProvider};
pub use registry::Registry;
pub use rule::{AnalysisContext, Category, Diagnostic, FileRule, Position, Rule, Severity};
