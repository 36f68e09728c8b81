//! Error types for engine construction and runs.
//!
//! Only configuration and source-loading failures surface as errors. Per-file
//! read failures and cache failures are absorbed where they happen.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::parser::ProviderError;

/// Fatal engine errors. Every variant aborts before any file is scheduled.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration selected no rules.
    #[error("no rules enabled; enable rules in .glint.yml or use --enable-all")]
    NoRulesEnabled,

    /// The configuration could not be applied (e.g., a malformed rule option).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Two rules were registered under the same name.
    #[error("duplicate rule registration: {name}")]
    DuplicateRule { name: String },

    /// Syntax or semantic resolution failed for a requested file.
    #[error("loading sources: {0}")]
    Provider(#[from] ProviderError),

    /// The cache directory could not be created.
    #[error("initializing cache at {}: {source}", dir.display())]
    CacheInit {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be started.
    #[error("starting worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
