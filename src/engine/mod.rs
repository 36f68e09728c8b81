//! The analysis engine.
//!
//! This module provides:
//! - `Walker`: single-pass dispatch of syntax nodes to interested rules
//! - `ResultCache`: content-addressed per-file result cache
//! - `Runner`: bounded-concurrency scheduling and deterministic merging
//! - `Engine`: ties rule selection, source loading, caching and scheduling together

mod cache;
mod cancel;
mod pool;
mod runner;
mod walker;

pub use cache::{cache_key, clear_dir, default_cache_dir, hash_content, ResultCache};
pub use cancel::CancellationToken;
pub use pool::BufferPool;
pub use runner::{resolve_concurrency, RunOutcome, RunStats, Runner};
pub use walker::Walker;

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::parser::{GoProvider, SourceProvider};
use crate::registry::Registry;
use crate::rule::{Rule, Severity};

/// Hex characters kept from the rule-set digest.
const FINGERPRINT_LEN: usize = 16;

/// Fingerprint of a set of rule tokens, independent of their order.
///
/// Each token is length-prefixed, so no two distinct token sets hash the
/// same input.
pub fn fingerprint_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut sorted: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    for token in sorted {
        hasher.update((token.len() as u64).to_le_bytes());
        hasher.update(token.as_bytes());
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

/// Fingerprint of the active rule set.
///
/// Each rule contributes its name, plus its options digest when it has one,
/// so changing an option invalidates cached results like changing the set.
pub fn rule_set_fingerprint(rules: &[Arc<dyn Rule>]) -> String {
    let tokens: Vec<String> = rules
        .iter()
        .map(|rule| match rule.options_digest() {
            Some(digest) => format!("{}:{}={}", rule.name().len(), rule.name(), digest),
            None => format!("{}:{}", rule.name().len(), rule.name()),
        })
        .collect();
    fingerprint_tokens(&tokens)
}

/// Registry rules selected by `config`, sorted by name.
pub fn select_active_rules(registry: &Registry, config: &Config) -> Vec<Arc<dyn Rule>> {
    registry
        .sorted()
        .into_iter()
        .filter(|rule| config.is_rule_active(rule.name()))
        .collect()
}

/// A configured analysis engine.
pub struct Engine {
    rules: Vec<Arc<dyn Rule>>,
    walker: Walker,
    cache: ResultCache,
    runner: Runner,
    fingerprint: String,
    provider: Box<dyn SourceProvider>,
    needs_semantics: bool,
    severity_overrides: HashMap<String, Severity>,
}

impl Engine {
    /// Build an engine for Go sources over the rules `config` selects.
    pub fn new(config: &Config, registry: &Registry) -> Result<Self> {
        Self::with_provider(config, registry, Box::new(GoProvider::new()))
    }

    /// Build an engine with a custom source provider.
    ///
    /// Fails if the configuration selects no rules, or the cache or worker
    /// pool cannot be set up.
    pub fn with_provider(
        config: &Config,
        registry: &Registry,
        provider: Box<dyn SourceProvider>,
    ) -> Result<Self> {
        let rules = select_active_rules(registry, config);
        if rules.is_empty() {
            return Err(EngineError::NoRulesEnabled);
        }

        let cache = if config.cache.enabled {
            match config.cache_dir().or_else(default_cache_dir) {
                Some(dir) => ResultCache::open(dir)?,
                None => {
                    tracing::warn!("no cache directory available; caching disabled");
                    ResultCache::disabled()
                }
            }
        } else {
            ResultCache::disabled()
        };

        let fingerprint = rule_set_fingerprint(&rules);
        let needs_semantics = rules.iter().any(|r| r.needs_semantic_facts());
        let severity_overrides = rules
            .iter()
            .filter_map(|r| {
                config
                    .severity_override(r.name())
                    .map(|s| (r.name().to_string(), s))
            })
            .collect();

        let runner = Runner::new(config.concurrency_limit())?;
        tracing::debug!(
            rules = rules.len(),
            %fingerprint,
            needs_semantics,
            concurrency = runner.concurrency(),
            cache = cache.is_enabled(),
            "engine ready"
        );

        Ok(Self {
            walker: Walker::new(&rules),
            rules,
            cache,
            runner,
            fingerprint,
            provider,
            needs_semantics,
            severity_overrides,
        })
    }

    /// Analyze `files` and return their diagnostics in report order.
    ///
    /// Sources are loaded up front on the worker pool; a provider failure
    /// aborts the run before any file is scheduled. A token that has already
    /// fired skips loading entirely.
    pub fn run(&self, files: &[PathBuf], cancel: &CancellationToken) -> Result<RunOutcome> {
        let mut files = files.to_vec();
        files.sort();
        files.dedup();

        if cancel.is_cancelled() {
            tracing::warn!(files = files.len(), "run cancelled before loading sources");
            return Ok(RunOutcome {
                diagnostics: Vec::new(),
                stats: RunStats {
                    not_dispatched: files.len(),
                    ..Default::default()
                },
                cancelled: true,
            });
        }

        let provider = &self.provider;
        let needs_semantics = self.needs_semantics;
        let units = self
            .runner
            .install(|| provider.load(&files, needs_semantics))?;
        let mut outcome =
            self.runner
                .run(&self.walker, &self.cache, &self.fingerprint, &units, cancel);

        if !self.severity_overrides.is_empty() {
            for diagnostic in &mut outcome.diagnostics {
                if let Some(&severity) = self.severity_overrides.get(&diagnostic.rule) {
                    diagnostic.severity = severity;
                }
            }
        }

        Ok(outcome)
    }

    /// Remove every persisted cache entry.
    pub fn clear_cache(&self) -> io::Result<usize> {
        self.cache.clear()
    }

    /// Active rules, sorted by name.
    pub fn active_rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }
}
