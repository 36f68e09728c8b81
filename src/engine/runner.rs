//! Bounded-concurrency scheduling of file units.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use serde::Serialize;

use super::cache::{hash_content, ResultCache};
use super::cancel::CancellationToken;
use super::walker::Walker;
use crate::error::Result;
use crate::parser::SourceFile;
use crate::rule::{sort_diagnostics, AnalysisContext, Diagnostic};

/// Counters describing one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Files walked because the cache missed.
    pub analyzed: usize,
    /// Files answered from the cache.
    pub cached: usize,
    /// Files that could not be read at analysis time.
    pub skipped: usize,
    /// Files never started because the run was cancelled.
    pub not_dispatched: usize,
}

/// Result of a run: diagnostics in report order, plus what happened.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub stats: RunStats,
    /// Set when cancellation stopped dispatch before every unit started.
    pub cancelled: bool,
}

/// Resolve a configured concurrency limit; zero means one worker per CPU.
pub fn resolve_concurrency(limit: usize) -> usize {
    if limit == 0 {
        num_cpus::get().max(1)
    } else {
        limit
    }
}

/// Drives the walker and cache across file units on a fixed-size pool.
pub struct Runner {
    pool: rayon::ThreadPool,
    concurrency: usize,
}

impl Runner {
    /// Create a runner with at most `limit` concurrent file analyses.
    pub fn new(limit: usize) -> Result<Self> {
        let concurrency = resolve_concurrency(limit);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("glint-worker-{}", i))
            .build()?;
        Ok(Self { pool, concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `op` on this runner's pool so any parallel work inside it is
    /// bounded by the same limit.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Analyze every unit, consulting `cache` before walking.
    ///
    /// Cancellation is checked before each unit starts; units already in
    /// flight run to completion so no cache entry is left half-written.
    pub fn run(
        &self,
        walker: &Walker,
        cache: &ResultCache,
        fingerprint: &str,
        units: &[SourceFile],
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let results: Mutex<Vec<Diagnostic>> = Mutex::new(Vec::new());
        let analyzed = AtomicUsize::new(0);
        let cached = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let not_dispatched = AtomicUsize::new(0);

        self.pool.install(|| {
            units.par_iter().for_each(|unit| {
                if cancel.is_cancelled() {
                    not_dispatched.fetch_add(1, Ordering::Relaxed);
                    return;
                }

                let diagnostics = match analyze_unit(walker, cache, fingerprint, unit) {
                    UnitResult::Cached(d) => {
                        cached.fetch_add(1, Ordering::Relaxed);
                        d
                    }
                    UnitResult::Analyzed(d) => {
                        analyzed.fetch_add(1, Ordering::Relaxed);
                        d
                    }
                    UnitResult::Skipped => {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                };

                if !diagnostics.is_empty() {
                    results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend(diagnostics);
                }
            });
        });

        let mut diagnostics = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        sort_diagnostics(&mut diagnostics);

        let stats = RunStats {
            analyzed: analyzed.into_inner(),
            cached: cached.into_inner(),
            skipped: skipped.into_inner(),
            not_dispatched: not_dispatched.into_inner(),
        };
        let cancelled = stats.not_dispatched > 0;
        if cancelled {
            tracing::warn!(
                remaining = stats.not_dispatched,
                "run cancelled before all files were analyzed"
            );
        }
        tracing::info!(
            files = units.len(),
            analyzed = stats.analyzed,
            cached = stats.cached,
            skipped = stats.skipped,
            diagnostics = diagnostics.len(),
            "run complete"
        );

        RunOutcome {
            diagnostics,
            stats,
            cancelled,
        }
    }
}

enum UnitResult {
    Cached(Vec<Diagnostic>),
    Analyzed(Vec<Diagnostic>),
    Skipped,
}

fn analyze_unit(
    walker: &Walker,
    cache: &ResultCache,
    fingerprint: &str,
    unit: &SourceFile,
) -> UnitResult {
    let content = match fs::read(&unit.path) {
        Ok(content) => content,
        Err(err) => {
            tracing::debug!(path = %unit.path.display(), error = %err, "skipping unreadable file");
            return UnitResult::Skipped;
        }
    };
    let content_hash = hash_content(&content);
    let entry_hash = validity_hash(&content_hash, unit);

    if let Some(diagnostics) = cache.lookup(&unit.path, &entry_hash, fingerprint) {
        tracing::debug!(path = %unit.path.display(), "cache hit");
        return UnitResult::Cached(diagnostics);
    }
    tracing::debug!(path = %unit.path.display(), "cache miss");

    let ctx = AnalysisContext::from_source(unit);
    let diagnostics = walker.walk(&ctx);

    // The tree was parsed from different bytes than are on disk now; the
    // result is still reported but must not be keyed to the new content.
    if content_hash == unit.content_hash {
        cache.store(&unit.path, &entry_hash, fingerprint, &diagnostics);
    } else {
        tracing::debug!(path = %unit.path.display(), "content changed since parse; not caching");
    }

    UnitResult::Analyzed(diagnostics)
}

/// Hash a cache entry is valid for.
///
/// With package facts attached, results can depend on sibling files, so the
/// facts digest is folded into the file's own content hash.
fn validity_hash(content_hash: &str, unit: &SourceFile) -> String {
    match &unit.semantics {
        Some(facts) => hash_content(format!("{}\0{}", content_hash, facts.digest()).as_bytes()),
        None => content_hash.to_string(),
    }
}
