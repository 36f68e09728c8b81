//! Integration tests for the engine: caching, scheduling and isolation.
//!
//! Sources are written to temporary directories; instrumented rules count
//! their invocations so cache behavior can be observed directly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;
use tree_sitter::Node;

use glint::config::Config;
use glint::parser::ProviderError;
use glint::rules::{self, UncheckedError};
use glint::{
    AnalysisContext, CancellationToken, Category, Diagnostic, Engine, EngineError, FileRule,
    GoProvider, Registry, Rule, Severity, SourceFile, SourceProvider,
};

/// Reports every node of one kind and counts how often it is called.
struct CountingRule {
    name: &'static str,
    kind: &'static str,
    calls: Arc<AtomicUsize>,
}

impl CountingRule {
    fn new(name: &'static str, kind: &'static str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let rule = Self {
            name,
            kind,
            calls: Arc::clone(&calls),
        };
        (rule, calls)
    }
}

impl Rule for CountingRule {
    fn name(&self) -> &str {
        self.name
    }

    fn category(&self) -> Category {
        Category::Bugs
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &str {
        "counts nodes"
    }

    fn node_kinds(&self) -> &[&'static str] {
        std::slice::from_ref(&self.kind)
    }

    fn check(&self, ctx: &AnalysisContext<'_>, node: Node<'_>) -> Vec<Diagnostic> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(node.kind(), self.kind);
        vec![ctx.diagnostic(self, node, format!("saw {}", self.kind))]
    }
}

/// Whole-file rule tracking how many files are analyzed at once.
struct ConcurrencyGuard {
    in_flight: AtomicUsize,
    peak: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl Rule for ConcurrencyGuard {
    fn name(&self) -> &str {
        "concurrency-guard"
    }

    fn category(&self) -> Category {
        Category::Perf
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn description(&self) -> &str {
        "tracks concurrent analyses"
    }

    fn as_file_rule(&self) -> Option<&dyn FileRule> {
        Some(self)
    }
}

impl FileRule for ConcurrencyGuard {
    fn check_file(&self, _ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Vec::new()
    }
}

struct Panicking;

impl Rule for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    fn category(&self) -> Category {
        Category::Bugs
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &str {
        "always panics"
    }

    fn node_kinds(&self) -> &[&'static str] {
        &["function_declaration"]
    }

    fn check(&self, _ctx: &AnalysisContext<'_>, _node: Node<'_>) -> Vec<Diagnostic> {
        panic!("rule bug")
    }
}

/// Whole-file rule that cancels the run from inside the first file it sees.
struct CancelsRun {
    token: CancellationToken,
}

impl Rule for CancelsRun {
    fn name(&self) -> &str {
        "cancels-run"
    }

    fn category(&self) -> Category {
        Category::Bugs
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn description(&self) -> &str {
        "cancels the run mid-file"
    }

    fn as_file_rule(&self) -> Option<&dyn FileRule> {
        Some(self)
    }
}

impl FileRule for CancelsRun {
    fn check_file(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        self.token.cancel();
        thread::sleep(Duration::from_millis(10));
        vec![ctx.diagnostic_at(self, 0, 7, "finished after cancel")]
    }
}

/// Go provider recording which thread loads sources.
struct RecordingProvider {
    threads: Arc<Mutex<Vec<String>>>,
}

impl SourceProvider for RecordingProvider {
    fn load(&self, files: &[PathBuf], need_semantics: bool) -> Result<Vec<SourceFile>, ProviderError> {
        let name = thread::current().name().unwrap_or("").to_string();
        self.threads.lock().unwrap().push(name);
        GoProvider::new().load(files, need_semantics)
    }
}

/// Go provider that deletes one file after parsing it.
struct DeletingProvider {
    victim: PathBuf,
}

impl SourceProvider for DeletingProvider {
    fn load(&self, files: &[PathBuf], need_semantics: bool) -> Result<Vec<SourceFile>, ProviderError> {
        let sources = GoProvider::new().load(files, need_semantics)?;
        fs::remove_file(&self.victim).unwrap();
        Ok(sources)
    }
}

struct Workspace {
    src: TempDir,
    cache: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            src: TempDir::new().unwrap(),
            cache: TempDir::new().unwrap(),
        }
    }

    fn write(&self, name: &str, source: &str) -> PathBuf {
        let path = self.src.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, source).unwrap();
        path
    }

    /// Config enabling `rules` with the cache in this workspace.
    fn config(&self, rules: &[&str]) -> Config {
        let mut config = Config::with_rules(rules.iter().copied());
        config.cache.dir = Some(self.cache.path().to_path_buf());
        config
    }

    fn cache_entries(&self) -> usize {
        fs::read_dir(self.cache.path())
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }
}

fn go_file(functions: usize) -> String {
    let mut source = String::from("package sample\n\n");
    for i in 0..functions {
        source.push_str(&format!("func f{}() {{\n\tg()\n\th()\n}}\n\n", i));
    }
    source.push_str("func g() {}\nfunc h() {}\n");
    source
}

fn registry_with(rules: Vec<Arc<dyn Rule>>) -> Registry {
    let registry = Registry::new();
    for rule in rules {
        registry.register(rule).unwrap();
    }
    registry
}

fn run(engine: &Engine, files: &[PathBuf]) -> glint::RunOutcome {
    engine.run(files, &CancellationToken::new()).unwrap()
}

#[test]
fn test_repeated_runs_are_identical() {
    let ws = Workspace::new();
    let files: Vec<_> = (0..12)
        .map(|i| ws.write(&format!("pkg{}/f{}.go", i % 3, i), &go_file(i % 4 + 1)))
        .collect();
    let (calls_rule, _) = CountingRule::new("calls", "call_expression");
    let (funcs_rule, _) = CountingRule::new("funcs", "function_declaration");
    let registry = registry_with(vec![Arc::new(calls_rule), Arc::new(funcs_rule)]);

    let mut config = ws.config(&["calls", "funcs"]);
    config.cache.enabled = false;
    config.concurrency = 4;
    let engine = Engine::new(&config, &registry).unwrap();

    let first = run(&engine, &files);
    assert!(!first.diagnostics.is_empty());
    for _ in 0..3 {
        let mut reversed = files.clone();
        reversed.reverse();
        assert_eq!(run(&engine, &reversed).diagnostics, first.diagnostics);
    }
}

#[test]
fn test_results_independent_of_concurrency() {
    let ws = Workspace::new();
    let files: Vec<_> = (0..16)
        .map(|i| ws.write(&format!("pkg{}/f{}.go", i % 4, i), &go_file(i % 5 + 1)))
        .collect();
    let (calls_rule, _) = CountingRule::new("calls", "call_expression");
    let (funcs_rule, _) = CountingRule::new("funcs", "function_declaration");
    let registry = registry_with(vec![Arc::new(calls_rule), Arc::new(funcs_rule)]);

    let outcomes: Vec<_> = [1, 8]
        .into_iter()
        .map(|limit| {
            let mut config = ws.config(&["calls", "funcs"]);
            config.cache.enabled = false;
            config.concurrency = limit;
            run(&Engine::new(&config, &registry).unwrap(), &files)
        })
        .collect();

    assert!(!outcomes[0].diagnostics.is_empty());
    assert_eq!(outcomes[0].diagnostics, outcomes[1].diagnostics);
    assert_eq!(outcomes[0].stats, outcomes[1].stats);
}

#[test]
fn test_cache_hit_invokes_no_rules() {
    let ws = Workspace::new();
    let file = ws.write("main.go", &go_file(2));
    let (rule, calls) = CountingRule::new("calls", "call_expression");
    let registry = registry_with(vec![Arc::new(rule)]);
    let engine = Engine::new(&ws.config(&["calls"]), &registry).unwrap();

    let first = run(&engine, &[file.clone()]);
    assert_eq!(first.stats.analyzed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(ws.cache_entries(), 1);

    let second = run(&engine, &[file]);
    assert_eq!(second.stats.cached, 1);
    assert_eq!(second.stats.analyzed, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(second.diagnostics, first.diagnostics);
}

#[test]
fn test_cache_survives_new_engine() {
    let ws = Workspace::new();
    let file = ws.write("main.go", &go_file(1));
    let (rule, calls) = CountingRule::new("calls", "call_expression");
    let registry = registry_with(vec![Arc::new(rule)]);
    let config = ws.config(&["calls"]);

    let first = run(&Engine::new(&config, &registry).unwrap(), &[file.clone()]);
    let second = run(&Engine::new(&config, &registry).unwrap(), &[file]);
    assert_eq!(second.stats.cached, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(second.diagnostics, first.diagnostics);
}

#[test]
fn test_content_change_invalidates() {
    let ws = Workspace::new();
    let file = ws.write("main.go", &go_file(1));
    let (rule, calls) = CountingRule::new("calls", "call_expression");
    let registry = registry_with(vec![Arc::new(rule)]);
    let engine = Engine::new(&ws.config(&["calls"]), &registry).unwrap();

    run(&engine, &[file.clone()]);
    let before = calls.load(Ordering::SeqCst);

    let mut source = fs::read(&file).unwrap();
    source.push(b'\n');
    fs::write(&file, source).unwrap();

    let outcome = run(&engine, &[file]);
    assert_eq!(outcome.stats.analyzed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), before * 2);
}

#[test]
fn test_rule_set_change_invalidates() {
    let ws = Workspace::new();
    let file = ws.write("main.go", &go_file(1));
    let (calls_rule, calls) = CountingRule::new("calls", "call_expression");
    let (funcs_rule, _) = CountingRule::new("funcs", "function_declaration");
    let registry = registry_with(vec![Arc::new(calls_rule), Arc::new(funcs_rule)]);

    let narrow = Engine::new(&ws.config(&["calls"]), &registry).unwrap();
    let wide = Engine::new(&ws.config(&["calls", "funcs"]), &registry).unwrap();
    assert_ne!(narrow.fingerprint(), wide.fingerprint());

    run(&narrow, &[file.clone()]);
    let outcome = run(&wide, &[file]);
    assert_eq!(outcome.stats.analyzed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(outcome.diagnostics.iter().any(|d| d.rule == "funcs"));
}

#[test]
fn test_rule_option_change_invalidates() {
    let ws = Workspace::new();
    let file = ws.write("main.go", "package main\n\n// a comment that is fairly long\n");

    let options = |max: usize| {
        let mut config = ws.config(&["line-length"]);
        config
            .rules
            .get_mut("line-length")
            .unwrap()
            .options
            .insert("max".to_string(), serde_yaml::Value::from(max));
        config
    };

    let strict_config = options(20);
    let strict_registry = Registry::new();
    rules::register_builtin(&strict_registry, &strict_config).unwrap();
    let strict = Engine::new(&strict_config, &strict_registry).unwrap();
    assert_eq!(run(&strict, &[file.clone()]).diagnostics.len(), 1);

    let lax_config = options(100);
    let lax_registry = Registry::new();
    rules::register_builtin(&lax_registry, &lax_config).unwrap();
    let lax = Engine::new(&lax_config, &lax_registry).unwrap();
    let outcome = run(&lax, &[file]);
    assert_eq!(outcome.stats.cached, 0);
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn test_concurrency_limit_is_respected() {
    let ws = Workspace::new();
    let files: Vec<_> = (0..16)
        .map(|i| ws.write(&format!("f{}.go", i), &go_file(1)))
        .collect();
    let peak = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let guard = ConcurrencyGuard {
        in_flight: AtomicUsize::new(0),
        peak: Arc::clone(&peak),
        calls: Arc::clone(&calls),
    };
    let registry = registry_with(vec![Arc::new(guard)]);

    let mut config = ws.config(&["concurrency-guard"]);
    config.cache.enabled = false;
    config.concurrency = 2;
    let engine = Engine::new(&config, &registry).unwrap();

    let outcome = run(&engine, &files);
    assert_eq!(outcome.stats.analyzed, 16);
    assert_eq!(calls.load(Ordering::SeqCst), 16);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak concurrency {}", peak);
}

#[test]
fn test_whole_file_rule_runs_once_per_file() {
    let ws = Workspace::new();
    let files = vec![ws.write("a.go", &go_file(3)), ws.write("b.go", &go_file(5))];
    let calls = Arc::new(AtomicUsize::new(0));
    let guard = ConcurrencyGuard {
        in_flight: AtomicUsize::new(0),
        peak: Arc::new(AtomicUsize::new(0)),
        calls: Arc::clone(&calls),
    };
    let registry = registry_with(vec![Arc::new(guard)]);
    let mut config = ws.config(&["concurrency-guard"]);
    config.cache.enabled = false;
    let engine = Engine::new(&config, &registry).unwrap();

    run(&engine, &files);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_rules_see_only_their_kinds() {
    let ws = Workspace::new();
    let file = ws.write("main.go", &go_file(2));
    let (funcs_rule, funcs) = CountingRule::new("funcs", "function_declaration");
    let registry = registry_with(vec![Arc::new(funcs_rule)]);
    let mut config = ws.config(&["funcs"]);
    config.cache.enabled = false;
    let engine = Engine::new(&config, &registry).unwrap();

    let outcome = run(&engine, &[file]);
    // f0, f1, g, h
    assert_eq!(funcs.load(Ordering::SeqCst), 4);
    assert!(outcome
        .diagnostics
        .iter()
        .all(|d| d.message == "saw function_declaration"));
}

#[test]
fn test_duplicate_registration_fails() {
    let registry = Registry::new();
    let (first, _) = CountingRule::new("dup", "call_expression");
    let (second, _) = CountingRule::new("dup", "function_declaration");
    registry.register(Arc::new(first)).unwrap();
    let err = registry.register(Arc::new(second)).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateRule { ref name } if name == "dup"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unchecked_error_end_to_end() {
    let ws = Workspace::new();
    let file = ws.write(
        "main.go",
        "package main\n\nfunc save() error { return nil }\n\nfunc main() {\n\tsave()\n}\n",
    );
    let registry = registry_with(vec![Arc::new(UncheckedError)]);

    let mut uncached = ws.config(&["unchecked-error"]);
    uncached.cache.enabled = false;
    let outcome = run(&Engine::new(&uncached, &registry).unwrap(), &[file.clone()]);
    assert_eq!(outcome.diagnostics.len(), 1);
    let diagnostic = &outcome.diagnostics[0];
    assert_eq!(diagnostic.rule, "unchecked-error");
    assert_eq!((diagnostic.start.line, diagnostic.start.column), (6, 2));
    assert_eq!((diagnostic.end.line, diagnostic.end.column), (6, 8));
    assert_eq!(diagnostic.severity, Severity::Error);

    let cached = Engine::new(&ws.config(&["unchecked-error"]), &registry).unwrap();
    let first = run(&cached, &[file.clone()]);
    let second = run(&cached, &[file]);
    assert_eq!(first.diagnostics, outcome.diagnostics);
    assert_eq!(second.stats.cached, 1);
    assert_eq!(second.diagnostics, outcome.diagnostics);
}

#[test]
fn test_cancelled_run_dispatches_nothing() {
    let ws = Workspace::new();
    let files: Vec<_> = (0..4)
        .map(|i| ws.write(&format!("f{}.go", i), &go_file(1)))
        .collect();
    let (rule, calls) = CountingRule::new("calls", "call_expression");
    let registry = registry_with(vec![Arc::new(rule)]);
    let engine = Engine::new(&ws.config(&["calls"]), &registry).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = engine.run(&files, &cancel).unwrap();
    assert!(outcome.cancelled);
    assert_eq!(outcome.stats.not_dispatched, 4);
    assert!(outcome.diagnostics.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ws.cache_entries(), 0);
}

#[test]
fn test_cancel_during_run_keeps_in_flight_results() {
    let ws = Workspace::new();
    let files: Vec<_> = (0..6)
        .map(|i| ws.write(&format!("f{}.go", i), &go_file(1)))
        .collect();
    let token = CancellationToken::new();
    let rule = CancelsRun {
        token: token.clone(),
    };
    let registry = registry_with(vec![Arc::new(rule)]);
    let mut config = ws.config(&["cancels-run"]);
    config.concurrency = 1;
    let engine = Engine::new(&config, &registry).unwrap();

    let outcome = engine.run(&files, &token).unwrap();
    assert!(outcome.cancelled);
    assert_eq!(outcome.stats.analyzed, 1);
    assert_eq!(outcome.stats.not_dispatched, 5);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].message, "finished after cancel");
    assert_eq!(ws.cache_entries(), 1);

    // The in-flight file's entry is complete and serves the next run.
    let rerun = run(&engine, &files);
    assert!(!rerun.cancelled);
    assert_eq!(rerun.stats.cached, 1);
    assert_eq!(rerun.stats.analyzed, 5);
    let finished = &outcome.diagnostics[0].start.file;
    let cached: Vec<_> = rerun
        .diagnostics
        .iter()
        .filter(|d| &d.start.file == finished)
        .collect();
    assert_eq!(cached, vec![&outcome.diagnostics[0]]);
}

#[test]
fn test_sibling_signature_change_invalidates() {
    let ws = Workspace::new();
    let caller = ws.write("a.go", "package main\n\nfunc main() {\n\tpersist()\n}\n");
    let callee = ws.write("b.go", "package main\n\nfunc persist() error { return nil }\n");
    let files = vec![caller.clone(), callee.clone()];
    let registry = registry_with(vec![Arc::new(UncheckedError)]);
    let engine = Engine::new(&ws.config(&["unchecked-error"]), &registry).unwrap();

    let first = run(&engine, &files);
    assert_eq!(first.diagnostics.len(), 1);
    assert_eq!(Path::new(&first.diagnostics[0].start.file), caller);

    fs::write(&callee, "package main\n\nfunc persist() {}\n").unwrap();
    let second = run(&engine, &files);
    assert_eq!(second.stats.analyzed, 2);
    assert!(second.diagnostics.is_empty());

    // A body-only edit leaves the package facts, and the caller's entry, intact.
    fs::write(&callee, "package main\n\nfunc persist() { println() }\n").unwrap();
    let third = run(&engine, &files);
    assert_eq!(third.stats.cached, 1);
    assert_eq!(third.stats.analyzed, 1);
    assert!(third.diagnostics.is_empty());
}

#[test]
fn test_sources_load_on_worker_pool() {
    let ws = Workspace::new();
    let files = vec![ws.write("a.go", &go_file(1)), ws.write("b.go", &go_file(2))];
    let (rule, _) = CountingRule::new("calls", "call_expression");
    let registry = registry_with(vec![Arc::new(rule)]);
    let threads = Arc::new(Mutex::new(Vec::new()));
    let mut config = ws.config(&["calls"]);
    config.concurrency = 1;
    let engine = Engine::with_provider(
        &config,
        &registry,
        Box::new(RecordingProvider {
            threads: Arc::clone(&threads),
        }),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let skipped = engine.run(&files, &cancel).unwrap();
    assert!(skipped.cancelled);
    assert_eq!(skipped.stats.not_dispatched, 2);
    assert!(threads.lock().unwrap().is_empty());

    let outcome = run(&engine, &files);
    assert_eq!(outcome.stats.analyzed, 2);
    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert!(threads[0].starts_with("glint-worker-"), "loaded on {:?}", threads[0]);
}

#[test]
fn test_unreadable_file_is_skipped() {
    let ws = Workspace::new();
    let keep = ws.write("keep.go", &go_file(1));
    let gone = ws.write("gone.go", &go_file(1));
    let (rule, _) = CountingRule::new("calls", "call_expression");
    let registry = registry_with(vec![Arc::new(rule)]);
    let engine = Engine::with_provider(
        &ws.config(&["calls"]),
        &registry,
        Box::new(DeletingProvider {
            victim: gone.clone(),
        }),
    )
    .unwrap();

    let outcome = run(&engine, &[keep.clone(), gone]);
    assert_eq!(outcome.stats.skipped, 1);
    assert_eq!(outcome.stats.analyzed, 1);
    assert!(!outcome.cancelled);
    assert!(outcome
        .diagnostics
        .iter()
        .all(|d| Path::new(&d.start.file) == keep));
}

#[test]
fn test_panicking_rule_is_isolated() {
    let ws = Workspace::new();
    let file = ws.write("main.go", &go_file(1));
    let (rule, calls) = CountingRule::new("calls", "call_expression");
    let registry = registry_with(vec![Arc::new(rule), Arc::new(Panicking)]);
    let mut config = ws.config(&["calls", "panicking"]);
    config.cache.enabled = false;
    let engine = Engine::new(&config, &registry).unwrap();

    let outcome = run(&engine, &[file]);
    let panics: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.rule == "panicking")
        .collect();
    // f0, g, h
    assert_eq!(panics.len(), 3);
    assert!(panics.iter().all(|d| d.severity == Severity::Error));
    assert!(panics[0].message.contains("rule bug"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_clear_cache() {
    let ws = Workspace::new();
    let files = vec![ws.write("a.go", &go_file(1)), ws.write("b.go", &go_file(1))];
    let (rule, _) = CountingRule::new("calls", "call_expression");
    let registry = registry_with(vec![Arc::new(rule)]);
    let engine = Engine::new(&ws.config(&["calls"]), &registry).unwrap();

    run(&engine, &files);
    assert_eq!(ws.cache_entries(), 2);
    assert_eq!(engine.clear_cache().unwrap(), 2);
    assert_eq!(ws.cache_entries(), 0);
    assert_eq!(run(&engine, &files).stats.analyzed, 2);
}
