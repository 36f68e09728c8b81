//! Command-line interface for glint.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Config, OutputFormat, CONFIG_FILE_NAMES};
use crate::engine::{clear_dir, default_cache_dir, CancellationToken, Engine, RunOutcome};
use crate::files::{collect_files, Discovery};
use crate::registry::{self, Registry};
use crate::report::Report;
use crate::rule::Rule;
use crate::rules;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Config file written by `glint init`.
const DEFAULT_CONFIG_NAME: &str = ".glint.yml";

/// Fast, pluggable static analysis for Go.
///
/// glint parses Go sources with tree-sitter, runs every enabled rule in a
/// single pass over each syntax tree, and caches per-file results keyed by
/// content and rule set.
#[derive(Parser)]
#[command(name = "glint")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze Go files and report diagnostics
    #[command(visible_alias = "check")]
    Run(RunArgs),
    /// List the available rules
    Rules(RulesArgs),
    /// Write a config file enabling every built-in rule
    Init(InitArgs),
    /// Remove cached results
    Clean(CleanArgs),
}

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Files or directories to analyze
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Path to config file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format (default: from config, else text)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Run every registered rule not disabled by name in the config
    #[arg(long)]
    pub enable_all: bool,

    /// Neither read nor write cached results
    #[arg(long)]
    pub no_cache: bool,

    /// Maximum concurrent file analyses (0 = one per CPU)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Stop dispatching files after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for the rules command.
#[derive(Args)]
pub struct RulesArgs {
    /// Path to config file; marks the rules it enables
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_NAME)]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the clean command.
#[derive(Args)]
pub struct CleanArgs {
    /// Path to config file naming the cache directory
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Load the config named on the command line, or discover one in the
/// working directory. Without a config file every rule is enabled.
fn load_config(path: Option<&Path>) -> anyhow::Result<(Option<PathBuf>, Config)> {
    if let Some(path) = path {
        let config = Config::parse_file(path)?;
        return Ok((Some(path.to_path_buf()), config));
    }

    let cwd = std::env::current_dir().context("resolving working directory")?;
    match Config::discover(&cwd)? {
        Some((path, config)) => {
            tracing::debug!(path = %path.display(), "using discovered config");
            Ok((Some(path), config))
        }
        None => {
            tracing::debug!(
                "no config file found (looked for {}); using defaults",
                CONFIG_FILE_NAMES.join(", ")
            );
            Ok((None, Config::default()))
        }
    }
}

/// Registry holding the built-in rules configured by `config`.
fn builtin_registry(config: &Config) -> anyhow::Result<&'static Registry> {
    let registry = registry::global();
    if registry.is_empty() {
        rules::register_builtin(registry, config)?;
    }
    Ok(registry)
}

/// Exit code for a finished run.
///
/// A cancelled run exits with `EXIT_ERROR` even when it found nothing,
/// since some files were never analyzed.
pub fn exit_code(outcome: &RunOutcome) -> i32 {
    if outcome.cancelled {
        EXIT_ERROR
    } else if outcome.diagnostics.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILED
    }
}

/// Run the run command.
pub fn run_analysis(args: &RunArgs) -> anyhow::Result<i32> {
    let start = Instant::now();
    let (_, mut config) = load_config(args.config.as_deref())?;
    if args.enable_all {
        config.enable_all = true;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    if let Some(limit) = args.concurrency {
        config.concurrency = i64::try_from(limit).unwrap_or(i64::MAX);
    }
    if args.no_color || !config.output.color {
        colored::control::set_override(false);
    }
    let format = args.format.unwrap_or(config.output.format);

    let discovery = Discovery {
        include_test_files: config.should_include_test_files(),
        excluded: config.excluded_matcher()?,
    };
    for path in &args.paths {
        if !path.exists() {
            eprintln!("Error: cannot access path {}", path.display());
            return Ok(EXIT_ERROR);
        }
    }
    let files = collect_files(&args.paths, &discovery)?;
    if files.is_empty() {
        eprintln!("Warning: no Go files to analyze");
        return Ok(EXIT_SUCCESS);
    }

    let registry = builtin_registry(&config)?;
    let engine = Engine::new(&config, registry)?;
    let cancel = match args.timeout {
        Some(secs) => CancellationToken::with_timeout(Duration::from_secs(secs)),
        None => CancellationToken::new(),
    };

    let outcome = engine.run(&files, &cancel)?;

    let base_path = match args.paths.as_slice() {
        [single] => single.clone(),
        _ => PathBuf::new(),
    };
    let report = Report {
        base_path: &base_path,
        diagnostics: &outcome.diagnostics,
        rules: engine.active_rules(),
        stats: &outcome.stats,
        cancelled: outcome.cancelled,
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    report.write(&mut out, format)?;
    out.flush()?;

    if outcome.cancelled {
        eprintln!(
            "glint: run cancelled: {} file(s) not analyzed",
            outcome.stats.not_dispatched
        );
    }
    eprintln!(
        "glint: analyzed {} file(s) with {} rule(s) in {:.2?}",
        outcome.stats.analyzed + outcome.stats.cached,
        engine.active_rules().len(),
        start.elapsed()
    );

    Ok(exit_code(&outcome))
}

/// Run the rules command.
pub fn run_rules(args: &RulesArgs) -> anyhow::Result<i32> {
    let (_, config) = load_config(args.config.as_deref())?;
    let registry = builtin_registry(&config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_rule_table(&mut out, &registry.sorted(), &config)?;
    Ok(EXIT_SUCCESS)
}

/// Write the rule listing, grouped by category and then sorted by name.
///
/// `*` marks rules the config enables. TYPES shows whether a rule needs
/// package facts beyond the syntax tree.
fn write_rule_table<W: Write>(
    out: &mut W,
    rules: &[Arc<dyn Rule>],
    config: &Config,
) -> io::Result<()> {
    let mut rules = rules.to_vec();
    rules.sort_by(|a, b| {
        (a.category().as_str(), a.name()).cmp(&(b.category().as_str(), b.name()))
    });

    writeln!(
        out,
        "  {:<20} {:<9} {:<8} {:<5} DESCRIPTION",
        "RULE", "CATEGORY", "SEVERITY", "TYPES"
    )?;
    for rule in rules {
        let marker = if config.is_rule_active(rule.name()) { "*" } else { " " };
        let types = if rule.needs_semantic_facts() { "yes" } else { "no" };
        writeln!(
            out,
            "{} {:<20} {:<9} {:<8} {:<5} {}",
            marker,
            rule.name(),
            rule.category().as_str(),
            rule.severity().to_string(),
            types,
            rule.description()
        )?;
    }
    Ok(())
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Use --force to overwrite it or --output to choose another path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let config = Config::with_rules(rules::builtin_names());
    std::fs::write(&args.output, config.to_yaml()?)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!("  2. Run: glint run .");

    Ok(EXIT_SUCCESS)
}

/// Run the clean command.
pub fn run_clean(args: &CleanArgs) -> anyhow::Result<i32> {
    let (_, config) = load_config(args.config.as_deref())?;
    let Some(dir) = config.cache_dir().or_else(default_cache_dir) else {
        eprintln!("Warning: no cache directory available");
        return Ok(EXIT_SUCCESS);
    };

    let removed = clear_dir(&dir).with_context(|| format!("clearing {}", dir.display()))?;
    println!("Removed {} cached results from {}", removed, dir.display());
    Ok(EXIT_SUCCESS)
}
