//! Style rules: naming, import grouping and line length.

use tree_sitter::Node;

use crate::config::Config;
use crate::error::Result;
use crate::parser::tree::{field_children, named_children, spec_children, unquote};
use crate::rule::{AnalysisContext, Category, Diagnostic, FileRule, Rule, Severity};

/// Initialisms Go spells in a consistent case.
const COMMON_ACRONYMS: &[&str] = &[
    "API", "ASCII", "CPU", "CSS", "DNS", "EOF", "GUID", "HTML", "HTTP", "HTTPS", "ID", "IP",
    "JSON", "LHS", "QPS", "RAM", "RHS", "RPC", "SLA", "SMTP", "SQL", "SSH", "TCP", "TLS", "TTL",
    "UDP", "UI", "UID", "URI", "URL", "UTF8", "UUID", "VM", "XML", "XMPP", "XSRF", "XSS",
];

/// Enforces MixedCaps for exported names and consistent initialisms.
pub struct NamingConvention;

impl NamingConvention {
    fn check_name(&self, ctx: &AnalysisContext<'_>, ident: Node<'_>) -> Option<Diagnostic> {
        let name = ctx.node_text(ident);
        if matches!(name, "" | "_" | "main" | "init") || !is_exported(name) {
            return None;
        }

        if name.contains('_') {
            if name == name.to_uppercase() {
                return None;
            }
            return Some(ctx.diagnostic(
                self,
                ident,
                format!("exported name '{}' should not contain underscores; use MixedCaps", name),
            ));
        }

        let (mixed, acronym) = misspelled_acronym(name)?;
        Some(
            ctx.diagnostic(
                self,
                ident,
                format!(
                    "'{}' in '{}' should be '{}' (Go convention: {} -> {})",
                    mixed,
                    name,
                    acronym,
                    acronym.to_lowercase(),
                    acronym
                ),
            )
            .with_severity(Severity::Info),
        )
    }
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// First initialism written in mixed case, e.g. ("Id", "ID") for `UserId`.
fn misspelled_acronym(name: &str) -> Option<(String, &'static str)> {
    for &acronym in COMMON_ACRONYMS {
        let mut mixed = acronym[..1].to_string();
        mixed.push_str(&acronym[1..].to_lowercase());
        if !name.contains(mixed.as_str()) || name.contains(acronym) {
            continue;
        }
        let Some(idx) = name.find(mixed.as_str()) else {
            continue;
        };
        let next = name[idx + mixed.len()..].chars().next();
        if next.map_or(true, char::is_uppercase) {
            return Some((mixed, acronym));
        }
    }
    None
}

impl Rule for NamingConvention {
    fn name(&self) -> &str {
        "naming-convention"
    }

    fn category(&self) -> Category {
        Category::Style
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &str {
        "Enforces Go naming conventions (MixedCaps, no underscores in exported names)"
    }

    fn node_kinds(&self) -> &[&'static str] {
        &[
            "function_declaration",
            "method_declaration",
            "type_spec",
            "type_alias",
            "var_spec",
            "const_spec",
        ]
    }

    fn check(&self, ctx: &AnalysisContext<'_>, node: Node<'_>) -> Vec<Diagnostic> {
        field_children(node, "name")
            .into_iter()
            .filter_map(|ident| self.check_name(ctx, ident))
            .collect()
    }
}

/// Requires standard-library imports to precede third-party ones.
pub struct ImportOrder;

/// 0 = standard library, 1 = everything else.
fn import_group(path: &str) -> u8 {
    if path.contains('.') {
        1
    } else {
        0
    }
}


impl Rule for ImportOrder {
    fn name(&self) -> &str {
        "import-order"
    }

    fn category(&self) -> Category {
        Category::Style
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn description(&self) -> &str {
        "Enforces import grouping: stdlib, then external"
    }

    fn as_file_rule(&self) -> Option<&dyn FileRule> {
        Some(self)
    }
}

impl FileRule for ImportOrder {
    fn check_file(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for decl in named_children(ctx.root()) {
            if decl.kind() != "import_declaration" {
                continue;
            }
            let specs = spec_children(decl, "import_spec");
            if specs.len() <= 1 {
                continue;
            }

            let mut last_group = 0;
            for spec in specs {
                let Some(path) = spec.child_by_field_name("path") else {
                    continue;
                };
                let path = unquote(ctx.node_text(path));
                let group = import_group(path);
                if group < last_group {
                    diagnostics.push(ctx.diagnostic(
                        self,
                        spec,
                        format!(
                            "import '{}' is out of order; expected grouping: stdlib, external",
                            path
                        ),
                    ));
                }
                last_group = last_group.max(group);
            }
        }

        diagnostics
    }
}

/// Default maximum line length in characters.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 120;

/// Reports lines longer than a configurable maximum.
pub struct LineLength {
    max: usize,
}

impl LineLength {
    pub fn new(max: usize) -> Self {
        Self { max }
    }

    /// Read `rules.line-length.options.max` from the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let max = config
            .rule_option::<usize>("line-length", "max")?
            .unwrap_or(DEFAULT_MAX_LINE_LENGTH);
        Ok(Self::new(max))
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

impl Default for LineLength {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl Rule for LineLength {
    fn name(&self) -> &str {
        "line-length"
    }

    fn category(&self) -> Category {
        Category::Style
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &str {
        "Reports lines exceeding a configurable maximum length"
    }

    fn as_file_rule(&self) -> Option<&dyn FileRule> {
        Some(self)
    }

    fn options_digest(&self) -> Option<String> {
        Some(format!("max={}", self.max))
    }
}

impl FileRule for LineLength {
    fn check_file(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        let source = ctx.source();
        let mut diagnostics = Vec::new();
        let mut start = 0;

        for line in source.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let length = String::from_utf8_lossy(line).chars().count();
            if length > self.max {
                diagnostics.push(ctx.diagnostic_at(
                    self,
                    start,
                    start + line.len(),
                    format!("line is {} characters (max {})", length, self.max),
                ));
            }
            start += line.len() + 1;
            if source.get(start - 1) == Some(&b'\r') {
                start += 1;
            }
        }

        diagnostics
    }
}
