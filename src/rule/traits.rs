//! The rule plugin contract.

use tree_sitter::Node;

use super::{AnalysisContext, Category, Diagnostic, Severity};

/// A lint rule.
///
/// Rules are registered once at start-up and shared by every worker thread,
/// so implementations must be stateless or synchronize their own state.
///
/// # Node dispatch
///
/// The walker calls [`Rule::check`] only for nodes whose tree-sitter kind
/// appears in [`Rule::node_kinds`]. Ancestors are always visited before
/// their descendants; anything else a rule needs about surrounding nodes it
/// must derive from the node itself.
pub trait Rule: Send + Sync {
    /// Unique rule identifier (e.g., "unchecked-error").
    fn name(&self) -> &str;

    fn category(&self) -> Category;

    /// Default severity of findings.
    fn severity(&self) -> Severity;

    /// One-line human readable description.
    fn description(&self) -> &str;

    /// Whether the rule needs resolved semantic facts.
    fn needs_semantic_facts(&self) -> bool {
        false
    }

    /// Tree-sitter node kinds this rule wants to observe.
    fn node_kinds(&self) -> &[&'static str] {
        &[]
    }

    /// Inspect a single node of one of the declared kinds.
    fn check(&self, _ctx: &AnalysisContext<'_>, _node: Node<'_>) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Whole-file capability, if the rule has one.
    fn as_file_rule(&self) -> Option<&dyn FileRule> {
        None
    }

    /// Digest of rule options that influence results.
    ///
    /// Folded into the rule-set fingerprint so that changing an option
    /// invalidates cached results.
    fn options_digest(&self) -> Option<String> {
        None
    }
}

/// Rules that inspect a whole file at once rather than individual nodes.
///
/// Return `Some(self)` from [`Rule::as_file_rule`] to opt in; the walker then
/// calls [`FileRule::check_file`] exactly once per file.
pub trait FileRule: Rule {
    fn check_file(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic>;
}
