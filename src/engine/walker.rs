//! Single-pass rule dispatch over a syntax tree.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tree_sitter::Node;

use super::pool::BufferPool;
use crate::parser::tree::visit_preorder;
use crate::rule::{AnalysisContext, Diagnostic, Rule, Severity};

/// Dispatches syntax nodes to the rules interested in their kind.
///
/// The dispatch table is built once per run and is read-only afterwards, so
/// one walker is shared by every worker without locking.
pub struct Walker {
    dispatch: HashMap<&'static str, Vec<Arc<dyn Rule>>>,
    file_rules: Vec<Arc<dyn Rule>>,
    pool: BufferPool,
}

impl Walker {
    /// Build the dispatch table for `rules`.
    ///
    /// Rules keep the order they are given in within each kind's list.
    pub fn new(rules: &[Arc<dyn Rule>]) -> Self {
        let mut dispatch: HashMap<&'static str, Vec<Arc<dyn Rule>>> = HashMap::new();
        let mut file_rules = Vec::new();

        for rule in rules {
            for &kind in rule.node_kinds() {
                let entry = dispatch.entry(kind).or_default();
                if !entry.iter().any(|r| Arc::ptr_eq(r, rule)) {
                    entry.push(Arc::clone(rule));
                }
            }
            if rule.as_file_rule().is_some() {
                file_rules.push(Arc::clone(rule));
            }
        }

        Self {
            dispatch,
            file_rules,
            pool: BufferPool::default(),
        }
    }

    /// Rules registered for a node kind, in dispatch order.
    pub fn rules_for(&self, kind: &str) -> &[Arc<dyn Rule>] {
        self.dispatch.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn file_rules(&self) -> &[Arc<dyn Rule>] {
        &self.file_rules
    }

    /// Run every interested rule over one file in a single traversal.
    ///
    /// Whole-file rules run first, then the tree is visited in pre-order. The
    /// returned diagnostics are owned by the caller.
    pub fn walk(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        let mut buffer = self.pool.acquire();

        for rule in &self.file_rules {
            if let Some(file_rule) = rule.as_file_rule() {
                guarded(rule.as_ref(), ctx, None, &mut buffer, || {
                    file_rule.check_file(ctx)
                });
            }
        }

        if !self.dispatch.is_empty() {
            visit_preorder(ctx.root(), |node| {
                let Some(rules) = self.dispatch.get(node.kind()) else {
                    return;
                };
                for rule in rules {
                    guarded(rule.as_ref(), ctx, Some(node), &mut buffer, || {
                        rule.check(ctx, node)
                    });
                }
            });
        }

        tracing::trace!(file = ctx.file(), diagnostics = buffer.len(), "walked file");

        let diagnostics = buffer.drain(..).collect();
        self.pool.release(buffer);
        diagnostics
    }
}

/// Invoke one rule, converting a panic into an error diagnostic.
fn guarded(
    rule: &dyn Rule,
    ctx: &AnalysisContext<'_>,
    node: Option<Node<'_>>,
    out: &mut Vec<Diagnostic>,
    check: impl FnOnce() -> Vec<Diagnostic>,
) {
    match catch_unwind(AssertUnwindSafe(check)) {
        Ok(diagnostics) => out.extend(diagnostics),
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(rule = rule.name(), file = ctx.file(), %reason, "rule panicked");
            let (start, end) = node.map_or((0, 0), |n| (n.start_byte(), n.end_byte()));
            out.push(
                ctx.diagnostic_at(rule, start, end, format!("rule {} panicked: {}", rule.name(), reason))
                    .with_severity(Severity::Error),
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
