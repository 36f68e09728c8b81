//! Performance rules.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::parser::tree::{
    block_statements, expressions, field_children, named_children, single_expression,
    visit_preorder,
};
use crate::rule::{AnalysisContext, Category, Diagnostic, FileRule, Rule, Severity};

/// Suggests preallocating slices grown with `append` inside a loop.
///
/// Only slices made empty earlier in the same function body are considered
/// (`var s []T`, `s := []T{}`, `s := make([]T, 0)`). Any other assignment,
/// such as a `make` with a capacity, clears the name.
pub struct PreallocSlice;

impl Rule for PreallocSlice {
    fn name(&self) -> &str {
        "prealloc-slice"
    }

    fn category(&self) -> Category {
        Category::Perf
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &str {
        "Suggests preallocating slices that are grown inside loops with append"
    }

    fn as_file_rule(&self) -> Option<&dyn FileRule> {
        Some(self)
    }
}

impl FileRule for PreallocSlice {
    fn check_file(&self, ctx: &AnalysisContext<'_>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        visit_preorder(ctx.root(), |node| {
            if matches!(node.kind(), "function_declaration" | "method_declaration" | "func_literal") {
                if let Some(body) = node.child_by_field_name("body") {
                    diagnostics.extend(self.check_body(ctx, body));
                }
            }
        });
        diagnostics
    }
}

impl PreallocSlice {
    fn check_body(&self, ctx: &AnalysisContext<'_>, body: Node<'_>) -> Vec<Diagnostic> {
        let mut empty_slices: HashSet<&str> = HashSet::new();
        let mut diagnostics = Vec::new();

        for stmt in block_statements(body) {
            match stmt.kind() {
                "var_declaration" => track_var_declaration(ctx, stmt, &mut empty_slices),
                "short_var_declaration" | "assignment_statement" => {
                    track_assignment(ctx, stmt, &mut empty_slices)
                }
                "for_statement" => {
                    let Some(loop_body) = stmt.child_by_field_name("body") else {
                        continue;
                    };
                    for inner in block_statements(loop_body) {
                        if let Some(name) = appended_slice(ctx, inner) {
                            if empty_slices.contains(name) {
                                diagnostics.push(ctx.diagnostic(
                                    self,
                                    inner,
                                    format!("consider preallocating '{}'", name),
                                ));
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        diagnostics
    }
}

/// `var s []T` declares an empty slice.
fn track_var_declaration<'a>(ctx: &AnalysisContext<'a>, decl: Node<'_>, slices: &mut HashSet<&'a str>) {
    let mut specs = Vec::new();
    visit_preorder(decl, |n| {
        if n.kind() == "var_spec" {
            specs.push(n);
        }
    });

    for spec in specs {
        let names = field_children(spec, "name");
        match spec.child_by_field_name("value") {
            None => {
                if spec.child_by_field_name("type").is_some_and(|t| t.kind() == "slice_type") {
                    slices.extend(names.iter().map(|n| ctx.node_text(*n)));
                }
            }
            Some(values) => {
                for (name, value) in names.iter().zip(expressions(values)) {
                    update_slice(ctx, ctx.node_text(*name), value, slices);
                }
            }
        }
    }
}

fn track_assignment<'a>(ctx: &AnalysisContext<'a>, stmt: Node<'_>, slices: &mut HashSet<&'a str>) {
    let (Some(left), Some(right)) = (
        stmt.child_by_field_name("left"),
        stmt.child_by_field_name("right"),
    ) else {
        return;
    };
    let names = expressions(left);
    let values = expressions(right);
    if names.len() != values.len() {
        return;
    }
    for (name, value) in names.into_iter().zip(values) {
        if name.kind() == "identifier" {
            update_slice(ctx, ctx.node_text(name), value, slices);
        }
    }
}

/// Record whether `name` now holds an empty, unsized slice.
fn update_slice<'a>(ctx: &AnalysisContext<'a>, name: &'a str, value: Node<'_>, slices: &mut HashSet<&'a str>) {
    let empty = match value.kind() {
        "composite_literal" => {
            value.child_by_field_name("type").is_some_and(|t| t.kind() == "slice_type")
                && value
                    .child_by_field_name("body")
                    .is_some_and(|b| b.named_child_count() == 0)
        }
        "call_expression" if is_call_to(ctx, value, "make") => {
            // make([]T, 0) with no capacity
            let args = value
                .child_by_field_name("arguments")
                .map(named_children)
                .unwrap_or_default();
            args.len() == 2 && ctx.node_text(args[1]) == "0"
        }
        _ => false,
    };

    if empty {
        slices.insert(name);
    } else {
        slices.remove(name);
    }
}

fn is_call_to(ctx: &AnalysisContext<'_>, call: Node<'_>, function: &str) -> bool {
    call.child_by_field_name("function")
        .is_some_and(|f| f.kind() == "identifier" && ctx.node_text(f) == function)
}

/// Name of `s` in a statement of the form `s = append(s, ...)`.
fn appended_slice<'a>(ctx: &AnalysisContext<'a>, stmt: Node<'_>) -> Option<&'a str> {
    if stmt.kind() != "assignment_statement" {
        return None;
    }
    let target = single_expression(stmt.child_by_field_name("left")?)?;
    let call = single_expression(stmt.child_by_field_name("right")?)?;
    if target.kind() != "identifier" || call.kind() != "call_expression" || !is_call_to(ctx, call, "append") {
        return None;
    }
    let first = call.child_by_field_name("arguments")?.named_child(0)?;
    let name = ctx.node_text(target);
    (first.kind() == "identifier" && ctx.node_text(first) == name).then_some(name)
}
