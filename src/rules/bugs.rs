//! Rules that catch likely defects.

use tree_sitter::Node;

use crate::parser::tree::{
    block_statements, declared_identifiers, expressions, has_define_token, named_children,
    parameter_identifiers, single_expression, spec_children, unquote,
};
use crate::rule::{AnalysisContext, Category, Diagnostic, Rule, Severity};

/// Flags calls whose error result is discarded by using them as a statement.
pub struct UncheckedError;

impl Rule for UncheckedError {
    fn name(&self) -> &str {
        "unchecked-error"
    }

    fn category(&self) -> Category {
        Category::Bugs
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn description(&self) -> &str {
        "Detects ignored error return values"
    }

    fn needs_semantic_facts(&self) -> bool {
        true
    }

    fn node_kinds(&self) -> &[&'static str] {
        &["expression_statement"]
    }

    fn check(&self, ctx: &AnalysisContext<'_>, node: Node<'_>) -> Vec<Diagnostic> {
        let Some(facts) = ctx.semantics() else {
            return Vec::new();
        };
        let Some(call) = node.named_child(0).filter(|n| n.kind() == "call_expression") else {
            return Vec::new();
        };
        let Some(function) = call.child_by_field_name("function") else {
            return Vec::new();
        };

        let returns_error = match function.kind() {
            "identifier" => facts.function_returns_error(ctx.node_text(function)),
            "selector_expression" => {
                let operand = function
                    .child_by_field_name("operand")
                    .map(|n| ctx.node_text(n))
                    .unwrap_or("");
                let field = function
                    .child_by_field_name("field")
                    .map(|n| ctx.node_text(n))
                    .unwrap_or("");
                facts.selector_returns_error(operand, field)
            }
            _ => false,
        };

        if returns_error {
            vec![ctx.diagnostic(self, call, "error return value is not checked")]
        } else {
            Vec::new()
        }
    }
}

/// Flags single-value type assertions, which panic on a failed assertion.
pub struct NilDeref;

impl Rule for NilDeref {
    fn name(&self) -> &str {
        "nil-deref"
    }

    fn category(&self) -> Category {
        Category::Bugs
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn description(&self) -> &str {
        "Detects type assertions without an ok check"
    }

    fn node_kinds(&self) -> &[&'static str] {
        &["short_var_declaration", "assignment_statement"]
    }

    fn check(&self, ctx: &AnalysisContext<'_>, node: Node<'_>) -> Vec<Diagnostic> {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return Vec::new();
        };

        // `v, ok := x.(T)` is the checked form
        if expressions(left).len() != 1 {
            return Vec::new();
        }
        let Some(rhs) = single_expression(right) else {
            return Vec::new();
        };
        if rhs.kind() != "type_assertion_expression" || rhs.child_by_field_name("type").is_none() {
            return Vec::new();
        }

        vec![ctx.diagnostic(
            self,
            rhs,
            "type assertion without ok check; will panic if value is nil or wrong type",
        )]
    }
}

/// Go's predeclared identifiers.
static PREDECLARED: phf::Set<&'static str> = phf::phf_set! {
    "any", "append", "bool", "byte", "cap", "clear", "close", "comparable",
    "complex", "complex64", "complex128", "copy", "delete", "error", "false",
    "float32", "float64", "imag", "int", "int8", "int16", "int32", "int64",
    "iota", "len", "make", "max", "min", "new", "nil", "panic", "print",
    "println", "real", "recover", "rune", "string", "true", "uint", "uint8",
    "uint16", "uint32", "uint64", "uintptr",
};

/// Node kinds that open a lexical scope.
const SCOPE_KINDS: &[&str] = &[
    "block",
    "if_statement",
    "for_statement",
    "expression_switch_statement",
    "type_switch_statement",
    "expression_case",
    "default_case",
    "type_case",
    "communication_case",
];

fn is_function(kind: &str) -> bool {
    matches!(
        kind,
        "function_declaration" | "method_declaration" | "func_literal"
    )
}

/// A name bound in a scope, visible from byte offset `visible_from` on.
struct Binding<'t> {
    ident: Node<'t>,
    visible_from: usize,
}

/// Bindings a statement introduces into the scope it sits in.
fn statement_bindings(stmt: Node<'_>) -> Vec<Binding<'_>> {
    match stmt.kind() {
        // a variable is in scope after its declaration ends
        "short_var_declaration" | "var_declaration" => declared_identifiers(stmt)
            .into_iter()
            .map(|ident| Binding {
                ident,
                visible_from: stmt.end_byte(),
            })
            .collect(),
        "receive_statement" if has_define_token(stmt) => stmt
            .child_by_field_name("left")
            .map(|left| expressions(left))
            .unwrap_or_default()
            .into_iter()
            .filter(|n| n.kind() == "identifier")
            .map(|ident| Binding {
                ident,
                visible_from: stmt.end_byte(),
            })
            .collect(),
        // constants and types are in scope from their identifier
        _ => declared_identifiers(stmt)
            .into_iter()
            .map(|ident| Binding {
                ident,
                visible_from: ident.start_byte(),
            })
            .collect(),
    }
}

/// Bindings of one scope node.
///
/// A function body shares its scope with the function's receiver,
/// parameters and named results.
fn scope_bindings(scope: Node<'_>) -> Vec<Binding<'_>> {
    let mut bindings = Vec::new();
    match scope.kind() {
        "block" | "expression_case" | "default_case" | "type_case" | "communication_case" => {
            if let Some(func) = scope.parent().filter(|p| is_function(p.kind())) {
                for field in ["receiver", "parameters", "result"] {
                    if let Some(list) = func.child_by_field_name(field) {
                        bindings.extend(parameter_identifiers(list).into_iter().map(|ident| {
                            Binding {
                                ident,
                                visible_from: scope.start_byte(),
                            }
                        }));
                    }
                }
            }
            for stmt in block_statements(scope) {
                bindings.extend(statement_bindings(stmt));
            }
        }
        "if_statement" | "expression_switch_statement" | "type_switch_statement" => {
            if let Some(init) = scope.child_by_field_name("initializer") {
                bindings.extend(statement_bindings(init));
            }
            if let Some(alias) = scope.child_by_field_name("alias") {
                bindings.extend(
                    expressions(alias)
                        .into_iter()
                        .filter(|n| n.kind() == "identifier")
                        .map(|ident| Binding {
                            ident,
                            visible_from: alias.end_byte(),
                        }),
                );
            }
        }
        "for_statement" => {
            for clause in named_children(scope) {
                match clause.kind() {
                    "for_clause" => {
                        if let Some(init) = clause.child_by_field_name("initializer") {
                            bindings.extend(statement_bindings(init));
                        }
                    }
                    "range_clause" if has_define_token(clause) => {
                        if let Some(left) = clause.child_by_field_name("left") {
                            bindings.extend(
                                expressions(left)
                                    .into_iter()
                                    .filter(|n| n.kind() == "identifier")
                                    .map(|ident| Binding {
                                        ident,
                                        visible_from: clause.end_byte(),
                                    }),
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    bindings
}

/// Names the file's imports bind, with the node that binds each.
fn import_bindings<'t>(ctx: &AnalysisContext<'_>, root: Node<'t>) -> Vec<(String, Node<'t>)> {
    let mut imports = Vec::new();
    for decl in named_children(root) {
        if decl.kind() != "import_declaration" {
            continue;
        }
        for spec in spec_children(decl, "import_spec") {
            let name = match spec.child_by_field_name("name") {
                Some(alias) if alias.kind() == "package_identifier" => {
                    ctx.node_text(alias).to_string()
                }
                Some(_) => continue,
                None => {
                    let Some(path) = spec.child_by_field_name("path") else {
                        continue;
                    };
                    let path = unquote(ctx.node_text(path));
                    path.rsplit('/').next().unwrap_or(path).to_string()
                }
            };
            imports.push((name, spec));
        }
    }
    imports
}

/// Flags `:=` declarations that shadow a name from an enclosing scope.
///
/// Scopes are resolved lexically from the syntax tree: enclosing blocks and
/// statement scopes, the function's parameters, the file's imports, the
/// package's declarations and the predeclared identifiers.
pub struct ShadowVar;

impl ShadowVar {
    /// Describe what `name`, declared at byte `at` inside `scope`, shadows.
    fn shadowed(
        &self,
        ctx: &AnalysisContext<'_>,
        scope: Node<'_>,
        at: usize,
        name: &str,
    ) -> Option<String> {
        let mut current = scope.parent();
        while let Some(node) = current {
            if SCOPE_KINDS.contains(&node.kind()) {
                let outer = scope_bindings(node)
                    .into_iter()
                    .find(|b| b.visible_from <= at && ctx.node_text(b.ident) == name);
                if let Some(binding) = outer {
                    return Some(format!(
                        "declaration at {}",
                        ctx.position(binding.ident.start_byte())
                    ));
                }
            }
            current = node.parent();
        }

        if let Some((_, spec)) = import_bindings(ctx, ctx.root())
            .into_iter()
            .find(|(import, _)| import == name)
        {
            return Some(format!("declaration at {}", ctx.position(spec.start_byte())));
        }
        if let Some(global) = ctx.semantics().and_then(|facts| facts.global(name)) {
            return Some(format!("declaration at {}", global));
        }
        PREDECLARED
            .contains(name)
            .then(|| "predeclared identifier".to_string())
    }
}

impl Rule for ShadowVar {
    fn name(&self) -> &str {
        "shadow-var"
    }

    fn category(&self) -> Category {
        Category::Bugs
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &str {
        "Detects variable shadowing in inner scopes"
    }

    fn needs_semantic_facts(&self) -> bool {
        true
    }

    fn node_kinds(&self) -> &[&'static str] {
        &["short_var_declaration"]
    }

    fn check(&self, ctx: &AnalysisContext<'_>, node: Node<'_>) -> Vec<Diagnostic> {
        let Some(left) = node.child_by_field_name("left") else {
            return Vec::new();
        };
        let mut ancestor = node.parent();
        let scope = loop {
            match ancestor {
                Some(n) if SCOPE_KINDS.contains(&n.kind()) => break n,
                Some(n) => ancestor = n.parent(),
                None => return Vec::new(),
            }
        };
        let at = node.start_byte();
        let same_scope = scope_bindings(scope);

        let mut diagnostics = Vec::new();
        for ident in expressions(left) {
            if ident.kind() != "identifier" {
                continue;
            }
            let name = ctx.node_text(ident);
            if name == "_" {
                continue;
            }
            // already declared in this scope: `:=` assigns to it
            if same_scope
                .iter()
                .any(|b| b.visible_from <= at && ctx.node_text(b.ident) == name)
            {
                continue;
            }
            if let Some(shadowed) = self.shadowed(ctx, scope, at, name) {
                diagnostics.push(ctx.diagnostic(
                    self,
                    ident,
                    format!("variable '{}' shadows {}", name, shadowed),
                ));
            }
        }
        diagnostics
    }
}
