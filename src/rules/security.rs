//! Security rules.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::parser::tree::{expressions, field_children, is_string_literal, literal_element_value, unquote};
use crate::rule::{AnalysisContext, Category, Diagnostic, Rule, Severity};

/// Name fragments that suggest a credential.
const SECRET_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "api_key",
    "apikey",
    "access_token",
    "auth_token",
    "private_key",
    "token",
];

fn is_secret_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    SECRET_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Flags string literals assigned to names that look like credentials.
pub struct HardcodedSecret;

impl HardcodedSecret {
    fn variable(&self, ctx: &AnalysisContext<'_>, ident: Node<'_>) -> Diagnostic {
        ctx.diagnostic(
            self,
            ident,
            format!("potential hardcoded secret in variable '{}'", ctx.node_text(ident)),
        )
    }

    fn check_pairs<'t>(
        &self,
        ctx: &AnalysisContext<'_>,
        names: Vec<Node<'t>>,
        values: Vec<Node<'t>>,
    ) -> Vec<Diagnostic> {
        names
            .into_iter()
            .zip(values)
            .filter(|(name, value)| {
                name.kind() == "identifier"
                    && is_secret_name(ctx.node_text(*name))
                    && is_string_literal(*value)
            })
            .map(|(name, _)| self.variable(ctx, name))
            .collect()
    }

    fn check_keyed_element(&self, ctx: &AnalysisContext<'_>, node: Node<'_>) -> Vec<Diagnostic> {
        let (Some(key), Some(value)) = (node.named_child(0), node.named_child(1)) else {
            return Vec::new();
        };
        let key = literal_element_value(key);
        let value = literal_element_value(value);
        if !is_string_literal(value) {
            return Vec::new();
        }

        match key.kind() {
            "identifier" | "field_identifier" if is_secret_name(ctx.node_text(key)) => {
                vec![self.variable(ctx, key)]
            }
            "interpreted_string_literal" | "raw_string_literal" => {
                let name = unquote(ctx.node_text(key));
                if is_secret_name(name) {
                    vec![ctx.diagnostic(
                        self,
                        node,
                        format!("potential hardcoded secret in key '{}'", name),
                    )]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }
}

impl Rule for HardcodedSecret {
    fn name(&self) -> &str {
        "hardcoded-secret"
    }

    fn category(&self) -> Category {
        Category::Security
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn description(&self) -> &str {
        "Detects hardcoded secrets in string assignments (passwords, API keys, tokens)"
    }

    fn node_kinds(&self) -> &[&'static str] {
        &[
            "short_var_declaration",
            "assignment_statement",
            "var_spec",
            "const_spec",
            "keyed_element",
        ]
    }

    fn check(&self, ctx: &AnalysisContext<'_>, node: Node<'_>) -> Vec<Diagnostic> {
        match node.kind() {
            "short_var_declaration" | "assignment_statement" => {
                let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) else {
                    return Vec::new();
                };
                self.check_pairs(ctx, expressions(left), expressions(right))
            }
            "var_spec" | "const_spec" => {
                let Some(values) = node.child_by_field_name("value") else {
                    return Vec::new();
                };
                self.check_pairs(ctx, field_children(node, "name"), expressions(values))
            }
            "keyed_element" => self.check_keyed_element(ctx, node),
            _ => Vec::new(),
        }
    }
}

/// Query methods of database/sql and sqlx handles.
const SQL_METHODS: &[&str] = &["Query", "QueryRow", "Exec", "Prepare"];

static SQL_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(select|insert|update|delete|replace|merge|create|drop|alter|with)\b").unwrap()
});

/// Flags SQL statements built by concatenation or `fmt.Sprintf` and passed to
/// a query method.
pub struct SqlInjection;

impl SqlInjection {
    /// Leftmost string literal of a `+` chain.
    fn leading_literal<'t>(expr: Node<'t>) -> Option<Node<'t>> {
        let mut current = expr;
        while current.kind() == "binary_expression" {
            current = current.child_by_field_name("left")?;
        }
        matches!(current.kind(), "interpreted_string_literal" | "raw_string_literal").then_some(current)
    }

    fn looks_like_sql(ctx: &AnalysisContext<'_>, literal: Node<'_>) -> bool {
        SQL_STATEMENT.is_match(unquote(ctx.node_text(literal)))
    }

    fn is_concatenation(ctx: &AnalysisContext<'_>, expr: Node<'_>) -> bool {
        expr.kind() == "binary_expression"
            && expr
                .child_by_field_name("operator")
                .is_some_and(|op| ctx.node_text(op) == "+")
            && Self::leading_literal(expr).is_some_and(|lit| Self::looks_like_sql(ctx, lit))
    }

    fn is_formatted(ctx: &AnalysisContext<'_>, expr: Node<'_>) -> bool {
        if expr.kind() != "call_expression" {
            return false;
        }
        let Some(function) = expr.child_by_field_name("function") else {
            return false;
        };
        if function.kind() != "selector_expression"
            || !matches!(ctx.node_text(function), "fmt.Sprintf" | "fmt.Sprint")
        {
            return false;
        }
        expr.child_by_field_name("arguments")
            .and_then(|args| args.named_child(0))
            .and_then(Self::leading_literal)
            .is_some_and(|lit| Self::looks_like_sql(ctx, lit))
    }
}

impl Rule for SqlInjection {
    fn name(&self) -> &str {
        "sql-injection"
    }

    fn category(&self) -> Category {
        Category::Security
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn description(&self) -> &str {
        "Detects potential SQL injection via string concatenation in SQL query functions"
    }

    fn node_kinds(&self) -> &[&'static str] {
        &["call_expression"]
    }

    fn check(&self, ctx: &AnalysisContext<'_>, node: Node<'_>) -> Vec<Diagnostic> {
        let Some(function) = node.child_by_field_name("function") else {
            return Vec::new();
        };
        if function.kind() != "selector_expression" {
            return Vec::new();
        }
        let method = function
            .child_by_field_name("field")
            .map(|f| ctx.node_text(f))
            .unwrap_or("");
        if !SQL_METHODS.contains(&method) {
            return Vec::new();
        }

        let Some(query) = node
            .child_by_field_name("arguments")
            .and_then(|args| args.named_child(0))
        else {
            return Vec::new();
        };

        if Self::is_concatenation(ctx, query) || Self::is_formatted(ctx, query) {
            vec![ctx.diagnostic(
                self,
                query,
                "potential SQL injection: use parameterized queries instead of string concatenation",
            )]
        } else {
            Vec::new()
        }
    }
}
