//! Package-level semantic facts for Go sources.
//!
//! Tree-sitter gives syntax only. The facts collected here cover what the
//! semantic rules need: which package-level functions and methods return an
//! `error`, plus a table of standard-library functions that do, and where
//! each package-level name is declared.

use std::collections::HashMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor, Tree};

use super::tree::{declared_identifiers, field_identifiers, named_children};
use crate::rule::Position;

/// Tree-sitter query for function and method declarations.
pub(crate) const SIGNATURE_QUERY: &str = r#"
(function_declaration
  name: (identifier) @func_name
) @function

(method_declaration
  name: (field_identifier) @method_name
) @method

(package_clause
  (package_identifier) @package_name
)
"#;

/// Standard-library functions whose results include an `error`.
static STDLIB_ERROR_FUNCS: phf::Set<&'static str> = phf::phf_set! {
    "os.Chdir",
    "os.Chmod",
    "os.Chown",
    "os.Link",
    "os.Mkdir",
    "os.MkdirAll",
    "os.Remove",
    "os.RemoveAll",
    "os.Rename",
    "os.Setenv",
    "os.Symlink",
    "os.Truncate",
    "os.Unsetenv",
    "os.WriteFile",
    "io.Copy",
    "io.CopyN",
    "io.ReadFull",
    "io.WriteString",
    "json.Unmarshal",
    "xml.Unmarshal",
    "http.ListenAndServe",
    "http.ListenAndServeTLS",
    "filepath.Walk",
    "filepath.WalkDir",
};

/// Declared signature of a function or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    /// Receiver type name for methods, without pointer or type parameters.
    pub receiver: Option<String>,
    /// Result types as written in source, one per result value.
    pub results: Vec<String>,
}

impl Signature {
    pub fn returns_error(&self) -> bool {
        self.results.iter().any(|r| r == "error")
    }
}

/// Resolved facts for one package (all analyzed files in one directory).
#[derive(Debug, Clone, Default)]
pub struct SemanticFacts {
    package: Option<String>,
    functions: HashMap<String, Signature>,
    methods: HashMap<String, Vec<Signature>>,
    /// Package-scope names (funcs, vars, consts, types) and where they are declared.
    globals: HashMap<String, Position>,
    digest: String,
}

impl SemanticFacts {
    /// Collect facts from every file of a package.
    pub fn extract<'a>(
        query: &Query,
        files: impl IntoIterator<Item = (&'a Path, &'a Tree, &'a [u8])>,
    ) -> Self {
        let mut facts = SemanticFacts::default();

        for (path, tree, source) in files {
            facts.collect_globals(path, tree, source);

            let mut cursor = QueryCursor::new();
            let mut matches = cursor.matches(query, tree.root_node(), source);

            while let Some(m) = matches.next() {
                let mut decl_node = None;
                let mut name = None;
                let mut is_method = false;

                for capture in m.captures {
                    let capture_name = query.capture_names()[capture.index as usize];
                    match capture_name {
                        "func_name" => name = Some(node_text(capture.node, source)),
                        "method_name" => {
                            name = Some(node_text(capture.node, source));
                            is_method = true;
                        }
                        "function" | "method" => decl_node = Some(capture.node),
                        "package_name" => {
                            if facts.package.is_none() {
                                facts.package = Some(node_text(capture.node, source).to_string());
                            }
                        }
                        _ => {}
                    }
                }

                let (Some(decl), Some(name)) = (decl_node, name) else {
                    continue;
                };

                let signature = Signature {
                    name: name.to_string(),
                    receiver: if is_method {
                        decl.child_by_field_name("receiver")
                            .and_then(|r| receiver_type(r, source))
                    } else {
                        None
                    },
                    results: decl
                        .child_by_field_name("result")
                        .map(|r| result_types(r, source))
                        .unwrap_or_default(),
                };

                if is_method {
                    facts
                        .methods
                        .entry(signature.name.clone())
                        .or_default()
                        .push(signature);
                } else {
                    facts.functions.insert(signature.name.clone(), signature);
                }
            }
        }

        facts.digest = facts.compute_digest();
        facts
    }

    fn collect_globals(&mut self, path: &Path, tree: &Tree, source: &[u8]) {
        let file = path.to_string_lossy();
        for decl in named_children(tree.root_node()) {
            for ident in declared_identifiers(decl) {
                let name = node_text(ident, source);
                if name == "_" {
                    continue;
                }
                let start = ident.start_position();
                self.globals
                    .entry(name.to_string())
                    .or_insert_with(|| Position::new(&*file, start.row + 1, start.column + 1));
            }
        }
    }

    /// Hash over every fact a rule can observe, in a stable order.
    fn compute_digest(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.extend(
            self.functions
                .values()
                .map(|sig| format!("func {}({})", sig.name, sig.results.join(","))),
        );
        lines.extend(self.methods.values().flatten().map(|sig| {
            format!(
                "method {}.{}({})",
                sig.receiver.as_deref().unwrap_or(""),
                sig.name,
                sig.results.join(",")
            )
        }));
        lines.extend(
            self.globals
                .iter()
                .map(|(name, pos)| format!("global {} {}", name, pos)),
        );
        lines.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(self.package.as_deref().unwrap_or("").as_bytes());
        for line in &lines {
            hasher.update([0u8]);
            hasher.update(line.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Digest of the package facts. Results that consulted these facts are
    /// only valid while it is unchanged.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Where a package-scope name is declared, if anywhere in the package.
    pub fn global(&self, name: &str) -> Option<&Position> {
        self.globals.get(name)
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn function(&self, name: &str) -> Option<&Signature> {
        self.functions.get(name)
    }

    /// Every method declared with `name`, across all receiver types.
    pub fn methods(&self, name: &str) -> &[Signature] {
        self.methods.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a call to the package-level function `name` returns an error.
    pub fn function_returns_error(&self, name: &str) -> bool {
        self.function(name).is_some_and(Signature::returns_error)
    }

    /// Whether a selector call `operand.field(...)` returns an error.
    ///
    /// Checks the standard-library table first, then methods of this package
    /// named `field`. Without receiver types, a method call is only reported
    /// when every same-named method in the package returns an error.
    pub fn selector_returns_error(&self, operand: &str, field: &str) -> bool {
        if STDLIB_ERROR_FUNCS.contains(format!("{}.{}", operand, field).as_str()) {
            return true;
        }
        let methods = self.methods(field);
        !methods.is_empty() && methods.iter().all(Signature::returns_error)
    }
}

fn node_text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Receiver type name, e.g. `Store` for `(s *Store[T])`.
fn receiver_type(receiver: Node<'_>, source: &[u8]) -> Option<String> {
    let param = named_children(receiver)
        .into_iter()
        .find(|n| n.kind() == "parameter_declaration")?;
    let ty = node_text(param.child_by_field_name("type")?, source);
    let ty = ty.trim_start_matches('*');
    let ty = ty.split('[').next().unwrap_or(ty);
    Some(ty.trim().to_string())
}

/// Flatten a result clause into one type per result value.
fn result_types(result: Node<'_>, source: &[u8]) -> Vec<String> {
    if result.kind() != "parameter_list" {
        return vec![node_text(result, source).to_string()];
    }

    let mut types = Vec::new();
    for param in named_children(result) {
        if !matches!(
            param.kind(),
            "parameter_declaration" | "variadic_parameter_declaration"
        ) {
            continue;
        }
        let Some(ty) = param.child_by_field_name("type") else {
            continue;
        };
        let ty = node_text(ty, source).to_string();
        let count = field_identifiers(param, "name").len().max(1);
        types.extend(std::iter::repeat(ty).take(count));
    }
    types
}
