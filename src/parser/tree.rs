//! Tree-sitter traversal helpers shared by the walker and rules.

use tree_sitter::Node;

/// Visit `node` and all of its descendants in pre-order.
///
/// Every node is visited before any of its descendants, and siblings are
/// visited in source order. Anonymous (token) nodes are included.
pub fn visit_preorder<'t>(node: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = node.walk();
    let mut depth = 0usize;
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if depth == 0 {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            cursor.goto_parent();
            depth -= 1;
        }
    }
}

/// Named nodes of `node`'s subtree (including `node`) in pre-order.
pub fn named_preorder(node: Node<'_>) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    visit_preorder(node, |n| {
        if n.is_named() {
            nodes.push(n);
        }
    });
    nodes
}

/// Named direct children of a node.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// All children attached to `field`.
pub fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Identifier children attached to `field`, skipping separators.
pub fn field_identifiers<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    field_children(node, field)
        .into_iter()
        .filter(|n| matches!(n.kind(), "identifier" | "type_identifier"))
        .collect()
}

/// Children of kind `kind`, looking through a parenthesized `*_list` group.
///
/// Covers `import (...)`, `var (...)` and similar grouped declarations.
pub fn spec_children<'t>(decl: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut specs = Vec::new();
    for child in named_children(decl) {
        if child.kind() == kind {
            specs.push(child);
        } else if child.kind().ends_with("_list") {
            specs.extend(
                named_children(child)
                    .into_iter()
                    .filter(|n| n.kind() == kind),
            );
        }
    }
    specs
}

/// Identifiers a declaration introduces, in source order.
///
/// Handles `:=`, `var`, `const`, `type` and function declarations; any other
/// node declares nothing.
pub fn declared_identifiers(decl: Node<'_>) -> Vec<Node<'_>> {
    match decl.kind() {
        "short_var_declaration" => decl
            .child_by_field_name("left")
            .map(|left| expressions(left))
            .unwrap_or_default()
            .into_iter()
            .filter(|n| n.kind() == "identifier")
            .collect(),
        "var_declaration" => spec_children(decl, "var_spec")
            .into_iter()
            .flat_map(|spec| field_identifiers(spec, "name"))
            .collect(),
        "const_declaration" => spec_children(decl, "const_spec")
            .into_iter()
            .flat_map(|spec| field_identifiers(spec, "name"))
            .collect(),
        "type_declaration" => named_children(decl)
            .into_iter()
            .filter(|n| matches!(n.kind(), "type_spec" | "type_alias"))
            .filter_map(|n| n.child_by_field_name("name"))
            .collect(),
        "function_declaration" => decl.child_by_field_name("name").into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Names declared by a parameter list, including variadic parameters.
pub fn parameter_identifiers(list: Node<'_>) -> Vec<Node<'_>> {
    if list.kind() != "parameter_list" {
        return Vec::new();
    }
    named_children(list)
        .into_iter()
        .filter(|p| {
            matches!(
                p.kind(),
                "parameter_declaration" | "variadic_parameter_declaration"
            )
        })
        .flat_map(|p| field_identifiers(p, "name"))
        .collect()
}

/// Whether `node` has a direct `:=` token child.
pub fn has_define_token(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|n| n.kind() == ":=");
    found
}

/// First node in the subtree that is a syntax error or a missing token.
pub fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if !node.has_error() {
        return None;
    }
    let mut found = None;
    visit_preorder(node, |n| {
        if found.is_none() && (n.is_error() || n.is_missing()) {
            found = Some(n);
        }
    });
    found
}

/// Whether `node` has an ancestor of one of `kinds` strictly below `boundary`.
pub fn has_ancestor_kind(node: Node<'_>, kinds: &[&str], boundary: Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.id() == boundary.id() {
            return false;
        }
        if kinds.contains(&parent.kind()) {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// Unwrap a composite literal element to the expression it holds.
pub fn literal_element_value(node: Node<'_>) -> Node<'_> {
    if node.kind() == "literal_element" {
        node.named_child(0).unwrap_or(node)
    } else {
        node
    }
}

/// Whether the node is a non-empty Go string literal.
pub fn is_string_literal(node: Node<'_>) -> bool {
    matches!(node.kind(), "interpreted_string_literal" | "raw_string_literal")
        && node.end_byte().saturating_sub(node.start_byte()) > 2
}

/// Strip Go string delimiters.
pub fn unquote(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '`')
}

/// Statements directly inside a block, looking through any statement list.
pub fn block_statements(block: Node<'_>) -> Vec<Node<'_>> {
    let mut statements = Vec::new();
    for child in named_children(block) {
        if child.kind() == "statement_list" {
            statements.extend(named_children(child));
        } else {
            statements.push(child);
        }
    }
    statements.retain(|n| n.kind() != "comment");
    statements
}

/// Named expressions of an expression list, or the node itself otherwise.
pub fn expressions(node: Node<'_>) -> Vec<Node<'_>> {
    if node.kind() == "expression_list" {
        named_children(node)
            .into_iter()
            .filter(|n| n.kind() != "comment")
            .collect()
    } else {
        vec![node]
    }
}

/// If `expr_list` holds exactly one expression, return it.
pub fn single_expression(expr_list: Node<'_>) -> Option<Node<'_>> {
    if expr_list.kind() != "expression_list" {
        return Some(expr_list);
    }
    if expr_list.named_child_count() == 1 {
        expr_list.named_child(0)
    } else {
        None
    }
}
