//! Method discovery in one Java compilation unit.
//!
//! Every class-like declaration (class, interface, enum, record), including
//! nested and local ones, contributes the methods it declares directly.
//! Constructors and methods of anonymous classes are not reported.

use tree_sitter::Node;

use super::metrics::compute_metrics;
use super::parser::node_text;
use crate::models::{body_digest, Method, MethodMetrics};

const CLASS_LIKE_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

/// A method as found in source, before it is attached to a version.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedMethod {
    pub signature: String,
    pub class_path: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub body: String,
    pub metrics: MethodMetrics,
}

impl ExtractedMethod {
    /// True when the 1-based `line` lies inside this method's span.
    pub fn spans(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn into_method(self, version: &str) -> Method {
        Method {
            body_hash: body_digest(&self.body),
            signature: self.signature,
            class_path: self.class_path,
            file_path: self.file_path,
            version: version.to_string(),
            start_line: self.start_line,
            end_line: self.end_line,
            metrics: self.metrics,
            buggy: false,
        }
    }
}

/// Collect every method declared in `tree`.
pub fn collect_methods(tree: &tree_sitter::Tree, source: &str, file_path: &str) -> Vec<ExtractedMethod> {
    let root = tree.root_node();
    let package = package_name(root, source);
    let mut scope: Vec<String> = Vec::new();
    let mut out = Vec::new();
    visit(root, source, file_path, package.as_deref(), &mut scope, &mut out);
    out
}

fn package_name(root: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = root.walk();
    let package = root
        .named_children(&mut cursor)
        .find(|child| child.kind() == "package_declaration")?;
    let mut inner = package.walk();
    let name = package
        .named_children(&mut inner)
        .find(|child| matches!(child.kind(), "scoped_identifier" | "identifier"))?;
    Some(strip_whitespace(node_text(name, source)))
}

fn visit(
    node: Node<'_>,
    source: &str,
    file_path: &str,
    package: Option<&str>,
    scope: &mut Vec<String>,
    out: &mut Vec<ExtractedMethod>,
) {
    if CLASS_LIKE_KINDS.contains(&node.kind()) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default();
        scope.push(name);
        if let Some(body) = node.child_by_field_name("body") {
            for member in members(body) {
                if member.kind() == "method_declaration" {
                    if let Some(method) = build_method(member, source, file_path, package, scope) {
                        out.push(method);
                    }
                }
                visit(member, source, file_path, package, scope, out);
            }
        }
        scope.pop();
        return;
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        visit(child, source, file_path, package, scope, out);
    }
}

/// Direct members of a class-like body. Enum methods live one level down.
fn members(body: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = body.walk();
    let mut out = Vec::new();
    for child in body.named_children(&mut cursor) {
        if child.kind() == "enum_body_declarations" {
            let mut inner = child.walk();
            out.extend(child.named_children(&mut inner));
        } else {
            out.push(child);
        }
    }
    out
}

fn build_method(
    node: Node<'_>,
    source: &str,
    file_path: &str,
    package: Option<&str>,
    scope: &[String],
) -> Option<ExtractedMethod> {
    let name = node_text(node.child_by_field_name("name")?, source);
    let params = node
        .child_by_field_name("parameters")
        .map(|p| parameter_types(p, source))
        .unwrap_or_default();
    let owner = scope.join(".");
    let qualified_owner = match package {
        Some(pkg) if !pkg.is_empty() => format!("{pkg}.{owner}"),
        _ => owner.clone(),
    };
    let body = node
        .child_by_field_name("body")
        .map(|b| node_text(b, source).to_string())
        .unwrap_or_default();

    Some(ExtractedMethod {
        signature: format!("{qualified_owner}#{name}({})", params.join(", ")),
        class_path: format!("{file_path}/{owner}"),
        file_path: file_path.to_string(),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        body,
        metrics: compute_metrics(node, source),
    })
}

fn parameter_types(params: Node<'_>, source: &str) -> Vec<String> {
    let mut cursor = params.walk();
    let mut types = Vec::new();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "formal_parameter" => {
                let mut ty = param
                    .child_by_field_name("type")
                    .map(|t| strip_whitespace(node_text(t, source)))
                    .unwrap_or_default();
                if let Some(dims) = param.child_by_field_name("dimensions") {
                    ty.push_str(&strip_whitespace(node_text(dims, source)));
                }
                types.push(ty);
            }
            "spread_parameter" => {
                let mut inner = param.walk();
                let ty = param
                    .named_children(&mut inner)
                    .find(|c| !matches!(c.kind(), "modifiers" | "variable_declarator"))
                    .map(|t| strip_whitespace(node_text(t, source)))
                    .unwrap_or_default();
                types.push(format!("{ty}..."));
            }
            _ => {}
        }
    }
    types
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
