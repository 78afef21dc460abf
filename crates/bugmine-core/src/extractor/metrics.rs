//! Size and complexity metrics computed from a method's syntax tree.

use tree_sitter::Node;

use super::parser::node_text;
use crate::models::MethodMetrics;

const STATEMENT_KINDS: &[&str] = &[
    "block",
    "expression_statement",
    "local_variable_declaration",
    "if_statement",
    "for_statement",
    "enhanced_for_statement",
    "while_statement",
    "do_statement",
    "switch_expression",
    "try_statement",
    "try_with_resources_statement",
    "return_statement",
    "break_statement",
    "continue_statement",
    "throw_statement",
    "yield_statement",
    "synchronized_statement",
    "labeled_statement",
    "assert_statement",
];

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "enhanced_for_statement",
    "while_statement",
    "do_statement",
    "catch_clause",
];

const NESTING_KINDS: &[&str] = &[
    "for_statement",
    "enhanced_for_statement",
    "while_statement",
    "do_statement",
    "catch_clause",
    "switch_expression",
    "ternary_expression",
];

/// Compute every metric of a `method_declaration` node.
pub fn compute_metrics(method: Node<'_>, source: &str) -> MethodMetrics {
    let body = method.child_by_field_name("body");
    let parameters = method
        .child_by_field_name("parameters")
        .map(|params| {
            let mut cursor = params.walk();
            params
                .named_children(&mut cursor)
                .filter(|p| matches!(p.kind(), "formal_parameter" | "spread_parameter"))
                .count() as u32
        })
        .unwrap_or(0);

    match body {
        Some(body) => MethodMetrics {
            loc: lines_of_code(node_text(body, source)),
            statements: count_kinds(body, STATEMENT_KINDS),
            cyclomatic: cyclomatic(body, source),
            cognitive: cognitive_children(body, 0),
            parameters,
            fan_out: count_kinds(body, &["method_invocation"]),
            deprecated: is_deprecated(method, source),
        },
        None => MethodMetrics {
            cyclomatic: 1,
            parameters,
            deprecated: is_deprecated(method, source),
            ..MethodMetrics::default()
        },
    }
}

/// Non-blank lines that do not open or continue a comment.
pub fn lines_of_code(text: &str) -> u32 {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with("//")
                && !line.starts_with("/*")
                && !line.starts_with('*')
        })
        .count() as u32
}

fn visit<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, f);
    }
}

fn count_kinds(node: Node<'_>, kinds: &[&str]) -> u32 {
    let mut count = 0;
    visit(node, &mut |n| {
        if kinds.contains(&n.kind()) {
            count += 1;
        }
    });
    count
}

fn is_logical_operator(node: Node<'_>) -> bool {
    node.kind() == "binary_expression"
        && node
            .child_by_field_name("operator")
            .is_some_and(|op| matches!(op.kind(), "&&" | "||"))
}

fn cyclomatic(body: Node<'_>, source: &str) -> u32 {
    let mut complexity = 1;
    visit(body, &mut |n| {
        let kind = n.kind();
        if BRANCH_KINDS.contains(&kind) || is_logical_operator(n) {
            complexity += 1;
        } else if kind == "switch_label" && !node_text(n, source).trim_start().starts_with("default") {
            complexity += 1;
        }
    });
    complexity
}

fn count_logical(node: Node<'_>) -> u32 {
    let mut count = 0;
    visit(node, &mut |n| {
        if is_logical_operator(n) {
            count += 1;
        }
    });
    count
}

fn cognitive_children(node: Node<'_>, depth: u32) -> u32 {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .map(|child| cognitive(child, depth))
        .sum()
}

fn cognitive(node: Node<'_>, depth: u32) -> u32 {
    match node.kind() {
        "if_statement" => cognitive_if(node, depth, false),
        "try_statement" | "try_with_resources_statement" => 1 + cognitive_children(node, depth),
        "lambda_expression" => 1 + cognitive_children(node, depth + 1),
        "object_creation_expression" if has_class_body(node) => {
            1 + cognitive_children(node, depth + 1)
        }
        kind if NESTING_KINDS.contains(&kind) => 1 + depth + cognitive_children(node, depth + 1),
        _ => cognitive_children(node, depth),
    }
}

/// `else if` continues the chain at the same depth without a nesting penalty.
fn cognitive_if(node: Node<'_>, depth: u32, chained: bool) -> u32 {
    let mut score = if chained { 1 } else { 1 + depth };
    if let Some(condition) = node.child_by_field_name("condition") {
        score += count_logical(condition) + cognitive_children(condition, depth + 1);
    }
    if let Some(consequence) = node.child_by_field_name("consequence") {
        score += cognitive(consequence, depth + 1);
    }
    if let Some(alternative) = node.child_by_field_name("alternative") {
        score += if alternative.kind() == "if_statement" {
            cognitive_if(alternative, depth, true)
        } else {
            1 + cognitive(alternative, depth + 1)
        };
    }
    score
}

fn has_class_body(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .any(|child| child.kind() == "class_body");
    found
}

fn is_deprecated(method: Node<'_>, source: &str) -> bool {
    let mut cursor = method.walk();
    let Some(modifiers) = method
        .named_children(&mut cursor)
        .find(|child| child.kind() == "modifiers")
    else {
        return false;
    };
    let mut inner = modifiers.walk();
    let found = modifiers.named_children(&mut inner).any(|annotation| {
        matches!(annotation.kind(), "marker_annotation" | "annotation")
            && annotation
                .child_by_field_name("name")
                .map(|name| node_text(name, source))
                .is_some_and(|name| name == "Deprecated" || name == "java.lang.Deprecated")
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::parser::JavaParser;

    fn metrics_of(method_src: &str) -> MethodMetrics {
        let source = format!("class T {{\n{method_src}\n}}\n");
        let mut parser = JavaParser::new().unwrap();
        let tree = parser.parse_clean(&source).unwrap();
        let mut found = None;
        visit(tree.root_node(), &mut |n| {
            if found.is_none() && n.kind() == "method_declaration" {
                found = Some(compute_metrics(n, &source));
            }
        });
        found.unwrap()
    }

    #[test]
    fn test_lines_of_code_skips_comments_and_blanks() {
        let text = "{\n  // note\n\n  int a = 1;\n  /* block\n   * more\n   */\n  return a;\n}";
        assert_eq!(lines_of_code(text), 4);
    }

    #[test]
    fn test_straight_line_method() {
        let m = metrics_of("int add(int a, int b) {\n  int c = a + b;\n  return c;\n}");
        assert_eq!(m.cyclomatic, 1);
        assert_eq!(m.cognitive, 0);
        assert_eq!(m.parameters, 2);
        assert_eq!(m.statements, 3);
        assert_eq!(m.loc, 4);
        assert!(!m.deprecated);
    }

    #[test]
    fn test_cyclomatic_counts_branches_and_operators() {
        let m = metrics_of(
            "void f(int x, boolean a, boolean b) {\n\
               if (a && b) { x++; }\n\
               for (int i = 0; i < x; i++) { }\n\
               while (x > 0 || a) { x--; }\n\
               try { g(); } catch (RuntimeException e) { }\n\
             }",
        );
        // 1 + if + && + for + while + || + catch
        assert_eq!(m.cyclomatic, 7);
        assert_eq!(m.fan_out, 1);
    }

    #[test]
    fn test_cyclomatic_switch_ignores_default() {
        let m = metrics_of(
            "int f(int x) {\n\
               switch (x) {\n\
                 case 1: return 10;\n\
                 case 2: return 20;\n\
                 default: return 0;\n\
               }\n\
             }",
        );
        assert_eq!(m.cyclomatic, 3);
    }

    #[test]
    fn test_cognitive_weights_nesting() {
        let m = metrics_of(
            "void f(int[] xs) {\n\
               for (int x : xs) {\n\
                 if (x > 0) {\n\
                   g(x);\n\
                 }\n\
               }\n\
             }",
        );
        // for: 1, nested if: 1 + 1
        assert_eq!(m.cognitive, 3);
    }

    #[test]
    fn test_cognitive_else_if_chain_is_flat() {
        let m = metrics_of(
            "int f(int x) {\n\
               if (x > 0) { return 1; }\n\
               else if (x < 0) { return -1; }\n\
               else { return 0; }\n\
             }",
        );
        // if: 1, else if: 1, else: 1
        assert_eq!(m.cognitive, 3);
    }

    #[test]
    fn test_abstract_method_metrics() {
        let source = "abstract class T {\n  @Deprecated\n  abstract void run(String... args);\n}\n";
        let mut parser = JavaParser::new().unwrap();
        let tree = parser.parse_clean(source).unwrap();
        let mut metrics = None;
        visit(tree.root_node(), &mut |n| {
            if n.kind() == "method_declaration" {
                metrics = Some(compute_metrics(n, source));
            }
        });
        let m = metrics.unwrap();
        assert_eq!(m.cyclomatic, 1);
        assert_eq!(m.loc, 0);
        assert_eq!(m.parameters, 1);
        assert!(m.deprecated);
    }
}
