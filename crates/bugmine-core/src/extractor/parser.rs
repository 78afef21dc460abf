//! Java parsing wrapper used by the extraction passes.

use crate::errors::{MinerError, MinerResult};

/// A reusable tree-sitter parser configured for Java.
pub struct JavaParser {
    parser: tree_sitter::Parser,
}

impl JavaParser {
    pub fn new() -> MinerResult<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| MinerError::Parse(format!("Failed to set language: {e}")))?;
        Ok(Self { parser })
    }

    /// Parse `source`, returning `None` when the file has syntax errors.
    pub fn parse_clean(&mut self, source: &str) -> Option<tree_sitter::Tree> {
        let tree = self.parser.parse(source.as_bytes(), None)?;
        if tree.root_node().has_error() {
            return None;
        }
        Some(tree)
    }
}

/// Text of `node`, empty when the byte range is not valid UTF-8.
pub fn node_text<'a>(node: tree_sitter::Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}
