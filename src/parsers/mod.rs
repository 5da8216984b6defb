//! Tree-sitter front ends for the two source languages of a Drupal code base
//!
//! - [`php`] covers module code, API stub files and plugin classes.
//! - [`yaml`] lowers the tree-sitter YAML tree into a small owned document
//!   model that the YAML extractors walk.
//! - [`position_utils`] converts tree-sitter byte offsets to LSP positions.

pub mod php;
pub mod position_utils;
pub mod yaml;

use tree_sitter::{Language, Node, Parser, Tree};

use tracing::warn;

use crate::errors::{ParseFailure, SourceLanguage};
use crate::parsers::position_utils::LineIndex;

pub fn php_language() -> Language {
    tree_sitter_php::LANGUAGE_PHP.into()
}

pub fn yaml_language() -> Language {
    tree_sitter_yaml::LANGUAGE.into()
}

fn parse_with(language: &Language, text: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(language) {
        warn!("Failed to set tree-sitter language: {}", e);
        return None;
    }
    parser.parse(text, None)
}

/// Parses PHP source. `None` only when tree-sitter could not produce a tree.
pub fn parse_php(text: &str) -> Option<Tree> {
    parse_with(&php_language(), text)
}

/// Parses YAML source. `None` only when tree-sitter could not produce a tree.
pub fn parse_yaml(text: &str) -> Option<Tree> {
    parse_with(&yaml_language(), text)
}

/// Returns the source text covered by `node`.
pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Finds the first `ERROR` or missing node in document order.
pub fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}

/// Builds a [`ParseFailure`] pointing at the first syntax error of `tree`.
pub fn failure_from_tree(language: SourceLanguage, tree: &Tree, lines: &LineIndex) -> ParseFailure {
    let root = tree.root_node();
    match first_error(root) {
        Some(node) => {
            let message = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "syntax error".to_string()
            };
            ParseFailure::new(language, lines.range_of(node.start_byte(), node.end_byte()), message)
        }
        None => ParseFailure::new(
            language,
            lines.range_of(root.start_byte(), root.end_byte()),
            "syntax error",
        ),
    }
}
