//! Translation placeholder code action
//!
//! `t('Hello @name')` becomes `t('Hello @name', ['@name' => ''])`. When the
//! replacement array already exists only the missing keys are appended, so
//! applying the action twice changes nothing the second time.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{CodeAction, CodeActionKind, Position, Range, TextEdit, WorkspaceEdit};
use tracing::debug;
use tree_sitter::Node;

use crate::lsp::engine::DocumentSnapshot;
use crate::parsers::parse_php;
use crate::parsers::php::{array_elements, call_info, string_literal};
use crate::parsers::position_utils::LineIndex;

pub const TITLE: &str = "Add translations placeholders";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[@%:]\w+").expect("valid regex"));

/// Distinct placeholder tokens in order of first appearance.
pub fn placeholders(text: &str) -> Vec<&str> {
    let mut seen = Vec::new();
    for m in PLACEHOLDER.find_iter(text) {
        if !seen.contains(&m.as_str()) {
            seen.push(m.as_str());
        }
    }
    seen
}

/// The innermost `t()` or `->t()` call around `offset`.
fn translation_call<'tree>(root: Node<'tree>, source: &str, offset: usize) -> Option<Node<'tree>> {
    let mut node = root.descendant_for_byte_range(offset, offset)?;
    loop {
        if matches!(node.kind(), "function_call_expression" | "member_call_expression") {
            if call_info(node, source).is_some_and(|info| info.callee == "t") {
                return Some(node);
            }
        }
        node = node.parent()?;
    }
}

/// Builds the edit for the `t()` call under the cursor, if it needs one.
pub fn translation_placeholders(document: &DocumentSnapshot, position: Position) -> Option<CodeAction> {
    if !document.kind.is_php() {
        return None;
    }
    let text: &str = &document.text;
    let lines = LineIndex::new(text);
    let offset = lines.offset_of(position);
    let tree = parse_php(text)?;
    let call = translation_call(tree.root_node(), text, offset)?;
    let info = call_info(call, text)?;

    let first = *info.arguments.first()?;
    let message = string_literal(first, text)?;
    let tokens = placeholders(&message.value);
    if tokens.is_empty() {
        return None;
    }

    let (insert_at, new_text) = match info.arguments.get(1) {
        None => {
            let entries: Vec<String> = tokens.iter().map(|token| format!("'{}' => ''", token)).collect();
            (first.end_byte(), format!(", [{}]", entries.join(", ")))
        }
        Some(array) if array.kind() == "array_creation_expression" => {
            let elements = array_elements(*array);
            let existing: Vec<String> = elements
                .iter()
                .filter_map(|(key, _)| key.and_then(|key| string_literal(key, text)))
                .map(|key| key.value)
                .collect();
            let missing: Vec<String> = tokens
                .iter()
                .filter(|token| !existing.iter().any(|key| key == *token))
                .map(|token| format!("'{}' => ''", token))
                .collect();
            if missing.is_empty() {
                debug!("Translation call already maps every placeholder");
                return None;
            }
            match elements.last() {
                Some((_, value)) => (value.end_byte(), format!(", {}", missing.join(", "))),
                // `[]` or `array()`: insert before the closing bracket.
                None => (array.end_byte().saturating_sub(1), missing.join(", ")),
            }
        }
        Some(_) => return None,
    };

    let position = lines.position_of(insert_at);
    let edit = TextEdit {
        range: Range::new(position, position),
        new_text,
    };
    Some(CodeAction {
        title: TITLE.to_string(),
        kind: Some(CodeActionKind::REFACTOR_INLINE),
        edit: Some(WorkspaceEdit {
            changes: Some(HashMap::from([(document.uri.clone(), vec![edit])])),
            ..WorkspaceEdit::default()
        }),
        is_preferred: Some(true),
        ..CodeAction::default()
    })
}
