//! Cursor context for completion
//!
//! Works out which symbol kind the string under the cursor expects, using the
//! same classification grammar as the extractors:
//!
//! - PHP: the tree-sitter string node around the cursor, its call and
//!   argument position, or the render array key it is the value of. While a
//!   literal is still unterminated the tree is unusable, so the text of the
//!   current line is matched instead.
//! - YAML: the current line only, since the file is usually mid-edit.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::config::ServiceReferenceRule;
use crate::extractors::FileKind;
use crate::extractors::context::{CallSite, Slot, classify_array_key, classify_call, classify_yaml_value};
use crate::parsers::parse_php;
use crate::parsers::php::{argument_values, call_info, is_call, string_literal};

/// Where a completion was requested and what it expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionContext {
    pub slot: Slot,
    /// Text typed so far, from `prefix_start` to the cursor.
    pub prefix: String,
    /// Byte offset where the typed identifier starts.
    pub prefix_start: usize,
    /// Byte offset after the closing quote of a `fromRoute()` route argument
    /// that has no parameters argument yet.
    pub route_parameters_at: Option<usize>,
}

/// Whether the cursor sits inside a PHP string literal at all.
pub fn in_php_string(text: &str, offset: usize) -> bool {
    let offset = floor_char_boundary(text, offset);
    if let Some(tree) = parse_php(text) {
        if string_at(tree.root_node(), offset).is_some() {
            return true;
        }
    }
    let (_, line) = line_before(text, offset);
    line.matches('\'').count() % 2 == 1 || line.matches('"').count() % 2 == 1
}

/// Detects the completion context at byte `offset` of `text`.
pub fn detect(kind: FileKind, text: &str, offset: usize, rule: &ServiceReferenceRule) -> Option<CompletionContext> {
    let offset = floor_char_boundary(text, offset);
    match kind {
        FileKind::Php => php_tree_context(text, offset).or_else(|| php_line_context(text, offset)),
        FileKind::HookApi => None,
        FileKind::Services => service_line_context(text, offset, rule),
        FileKind::Routing | FileKind::Links | FileKind::Permissions => yaml_line_context(kind, text, offset),
    }
}

fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn line_before(text: &str, offset: usize) -> (usize, &str) {
    let start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    (start, &text[start..offset])
}

/// Innermost string literal node whose content holds `offset`.
fn string_at(root: Node, offset: usize) -> Option<Node> {
    let mut node = root.descendant_for_byte_range(offset, offset)?;
    loop {
        if matches!(node.kind(), "string" | "encapsed_string") {
            // Strictly after the opening quote and no further than the closing one.
            return (offset > node.start_byte() && offset < node.end_byte()).then_some(node);
        }
        node = node.parent()?;
    }
}

fn php_tree_context(text: &str, offset: usize) -> Option<CompletionContext> {
    let tree = parse_php(text)?;
    let string = string_at(tree.root_node(), offset)?;
    if string.has_error() {
        return None;
    }
    let literal = string_literal(string, text)?;
    if offset < literal.span.start || offset > literal.span.end {
        return None;
    }
    let prefix = text.get(literal.span.start..offset)?.to_string();
    let parent = string.parent()?;

    // `'#type' => 'da|'`
    if parent.kind() == "array_element_initializer" && parent.named_child_count() == 2 {
        let key = parent.named_child(0)?;
        if key.id() != string.id() {
            let key = string_literal(key, text)?;
            let slot = classify_array_key(&key.value)?;
            return Some(CompletionContext {
                slot,
                prefix,
                prefix_start: literal.span.start,
                route_parameters_at: None,
            });
        }
        return None;
    }

    // A string argument, or an item of an array argument: `alter(['a', 'b|'])`.
    let argument_value = if parent.kind() == "argument" {
        string
    } else if parent.kind() == "array_element_initializer" && parent.named_child_count() == 1 {
        let array = parent.parent()?;
        if array.kind() != "array_creation_expression" || array.parent()?.kind() != "argument" {
            return None;
        }
        array
    } else {
        return None;
    };
    let arguments = argument_value.parent()?.parent()?;
    let call = arguments.parent()?;
    if arguments.kind() != "arguments" || !is_call(&call) {
        return None;
    }
    let info = call_info(call, text)?;
    let position = argument_values(arguments)
        .iter()
        .position(|value| value.id() == argument_value.id())?;
    let slot = classify_call(&CallSite {
        callee: &info.callee,
        receiver: info.receiver.as_deref(),
        argument: position,
    })?;
    let route_parameters_at = (info.callee == "fromRoute" && position == 0 && info.arguments.len() == 1)
        .then(|| string.end_byte());
    Some(CompletionContext {
        slot,
        prefix,
        prefix_start: literal.span.start,
        route_parameters_at,
    })
}

static CALL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:(?P<receiver>[$\\\w]+(?:\(\))?(?:(?:->|::)\w+(?:\(\))?)*)(?:->|::))?(?P<callee>\w+)\((?P<args>(?:[^()'"]|'[^']*'|"[^"]*"|\([^()]*\))*)['"](?P<prefix>[^'"]*)$"#,
    )
    .expect("valid regex")
});

static ARRAY_KEY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"['"](?P<key>#\w+)['"]\s*=>\s*['"](?P<prefix>[^'"]*)$"#).expect("valid regex")
});

fn php_line_context(text: &str, offset: usize) -> Option<CompletionContext> {
    let (line_start, line) = line_before(text, offset);
    if let Some(caps) = ARRAY_KEY_PREFIX.captures(line) {
        let slot = classify_array_key(&caps["key"])?;
        let prefix = caps.name("prefix")?;
        return Some(CompletionContext {
            slot,
            prefix: prefix.as_str().to_string(),
            prefix_start: line_start + prefix.start(),
            route_parameters_at: None,
        });
    }
    let caps = CALL_PREFIX.captures(line)?;
    let prefix = caps.name("prefix")?;
    let slot = classify_call(&CallSite {
        callee: caps.name("callee")?.as_str(),
        receiver: caps.name("receiver").map(|m| m.as_str()),
        argument: top_level_commas(caps.name("args").map(|m| m.as_str()).unwrap_or("")),
    })?;
    Some(CompletionContext {
        slot,
        prefix: prefix.as_str().to_string(),
        prefix_start: line_start + prefix.start(),
        route_parameters_at: None,
    })
}

/// Number of commas outside quotes and brackets, i.e. the argument index of
/// whatever follows `args`.
fn top_level_commas(args: &str) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut commas = 0;
    for c in args.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => commas += 1,
            _ => {}
        }
    }
    commas
}

fn service_line_context(text: &str, offset: usize, rule: &ServiceReferenceRule) -> Option<CompletionContext> {
    let (line_start, line) = line_before(text, offset);
    let token_start = line
        .rfind(|c: char| c.is_whitespace() || matches!(c, '[' | ',' | '\'' | '"' | '{'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let token = &line[token_start..];
    if let Some(escape) = &rule.escape {
        if token.starts_with(escape.as_str()) {
            return None;
        }
    }
    let mut skip = rule.prefix.len();
    let rest = token.strip_prefix(rule.prefix.as_str())?;
    if let Some(marker) = rule.optional_marker {
        if rest.starts_with(marker) {
            skip += marker.len_utf8();
        }
    }
    let prefix = &token[skip..];
    Some(CompletionContext {
        slot: Slot::Symbol(crate::ir::SymbolKind::Service),
        prefix: prefix.to_string(),
        prefix_start: line_start + token_start + skip,
        route_parameters_at: None,
    })
}

static YAML_KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r##"^\s*(?:-\s+)?(?P<key>[A-Za-z_][\w.]*)\s*:\s*['"]?(?P<value>[^'"#]*)$"##).expect("valid regex")
});

fn yaml_line_context(kind: FileKind, text: &str, offset: usize) -> Option<CompletionContext> {
    let (line_start, line) = line_before(text, offset);
    let caps = YAML_KEY_VALUE.captures(line)?;
    let slot = classify_yaml_value(kind, &caps["key"])?;
    let value = caps.name("value")?;
    // Only the last permission of a `+`/`,` list is being typed.
    let mut start = value.start();
    if slot == Slot::PermissionList {
        if let Some(separator) = value.as_str().rfind(['+', ',']) {
            start = value.start() + separator + 1;
        }
    }
    let typed = &line[start..];
    let trimmed = typed.trim_start();
    start += typed.len() - trimmed.len();
    Some(CompletionContext {
        slot,
        prefix: trimmed.to_string(),
        prefix_start: line_start + start,
        route_parameters_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{PluginType, SymbolKind};

    fn at_cursor(kind: FileKind, marked: &str) -> Option<CompletionContext> {
        let offset = marked.find('|').expect("cursor marker");
        let text = marked.replacen('|', "", 1);
        detect(kind, &text, offset, &ServiceReferenceRule::default())
    }

    #[test]
    fn test_php_call_argument() {
        let context = at_cursor(FileKind::Php, "<?php\n$x = \\Drupal::service('logger.f|');\n").expect("context");
        assert_eq!(context.slot, Slot::Symbol(SymbolKind::Service));
        assert_eq!(context.prefix, "logger.f");
        assert_eq!(context.route_parameters_at, None);
    }

    #[test]
    fn test_php_second_argument_and_route_parameters() {
        let link = at_cursor(FileKind::Php, "<?php\nLink::createFromRoute(t('Home'), 'mymod.|');\n").expect("context");
        assert_eq!(link.slot, Slot::Symbol(SymbolKind::Route));
        assert_eq!(link.prefix, "mymod.");

        let text = "<?php\nUrl::fromRoute('mymod.|');\n";
        let context = at_cursor(FileKind::Php, text).expect("context");
        let after_quote = text.replacen('|', "", 1).find("');").unwrap() + 1;
        assert_eq!(context.route_parameters_at, Some(after_quote));
    }

    #[test]
    fn test_php_render_array_type() {
        let context = at_cursor(FileKind::Php, "<?php\n$form['x'] = ['#type' => 'te|'];\n").expect("context");
        assert_eq!(context.slot, Slot::Symbol(SymbolKind::Plugin(PluginType::RenderElement)));
        assert_eq!(context.prefix, "te");
    }

    #[test]
    fn test_php_unterminated_literal_uses_line() {
        let context = at_cursor(
            FileKind::Php,
            "<?php\nfunction f() {\n  \\Drupal::moduleHandler()->alter('for|\n}\n",
        )
        .expect("context");
        assert_eq!(context.slot, Slot::AlterHook);
        assert_eq!(context.prefix, "for");
    }

    #[test]
    fn test_php_unclassified_string() {
        assert!(at_cursor(FileKind::Php, "<?php\n$x = strtolower('ab|');\n").is_none());
    }

    #[test]
    fn test_yaml_contexts() {
        let service = at_cursor(FileKind::Services, "services:\n  a:\n    arguments: ['@?cache.|']\n").expect("service");
        assert_eq!(service.slot, Slot::Symbol(SymbolKind::Service));
        assert_eq!(service.prefix, "cache.");

        let permission = at_cursor(
            FileKind::Routing,
            "a.page:\n  requirements:\n    _permission: 'access content+adm|'\n",
        )
        .expect("permission");
        assert_eq!(permission.slot, Slot::PermissionList);
        assert_eq!(permission.prefix, "adm");

        let link = at_cursor(FileKind::Links, "a.link:\n  route_name: mymod.|\n").expect("link");
        assert_eq!(link.slot, Slot::Symbol(SymbolKind::Route));
        assert_eq!(link.prefix, "mymod.");

        assert!(at_cursor(FileKind::Routing, "a.page:\n  path: /fo|\n").is_none());

        let quoted = at_cursor(
            FileKind::Routing,
            "a.page:\n  requirements:\n    _permission: \"access con|\"\n",
        )
        .expect("double-quoted permission");
        assert_eq!(quoted.prefix, "access con");
        assert!(at_cursor(FileKind::Links, "a.link:\n  route_name: mymod.page # note|\n").is_none());
    }

    #[test]
    fn test_top_level_commas() {
        assert_eq!(top_level_commas(""), 0);
        assert_eq!(top_level_commas("t('a, b'), "), 1);
        assert_eq!(top_level_commas("$a, [1, 2], "), 2);
    }
}
