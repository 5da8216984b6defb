//! Owned YAML document model lowered from the tree-sitter YAML grammar.
//!
//! Drupal YAML files mix block style (`services:` followed by indented
//! entries) and flow style (`{class: Foo, arguments: ['@bar']}`). Both are
//! lowered into the same [`YamlValue`] tree so extractors never look at
//! grammar node kinds. Every scalar keeps the byte span of its content,
//! quotes excluded.

use tree_sitter::{Node, Tree};

use super::node_text;

/// Half-open byte span into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn of(node: &Node) -> Self {
        Self {
            start: node.start_byte(),
            end: node.end_byte(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlScalar {
    /// Unquoted, unescaped value.
    pub value: String,
    /// Span of the value without surrounding quotes.
    pub span: Span,
    pub quoted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlPair {
    pub key: YamlScalar,
    pub value: Option<YamlValue>,
    /// Span of the whole `key: value` entry.
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YamlValue {
    Scalar(YamlScalar),
    Mapping(Vec<YamlPair>),
    Sequence(Vec<YamlValue>),
    /// Aliases, block scalars and anything else extractors do not inspect.
    Other(Span),
}

impl YamlValue {
    pub fn as_mapping(&self) -> Option<&[YamlPair]> {
        match self {
            YamlValue::Mapping(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[YamlValue]> {
        match self {
            YamlValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&YamlScalar> {
        match self {
            YamlValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Looks up `key` in a mapping value.
    pub fn get(&self, key: &str) -> Option<&YamlValue> {
        self.as_mapping()?
            .iter()
            .find(|pair| pair.key.value == key)
            .and_then(|pair| pair.value.as_ref())
    }

    /// Looks up `key` in a mapping value and returns it as a scalar string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_scalar().map(|s| s.value.as_str())
    }

    /// Collects scalars reachable from this value.
    ///
    /// With `nested` false only the value itself and the direct items of a
    /// sequence are visited; with `nested` true the walk descends into every
    /// sequence and mapping value.
    pub fn scalars(&self, nested: bool) -> Vec<&YamlScalar> {
        let mut out = Vec::new();
        self.collect_scalars(nested, 0, &mut out);
        out
    }

    fn collect_scalars<'a>(&'a self, nested: bool, depth: usize, out: &mut Vec<&'a YamlScalar>) {
        match self {
            YamlValue::Scalar(scalar) => out.push(scalar),
            YamlValue::Sequence(items) if nested || depth == 0 => {
                for item in items {
                    item.collect_scalars(nested, depth + 1, out);
                }
            }
            YamlValue::Mapping(pairs) if nested => {
                for pair in pairs {
                    if let Some(value) = &pair.value {
                        value.collect_scalars(nested, depth + 1, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Lowers every document of a YAML stream.
pub fn lower_documents(tree: &Tree, source: &str) -> Vec<YamlValue> {
    let root = tree.root_node();
    let mut documents = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "document" {
            let mut doc_cursor = child.walk();
            let value = child
                .named_children(&mut doc_cursor)
                .find_map(|node| lower_node(node, source));
            if let Some(value) = value {
                documents.push(value);
            }
        }
    }
    documents
}

/// Lowers a single value node. Comments and unrecognized nodes yield `None`.
pub fn lower_node(node: Node, source: &str) -> Option<YamlValue> {
    match node.kind() {
        "block_node" | "flow_node" => {
            let mut cursor = node.walk();
            let lowered = node
                .named_children(&mut cursor)
                .find_map(|child| lower_node(child, source));
            lowered.or_else(|| Some(YamlValue::Other(Span::of(&node))))
        }
        "plain_scalar" => Some(YamlValue::Scalar(YamlScalar {
            value: node_text(&node, source).trim().to_string(),
            span: Span::of(&node),
            quoted: false,
        })),
        "single_quote_scalar" => Some(YamlValue::Scalar(unquote(node, source, '\''))),
        "double_quote_scalar" => Some(YamlValue::Scalar(unquote(node, source, '"'))),
        "block_mapping" => Some(YamlValue::Mapping(lower_pairs(node, source, "block_mapping_pair"))),
        "flow_mapping" => Some(YamlValue::Mapping(lower_pairs(node, source, "flow_pair"))),
        "block_sequence" => {
            let mut items = Vec::new();
            let mut cursor = node.walk();
            for item in node.named_children(&mut cursor) {
                if item.kind() != "block_sequence_item" {
                    continue;
                }
                let mut item_cursor = item.walk();
                if let Some(value) = item
                    .named_children(&mut item_cursor)
                    .find_map(|child| lower_node(child, source))
                {
                    items.push(value);
                }
            }
            Some(YamlValue::Sequence(items))
        }
        "flow_sequence" => {
            let mut items = Vec::new();
            let mut cursor = node.walk();
            for item in node.named_children(&mut cursor) {
                match item.kind() {
                    "flow_pair" => {
                        if let Some(pair) = lower_pair(item, source) {
                            items.push(YamlValue::Mapping(vec![pair]));
                        }
                    }
                    _ => {
                        if let Some(value) = lower_node(item, source) {
                            items.push(value);
                        }
                    }
                }
            }
            Some(YamlValue::Sequence(items))
        }
        "alias" | "block_scalar" => Some(YamlValue::Other(Span::of(&node))),
        _ => None,
    }
}

fn lower_pairs(node: Node, source: &str, pair_kind: &str) -> Vec<YamlPair> {
    let mut pairs = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.is_error() {
            continue;
        }
        if child.kind() == pair_kind {
            if let Some(pair) = lower_pair(child, source) {
                pairs.push(pair);
            }
        } else if child.kind() == "flow_node" {
            // A bare key inside a flow mapping, e.g. `{ foo }`.
            if let Some(YamlValue::Scalar(key)) = lower_node(child, source) {
                pairs.push(YamlPair {
                    key,
                    value: None,
                    span: Span::of(&child),
                });
            }
        }
    }
    pairs
}

fn lower_pair(node: Node, source: &str) -> Option<YamlPair> {
    let key_node = node.child_by_field_name("key")?;
    let key = match lower_node(key_node, source)? {
        YamlValue::Scalar(scalar) => scalar,
        _ => return None,
    };
    let value = node
        .child_by_field_name("value")
        .and_then(|value| lower_node(value, source));
    Some(YamlPair {
        key,
        value,
        span: Span::of(&node),
    })
}

fn unquote(node: Node, source: &str, quote: char) -> YamlScalar {
    let raw = node_text(&node, source);
    let start = node.start_byte();
    let end = node.end_byte();
    let inner_start = if raw.starts_with(quote) { start + 1 } else { start };
    let inner_end = if raw.len() > 1 && raw.ends_with(quote) { end - 1 } else { end };
    let inner = source.get(inner_start..inner_end.max(inner_start)).unwrap_or("");
    let value = if quote == '\'' {
        inner.replace("''", "'")
    } else {
        inner.replace("\\\"", "\"").replace("\\\\", "\\")
    };
    YamlScalar {
        value,
        span: Span {
            start: inner_start,
            end: inner_end.max(inner_start),
        },
        quoted: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse_yaml;
    use indoc::indoc;

    fn lower(text: &str) -> YamlValue {
        let tree = parse_yaml(text).expect("tree");
        lower_documents(&tree, text).into_iter().next().expect("document")
    }

    #[test]
    fn test_block_mapping() {
        let text = indoc! {"
            services:
              foo.bar:
                class: Drupal\\foo\\Bar
                arguments: ['@baz', '%param%']
        "};
        let doc = lower(text);
        let service = doc.get("services").and_then(|s| s.get("foo.bar")).expect("service");
        assert_eq!(service.get_str("class"), Some("Drupal\\foo\\Bar"));
        let args = service.get("arguments").and_then(YamlValue::as_sequence).expect("args");
        assert_eq!(args.len(), 2);
        let first = args[0].as_scalar().expect("scalar");
        assert_eq!(first.value, "@baz");
        assert_eq!(&text[first.span.start..first.span.end], "@baz");
        assert!(first.quoted);
    }

    #[test]
    fn test_flow_mapping() {
        let text = "my.service: {class: Foo\\Bar, arguments: ['@other.service']}\n";
        let doc = lower(text);
        let service = doc.get("my.service").expect("service");
        assert_eq!(service.get_str("class"), Some("Foo\\Bar"));
        let scalars = service.get("arguments").expect("args").scalars(false);
        assert_eq!(scalars.len(), 1);
        assert_eq!(scalars[0].value, "@other.service");
    }

    #[test]
    fn test_quote_unescaping() {
        let doc = lower("a: 'it''s'\nb: \"say \\\"hi\\\"\"\n");
        assert_eq!(doc.get_str("a"), Some("it's"));
        assert_eq!(doc.get_str("b"), Some("say \"hi\""));
    }

    #[test]
    fn test_nested_scalars() {
        let text = indoc! {"
            calls:
              - [setFoo, ['@foo']]
              - [setBar, ['@bar']]
        "};
        let doc = lower(text);
        let calls = doc.get("calls").expect("calls");
        let shallow: Vec<_> = calls.scalars(false).into_iter().map(|s| s.value.as_str()).collect();
        assert!(shallow.is_empty());
        let deep: Vec<_> = calls.scalars(true).into_iter().map(|s| s.value.as_str()).collect();
        assert_eq!(deep, vec!["setFoo", "@foo", "setBar", "@bar"]);
    }
}
