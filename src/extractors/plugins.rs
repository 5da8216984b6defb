//! Plugin declarations from PHP 8 attributes or docblock annotations on a
//! class.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::ir::{DeclarationMetadata, PluginType, SymbolKind};
use crate::parsers::node_text;
use crate::parsers::php::{
    PhpAttribute, attributes, docblock_code_example, last_segment, preceding_docblock, string_literal,
};
use crate::parsers::yaml::Span;

use super::ExtractionBuilder;

static ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\*\s*@(?P<type>[A-Za-z_][A-Za-z0-9_\\]*)\(").expect("valid regex"));
static POSITIONAL_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\s*"(?P<id>[^"]+)""#).expect("valid regex"));
static NAMED_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bid\s*=\s*"(?P<id>[^"]+)""#).expect("valid regex"));
static LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\blabel\s*=\s*@Translation\(\s*"(?P<label>[^"]*)""#).expect("valid regex"));

pub(super) fn extract_class(class: Node, fqcn: Option<&str>, builder: &mut ExtractionBuilder) {
    let source = builder.source;
    let docblock = preceding_docblock(class, source);
    let usage_example = docblock.and_then(|doc| docblock_code_example(node_text(&doc, source)));

    let from_attribute = attributes(class, source).into_iter().find_map(|attribute| {
        let plugin_type = PluginType::from_annotation(&attribute.name)?;
        let id = attribute.argument("id").and_then(|node| string_literal(node, source))?;
        Some((plugin_type, id, attribute_label(&attribute, source)))
    });
    if let Some((plugin_type, id, label)) = from_attribute {
        builder.declare(
            SymbolKind::Plugin(plugin_type),
            id.value,
            fqcn.map(str::to_string),
            id.span,
            DeclarationMetadata::Plugin { label, usage_example },
        );
        return;
    }

    let Some(doc) = docblock else {
        return;
    };
    let text = node_text(&doc, source);
    let from_annotation = ANNOTATION.captures_iter(text).find_map(|annotation| {
        let whole = annotation.get(0)?;
        let plugin_type = PluginType::from_annotation(last_segment(annotation.name("type")?.as_str()))?;
        let body = &text[whole.end()..];
        let id = POSITIONAL_ID
            .captures(body)
            .or_else(|| NAMED_ID.captures(body))
            .and_then(|captures| captures.name("id"))?;
        let label = LABEL
            .captures(body)
            .and_then(|captures| captures.name("label"))
            .map(|label| label.as_str().to_string());
        let start = doc.start_byte() + whole.end() + id.start();
        Some((plugin_type, id.as_str(), start, label))
    });
    if let Some((plugin_type, id, start, label)) = from_annotation {
        builder.declare(
            SymbolKind::Plugin(plugin_type),
            id,
            fqcn.map(str::to_string),
            Span {
                start,
                end: start + id.len(),
            },
            DeclarationMetadata::Plugin { label, usage_example },
        );
    }
}

/// The first string literal under the `label:` argument, usually inside
/// `new TranslatableMarkup('...')`.
fn attribute_label(attribute: &PhpAttribute, source: &str) -> Option<String> {
    let label = attribute.named_argument("label")?;
    first_string(label, source)
}

fn first_string(node: Node, source: &str) -> Option<String> {
    if let Some(literal) = string_literal(node, source) {
        return Some(literal.value);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    children.into_iter().find_map(|child| first_string(child, source))
}
