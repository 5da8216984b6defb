//! Helpers over the tree-sitter PHP grammar.
//!
//! Only the shapes the extractors care about are modelled: string literals,
//! call expressions with their arguments, array literals, docblocks and
//! PHP 8 attributes.

use tree_sitter::Node;

use super::node_text;
use super::yaml::Span;

/// A non-interpolated PHP string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhpString {
    pub value: String,
    /// Span of the content between the quotes.
    pub span: Span,
}

/// Reads a string literal node. Interpolated double-quoted strings yield `None`.
pub fn string_literal(node: Node, source: &str) -> Option<PhpString> {
    match node.kind() {
        "string" | "encapsed_string" => {}
        _ => return None,
    }
    if node.kind() == "encapsed_string" {
        let mut cursor = node.walk();
        let interpolated = node
            .named_children(&mut cursor)
            .any(|child| !matches!(child.kind(), "string_content" | "string_value" | "escape_sequence"));
        if interpolated {
            return None;
        }
    }
    let raw = node_text(&node, source);
    let quote_offset = raw.find(['\'', '"'])?;
    let quote = raw[quote_offset..].chars().next()?;
    let start = node.start_byte() + quote_offset + 1;
    let closed = raw.len() > quote_offset + 1 && raw.ends_with(quote);
    let end = if closed { node.end_byte() - 1 } else { node.end_byte() };
    let inner = source.get(start..end.max(start)).unwrap_or("");
    let value = if quote == '\'' {
        inner.replace("\\'", "'").replace("\\\\", "\\")
    } else {
        inner.replace("\\\"", "\"").replace("\\\\", "\\")
    };
    Some(PhpString {
        value,
        span: Span {
            start,
            end: end.max(start),
        },
    })
}

/// The call shapes that can carry a symbol reference.
#[derive(Debug, Clone)]
pub struct CallInfo<'tree> {
    pub node: Node<'tree>,
    /// Bare name of the called function or method.
    pub callee: String,
    /// Object or scope text for method and static calls.
    pub receiver: Option<String>,
    /// The `arguments` node, when present.
    pub arguments_node: Option<Node<'tree>>,
    /// Expression node of each argument, positional order.
    pub arguments: Vec<Node<'tree>>,
}

pub fn is_call(node: &Node) -> bool {
    matches!(
        node.kind(),
        "function_call_expression"
            | "member_call_expression"
            | "nullsafe_member_call_expression"
            | "scoped_call_expression"
    )
}

/// Decomposes a call expression node.
pub fn call_info<'tree>(node: Node<'tree>, source: &str) -> Option<CallInfo<'tree>> {
    let (callee, receiver) = match node.kind() {
        "function_call_expression" => {
            let function = node.child_by_field_name("function")?;
            let name = node_text(&function, source);
            (last_segment(name).to_string(), None)
        }
        "member_call_expression" | "nullsafe_member_call_expression" => {
            let name = node.child_by_field_name("name")?;
            let object = node.child_by_field_name("object")?;
            (
                node_text(&name, source).to_string(),
                Some(node_text(&object, source).to_string()),
            )
        }
        "scoped_call_expression" => {
            let name = node.child_by_field_name("name")?;
            let scope = node.child_by_field_name("scope")?;
            (
                node_text(&name, source).to_string(),
                Some(node_text(&scope, source).to_string()),
            )
        }
        _ => return None,
    };
    let arguments_node = node.child_by_field_name("arguments");
    let arguments = arguments_node.map(argument_values).unwrap_or_default();
    Some(CallInfo {
        node,
        callee,
        receiver,
        arguments_node,
        arguments,
    })
}

/// Expression nodes of the `argument` children of an `arguments` node.
pub fn argument_values(arguments: Node) -> Vec<Node> {
    let mut values = Vec::new();
    let mut cursor = arguments.walk();
    for argument in arguments.named_children(&mut cursor) {
        if argument.kind() != "argument" {
            continue;
        }
        let count = argument.named_child_count();
        if count == 0 {
            continue;
        }
        if let Some(value) = argument.named_child(count - 1) {
            values.push(value);
        }
    }
    values
}

/// Strips a leading namespace from a function name such as `\Drupal\t`.
pub fn last_segment(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

/// Key and value nodes of an array literal, in source order.
pub fn array_elements(node: Node) -> Vec<(Option<Node>, Node)> {
    let mut elements = Vec::new();
    if node.kind() != "array_creation_expression" {
        return elements;
    }
    let mut cursor = node.walk();
    for element in node.named_children(&mut cursor) {
        if element.kind() != "array_element_initializer" {
            continue;
        }
        match element.named_child_count() {
            1 => {
                if let Some(value) = element.named_child(0) {
                    elements.push((None, value));
                }
            }
            2 => {
                if let (Some(key), Some(value)) = (element.named_child(0), element.named_child(1)) {
                    elements.push((Some(key), value));
                }
            }
            _ => {}
        }
    }
    elements
}

/// The `/** ... */` comment directly preceding a declaration.
pub fn preceding_docblock<'tree>(node: Node<'tree>, source: &str) -> Option<Node<'tree>> {
    let mut prev = node.prev_named_sibling();
    // Attributes written before a docblock are siblings in some layouts.
    while let Some(candidate) = prev {
        if candidate.kind() == "attribute_list" {
            prev = candidate.prev_named_sibling();
            continue;
        }
        break;
    }
    let comment = prev?;
    if comment.kind() == "comment" && node_text(&comment, source).starts_with("/**") {
        Some(comment)
    } else {
        None
    }
}

/// A PHP 8 attribute such as `#[Hook('cron')]`.
#[derive(Debug, Clone)]
pub struct PhpAttribute<'tree> {
    pub node: Node<'tree>,
    /// Bare attribute name with any namespace removed.
    pub name: String,
    pub arguments: Vec<AttributeArgument<'tree>>,
}

#[derive(Debug, Clone)]
pub struct AttributeArgument<'tree> {
    pub name: Option<String>,
    pub value: Node<'tree>,
}

impl<'tree> PhpAttribute<'tree> {
    /// The first positional argument or the argument named `name`.
    pub fn argument(&self, name: &str) -> Option<Node<'tree>> {
        self.arguments
            .iter()
            .find(|arg| arg.name.as_deref() == Some(name))
            .or_else(|| self.arguments.first().filter(|arg| arg.name.is_none()))
            .map(|arg| arg.value)
    }

    pub fn named_argument(&self, name: &str) -> Option<Node<'tree>> {
        self.arguments
            .iter()
            .find(|arg| arg.name.as_deref() == Some(name))
            .map(|arg| arg.value)
    }
}

/// Attributes attached to a class, method or function declaration.
pub fn attributes<'tree>(declaration: Node<'tree>, source: &str) -> Vec<PhpAttribute<'tree>> {
    let mut out = Vec::new();
    let Some(list) = declaration.child_by_field_name("attributes") else {
        return out;
    };
    let mut groups = list.walk();
    for group in list.named_children(&mut groups) {
        let mut attrs = group.walk();
        for attribute in group.named_children(&mut attrs) {
            if attribute.kind() != "attribute" {
                continue;
            }
            let Some(name_node) = attribute.named_child(0) else {
                continue;
            };
            let name = last_segment(node_text(&name_node, source)).to_string();
            let mut arguments = Vec::new();
            if let Some(params) = attribute.child_by_field_name("parameters") {
                let mut cursor = params.walk();
                for argument in params.named_children(&mut cursor) {
                    if argument.kind() != "argument" {
                        continue;
                    }
                    let count = argument.named_child_count();
                    let Some(value) = (count > 0).then(|| argument.named_child(count - 1)).flatten() else {
                        continue;
                    };
                    let name = argument
                        .child_by_field_name("name")
                        .map(|n| node_text(&n, source).to_string());
                    arguments.push(AttributeArgument { name, value });
                }
            }
            out.push(PhpAttribute {
                node: attribute,
                name,
                arguments,
            });
        }
    }
    out
}

/// Namespace in effect at `node`, from a braced or statement-style declaration.
pub fn namespace_of(node: Node, source: &str) -> Option<String> {
    let mut current = Some(node);
    while let Some(n) = current {
        if n.kind() == "namespace_definition" && n.child_by_field_name("body").is_some() {
            return n
                .child_by_field_name("name")
                .map(|name| node_text(&name, source).to_string());
        }
        let mut prev = n.prev_named_sibling();
        while let Some(p) = prev {
            if p.kind() == "namespace_definition" && p.child_by_field_name("body").is_none() {
                return p
                    .child_by_field_name("name")
                    .map(|name| node_text(&name, source).to_string());
            }
            prev = p.prev_named_sibling();
        }
        current = n.parent();
    }
    None
}

/// Fully-qualified name of a class-like declaration.
pub fn qualified_class_name(class: Node, source: &str) -> Option<String> {
    let name = node_text(&class.child_by_field_name("name")?, source);
    Some(match namespace_of(class, source) {
        Some(namespace) => format!("{}\\{}", namespace, name),
        None => name.to_string(),
    })
}

/// Parameter list text of a function or method, without the parentheses.
pub fn parameter_text(function: Node, source: &str) -> String {
    function
        .child_by_field_name("parameters")
        .map(|params| node_text(&params, source))
        .unwrap_or("")
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
        .to_string()
}

/// Strips the comment markers of a docblock, one entry per line.
pub fn docblock_lines(comment: &str) -> Vec<String> {
    comment
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let trimmed = trimmed.strip_prefix('*').unwrap_or(trimmed);
            trimmed.strip_prefix(' ').unwrap_or(trimmed).trim_end().to_string()
        })
        .collect()
}

/// First non-empty line of a docblock.
pub fn docblock_summary(comment: &str) -> Option<String> {
    docblock_lines(comment)
        .into_iter()
        .map(|line| line.trim().to_string())
        .find(|line| !line.is_empty())
}

/// Text between `@code` and `@endcode` in a docblock.
pub fn docblock_code_example(comment: &str) -> Option<String> {
    let lines = docblock_lines(comment);
    let start = lines.iter().position(|line| line.trim() == "@code")?;
    let end = lines[start + 1..]
        .iter()
        .position(|line| line.trim() == "@endcode")
        .map(|offset| start + 1 + offset)?;
    let example = lines[start + 1..end].join("\n");
    let example = example.trim_matches('\n').to_string();
    if example.trim().is_empty() { None } else { Some(example) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse_php;
    use indoc::indoc;

    fn find_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        children.into_iter().find_map(|child| find_kind(child, kind))
    }

    #[test]
    fn test_member_call_info() {
        let source = "<?php\n$this->currentUser->hasPermission('administer nodes');\n";
        let tree = parse_php(source).expect("tree");
        let call = find_kind(tree.root_node(), "member_call_expression").expect("call");
        let info = call_info(call, source).expect("info");
        assert_eq!(info.callee, "hasPermission");
        assert_eq!(info.receiver.as_deref(), Some("$this->currentUser"));
        assert_eq!(info.arguments.len(), 1);
        let literal = string_literal(info.arguments[0], source).expect("string");
        assert_eq!(literal.value, "administer nodes");
        assert_eq!(&source[literal.span.start..literal.span.end], "administer nodes");
    }

    #[test]
    fn test_interpolated_string_is_not_a_literal() {
        let source = "<?php\nfoo(\"node.$bundle\");\n";
        let tree = parse_php(source).expect("tree");
        let call = find_kind(tree.root_node(), "function_call_expression").expect("call");
        let info = call_info(call, source).expect("info");
        assert!(string_literal(info.arguments[0], source).is_none());
    }

    #[test]
    fn test_namespaced_class_name() {
        let source = indoc! {r#"
            <?php

            namespace Drupal\mymod\Plugin\QueueWorker;

            class Worker {}
        "#};
        let tree = parse_php(source).expect("tree");
        let class = find_kind(tree.root_node(), "class_declaration").expect("class");
        assert_eq!(
            qualified_class_name(class, source).as_deref(),
            Some("Drupal\\mymod\\Plugin\\QueueWorker\\Worker")
        );
    }

    #[test]
    fn test_docblock_code_example() {
        let comment = indoc! {"
            /**
             * Provides a date element.
             *
             * @code
             * $form['expiration'] = [
             *   '#type' => 'date',
             * ];
             * @endcode
             */"};
        assert_eq!(docblock_summary(comment).as_deref(), Some("Provides a date element."));
        assert_eq!(
            docblock_code_example(comment).as_deref(),
            Some("$form['expiration'] = [\n  '#type' => 'date',\n];")
        );
    }

    #[test]
    fn test_attribute_arguments() {
        let source = indoc! {r#"
            <?php
            #[FormElement('date')]
            class Date {}
        "#};
        let tree = parse_php(source).expect("tree");
        let class = find_kind(tree.root_node(), "class_declaration").expect("class");
        let attrs = attributes(class, source);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name, "FormElement");
        let id = attrs[0].argument("id").and_then(|n| string_literal(n, source)).expect("id");
        assert_eq!(id.value, "date");
    }
}
