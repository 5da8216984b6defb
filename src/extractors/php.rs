//! PHP walker: declarations from functions, methods and classes, and
//! references from string literals in classified positions.

use tree_sitter::Node;

use crate::ir::{DeclarationMetadata, SymbolKind};
use crate::parsers::node_text;
use crate::parsers::php::{
    PhpString, array_elements, call_info, is_call, parameter_text, qualified_class_name, string_literal,
};
use crate::parsers::yaml::Span;

use super::context::{CallSite, Slot, classify_array_key, classify_call, split_permission_list};
use super::{ExtractContext, ExtractionBuilder, FileKind, callables, hooks, module_name, plugins};

struct Walker<'b, 'a> {
    kind: FileKind,
    builder: &'b mut ExtractionBuilder<'a>,
    ctx: &'b ExtractContext<'b>,
    module: Option<String>,
}

pub(super) fn extract(kind: FileKind, root: Node, builder: &mut ExtractionBuilder, ctx: &ExtractContext) {
    let module = module_name(builder.uri);
    let mut walker = Walker { kind, builder, ctx, module };
    walker.visit(root);
}

impl Walker<'_, '_> {
    fn visit(&mut self, node: Node) {
        // Error-recovery regions carry no trustworthy structure.
        if node.is_error() || node.is_missing() {
            return;
        }
        match node.kind() {
            "function_definition" => {
                if self.kind == FileKind::HookApi {
                    hooks::hook_spec(node, self.builder);
                } else {
                    hooks::implementation(node, self.builder, self.ctx, self.module.as_deref());
                }
            }
            "method_declaration" if self.kind != FileKind::HookApi => {
                hooks::attribute_implementations(node, self.builder, self.ctx, self.module.as_deref());
            }
            "class_declaration" | "interface_declaration" | "trait_declaration" | "enum_declaration" => {
                self.class(node);
            }
            "comment" if self.kind != FileKind::HookApi => hooks::comment_references(node, self.builder),
            "array_element_initializer" => self.render_array_pair(node),
            "string" | "encapsed_string" => self.callable_string(node),
            _ if is_call(&node) => self.call(node),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    fn class(&mut self, node: Node) {
        let source = self.builder.source;
        let fqcn = qualified_class_name(node, source);
        if let (Some(name), Some(name_node)) = (&fqcn, node.child_by_field_name("name")) {
            let keyword = node.kind().trim_end_matches("_declaration").to_string();
            self.builder.declare(
                SymbolKind::Class,
                name.clone(),
                Some(name.clone()),
                Span::of(&name_node),
                DeclarationMetadata::Class { keyword },
            );
            self.methods(node, name);
        }
        if node.kind() == "class_declaration" {
            plugins::extract_class(node, fqcn.as_deref(), self.builder);
        }
    }

    fn methods(&mut self, class: Node, fqcn: &str) {
        let source = self.builder.source;
        let Some(body) = class.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        for method in body.named_children(&mut cursor) {
            if method.kind() != "method_declaration" {
                continue;
            }
            let Some(name) = method.child_by_field_name("name") else {
                continue;
            };
            let mut modifiers = method.walk();
            let is_static = method
                .children(&mut modifiers)
                .any(|child| child.kind() == "static_modifier");
            self.builder.declare(
                SymbolKind::Method,
                format!("{}::{}", fqcn, node_text(&name, source)),
                Some(fqcn.to_string()),
                Span::of(&name),
                DeclarationMetadata::Method {
                    class: fqcn.to_string(),
                    parameters: parameter_text(method, source),
                    is_static,
                },
            );
        }
    }

    /// `'\Drupal\mymod\Element\Date::preRender'` style callbacks.
    fn callable_string(&mut self, node: Node) {
        if let Some(literal) = string_literal(node, self.builder.source) {
            callables::reference(self.builder, &literal.value, literal.span, true);
        }
    }

    fn call(&mut self, node: Node) {
        let source = self.builder.source;
        let Some(info) = call_info(node, source) else {
            return;
        };
        for (index, argument) in info.arguments.iter().enumerate() {
            let site = CallSite {
                callee: &info.callee,
                receiver: info.receiver.as_deref(),
                argument: index,
            };
            let Some(slot) = classify_call(&site) else {
                continue;
            };
            for literal in literals(*argument, source) {
                self.emit(slot, literal);
            }
        }
    }

    fn render_array_pair(&mut self, node: Node) {
        if node.named_child_count() != 2 {
            return;
        }
        let source = self.builder.source;
        let (Some(key), Some(value)) = (node.named_child(0), node.named_child(1)) else {
            return;
        };
        let Some(key) = string_literal(key, source) else {
            return;
        };
        let Some(slot) = classify_array_key(&key.value) else {
            return;
        };
        if let Some(literal) = string_literal(value, source) {
            self.emit(slot, literal);
        }
    }

    fn emit(&mut self, slot: Slot, literal: PhpString) {
        match slot {
            Slot::Symbol(kind) => self.builder.reference(kind, literal.value, literal.span),
            Slot::AlterHook => {
                self.builder
                    .reference(SymbolKind::Hook, format!("{}_alter", literal.value), literal.span)
            }
            Slot::PermissionList => {
                let exact = self.builder.source.get(literal.span.start..literal.span.end) == Some(literal.value.as_str());
                for (permission, offset) in split_permission_list(&literal.value) {
                    let span = if exact {
                        Span {
                            start: literal.span.start + offset,
                            end: literal.span.start + offset + permission.len(),
                        }
                    } else {
                        literal.span
                    };
                    self.builder.reference(SymbolKind::Permission, permission, span);
                }
            }
        }
    }
}

/// A string literal argument, or the string values of an array literal
/// argument such as `['form', 'form_node_form']`.
fn literals(argument: Node, source: &str) -> Vec<PhpString> {
    if let Some(literal) = string_literal(argument, source) {
        return vec![literal];
    }
    array_elements(argument)
        .into_iter()
        .filter(|(key, _)| key.is_none())
        .filter_map(|(_, value)| string_literal(value, source))
        .collect()
}
