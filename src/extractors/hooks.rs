//! Hook stubs, procedural and attribute-based hook implementations, and
//! `Implements hook_NAME().` doc comment references.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::ir::hooks::is_template;
use crate::ir::{DeclarationMetadata, HookMatch, HookSpec, SymbolKind};
use crate::parsers::node_text;
use crate::parsers::php::{
    attributes, docblock_summary, parameter_text, preceding_docblock, qualified_class_name, string_literal,
};
use crate::parsers::yaml::Span;

use super::{ExtractContext, ExtractionBuilder};

static IMPLEMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Implements\s+hook_(?P<name>[A-Za-z0-9_]+)\(\)").expect("valid regex"));

/// Records `function hook_NAME(...)` of an API file as a hook stub.
pub(super) fn hook_spec(function: Node, builder: &mut ExtractionBuilder) {
    let source = builder.source;
    let Some(name_node) = function.child_by_field_name("name") else {
        return;
    };
    let Some(name) = node_text(&name_node, source).strip_prefix("hook_") else {
        return;
    };
    if name.is_empty() {
        return;
    }
    let summary = preceding_docblock(function, source).and_then(|doc| docblock_summary(node_text(&doc, source)));
    let range = builder.lines.range_of(name_node.start_byte(), name_node.end_byte());
    let spec = HookSpec {
        name: name.to_string(),
        parameters: parameter_text(function, source),
        summary,
        uri: builder.uri.clone(),
        range,
    };
    builder.hook_spec(spec);
}

/// Matches a procedural function against the hook catalog.
///
/// The owning module is taken from the file name when the function starts
/// with it. Otherwise every `_` is tried as the module/hook boundary, exact
/// hook names left to right first, then templates right to left. A docblock
/// that says `Implements hook_NAME().` is the last resort.
pub(super) fn implementation(
    function: Node,
    builder: &mut ExtractionBuilder,
    ctx: &ExtractContext,
    file_module: Option<&str>,
) {
    let source = builder.source;
    let Some(name_node) = function.child_by_field_name("name") else {
        return;
    };
    let function_name = node_text(&name_node, source);
    let span = Span::of(&name_node);

    let matched = match_function(function_name, ctx, file_module)
        .or_else(|| from_docblock(function, source, function_name, file_module));
    let Some((module, hook)) = matched else {
        return;
    };
    builder.declare(
        SymbolKind::Hook,
        hook.hook,
        None,
        span,
        DeclarationMetadata::Hook {
            module,
            template: hook.template,
            function: function_name.to_string(),
        },
    );
}

fn match_function(name: &str, ctx: &ExtractContext, file_module: Option<&str>) -> Option<(String, HookMatch)> {
    if let Some(module) = file_module {
        if let Some(rest) = name.strip_prefix(module).and_then(|rest| rest.strip_prefix('_')) {
            if let Some(hook) = ctx.hooks.match_hook(rest) {
                return Some((module.to_string(), hook));
            }
        }
    }
    let boundaries: Vec<usize> = name.match_indices('_').map(|(index, _)| index).filter(|i| *i > 0).collect();
    for &boundary in &boundaries {
        let rest = &name[boundary + 1..];
        if let Some(hook) = ctx.hooks.match_hook(rest).filter(|m| m.template.is_none()) {
            return Some((name[..boundary].to_string(), hook));
        }
    }
    for &boundary in boundaries.iter().rev() {
        let rest = &name[boundary + 1..];
        if let Some(hook) = ctx.hooks.match_hook(rest).filter(|m| m.template.is_some()) {
            return Some((name[..boundary].to_string(), hook));
        }
    }
    None
}

fn from_docblock(
    function: Node,
    source: &str,
    function_name: &str,
    file_module: Option<&str>,
) -> Option<(String, HookMatch)> {
    let doc = preceding_docblock(function, source)?;
    let captures = IMPLEMENTS.captures(node_text(&doc, source))?;
    let documented = captures.name("name")?.as_str();

    let (module, concrete) = match function_name.strip_suffix(documented) {
        Some(prefix) if prefix.ends_with('_') && prefix.len() > 1 => {
            (prefix[..prefix.len() - 1].to_string(), documented.to_string())
        }
        _ => {
            let module = file_module.unwrap_or(function_name).to_string();
            let concrete = function_name
                .strip_prefix(module.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|rest| !rest.is_empty())
                .unwrap_or(documented)
                .to_string();
            (module, concrete)
        }
    };
    let template = (is_template(documented) && concrete != documented).then(|| documented.to_string());
    Some((module, HookMatch { hook: concrete, template }))
}

/// `#[Hook('name')]` on a method of a hook class.
pub(super) fn attribute_implementations(
    method: Node,
    builder: &mut ExtractionBuilder,
    ctx: &ExtractContext,
    file_module: Option<&str>,
) {
    let source = builder.source;
    let Some(name_node) = method.child_by_field_name("name") else {
        return;
    };
    for attribute in attributes(method, source) {
        if attribute.name != "Hook" {
            continue;
        }
        let Some(hook) = attribute.argument("hook").and_then(|node| string_literal(node, source)) else {
            continue;
        };
        let module = attribute
            .named_argument("module")
            .and_then(|node| string_literal(node, source))
            .map(|literal| literal.value)
            .or_else(|| file_module.map(str::to_string))
            .unwrap_or_default();
        let template = ctx.hooks.match_hook(&hook.value).and_then(|m| m.template);
        let class = enclosing_class(method).and_then(|class| qualified_class_name(class, source));
        let function = match &class {
            Some(class) => format!("{}::{}", class, node_text(&name_node, source)),
            None => node_text(&name_node, source).to_string(),
        };
        builder.declare(
            SymbolKind::Hook,
            hook.value,
            class,
            hook.span,
            DeclarationMetadata::Hook { module, template, function },
        );
    }
}

fn enclosing_class(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if matches!(parent.kind(), "class_declaration" | "trait_declaration" | "enum_declaration") {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

/// `Implements hook_NAME().` in a comment is a reference to the hook.
pub(super) fn comment_references(comment: Node, builder: &mut ExtractionBuilder) {
    let text = node_text(&comment, builder.source);
    let base = comment.start_byte();
    for captures in IMPLEMENTS.captures_iter(text) {
        let Some(name) = captures.name("name") else {
            continue;
        };
        // The range covers `hook_NAME` so the whole token is clickable.
        let span = Span {
            start: base + name.start() - "hook_".len(),
            end: base + name.end(),
        };
        builder.reference(SymbolKind::Hook, name.as_str(), span);
    }
}
