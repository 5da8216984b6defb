//! Hover tooltips
//!
//! ```text
//! User hovers over a reference
//!       ↓
//! resolve() → ResolvedSymbol
//!       ├─→ one section per declaration, rendered by kind
//!       └─→ markdown Hover over the reference range
//!
//! User hovers over a declaration (no reference there)
//!       ↓
//! declaration_hover() → the same rendering over the declaration range
//! ```

use std::fmt::Write as _;

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Range, Url};
use tracing::debug;

use crate::extractors::routes::path_parameters;
use crate::ir::{Declaration, DeclarationMetadata, HookCatalog, SymbolKind};
use crate::lsp::resolver::ResolvedSymbol;
use crate::lsp::symbol_index::SymbolIndex;
use crate::parsers::php::last_segment;
use crate::parsers::position_utils::range_contains;

/// Builds the hover for a resolved reference.
///
/// # Returns
/// `None` when the reference has no declaration.
pub fn hover(index: &SymbolIndex, resolved: &ResolvedSymbol) -> Option<Hover> {
    if !resolved.is_resolved() {
        debug!(
            "No declaration for {} '{}'",
            resolved.reference.kind, resolved.reference.identifier
        );
        return None;
    }
    let reference = &resolved.reference;
    let declarations = resolved.declarations.as_slice();

    let mut out = String::new();
    match reference.kind {
        SymbolKind::Hook => {
            let catalog = index.hook_catalog();
            render_hook(&mut out, &reference.identifier, declarations, &catalog);
        }
        _ => {
            for (i, declaration) in declarations.iter().enumerate() {
                if i > 0 {
                    out.push_str("\n---\n\n");
                }
                render_declaration(&mut out, index, declaration);
            }
        }
    }

    Some(markdown_hover(out, reference.range))
}

/// Hover for a declaration under the cursor, such as a route name in a
/// routing file or a hook implementation.
pub fn declaration_hover(index: &SymbolIndex, uri: &Url, position: Position) -> Option<Hover> {
    let declaration = index
        .declarations_in(uri)
        .iter()
        .find(|declaration| range_contains(&declaration.range, position))?;

    let mut out = String::new();
    match declaration.kind {
        SymbolKind::Hook => {
            let implementations = index.lookup_declarations(SymbolKind::Hook, &declaration.identifier);
            let catalog = index.hook_catalog();
            render_hook(&mut out, &declaration.identifier, implementations.as_slice(), &catalog);
        }
        _ => render_declaration(&mut out, index, declaration),
    }
    Some(markdown_hover(out, declaration.range))
}

fn markdown_hover(out: String, range: Range) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: out.trim_end().to_string(),
        }),
        range: Some(range),
    }
}

/// Markdown summary of one declaration, also used as completion documentation.
pub fn describe(index: &SymbolIndex, declaration: &Declaration) -> String {
    let mut out = String::new();
    render_declaration(&mut out, index, declaration);
    out.trim_end().to_string()
}

fn render_declaration(out: &mut String, index: &SymbolIndex, declaration: &Declaration) {
    let _ = writeln!(out, "**{}** ({})\n", declaration.identifier, declaration.kind);
    match &declaration.metadata {
        DeclarationMetadata::Service { arguments, alias, parent } => {
            if let Some(class) = &declaration.display_class {
                let _ = writeln!(out, "*Class:* `{}`\n", class);
            }
            if let Some(alias) = alias {
                let _ = writeln!(out, "*Alias of:* `{}`\n", alias);
            }
            if let Some(parent) = parent {
                let _ = writeln!(out, "*Parent:* `{}`\n", parent);
            }
            if !arguments.is_empty() {
                out.push_str("*Arguments:*\n");
                for argument in arguments {
                    let _ = writeln!(out, "- `{}`", argument);
                }
                out.push('\n');
            }
        }
        DeclarationMetadata::Route {
            path,
            methods,
            title,
            handler,
            permission,
        } => {
            if let Some(path) = path {
                let _ = writeln!(out, "*Path:* `{}`\n", path);
                let parameters = path_parameters(path);
                if !parameters.is_empty() {
                    let list: Vec<String> = parameters.iter().map(|p| format!("`{}`", p)).collect();
                    let _ = writeln!(out, "*Parameters:* {}\n", list.join(", "));
                }
            }
            if !methods.is_empty() {
                let _ = writeln!(out, "*Methods:* {}\n", methods.join(", "));
            }
            if let Some(title) = title {
                let _ = writeln!(out, "*Title:* {}\n", title);
            }
            if let Some(handler) = handler {
                let status = match handler.class_name() {
                    Some(class) if index.has_class(class) => "",
                    Some(_) => " (class not found in workspace)",
                    None => "",
                };
                let _ = writeln!(out, "*{}:* `{}`{}\n", handler.key, handler.raw, status);
            }
            if let Some(permission) = permission {
                let _ = writeln!(out, "*Permission:* `{}`\n", permission);
            }
        }
        DeclarationMetadata::Permission {
            title,
            description,
            restrict_access,
        } => {
            if let Some(title) = title {
                let _ = writeln!(out, "*Title:* {}\n", title);
            }
            if let Some(description) = description {
                let _ = writeln!(out, "{}\n", description);
            }
            if *restrict_access {
                out.push_str("*Warning:* give to trusted roles only; this permission has security implications.\n\n");
            }
        }
        DeclarationMetadata::Plugin { label, usage_example } => {
            if let Some(label) = label {
                let _ = writeln!(out, "*Label:* {}\n", label);
            }
            if let Some(class) = &declaration.display_class {
                let _ = writeln!(out, "*Class:* `{}`\n", class);
            }
            if let Some(example) = usage_example {
                let _ = writeln!(out, "```php\n{}\n```\n", example);
            }
        }
        DeclarationMetadata::Class { keyword } => {
            let _ = writeln!(out, "```php\n{} {}\n```\n", keyword, last_segment(&declaration.identifier));
        }
        DeclarationMetadata::Method {
            class,
            parameters,
            is_static,
        } => {
            let name = declaration.identifier.rsplit("::").next().unwrap_or(declaration.identifier.as_str());
            let modifier = if *is_static { "static " } else { "" };
            let _ = writeln!(out, "```php\n{}function {}({})\n```\n", modifier, name, parameters);
            let _ = writeln!(out, "*Class:* `{}`\n", class);
        }
        DeclarationMetadata::Hook { .. } => {}
    }
    let _ = writeln!(out, "*Defined in: {}:{}*", display_path(&declaration.uri), declaration.range.start.line + 1);
}

fn render_hook(out: &mut String, hook: &str, implementations: &[std::sync::Arc<Declaration>], catalog: &HookCatalog) {
    let _ = writeln!(out, "**hook_{}** (Hook)\n", hook);
    if let Some(spec) = catalog.spec_for(hook) {
        let _ = writeln!(out, "```php\n<?php function hook_{}({}) {{}}\n```\n", spec.name, spec.parameters);
        if let Some(summary) = &spec.summary {
            let _ = writeln!(out, "{}\n", summary);
        }
    }
    let _ = writeln!(out, "*Implementations ({}):*", implementations.len());
    for declaration in implementations {
        if let DeclarationMetadata::Hook { module, function, .. } = &declaration.metadata {
            let _ = writeln!(
                out,
                "- `{}` in module `{}` ({}:{})",
                function,
                module,
                display_path(&declaration.uri),
                declaration.range.start.line + 1
            );
        }
    }
}

fn display_path(uri: &Url) -> String {
    uri.to_file_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| uri.to_string())
}
