//! Completion
//!
//! ```text
//! cursor offset
//!       ├─→ context::detect → inside a classified literal?
//!       │        └─→ completion_candidates(kind, typed prefix)
//!       └─→ otherwise, in PHP code → snippets (global, hook stubs, elements)
//! ```
//!
//! Every item carries a text edit over the typed prefix so that clients
//! with their own word boundaries (dots, colons) replace the right span.

pub mod context;
pub mod snippets;

use std::collections::BTreeSet;

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionItemLabelDetails, CompletionResponse, CompletionTextEdit,
    Documentation, MarkupContent, MarkupKind, Position, Range, TextEdit,
};
use tracing::debug;

use crate::config::EngineConfig;
use crate::extractors::context::Slot;
use crate::extractors::routes::path_parameters;
use crate::extractors::{FileKind, module_name};
use crate::ir::{DeclarationMetadata, PluginType, SymbolKind};
use crate::lsp::engine::DocumentSnapshot;
use crate::lsp::features::hover;
use crate::lsp::resolver;
use crate::lsp::symbol_index::SymbolIndex;
use crate::parsers::position_utils::LineIndex;

use self::context::CompletionContext;

/// File extensions whose functions are procedural hook implementations.
const HOOK_FILE_EXTENSIONS: &[&str] = &["module", "theme"];

pub fn complete(
    index: &SymbolIndex,
    config: &EngineConfig,
    document: &DocumentSnapshot,
    position: Position,
) -> Option<CompletionResponse> {
    let text: &str = &document.text;
    let lines = LineIndex::new(text);
    let offset = lines.offset_of(position);

    let items = match context::detect(document.kind, text, offset, &config.service_reference) {
        Some(context) => symbol_items(index, &context, &lines, position),
        None if document.kind == FileKind::Php && !context::in_php_string(text, offset) => {
            snippet_items(index, document, text, offset, &lines, position)
        }
        None => Vec::new(),
    };
    debug!("Completion at {}:{:?}: {} item(s)", document.uri, position, items.len());
    if items.is_empty() {
        None
    } else {
        Some(CompletionResponse::Array(items))
    }
}

/// Identifiers of the kind expected by `context`, with the text they insert.
fn candidates(index: &SymbolIndex, context: &CompletionContext) -> Vec<(String, String)> {
    match context.slot {
        Slot::AlterHook => index
            .completion_candidates(SymbolKind::Hook, &context.prefix)
            .into_iter()
            .filter_map(|hook| {
                let alter_type = hook.strip_suffix("_alter")?.to_string();
                Some((hook, alter_type))
            })
            .collect(),
        Slot::Symbol(SymbolKind::Plugin(PluginType::RenderElement)) => {
            let mut ids: BTreeSet<String> = BTreeSet::new();
            for plugin in [PluginType::RenderElement, PluginType::FormElement] {
                ids.extend(index.completion_candidates(SymbolKind::Plugin(plugin), &context.prefix));
            }
            ids.into_iter().map(|id| (id.clone(), id)).collect()
        }
        slot => index
            .completion_candidates(slot.completion_kind(), &context.prefix)
            .into_iter()
            .map(|id| (id.clone(), id))
            .collect(),
    }
}

fn symbol_items(
    index: &SymbolIndex,
    context: &CompletionContext,
    lines: &LineIndex,
    position: Position,
) -> Vec<CompletionItem> {
    let kind = context.slot.completion_kind();
    let replace = Range::new(lines.position_of(context.prefix_start), position);
    let description = match kind {
        SymbolKind::Plugin(plugin) => plugin.to_string(),
        other => other.to_string(),
    };

    candidates(index, context)
        .into_iter()
        .map(|(identifier, insert)| {
            let declarations = resolver::lookup(index, kind, &identifier);
            let mut documentation = declarations.iter().next().map(|d| hover::describe(index, d));
            if kind == SymbolKind::Hook {
                documentation = hook_documentation(index, &identifier).or(documentation);
            }

            let mut additional_text_edits = None;
            if let (Some(at), SymbolKind::Route) = (context.route_parameters_at, kind) {
                let path = declarations.iter().find_map(|d| match &d.metadata {
                    DeclarationMetadata::Route { path: Some(path), .. } => Some(path.clone()),
                    _ => None,
                });
                if let Some(arguments) = path.as_deref().and_then(route_arguments) {
                    let at = lines.position_of(at);
                    additional_text_edits = Some(vec![TextEdit {
                        range: Range::new(at, at),
                        new_text: arguments,
                    }]);
                }
            }

            CompletionItem {
                label: insert.clone(),
                label_details: Some(CompletionItemLabelDetails {
                    detail: None,
                    description: Some(description.clone()),
                }),
                kind: Some(CompletionItemKind::REFERENCE),
                documentation: documentation.map(|value| {
                    Documentation::MarkupContent(MarkupContent {
                        kind: MarkupKind::Markdown,
                        value,
                    })
                }),
                text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                    range: replace,
                    new_text: insert,
                })),
                additional_text_edits,
                ..CompletionItem::default()
            }
        })
        .collect()
}

/// `, ['node' => $node]` for a route path with parameters.
fn route_arguments(path: &str) -> Option<String> {
    let parameters = path_parameters(path);
    if parameters.is_empty() {
        return None;
    }
    let pairs: Vec<String> = parameters.iter().map(|p| format!("'{}' => ${}", p, p)).collect();
    Some(format!(", [{}]", pairs.join(", ")))
}

fn hook_documentation(index: &SymbolIndex, hook: &str) -> Option<String> {
    let catalog = index.hook_catalog();
    let spec = catalog.spec_for(hook)?;
    let mut value = format!("```php\nfunction hook_{}({})\n```", spec.name, spec.parameters);
    if let Some(summary) = &spec.summary {
        value.push_str("\n\n");
        value.push_str(summary);
    }
    Some(value)
}

fn snippet_items(
    index: &SymbolIndex,
    document: &DocumentSnapshot,
    text: &str,
    offset: usize,
    lines: &LineIndex,
    position: Position,
) -> Vec<CompletionItem> {
    // Replace the identifier being typed.
    let word_start = text[..offset]
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || matches!(c, '_' | '-'))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(offset);
    let replace = Range::new(lines.position_of(word_start), position);

    let mut items = snippets::global_snippets(replace);
    let extension = document.uri.path().rsplit('.').next().unwrap_or_default();
    if HOOK_FILE_EXTENSIONS.contains(&extension) {
        if let Some(module) = module_name(&document.uri) {
            items.extend(snippets::hook_snippets(index, &module, replace));
        }
    }
    items.extend(snippets::element_snippets(index, replace));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{ExtractContext, extract};
    use crate::ir::HookCatalog;
    use indoc::indoc;
    use std::sync::Arc;
    use tower_lsp::lsp_types::Url;

    fn index_with(files: &[(&str, &str)]) -> SymbolIndex {
        let config = EngineConfig::default();
        let mut index = SymbolIndex::new();
        for (revision, (path, text)) in files.iter().enumerate() {
            let uri = Url::parse(&format!("file:///ws{}", path)).unwrap();
            let kind = FileKind::from_uri(&uri).unwrap();
            let hooks: Arc<HookCatalog> = index.hook_catalog();
            let ctx = ExtractContext { config: &config, hooks: &hooks };
            let extraction = extract(kind, &uri, text, &ctx).unwrap();
            index.replace_file(&uri, revision as u64 + 1, extraction).unwrap();
        }
        index
    }

    fn complete_at(index: &SymbolIndex, path: &str, marked: &str) -> Vec<CompletionItem> {
        let offset = marked.find('|').expect("cursor marker");
        let text = marked.replacen('|', "", 1);
        let uri = Url::parse(&format!("file:///ws{}", path)).unwrap();
        let position = LineIndex::new(&text).position_of(offset);
        let document = DocumentSnapshot {
            kind: FileKind::from_uri(&uri).unwrap(),
            uri,
            version: 1,
            revision: 99,
            text: text.into(),
        };
        match complete(index, &EngineConfig::default(), &document, position) {
            Some(CompletionResponse::Array(items)) => items,
            Some(CompletionResponse::List(list)) => list.items,
            None => Vec::new(),
        }
    }

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|item| item.label.as_str()).collect()
    }

    const ROUTING: &str = indoc! {"
        mymod.settings:
          path: '/admin/mymod'
          defaults:
            _form: '\\Drupal\\mymod\\Form\\Settings'
        mymod.node:
          path: '/mymod/{node}/{mode}'
          defaults:
            _controller: '\\Drupal\\mymod\\Controller\\Page::build'
        other.page:
          path: '/other'
    "};

    #[test]
    fn test_route_completion_replaces_prefix_and_adds_parameters() {
        let index = index_with(&[("/mymod/mymod.routing.yml", ROUTING)]);
        let items = complete_at(&index, "/mymod/mymod.module", "<?php\n$url = Url::fromRoute('mymod.|');\n");
        assert_eq!(labels(&items), vec!["mymod.node", "mymod.settings"]);

        let node = &items[0];
        match &node.text_edit {
            Some(CompletionTextEdit::Edit(edit)) => {
                assert_eq!(edit.range, Range::new(Position::new(1, 23), Position::new(1, 29)));
                assert_eq!(edit.new_text, "mymod.node");
            }
            other => panic!("unexpected edit {:?}", other),
        }
        let extra = node.additional_text_edits.as_ref().expect("parameters edit");
        assert_eq!(extra[0].new_text, ", ['node' => $node, 'mode' => $mode]");
        assert_eq!(extra[0].range.start, Position::new(1, 30));
        assert!(items[1].additional_text_edits.is_none());
    }

    #[test]
    fn test_permission_completion_in_routing_requirements() {
        let index = index_with(&[(
            "/mymod/mymod.permissions.yml",
            "administer mymod:\n  title: 'Administer'\naccess mymod:\n  title: 'Access'\n",
        )]);
        let items = complete_at(
            &index,
            "/mymod/mymod.routing.yml",
            "mymod.x:\n  requirements:\n    _permission: 'access content+adm|'\n",
        );
        assert_eq!(labels(&items), vec!["administer mymod"]);
        assert_eq!(
            items[0].label_details.as_ref().and_then(|d| d.description.as_deref()),
            Some("Permission")
        );
    }

    #[test]
    fn test_alter_completion_strips_suffix() {
        let index = index_with(&[(
            "/core/mymod.api.php",
            "<?php\nfunction hook_mymod_info_alter(array &$info) {}\nfunction hook_mymod_info() {}\n",
        )]);
        let items = complete_at(
            &index,
            "/mymod/mymod.module",
            "<?php\n\\Drupal::moduleHandler()->alter('mymod_|', $info);\n",
        );
        assert_eq!(labels(&items), vec!["mymod_info"]);
    }

    #[test]
    fn test_snippets_outside_strings() {
        let index = index_with(&[("/core/system.api.php", "<?php\n/**\n * Runs on cron.\n */\nfunction hook_cron() {}\n")]);
        let items = complete_at(&index, "/mymod/mymod.module", "<?php\n\ncr|\n");
        let cron = items.iter().find(|item| item.label == "cron").expect("hook snippet");
        match &cron.text_edit {
            Some(CompletionTextEdit::Edit(edit)) => {
                assert!(edit.new_text.contains("function mymod_cron() {"));
                assert_eq!(edit.range, Range::new(Position::new(2, 0), Position::new(2, 2)));
            }
            other => panic!("unexpected edit {:?}", other),
        }
        assert!(items.iter().any(|item| item.label == "ihdoc"));

        let class_file = complete_at(&index, "/mymod/src/Foo.php", "<?php\n\ncr|\n");
        assert!(class_file.iter().all(|item| item.label != "cron"));

        let in_string = complete_at(&index, "/mymod/mymod.module", "<?php\n$x = 'cr|';\n");
        assert!(in_string.is_empty());
    }
}
