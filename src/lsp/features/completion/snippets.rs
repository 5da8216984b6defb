//! Snippet completions: hook implementation stubs, render/form element
//! examples and a fixed set of Drupal idioms.

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionItemLabelDetails, CompletionTextEdit, Documentation,
    InsertTextFormat, MarkupContent, MarkupKind, Range, TextEdit,
};

use crate::ir::{DeclarationMetadata, HookSpec, PluginType, SymbolKind, replace_placeholders};
use crate::lsp::symbol_index::SymbolIndex;

/// `(label, snippet body)` pairs offered anywhere in PHP code.
const GLOBAL_SNIPPETS: &[(&str, &str)] = &[
    (
        "batch",
        r#"\$storage = \\Drupal::entityTypeManager()->getStorage('$0');
if (!isset(\$sandbox['ids'])) {
  \$ids = \$storage->getQuery()
    ->accessCheck(FALSE)
    ->execute();
  \$sandbox['ids'] = \$ids;
  \$sandbox['total'] = count(\$sandbox['ids']);
}

\$ids = array_splice(\$sandbox['ids'], 0, 20);
foreach (\$storage->loadMultiple(\$ids) as \$entity) {
  \$entity->save();
}

if (\$sandbox['total'] > 0) {
  \$sandbox['#finished'] = (\$sandbox['total'] - count(\$sandbox['ids'])) / \$sandbox['total'];
}"#,
    ),
    ("ihdoc", "/**\n * {@inheritdoc}\n */"),
    ("ensure-instanceof", "if (!($1 instanceof $2)) {\n  return$0;\n}"),
    ("entity-storage", r#"\$storage = \$this->entityTypeManager->getStorage('$0');"#),
    ("entity-load", r#"\$$1 = \$this->entityTypeManager->getStorage('$1')->load($0);"#),
    (
        "entity-query",
        r#"\$ids = \$this->entityTypeManager->getStorage('$1')->getQuery()
  ->accessCheck(${2:TRUE})
  $0
  ->execute();"#,
    ),
    ("type", "'#type' => '$0',"),
    ("title", r#"'#title' => \$this->t('$0'),"#),
    ("description", r#"'#description' => \$this->t('$0'),"#),
    ("attributes", "'#attributes' => [$0],"),
    ("attributes-class", "'#attributes' => [\n  'class' => ['$0'],\n],"),
    ("attributes-id", "'#attributes' => [\n  'id' => '$0',\n],"),
    ("type_html_tag", "'#type' => 'html_tag',\n'#tag' => '$1',\n'#value' => $0,"),
    (
        "type_details",
        r#"'#type' => 'details',
'#open' => TRUE,
'#title' => \$this->t('$0'),"#,
    ),
    (
        "create",
        r#"/**
 * {@inheritdoc}
 */
public static function create(ContainerInterface \$container) {
  return new static(
    \$container->get('$0'),
  );
}"#,
    ),
    (
        "create-plugin",
        r#"/**
 * {@inheritdoc}
 */
public static function create(ContainerInterface \$container, array \$configuration, \$plugin_id, \$plugin_definition) {
  return new static(
    \$configuration,
    \$plugin_id,
    \$plugin_definition,
    \$container->get('$0'),
  );
}"#,
    ),
];

fn snippet_item(label: String, description: &str, body: String, replace: Range) -> CompletionItem {
    CompletionItem {
        label: label.clone(),
        label_details: Some(CompletionItemLabelDetails {
            detail: None,
            description: Some(description.to_string()),
        }),
        kind: Some(CompletionItemKind::SNIPPET),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit {
            range: replace,
            new_text: body,
        })),
        filter_text: Some(label),
        ..CompletionItem::default()
    }
}

pub fn global_snippets(replace: Range) -> Vec<CompletionItem> {
    GLOBAL_SNIPPETS
        .iter()
        .map(|(label, body)| snippet_item(label.to_string(), "snippet", body.to_string(), replace))
        .collect()
}

/// Escapes text for literal use inside a snippet body.
fn escape_snippet(text: &str) -> String {
    text.replace('\\', "\\\\").replace('$', "\\$").replace('}', "\\}")
}

/// Implementation stub for `spec` in a module whose machine name is `module`.
///
/// Placeholder segments of templated hooks become tab stops, so
/// `form_FORM_ID_alter` expands to `mymod_form_${1:FORM_ID}_alter`.
pub fn hook_body(spec: &HookSpec, module: &str) -> String {
    let mut stop = 0;
    let name = replace_placeholders(&spec.name, |segment| {
        stop += 1;
        format!("${{{}:{}}}", stop, segment)
    });
    format!(
        "/**\n * Implements hook_{}().\n */\nfunction {}_{}({}) {{\n  $0\n}}",
        spec.name,
        module,
        name,
        escape_snippet(&spec.parameters)
    )
}

pub fn hook_snippets(index: &SymbolIndex, module: &str, replace: Range) -> Vec<CompletionItem> {
    let catalog = index.hook_catalog();
    catalog
        .specs()
        .map(|spec| {
            let mut item = snippet_item(spec.name.clone(), "hook", hook_body(spec, module), replace);
            item.filter_text = Some(format!("hook_{}", spec.name));
            item.documentation = spec.summary.as_ref().map(|summary| {
                Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: summary.clone(),
                })
            });
            item
        })
        .collect()
}

/// `render-<id>` and `form-<id>` snippets from element usage examples.
pub fn element_snippets(index: &SymbolIndex, replace: Range) -> Vec<CompletionItem> {
    [(PluginType::RenderElement, "render"), (PluginType::FormElement, "form")]
        .into_iter()
        .flat_map(|(plugin, prefix)| {
            index.declarations_of(SymbolKind::Plugin(plugin)).filter_map(move |declaration| {
                let DeclarationMetadata::Plugin {
                    usage_example: Some(example),
                    ..
                } = &declaration.metadata
                else {
                    return None;
                };
                Some(snippet_item(
                    format!("{}-{}", prefix, declaration.identifier),
                    &plugin.to_string(),
                    example.replace('$', "\\$"),
                    replace,
                ))
            })
        })
        .collect()
}
