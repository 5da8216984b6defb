//! `*.routing.yml` extractor.

use crate::ir::{DeclarationMetadata, RouteHandler, SymbolKind};
use crate::parsers::yaml::{Span, YamlScalar, YamlValue};

use super::context::{Slot, classify_yaml_value, split_permission_list};
use super::{ExtractionBuilder, FileKind, callables};

/// Defaults keys naming the code that serves a route, in lookup order.
const HANDLER_KEYS: &[&str] = &[
    "_controller",
    "_form",
    "_entity_form",
    "_entity_list",
    "_entity_view",
    "_title_callback",
];

pub(super) fn extract(document: &YamlValue, builder: &mut ExtractionBuilder) {
    let Some(entries) = document.as_mapping() else {
        return;
    };
    for entry in entries {
        // Dynamic route providers, not a route.
        if entry.key.value == "route_callbacks" {
            continue;
        }
        let Some(definition) = entry.value.as_ref().filter(|value| value.as_mapping().is_some()) else {
            continue;
        };

        let defaults = definition.get("defaults");
        let handler = defaults.and_then(|defaults| {
            HANDLER_KEYS.iter().find_map(|key| {
                let scalar = defaults.get(key)?.as_scalar()?;
                Some(RouteHandler {
                    key: key.to_string(),
                    raw: scalar.value.clone(),
                    range: builder.lines.range_of(scalar.span.start, scalar.span.end),
                })
            })
        });
        let title = defaults.and_then(|defaults| defaults.get_str("_title")).map(str::to_string);
        if let Some(defaults) = defaults {
            for key in HANDLER_KEYS {
                if let Some(scalar) = defaults.get(key).and_then(YamlValue::as_scalar) {
                    callables::reference(builder, &scalar.value, scalar.span, false);
                }
            }
        }

        let methods = match definition.get("methods") {
            Some(YamlValue::Sequence(items)) => items
                .iter()
                .filter_map(YamlValue::as_scalar)
                .map(|s| s.value.to_ascii_uppercase())
                .collect(),
            Some(YamlValue::Scalar(method)) => vec![method.value.to_ascii_uppercase()],
            _ => Vec::new(),
        };

        let mut permission = None;
        if let Some(requirements) = definition.get("requirements").and_then(YamlValue::as_mapping) {
            for requirement in requirements {
                let Some(YamlValue::Scalar(value)) = &requirement.value else {
                    continue;
                };
                match classify_yaml_value(FileKind::Routing, &requirement.key.value) {
                    Some(Slot::PermissionList) => {
                        permission = Some(value.value.clone());
                        permission_references(value, builder);
                    }
                    Some(Slot::Symbol(kind)) => builder.reference(kind, value.value.clone(), value.span),
                    _ => {}
                }
            }
        }

        let display_class = handler.as_ref().map(|handler| {
            handler
                .class_name()
                .map(str::to_string)
                .unwrap_or_else(|| handler.raw.clone())
        });

        builder.declare(
            SymbolKind::Route,
            entry.key.value.clone(),
            display_class,
            entry.key.span,
            DeclarationMetadata::Route {
                path: definition.get_str("path").map(str::to_string),
                methods,
                title,
                handler,
                permission,
            },
        );
    }
}

fn permission_references(value: &YamlScalar, builder: &mut ExtractionBuilder) {
    let raw = builder.source.get(value.span.start..value.span.end).unwrap_or("");
    let exact = raw == value.value;
    for (permission, offset) in split_permission_list(&value.value) {
        let span = if exact {
            Span {
                start: value.span.start + offset,
                end: value.span.start + offset + permission.len(),
            }
        } else {
            value.span
        };
        builder.reference(SymbolKind::Permission, permission, span);
    }
}

/// Names of the `{placeholders}` of a route path.
pub fn path_parameters(path: &str) -> Vec<&str> {
    let mut parameters = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let name = &after[..close];
        if !name.is_empty() {
            parameters.push(name);
        }
        rest = &after[close + 1..];
    }
    parameters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::extractors::{ExtractContext, Extraction, extract};
    use crate::ir::HookCatalog;
    use indoc::indoc;
    use tower_lsp::lsp_types::Url;

    fn run(text: &str) -> Extraction {
        let config = EngineConfig::default();
        let hooks = HookCatalog::default();
        let ctx = ExtractContext { config: &config, hooks: &hooks };
        let uri = Url::parse("file:///my_module/my_module.routing.yml").unwrap();
        extract(FileKind::Routing, &uri, text, &ctx).expect("extraction")
    }

    #[test]
    fn test_flow_route() {
        let extraction = run("my_module.page: {path: /foo, defaults: {_controller: 'Foo\\Bar::baz'}}\n");
        assert_eq!(extraction.declarations.len(), 1);
        let route = &extraction.declarations[0];
        assert_eq!(route.identifier, "my_module.page");
        assert_eq!(route.display_class.as_deref(), Some("Foo\\Bar"));
        match &route.metadata {
            DeclarationMetadata::Route { path, handler, .. } => {
                assert_eq!(path.as_deref(), Some("/foo"));
                assert_eq!(handler.as_ref().map(|h| h.raw.as_str()), Some("Foo\\Bar::baz"));
            }
            other => panic!("unexpected metadata {:?}", other),
        }
    }

    #[test]
    fn test_block_route_with_permissions() {
        let text = indoc! {"
            route_callbacks:
              - '\\Drupal\\my_module\\Routes::routes'
            my_module.settings:
              path: '/admin/config/my-module/{node}'
              methods: [get, POST]
              defaults:
                _form: '\\Drupal\\my_module\\Form\\SettingsForm'
                _title: 'Settings'
              requirements:
                _permission: 'administer site configuration+access content'
        "};
        let extraction = run(text);
        assert_eq!(extraction.declarations.len(), 1);
        let route = &extraction.declarations[0];
        assert_eq!(route.display_class.as_deref(), Some("Drupal\\my_module\\Form\\SettingsForm"));
        match &route.metadata {
            DeclarationMetadata::Route { methods, title, permission, path, .. } => {
                assert_eq!(methods, &vec!["GET".to_string(), "POST".to_string()]);
                assert_eq!(title.as_deref(), Some("Settings"));
                assert_eq!(permission.as_deref(), Some("administer site configuration+access content"));
                assert_eq!(path_parameters(path.as_deref().unwrap()), vec!["node"]);
            }
            other => panic!("unexpected metadata {:?}", other),
        }

        let refs: Vec<(&str, SymbolKind)> = extraction
            .references
            .iter()
            .map(|r| (r.identifier.as_str(), r.kind))
            .collect();
        assert_eq!(
            refs,
            vec![
                ("Drupal\\my_module\\Form\\SettingsForm", SymbolKind::Class),
                ("administer site configuration", SymbolKind::Permission),
                ("access content", SymbolKind::Permission)
            ]
        );
        let line = text.lines().nth(9).unwrap();
        let column = line.find("access content").unwrap() as u32;
        assert_eq!(extraction.references[2].range.start.character, column);
    }

    #[test]
    fn test_controller_references_its_method() {
        let text = indoc! {"
            my.page:
              path: /my
              defaults:
                _controller: '\\Drupal\\my\\Controller\\Page::build'
                _title_callback: 'my.title_resolver:title'
        "};
        let extraction = run(text);
        assert_eq!(extraction.references.len(), 1);
        let reference = &extraction.references[0];
        assert_eq!(reference.kind, SymbolKind::Method);
        assert_eq!(reference.identifier, "Drupal\\my\\Controller\\Page::build");
        let line = text.lines().nth(3).unwrap();
        let start = line.find('\\').unwrap() as u32;
        assert_eq!(reference.range.start.character, start);
        assert_eq!(reference.range.end.character, line.rfind('\'').unwrap() as u32);
    }

    #[test]
    fn test_path_parameters() {
        assert_eq!(path_parameters("/node/{node}/revisions/{node_revision}"), vec!["node", "node_revision"]);
        assert!(path_parameters("/admin").is_empty());
    }
}
