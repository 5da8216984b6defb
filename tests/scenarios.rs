//! End-to-end scenarios against the engine's query entry points.

use std::sync::Arc;

use indoc::indoc;
use tower_lsp::lsp_types::{
    CodeActionOrCommand, GotoDefinitionResponse, Hover, HoverContents, Position, Url,
};

use drupal_language_server::ir::SymbolKind;
use drupal_language_server::lsp::engine::{DrupalEngine, UpdateOutcome};

fn uri(path: &str) -> Url {
    Url::parse(&format!("file:///ws{}", path)).unwrap()
}

fn ready_engine() -> DrupalEngine {
    let engine = DrupalEngine::default();
    engine.mark_ready();
    engine
}

fn markdown(hover: Hover) -> String {
    match hover.contents {
        HoverContents::Markup(content) => content.value,
        other => panic!("unexpected hover contents {:?}", other),
    }
}

/// Applies the single edit of a code action to single-byte text.
fn apply_action(text: &str, action: &CodeActionOrCommand) -> String {
    let CodeActionOrCommand::CodeAction(action) = action else {
        panic!("expected a code action, got {:?}", action);
    };
    let changes = action.edit.as_ref().and_then(|edit| edit.changes.as_ref()).unwrap();
    let edit = &changes.values().next().unwrap()[0];
    let offset = |position: Position| -> usize {
        let line_start: usize = text
            .split_inclusive('\n')
            .take(position.line as usize)
            .map(str::len)
            .sum();
        line_start + position.character as usize
    };
    let start = offset(edit.range.start);
    let end = offset(edit.range.end);
    format!("{}{}{}", &text[..start], edit.new_text, &text[end..])
}

#[tokio::test]
async fn test_service_argument_hover_resolves_across_files() {
    let engine = ready_engine();
    let services = uri("/modules/my/my.services.yml");
    engine.on_file_opened_or_changed(
        &services,
        1,
        indoc! {"
            services:
              my.service:
                class: Foo\\Bar
                arguments: ['@other.service']
        "},
    );

    let on_argument = Position::new(3, 22);
    assert!(engine.hover(&services, on_argument).await.is_none());

    let other = uri("/modules/other/other.services.yml");
    engine.on_file_opened_or_changed(
        &other,
        1,
        indoc! {"
            services:
              other.service:
                class: Foo\\Other
        "},
    );
    let hover = markdown(engine.hover(&services, on_argument).await.expect("hover"));
    assert!(hover.contains("**other.service** (Service)"), "{}", hover);
    assert!(hover.contains("`Foo\\Other`"), "{}", hover);
    assert!(hover.contains("other.services.yml:2"), "{}", hover);

    let on_sigil = Position::new(3, 17);
    let hover = engine.hover(&services, on_sigil).await.expect("hover on the sigil");
    assert_eq!(hover.range.map(|range| range.start), Some(on_sigil));
    assert!(markdown(hover).contains("**other.service** (Service)"));
}

#[tokio::test]
async fn test_route_reference_goes_to_single_declaration() {
    let engine = ready_engine();
    let routing = uri("/modules/my_module/my_module.routing.yml");
    engine.on_file_opened_or_changed(
        &routing,
        1,
        indoc! {"
            my_module.page:
              path: /foo
              defaults:
                _controller: 'Foo\\Bar::baz'
        "},
    );
    let module = uri("/modules/my_module/my_module.module");
    engine.on_file_opened_or_changed(
        &module,
        1,
        indoc! {"
            <?php
            function my_module_link() {
              return Url::fromRoute('my_module.page');
            }
        "},
    );

    let definition = engine.definition(&module, Position::new(2, 30)).await;
    match definition {
        Some(GotoDefinitionResponse::Scalar(location)) => {
            assert_eq!(location.uri, routing);
            assert_eq!(location.range.start.line, 0);
        }
        other => panic!("expected a single location, got {:?}", other),
    }
}

#[tokio::test]
async fn test_route_handler_and_service_class_go_to_php() {
    let engine = ready_engine();
    let page = uri("/modules/my/src/Controller/Page.php");
    engine.on_file_opened_or_changed(
        &page,
        1,
        indoc! {r"
            <?php

            namespace Drupal\my\Controller;

            class Page {
              public function build() {
                return [];
              }
            }
        "},
    );
    let routing = uri("/modules/my/my.routing.yml");
    engine.on_file_opened_or_changed(
        &routing,
        1,
        indoc! {r"
            my.page:
              path: /my
              defaults:
                _controller: '\Drupal\my\Controller\Page::build'
        "},
    );
    let services = uri("/modules/my/my.services.yml");
    engine.on_file_opened_or_changed(
        &services,
        1,
        indoc! {r"
            services:
              my.page_builder:
                class: Drupal\my\Controller\Page
        "},
    );

    match engine.definition(&routing, Position::new(3, 30)).await {
        Some(GotoDefinitionResponse::Scalar(location)) => {
            assert_eq!(location.uri, page);
            assert_eq!(location.range.start, Position::new(5, 18));
        }
        other => panic!("expected the method, got {:?}", other),
    }
    let hover = markdown(engine.hover(&routing, Position::new(3, 30)).await.expect("hover"));
    assert!(hover.contains("(Method)"), "{}", hover);
    assert!(hover.contains("function build()"), "{}", hover);

    match engine.definition(&services, Position::new(2, 15)).await {
        Some(GotoDefinitionResponse::Scalar(location)) => {
            assert_eq!(location.uri, page);
            assert_eq!(location.range.start, Position::new(4, 6));
        }
        other => panic!("expected the class, got {:?}", other),
    }
}

#[tokio::test]
async fn test_hover_on_a_declaration_describes_it() {
    let engine = ready_engine();
    let routing = uri("/modules/my/my.routing.yml");
    engine.on_file_opened_or_changed(
        &routing,
        1,
        indoc! {"
            my.page:
              path: /my/{node}
              defaults:
                _title: 'My page'
        "},
    );

    let hover = engine.hover(&routing, Position::new(0, 3)).await.expect("hover");
    assert_eq!(hover.range.map(|range| range.start), Some(Position::new(0, 0)));
    let text = markdown(hover);
    assert!(text.contains("**my.page** (Route)"), "{}", text);
    assert!(text.contains("*Path:* `/my/{node}`"), "{}", text);
    assert!(engine.hover(&routing, Position::new(1, 12)).await.is_none());
}

#[tokio::test]
async fn test_hook_invocation_hover_lists_every_implementation() {
    let engine = ready_engine();
    engine.on_file_opened_or_changed(
        &uri("/core/modules/system/system.api.php"),
        1,
        indoc! {"
            <?php
            /**
             * Respond to a name change.
             */
            function hook_name($entity) {
            }
        "},
    );
    engine.on_file_opened_or_changed(&uri("/modules/moda/moda.module"), 1, "<?php\nfunction moda_name($entity) {}\n");
    let modb = uri("/modules/modb/modb.module");
    engine.on_file_opened_or_changed(
        &modb,
        1,
        indoc! {"
            <?php
            function modb_name($entity) {
              \\Drupal::moduleHandler()->invokeAll('name');
            }
        "},
    );

    assert_eq!(engine.index().lookup_declarations(SymbolKind::Hook, "name").len(), 2);
    let hover = markdown(engine.hover(&modb, Position::new(2, 40)).await.expect("hover"));
    assert!(hover.contains("**hook_name** (Hook)"), "{}", hover);
    assert!(hover.contains("*Implementations (2):*"), "{}", hover);
    assert!(hover.contains("`moda_name` in module `moda`"), "{}", hover);
    assert!(hover.contains("`modb_name` in module `modb`"), "{}", hover);
}

#[tokio::test]
async fn test_translation_placeholders_action_is_idempotent() {
    let engine = ready_engine();
    let module = uri("/modules/my/my.module");
    let text = "<?php\n$greeting = t('Hello @name');\n";
    engine.on_file_opened_or_changed(&module, 1, text);

    let actions = engine.code_action(&module, Position::new(1, 18)).await;
    assert_eq!(actions.len(), 1);
    let fixed = apply_action(text, &actions[0]);
    assert_eq!(fixed, "<?php\n$greeting = t('Hello @name', ['@name' => '']);\n");

    engine.on_file_opened_or_changed(&module, 2, fixed.as_str());
    assert!(engine.code_action(&module, Position::new(1, 18)).await.is_empty());
}

#[tokio::test]
async fn test_deleting_a_file_removes_its_symbols() {
    let engine = ready_engine();
    let permissions = uri("/modules/my/my.permissions.yml");
    engine.on_file_opened_or_changed(&permissions, 1, "administer my:\n  title: 'Administer my'\n");
    let routing = uri("/modules/my/my.routing.yml");
    let routing_text = indoc! {"
        my.admin:
          path: /admin/my
          requirements:
            _permission: 'administer my'
    "};
    engine.on_file_opened_or_changed(&routing, 1, routing_text);
    assert!(engine.resolve(&routing, Position::new(3, 20)).is_some());

    engine.on_file_deleted(&routing);
    let index = engine.index();
    assert!(index.lookup_declarations(SymbolKind::Route, "my.admin").is_empty());
    assert!(index.lookup_reference_at(&routing, Position::new(3, 20)).is_none());
    assert!(!index.contains_file(&routing));
    assert_eq!(index.lookup_declarations(SymbolKind::Permission, "administer my").len(), 1);
}

#[test]
fn test_concurrent_updates_leave_the_highest_version_indexed() {
    let engine = Arc::new(ready_engine());
    let file = uri("/modules/my/my.permissions.yml");

    let handles: Vec<_> = (1..=8)
        .map(|version| {
            let engine = engine.clone();
            let file = file.clone();
            std::thread::spawn(move || {
                let text = format!("permission {}:\n  title: 'v{}'\n", version, version);
                engine.on_file_opened_or_changed(&file, version, text)
            })
        })
        .collect();
    for handle in handles {
        let outcome = handle.join().unwrap();
        assert!(matches!(outcome, UpdateOutcome::Indexed { .. } | UpdateOutcome::Superseded));
    }

    let stored = engine.document(&file).expect("document");
    assert_eq!(stored.version, 8);
    let expected = "permission 8".to_string();
    let index = engine.index();
    let declared: Vec<String> = index
        .declarations_in(&file)
        .iter()
        .map(|declaration| declaration.identifier.clone())
        .collect();
    assert_eq!(declared, vec![expected]);
    assert_eq!(index.revision(&file), Some(stored.revision));
}

#[test]
fn test_sequential_versions_coalesce_to_the_last() {
    let engine = ready_engine();
    let file = uri("/modules/my/my.services.yml");
    engine.on_file_opened_or_changed(&file, 1, "services:\n  my.first:\n    class: First\n");
    engine.on_file_opened_or_changed(&file, 2, "services:\n  my.second:\n    class: Second\n");

    let index = engine.index();
    assert!(index.lookup_declarations(SymbolKind::Service, "my.first").is_empty());
    assert_eq!(index.lookup_declarations(SymbolKind::Service, "my.second").len(), 1);
}

#[tokio::test]
async fn test_completion_offers_routes_with_prefix() {
    let engine = ready_engine();
    engine.on_file_opened_or_changed(
        &uri("/modules/my/my.routing.yml"),
        1,
        "my.list:\n  path: /my\nmy.edit:\n  path: /my/{node}/edit\nother.page:\n  path: /other\n",
    );
    let module = uri("/modules/my/my.module");
    engine.on_file_opened_or_changed(&module, 1, "<?php\n$url = Url::fromRoute('my.');\n");

    let response = engine.completion(&module, Position::new(1, 26)).await.expect("completion");
    let items = match response {
        tower_lsp::lsp_types::CompletionResponse::Array(items) => items,
        tower_lsp::lsp_types::CompletionResponse::List(list) => list.items,
    };
    let mut labels: Vec<String> = items.into_iter().map(|item| item.label).collect();
    labels.sort();
    assert_eq!(labels, vec!["my.edit".to_string(), "my.list".to_string()]);
}
