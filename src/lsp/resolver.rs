//! Cursor position to symbol resolution.

use tower_lsp::lsp_types::{Position, Url};

use crate::ir::{DeclarationSet, PluginType, Reference, SymbolKind};
use crate::lsp::symbol_index::SymbolIndex;

/// A reference under the cursor and whatever it resolves to.
#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    pub reference: Reference,
    /// Ordered by file, then position. Empty when nothing declares the symbol.
    pub declarations: DeclarationSet,
}

impl ResolvedSymbol {
    pub fn is_resolved(&self) -> bool {
        !self.declarations.is_empty()
    }
}

/// Finds the reference at `position` and looks up its declarations.
///
/// Returns `None` when there is no reference under the cursor, including for
/// documents the index does not track.
pub fn resolve(index: &SymbolIndex, uri: &Url, position: Position) -> Option<ResolvedSymbol> {
    let reference = index.lookup_reference_at(uri, position)?.clone();
    let declarations = lookup(index, reference.kind, &reference.identifier);
    Some(ResolvedSymbol { reference, declarations })
}

/// Declarations for a kind, with `'#type'` element references also
/// reaching form elements.
///
/// PHP class and method names are case-insensitive, so those fall back to a
/// case-insensitive scan when the exact name is unknown.
pub fn lookup(index: &SymbolIndex, kind: SymbolKind, identifier: &str) -> DeclarationSet {
    let declarations = index.lookup_declarations(kind, identifier);
    match kind {
        SymbolKind::Plugin(PluginType::RenderElement) if declarations.is_empty() => {
            index.lookup_declarations(SymbolKind::Plugin(PluginType::FormElement), identifier)
        }
        SymbolKind::Class | SymbolKind::Method if declarations.is_empty() => index
            .declarations_of(kind)
            .find(|declaration| declaration.identifier.eq_ignore_ascii_case(identifier))
            .map(|declaration| DeclarationSet::Unique(declaration.clone()))
            .unwrap_or_default(),
        _ => declarations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::Extraction;
    use crate::ir::{Declaration, DeclarationMetadata};
    use tower_lsp::lsp_types::Range;

    fn plugin(kind: PluginType, uri: &Url, id: &str) -> Declaration {
        Declaration {
            kind: SymbolKind::Plugin(kind),
            identifier: id.to_string(),
            display_class: Some("Drupal\\Core\\Render\\Element\\Date".to_string()),
            uri: uri.clone(),
            range: Range::new(Position::new(3, 4), Position::new(3, 8)),
            metadata: DeclarationMetadata::Plugin {
                label: None,
                usage_example: None,
            },
        }
    }

    #[test]
    fn test_render_element_reference_finds_form_element() {
        let element_file = Url::parse("file:///core/Date.php").unwrap();
        let form_file = Url::parse("file:///mymod/mymod.module").unwrap();
        let mut index = SymbolIndex::new();
        index
            .replace_file(
                &element_file,
                1,
                Extraction {
                    declarations: vec![plugin(PluginType::FormElement, &element_file, "date")],
                    ..Extraction::default()
                },
            )
            .unwrap();
        index
            .replace_file(
                &form_file,
                2,
                Extraction {
                    references: vec![Reference {
                        kind: SymbolKind::Plugin(PluginType::RenderElement),
                        identifier: "date".to_string(),
                        uri: form_file.clone(),
                        range: Range::new(Position::new(5, 20), Position::new(5, 24)),
                    }],
                    ..Extraction::default()
                },
            )
            .unwrap();

        let resolved = resolve(&index, &form_file, Position::new(5, 22)).expect("reference");
        assert!(resolved.is_resolved());
        assert_eq!(resolved.declarations.iter().next().map(|d| d.uri.clone()), Some(element_file));
        assert!(resolve(&index, &form_file, Position::new(5, 30)).is_none());
    }

    #[test]
    fn test_method_names_resolve_case_insensitively() {
        let class_file = Url::parse("file:///ws/my/src/Controller/Page.php").unwrap();
        let routing = Url::parse("file:///ws/my/my.routing.yml").unwrap();
        let mut index = SymbolIndex::new();
        index
            .replace_file(
                &class_file,
                1,
                Extraction {
                    declarations: vec![Declaration {
                        kind: SymbolKind::Method,
                        identifier: "Drupal\\my\\Controller\\Page::buildPage".to_string(),
                        display_class: Some("Drupal\\my\\Controller\\Page".to_string()),
                        uri: class_file.clone(),
                        range: Range::new(Position::new(4, 18), Position::new(4, 27)),
                        metadata: DeclarationMetadata::Method {
                            class: "Drupal\\my\\Controller\\Page".to_string(),
                            parameters: String::new(),
                            is_static: false,
                        },
                    }],
                    ..Extraction::default()
                },
            )
            .unwrap();
        index
            .replace_file(
                &routing,
                2,
                Extraction {
                    references: vec![Reference {
                        kind: SymbolKind::Method,
                        identifier: "Drupal\\my\\Controller\\Page::buildpage".to_string(),
                        uri: routing.clone(),
                        range: Range::new(Position::new(3, 18), Position::new(3, 54)),
                    }],
                    ..Extraction::default()
                },
            )
            .unwrap();

        let resolved = resolve(&index, &routing, Position::new(3, 30)).expect("reference");
        let declaration = resolved.declarations.iter().next().expect("method");
        assert_eq!(declaration.uri, class_file);
        assert_eq!(declaration.range.start, Position::new(4, 18));
    }

    #[test]
    fn test_untracked_document_is_unresolved() {
        let index = SymbolIndex::new();
        let uri = Url::parse("file:///nowhere.module").unwrap();
        assert!(resolve(&index, &uri, Position::new(0, 0)).is_none());
    }
}
