//! Go-to-definition
//!
//! One declaration answers with a single location. Hooks may resolve to every
//! implementation, which answers with all of them in file order.

use tower_lsp::lsp_types::{GotoDefinitionResponse, Location};
use tracing::debug;

use crate::lsp::resolver::ResolvedSymbol;

pub fn goto_definition(resolved: &ResolvedSymbol) -> Option<GotoDefinitionResponse> {
    let mut locations: Vec<Location> = resolved.declarations.iter().map(|d| d.location()).collect();
    debug!(
        "Definition of {} '{}': {} location(s)",
        resolved.reference.kind,
        resolved.reference.identifier,
        locations.len()
    );
    match locations.len() {
        0 => None,
        1 => locations.pop().map(GotoDefinitionResponse::Scalar),
        _ => Some(GotoDefinitionResponse::Array(locations)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Declaration, DeclarationMetadata, DeclarationSet, Reference, SymbolKind};
    use std::sync::Arc;
    use tower_lsp::lsp_types::{Position, Range, Url};

    fn implementation(file: &str, line: u32) -> Arc<Declaration> {
        Arc::new(Declaration {
            kind: SymbolKind::Hook,
            identifier: "cron".to_string(),
            display_class: None,
            uri: Url::parse(&format!("file:///ws/{}", file)).unwrap(),
            range: Range::new(Position::new(line, 9), Position::new(line, 19)),
            metadata: DeclarationMetadata::Hook {
                module: file.split('.').next().unwrap_or_default().to_string(),
                template: None,
                function: format!("{}_cron", file.split('.').next().unwrap_or_default()),
            },
        })
    }

    fn resolved(declarations: DeclarationSet) -> ResolvedSymbol {
        ResolvedSymbol {
            reference: Reference {
                kind: SymbolKind::Hook,
                identifier: "cron".to_string(),
                uri: Url::parse("file:///ws/caller.module").unwrap(),
                range: Range::default(),
            },
            declarations,
        }
    }

    #[test]
    fn test_single_and_multiple_locations() {
        let a = implementation("a.module", 2);
        let b = implementation("b.module", 7);

        assert!(goto_definition(&resolved(DeclarationSet::Empty)).is_none());

        match goto_definition(&resolved(DeclarationSet::Unique(a.clone()))) {
            Some(GotoDefinitionResponse::Scalar(location)) => assert_eq!(location, a.location()),
            other => panic!("expected a single location, got {:?}", other),
        }

        match goto_definition(&resolved(DeclarationSet::Multiple(vec![a.clone(), b.clone()]))) {
            Some(GotoDefinitionResponse::Array(locations)) => {
                assert_eq!(locations, vec![a.location(), b.location()]);
            }
            other => panic!("expected every implementation, got {:?}", other),
        }
    }
}
