//! `*.permissions.yml` extractor.

use crate::ir::{DeclarationMetadata, SymbolKind};
use crate::parsers::yaml::{YamlScalar, YamlValue};

use super::ExtractionBuilder;

pub(super) fn extract(document: &YamlValue, builder: &mut ExtractionBuilder) {
    let Some(entries) = document.as_mapping() else {
        return;
    };
    for entry in entries {
        if entry.key.value == "permission_callbacks" {
            continue;
        }
        let definition = entry.value.as_ref();
        let field = |key: &str| definition.and_then(|d| d.get_str(key)).map(str::to_string);
        let restrict_access = definition
            .and_then(|d| d.get("restrict access"))
            .and_then(YamlValue::as_scalar)
            .map(is_truthy)
            .unwrap_or(false);

        builder.declare(
            SymbolKind::Permission,
            entry.key.value.clone(),
            None,
            entry.key.span,
            DeclarationMetadata::Permission {
                title: field("title"),
                description: field("description"),
                restrict_access,
            },
        );
    }
}

fn is_truthy(scalar: &YamlScalar) -> bool {
    !scalar.quoted && matches!(scalar.value.to_ascii_lowercase().as_str(), "true" | "yes" | "on")
}
