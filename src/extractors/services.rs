//! `*.services.yml` extractor.

use crate::config::ServiceReferenceRule;
use crate::ir::{DeclarationMetadata, SymbolKind};
use crate::parsers::yaml::{Span, YamlPair, YamlScalar, YamlValue};

use super::{ExtractionBuilder, callables};

/// Keys of a service definition whose values may hold `@service` references.
const SCANNED_KEYS: &[&str] = &["arguments", "factory", "configurator", "calls", "properties"];

/// Keys whose value is a bare service id.
const PLAIN_ID_KEYS: &[&str] = &["alias", "parent", "decorates"];

/// Top-level keys that never hold service definitions.
const RESERVED_TOP_LEVEL: &[&str] = &["parameters", "imports"];

/// Entries of the `services` mapping that configure other entries.
const RESERVED_ENTRIES: &[&str] = &["_defaults", "_instanceof"];

pub(super) fn extract(document: &YamlValue, builder: &mut ExtractionBuilder, rule: &ServiceReferenceRule) {
    let entries: Vec<&YamlPair> = match document.get("services") {
        Some(services) => services.as_mapping().map(|pairs| pairs.iter().collect()).unwrap_or_default(),
        None => document
            .as_mapping()
            .map(|pairs| {
                pairs
                    .iter()
                    .filter(|pair| !RESERVED_TOP_LEVEL.contains(&pair.key.value.as_str()))
                    .collect()
            })
            .unwrap_or_default(),
    };

    for entry in entries {
        if RESERVED_ENTRIES.contains(&entry.key.value.as_str()) {
            continue;
        }
        extract_service(entry, builder, rule);
    }
}

fn extract_service(entry: &YamlPair, builder: &mut ExtractionBuilder, rule: &ServiceReferenceRule) {
    let id = entry.key.value.clone();
    let fqcn_id = id.contains('\\').then(|| id.trim_start_matches('\\').to_string());

    match &entry.value {
        // Shorthand alias: `foo: '@bar'`.
        Some(YamlValue::Scalar(scalar)) => {
            let alias = service_reference(scalar, builder, rule);
            builder.declare(
                SymbolKind::Service,
                id,
                fqcn_id,
                entry.key.span,
                DeclarationMetadata::Service {
                    arguments: Vec::new(),
                    alias,
                    parent: None,
                },
            );
        }
        Some(definition @ YamlValue::Mapping(_)) => {
            let class = definition
                .get_str("class")
                .map(|class| class.trim_start_matches('\\').to_string());
            if let Some(scalar) = definition.get("class").and_then(YamlValue::as_scalar) {
                callables::reference(builder, &scalar.value, scalar.span, false);
            }

            let mut arguments = Vec::new();
            if let Some(args) = definition.get("arguments") {
                arguments = args.scalars(rule.scan_nested).iter().map(|s| s.value.clone()).collect();
            }

            for key in SCANNED_KEYS {
                if let Some(value) = definition.get(key) {
                    for scalar in value.scalars(rule.scan_nested) {
                        service_reference(scalar, builder, rule);
                    }
                }
            }

            let mut alias = None;
            let mut parent = None;
            for key in PLAIN_ID_KEYS {
                let Some(scalar) = definition.get(key).and_then(YamlValue::as_scalar) else {
                    continue;
                };
                // Targets are written either bare or with the reference sigil.
                let target = match service_reference(scalar, builder, rule) {
                    Some(target) => target,
                    None => {
                        builder.reference(SymbolKind::Service, scalar.value.clone(), scalar.span);
                        scalar.value.clone()
                    }
                };
                match *key {
                    "alias" => alias = Some(target),
                    "parent" => parent = Some(target),
                    _ => {}
                }
            }

            builder.declare(
                SymbolKind::Service,
                id,
                class.or(fqcn_id),
                entry.key.span,
                DeclarationMetadata::Service { arguments, alias, parent },
            );
        }
        // `Foo\Bar: ~` autowired by class name.
        _ => builder.declare(
            SymbolKind::Service,
            id,
            fqcn_id,
            entry.key.span,
            DeclarationMetadata::Service {
                arguments: Vec::new(),
                alias: None,
                parent: None,
            },
        ),
    }
}

/// Emits a reference for a sigil-prefixed scalar and returns the target id.
///
/// The reference covers the sigil and the optional marker, so the whole
/// `@?logger.factory` resolves.
fn service_reference(scalar: &YamlScalar, builder: &mut ExtractionBuilder, rule: &ServiceReferenceRule) -> Option<String> {
    let (target, offset) = rule.parse(&scalar.value)?;
    let target = target.to_string();
    // Offsets are only exact when the raw text equals the unescaped value.
    let raw = builder.source.get(scalar.span.start..scalar.span.end).unwrap_or("");
    let span = if raw == scalar.value {
        Span {
            start: scalar.span.start,
            end: scalar.span.start + offset + target.len(),
        }
    } else {
        scalar.span
    };
    builder.reference(SymbolKind::Service, target.clone(), span);
    Some(target)
}
