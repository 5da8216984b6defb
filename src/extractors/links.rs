//! `*.links.*.yml` extractor: menu, task, action and contextual links only
//! reference routes.

use crate::parsers::yaml::YamlValue;

use super::context::{Slot, classify_yaml_value};
use super::{ExtractionBuilder, FileKind};

pub(super) fn extract(document: &YamlValue, builder: &mut ExtractionBuilder) {
    let Some(entries) = document.as_mapping() else {
        return;
    };
    for entry in entries {
        let Some(fields) = entry.value.as_ref().and_then(YamlValue::as_mapping) else {
            continue;
        };
        for field in fields {
            let Some(Slot::Symbol(kind)) = classify_yaml_value(FileKind::Links, &field.key.value) else {
                continue;
            };
            let Some(value) = &field.value else {
                continue;
            };
            for scalar in value.scalars(false) {
                builder.reference(kind, scalar.value.clone(), scalar.span);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::extractors::{ExtractContext, FileKind, extract};
    use crate::ir::{HookCatalog, SymbolKind};
    use indoc::indoc;
    use tower_lsp::lsp_types::Url;

    #[test]
    fn test_link_route_references() {
        let text = indoc! {"
            mymod.settings_tab:
              title: Settings
              route_name: mymod.settings
              base_route: system.admin_config
            mymod.add_action:
              route_name: 'mymod.add'
              appears_on:
                - mymod.list
                - mymod.overview
        "};
        let config = EngineConfig::default();
        let hooks = HookCatalog::default();
        let ctx = ExtractContext { config: &config, hooks: &hooks };
        let uri = Url::parse("file:///mymod/mymod.links.task.yml").unwrap();
        let extraction = extract(FileKind::Links, &uri, text, &ctx).expect("extraction");

        assert!(extraction.declarations.is_empty());
        let refs: Vec<&str> = extraction.references.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(
            refs,
            vec!["mymod.settings", "system.admin_config", "mymod.add", "mymod.list", "mymod.overview"]
        );
        assert!(extraction.references.iter().all(|r| r.kind == SymbolKind::Route));
        // Quotes are not part of the reference.
        assert_eq!(extraction.references[2].range.start.character, 15);
    }
}
