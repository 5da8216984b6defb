//! Hook stubs and the catalog of known hook names.
//!
//! API files (`*.api.php`) document every hook as `function hook_NAME()`.
//! Names with upper-case placeholder segments, such as
//! `hook_form_FORM_ID_alter`, are matched as templates.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tower_lsp::lsp_types::{Range, Url};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z][A-Z0-9_]*[A-Z0-9]").expect("valid regex"));

/// A `hook_*` function documented in an API file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookSpec {
    /// Hook name without the `hook_` prefix.
    pub name: String,
    pub parameters: String,
    pub summary: Option<String>,
    pub uri: Url,
    pub range: Range,
}

impl HookSpec {
    pub fn is_template(&self) -> bool {
        is_template(&self.name)
    }
}

/// True when a hook name contains upper-case placeholder segments.
pub fn is_template(name: &str) -> bool {
    PLACEHOLDER.is_match(name)
}

/// Replaces each placeholder segment with `replacement(segment)`.
pub fn replace_placeholders(name: &str, mut replacement: impl FnMut(&str) -> String) -> String {
    PLACEHOLDER
        .replace_all(name, |caps: &regex::Captures| replacement(&caps[0]))
        .into_owned()
}

#[derive(Debug, Clone)]
struct HookTemplate {
    name: String,
    pattern: Regex,
}

/// Result of matching a function-name suffix against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookMatch {
    pub hook: String,
    pub template: Option<String>,
}

/// Every hook name known from API files.
#[derive(Debug, Clone, Default)]
pub struct HookCatalog {
    specs: BTreeMap<String, HookSpec>,
    templates: Vec<HookTemplate>,
}

impl HookCatalog {
    pub fn new(specs: impl IntoIterator<Item = HookSpec>) -> Self {
        let mut by_name = BTreeMap::new();
        for spec in specs {
            by_name.entry(spec.name.clone()).or_insert(spec);
        }
        let templates = by_name
            .keys()
            .filter(|name| is_template(name))
            .filter_map(|name| {
                let mut pattern = String::from("^");
                let mut last = 0;
                for m in PLACEHOLDER.find_iter(name) {
                    pattern.push_str(&regex::escape(&name[last..m.start()]));
                    pattern.push_str("[a-z0-9_]+");
                    last = m.end();
                }
                pattern.push_str(&regex::escape(&name[last..]));
                pattern.push('$');
                Regex::new(&pattern).ok().map(|pattern| HookTemplate {
                    name: name.clone(),
                    pattern,
                })
            })
            .collect();
        Self { specs: by_name, templates }
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn get(&self, name: &str) -> Option<&HookSpec> {
        self.specs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.specs.keys()
    }

    pub fn specs(&self) -> impl Iterator<Item = &HookSpec> {
        self.specs.values()
    }

    /// Matches a concrete hook name, exact names first, then templates.
    pub fn match_hook(&self, candidate: &str) -> Option<HookMatch> {
        if candidate.is_empty() {
            return None;
        }
        if self.specs.contains_key(candidate) && !is_template(candidate) {
            return Some(HookMatch {
                hook: candidate.to_string(),
                template: None,
            });
        }
        self.templates
            .iter()
            .find(|template| template.pattern.is_match(candidate))
            .map(|template| HookMatch {
                hook: candidate.to_string(),
                template: Some(template.name.clone()),
            })
    }

    /// Spec for a concrete or templated hook name.
    pub fn spec_for(&self, hook: &str) -> Option<&HookSpec> {
        self.get(hook).or_else(|| {
            self.match_hook(hook)
                .and_then(|m| m.template)
                .and_then(|template| self.specs.get(&template))
        })
    }
}
