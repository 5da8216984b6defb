//! Symbol extractors
//!
//! Extraction is a pure function from `(file kind, text, context)` to the
//! declarations, references and hook stubs found in one file. There is no I/O and no shared mutable state, so the workspace scan
//! runs extractors on a rayon pool.
//!
//! - [`services`], [`routes`], [`permissions`], [`links`] walk YAML files.
//! - [`php`] walks PHP files and delegates to [`hooks`] and [`plugins`].
//! - [`context`] is the grammar that decides which symbol kind a string
//!   literal names; completion uses the same grammar.
//! - [`callables`] turns class names and `Class::method` strings into
//!   references.

pub mod callables;
pub mod context;
pub mod hooks;
pub mod links;
pub mod permissions;
pub mod php;
pub mod plugins;
pub mod routes;
pub mod services;

use std::path::Path;

use serde::Serialize;
use tower_lsp::lsp_types::Url;
use tracing::debug;

use crate::config::EngineConfig;
use crate::errors::{ParseFailure, SourceLanguage};
use crate::ir::{Declaration, DeclarationMetadata, HookCatalog, HookSpec, Reference, SymbolKind};
use crate::parsers::position_utils::{LineIndex, position_le};
use crate::parsers::yaml::{Span, lower_documents};
use crate::parsers::{failure_from_tree, parse_php, parse_yaml};

/// File kinds recognized by name pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileKind {
    /// `*.services.yml`
    Services,
    /// `*.routing.yml`
    Routing,
    /// `*.permissions.yml`
    Permissions,
    /// `*.links.{menu,task,action,contextual}.yml`
    Links,
    /// `*.api.php`, documentation of hooks.
    HookApi,
    /// Any other PHP source file.
    Php,
}

const PHP_EXTENSIONS: &[&str] = &["php", "module", "install", "theme", "inc", "profile", "engine"];

impl FileKind {
    /// Classifies a file by its name.
    pub fn classify(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        Self::classify_name(name)
    }

    pub fn from_uri(uri: &Url) -> Option<Self> {
        let name = uri.path_segments()?.next_back()?;
        Self::classify_name(name)
    }

    fn classify_name(name: &str) -> Option<Self> {
        if name.ends_with(".services.yml") {
            return Some(FileKind::Services);
        }
        if name.ends_with(".routing.yml") {
            return Some(FileKind::Routing);
        }
        if name.ends_with(".permissions.yml") {
            return Some(FileKind::Permissions);
        }
        if [".links.menu.yml", ".links.task.yml", ".links.action.yml", ".links.contextual.yml"]
            .iter()
            .any(|suffix| name.ends_with(suffix))
        {
            return Some(FileKind::Links);
        }
        if name.ends_with(".api.php") {
            return Some(FileKind::HookApi);
        }
        let extension = name.rsplit_once('.').map(|(_, ext)| ext)?;
        if PHP_EXTENSIONS.contains(&extension) {
            return Some(FileKind::Php);
        }
        None
    }

    pub fn language(&self) -> SourceLanguage {
        match self {
            FileKind::Services | FileKind::Routing | FileKind::Permissions | FileKind::Links => {
                SourceLanguage::Yaml
            }
            FileKind::HookApi | FileKind::Php => SourceLanguage::Php,
        }
    }

    pub fn is_php(&self) -> bool {
        self.language() == SourceLanguage::Php
    }
}

/// Module that owns a file: the stem of `mymod.module`, or the directory
/// above `src/` for class files.
pub fn module_name(uri: &Url) -> Option<String> {
    let segments: Vec<&str> = uri.path_segments()?.collect();
    let file = *segments.last()?;
    if file.ends_with(".php") && !file.ends_with(".api.php") {
        if let Some(src) = segments.iter().rposition(|segment| *segment == "src") {
            if src > 0 {
                return Some(segments[src - 1].to_string());
            }
        }
    }
    file.split('.').next().filter(|stem| !stem.is_empty()).map(str::to_string)
}

/// Read-only inputs an extractor may consult.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub config: &'a EngineConfig,
    pub hooks: &'a HookCatalog,
}

/// Everything extracted from one version of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub declarations: Vec<Declaration>,
    /// Sorted by start position; ranges never overlap.
    pub references: Vec<Reference>,
    pub hook_specs: Vec<HookSpec>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
            && self.references.is_empty()
            && self.hook_specs.is_empty()
    }
}

/// Accumulates extractor output for one file and converts byte spans to
/// LSP ranges.
pub struct ExtractionBuilder<'a> {
    pub uri: &'a Url,
    pub source: &'a str,
    pub lines: LineIndex,
    out: Extraction,
}

impl<'a> ExtractionBuilder<'a> {
    pub fn new(uri: &'a Url, source: &'a str) -> Self {
        Self {
            uri,
            source,
            lines: LineIndex::new(source),
            out: Extraction::default(),
        }
    }

    pub fn declare(
        &mut self,
        kind: SymbolKind,
        identifier: impl Into<String>,
        display_class: Option<String>,
        span: Span,
        metadata: DeclarationMetadata,
    ) {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return;
        }
        self.out.declarations.push(Declaration {
            kind,
            identifier,
            display_class,
            uri: self.uri.clone(),
            range: self.lines.range_of(span.start, span.end),
            metadata,
        });
    }

    pub fn reference(&mut self, kind: SymbolKind, identifier: impl Into<String>, span: Span) {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return;
        }
        self.out.references.push(Reference {
            kind,
            identifier,
            uri: self.uri.clone(),
            range: self.lines.range_of(span.start, span.end),
        });
    }

    pub fn hook_spec(&mut self, spec: HookSpec) {
        self.out.hook_specs.push(spec);
    }

    /// Orders the output and drops references that overlap an earlier one.
    pub fn finish(self) -> Extraction {
        let mut out = self.out;
        out.declarations.sort_by(|a, b| {
            (a.range.start.line, a.range.start.character, &a.identifier)
                .cmp(&(b.range.start.line, b.range.start.character, &b.identifier))
        });
        out.references.sort_by(|a, b| {
            (a.range.start.line, a.range.start.character, a.range.end.line, a.range.end.character)
                .cmp(&(b.range.start.line, b.range.start.character, b.range.end.line, b.range.end.character))
        });
        let mut kept: Vec<Reference> = Vec::with_capacity(out.references.len());
        for reference in out.references {
            let overlaps = kept
                .last()
                .is_some_and(|previous| position_le(reference.range.start, previous.range.end));
            if overlaps {
                debug!(
                    "Dropping overlapping reference {} at {:?} in {}",
                    reference.identifier, reference.range, reference.uri
                );
                continue;
            }
            kept.push(reference);
        }
        out.references = kept;
        out.hook_specs.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

/// Runs the extractors for `kind` over `text`.
///
/// YAML files with syntax errors and PHP files without a usable tree are a
/// [`ParseFailure`]. Error-recovery regions inside an otherwise valid PHP
/// tree are skipped.
pub fn extract(kind: FileKind, uri: &Url, text: &str, ctx: &ExtractContext) -> Result<Extraction, ParseFailure> {
    let mut builder = ExtractionBuilder::new(uri, text);
    match kind.language() {
        SourceLanguage::Yaml => {
            let tree = parse_yaml(text).ok_or_else(|| whole_file_failure(SourceLanguage::Yaml, &builder))?;
            if tree.root_node().has_error() {
                return Err(failure_from_tree(SourceLanguage::Yaml, &tree, &builder.lines));
            }
            for document in lower_documents(&tree, text) {
                match kind {
                    FileKind::Services => services::extract(&document, &mut builder, &ctx.config.service_reference),
                    FileKind::Routing => routes::extract(&document, &mut builder),
                    FileKind::Permissions => permissions::extract(&document, &mut builder),
                    FileKind::Links => links::extract(&document, &mut builder),
                    FileKind::HookApi | FileKind::Php => {}
                }
            }
        }
        SourceLanguage::Php => {
            let tree = parse_php(text).ok_or_else(|| whole_file_failure(SourceLanguage::Php, &builder))?;
            let root = tree.root_node();
            if root.is_error() {
                return Err(failure_from_tree(SourceLanguage::Php, &tree, &builder.lines));
            }
            php::extract(kind, root, &mut builder, ctx);
        }
    }
    Ok(builder.finish())
}

fn whole_file_failure(language: SourceLanguage, builder: &ExtractionBuilder) -> ParseFailure {
    ParseFailure::new(
        language,
        builder.lines.range_of(0, builder.source.len()),
        "parser produced no syntax tree",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn uri(path: &str) -> Url {
        Url::parse(&format!("file:///var/www/web/modules/custom{}", path)).unwrap()
    }

    #[test]
    fn test_classify_file_kinds() {
        let cases = [
            ("mymod.services.yml", Some(FileKind::Services)),
            ("mymod.routing.yml", Some(FileKind::Routing)),
            ("mymod.permissions.yml", Some(FileKind::Permissions)),
            ("mymod.links.menu.yml", Some(FileKind::Links)),
            ("mymod.links.task.yml", Some(FileKind::Links)),
            ("mymod.api.php", Some(FileKind::HookApi)),
            ("mymod.module", Some(FileKind::Php)),
            ("mymod.install", Some(FileKind::Php)),
            ("Worker.php", Some(FileKind::Php)),
            ("mymod.info.yml", None),
            ("README.md", None),
        ];
        for (name, expected) in cases {
            assert_eq!(FileKind::classify(Path::new(name)), expected, "{}", name);
        }
    }

    #[test]
    fn test_module_name() {
        assert_eq!(module_name(&uri("/mymod/mymod.module")).as_deref(), Some("mymod"));
        assert_eq!(
            module_name(&uri("/mymod/src/Hook/MymodHooks.php")).as_deref(),
            Some("mymod")
        );
        assert_eq!(module_name(&uri("/mymod/mymod.api.php")).as_deref(), Some("mymod"));
    }

    #[test]
    fn test_yaml_parse_failure_keeps_nothing() {
        let config = EngineConfig::default();
        let hooks = HookCatalog::default();
        let ctx = ExtractContext { config: &config, hooks: &hooks };
        let text = "services:\n  foo:\n    class: [broken\n";
        let result = extract(FileKind::Services, &uri("/mymod/mymod.services.yml"), text, &ctx);
        assert!(result.is_err());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let config = EngineConfig::default();
        let hooks = HookCatalog::default();
        let ctx = ExtractContext { config: &config, hooks: &hooks };
        let text = indoc! {"
            services:
              mymod.a:
                class: Drupal\\mymod\\A
                arguments: ['@mymod.b', '@?logger.factory']
              mymod.b:
                class: Drupal\\mymod\\B
        "};
        let file = uri("/mymod/mymod.services.yml");
        let first = extract(FileKind::Services, &file, text, &ctx).unwrap();
        let second = extract(FileKind::Services, &file, text, &ctx).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.declarations.len(), 2);
        // Two service arguments and the two classes.
        assert_eq!(first.references.len(), 4);
    }
}
