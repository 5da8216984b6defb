//! Class and method references from PHP callable strings.
//!
//! Routes name their handlers as `'\Drupal\mymod\Controller\Page::build'`,
//! service definitions name a class, and render arrays pass callbacks such as
//! `'\Drupal\mymod\Element\Date::preRender'`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::SymbolKind;
use crate::parsers::yaml::Span;

use super::ExtractionBuilder;

static CALLABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\\?(?P<class>[A-Za-z_][A-Za-z0-9_]*(?:\\[A-Za-z_][A-Za-z0-9_]*)+)(?:::(?P<method>[A-Za-z_][A-Za-z0-9_]*))?$",
    )
    .expect("valid regex")
});

/// What a callable string points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableTarget {
    pub kind: SymbolKind,
    /// Class name without a leading backslash, with `::method` for methods.
    pub identifier: String,
    /// Byte offset of the leading backslash or the first name character.
    pub offset: usize,
}

/// Parses a namespaced class name or a `Class::method` string.
///
/// Single-segment names are not accepted: in a YAML value or a PHP string
/// they are far more often plain words than global classes.
pub fn parse(value: &str) -> Option<CallableTarget> {
    let captures = CALLABLE.captures(value.trim())?;
    let class = captures.name("class")?.as_str();
    let offset = value.len() - value.trim_start().len();
    let (kind, identifier) = match captures.name("method") {
        Some(method) => (SymbolKind::Method, format!("{}::{}", class, method.as_str())),
        None => (SymbolKind::Class, class.to_string()),
    };
    Some(CallableTarget {
        kind,
        identifier,
        offset,
    })
}

/// Emits the class or method reference of `value`, a string whose content
/// spans `span` in the source.
///
/// With `methods_only`, bare class names are ignored.
pub(super) fn reference(builder: &mut ExtractionBuilder, value: &str, span: Span, methods_only: bool) {
    let Some(target) = parse(value) else {
        return;
    };
    if methods_only && target.kind != SymbolKind::Method {
        return;
    }
    // Offsets are only exact when the raw text equals the unescaped value.
    let exact = builder.source.get(span.start..span.end) == Some(value);
    let span = if exact {
        let trimmed = value.trim_end();
        Span {
            start: span.start + target.offset,
            end: span.start + trimmed.len(),
        }
    } else {
        span
    };
    builder.reference(target.kind, target.identifier, span);
}
