//! Symbol model shared by extractors, the index and the query handlers.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tower_lsp::lsp_types::{Location, Range, Url};

/// Plugin subtypes recognized from annotations and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PluginType {
    EntityType,
    QueueWorker,
    FieldType,
    DataType,
    FormElement,
    RenderElement,
}

impl PluginType {
    pub const ALL: [PluginType; 6] = [
        PluginType::EntityType,
        PluginType::QueueWorker,
        PluginType::FieldType,
        PluginType::DataType,
        PluginType::FormElement,
        PluginType::RenderElement,
    ];

    /// Maps an annotation or attribute name to a plugin subtype.
    pub fn from_annotation(name: &str) -> Option<Self> {
        match name {
            "EntityType" | "ContentEntityType" | "ConfigEntityType" => Some(PluginType::EntityType),
            "QueueWorker" => Some(PluginType::QueueWorker),
            "FieldType" => Some(PluginType::FieldType),
            "DataType" => Some(PluginType::DataType),
            "FormElement" => Some(PluginType::FormElement),
            "RenderElement" => Some(PluginType::RenderElement),
            _ => None,
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginType::EntityType => "EntityType",
            PluginType::QueueWorker => "QueueWorker",
            PluginType::FieldType => "FieldType",
            PluginType::DataType => "DataType",
            PluginType::FormElement => "FormElement",
            PluginType::RenderElement => "RenderElement",
        };
        write!(f, "{}", name)
    }
}

/// Closed set of framework symbol kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SymbolKind {
    Service,
    Route,
    Hook,
    Permission,
    Plugin(PluginType),
    /// A PHP class, interface, trait or enum, keyed by its fully-qualified name.
    Class,
    /// A PHP method, keyed as `Fully\Qualified\Class::method`.
    Method,
}

impl SymbolKind {
    /// Only hooks may have several declarations per identifier.
    pub fn allows_multiple(&self) -> bool {
        matches!(self, SymbolKind::Hook)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Service => write!(f, "Service"),
            SymbolKind::Route => write!(f, "Route"),
            SymbolKind::Hook => write!(f, "Hook"),
            SymbolKind::Permission => write!(f, "Permission"),
            SymbolKind::Plugin(plugin) => write!(f, "{} plugin", plugin),
            SymbolKind::Class => write!(f, "Class"),
            SymbolKind::Method => write!(f, "Method"),
        }
    }
}

/// Raw handler string of a route, e.g. `'\Drupal\foo\Controller\Page::build'`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteHandler {
    /// The defaults key that named the handler (`_controller`, `_form`, ...).
    pub key: String,
    pub raw: String,
    pub range: Range,
}

impl RouteHandler {
    /// Class part of the handler, without a leading backslash.
    pub fn class_name(&self) -> Option<&str> {
        let raw = self.raw.trim_start_matches('\\');
        let class = raw.split("::").next().unwrap_or(raw);
        if class.contains('\\') { Some(class) } else { None }
    }
}

/// Kind-specific data of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeclarationMetadata {
    Service {
        arguments: Vec<String>,
        /// Target of an alias entry.
        alias: Option<String>,
        parent: Option<String>,
    },
    Route {
        path: Option<String>,
        methods: Vec<String>,
        title: Option<String>,
        handler: Option<RouteHandler>,
        permission: Option<String>,
    },
    Hook {
        /// Module that implements the hook.
        module: String,
        /// Templated hook name the implementation matched, e.g. `form_FORM_ID_alter`.
        template: Option<String>,
        /// Name of the implementing function or method.
        function: String,
    },
    Permission {
        title: Option<String>,
        description: Option<String>,
        restrict_access: bool,
    },
    Plugin {
        label: Option<String>,
        usage_example: Option<String>,
    },
    Class {
        /// `class`, `interface`, `trait` or `enum`.
        keyword: String,
    },
    Method {
        /// Fully-qualified name of the declaring class.
        class: String,
        /// Parameter list without the parentheses.
        parameters: String,
        is_static: bool,
    },
}

/// The defining occurrence of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub kind: SymbolKind,
    pub identifier: String,
    pub display_class: Option<String>,
    pub uri: Url,
    /// Span of the identifier token.
    pub range: Range,
    pub metadata: DeclarationMetadata,
}

impl Declaration {
    pub fn location(&self) -> Location {
        Location::new(self.uri.clone(), self.range)
    }

    /// Keys under which this declaration is indexed.
    ///
    /// Hook implementations of templated hooks are also reachable through the
    /// template name, so `hook_form_FORM_ID_alter` lists every form alter.
    pub fn index_keys(&self) -> Vec<String> {
        let mut keys = vec![self.identifier.clone()];
        if let DeclarationMetadata::Hook { template: Some(template), .. } = &self.metadata {
            if template != &self.identifier {
                keys.push(template.clone());
            }
        }
        keys
    }

    /// Ordering used whenever several declarations are presented.
    pub fn sort_key(&self) -> (&str, u32, u32) {
        (self.uri.as_str(), self.range.start.line, self.range.start.character)
    }
}

/// An occurrence of a symbol identifier used, not declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub kind: SymbolKind,
    pub identifier: String,
    pub uri: Url,
    /// Span of the identifier text and any reference sigil, quotes excluded.
    pub range: Range,
}

/// One or many declarations for an identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeclarationSet {
    #[default]
    Empty,
    Unique(Arc<Declaration>),
    Multiple(Vec<Arc<Declaration>>),
}

impl DeclarationSet {
    /// Builds a set from declarations already ordered by [`Declaration::sort_key`].
    pub fn from_sorted(kind: SymbolKind, mut declarations: Vec<Arc<Declaration>>) -> Self {
        match declarations.len() {
            0 => DeclarationSet::Empty,
            1 => DeclarationSet::Unique(declarations.remove(0)),
            _ if !kind.allows_multiple() => DeclarationSet::Unique(declarations.remove(0)),
            _ => DeclarationSet::Multiple(declarations),
        }
    }

    pub fn as_slice(&self) -> &[Arc<Declaration>] {
        match self {
            DeclarationSet::Empty => &[],
            DeclarationSet::Unique(declaration) => std::slice::from_ref(declaration),
            DeclarationSet::Multiple(declarations) => declarations,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Declaration>> {
        self.as_slice().iter()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DeclarationSet::Empty)
    }

    /// Merges two sets, keeping the combined declarations sorted.
    pub fn merge(self, kind: SymbolKind, other: DeclarationSet) -> Self {
        let mut all: Vec<Arc<Declaration>> = self.as_slice().to_vec();
        all.extend(other.as_slice().iter().cloned());
        all.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        all.dedup_by(|a, b| Arc::ptr_eq(a, b));
        DeclarationSet::from_sorted(kind, all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Position;

    fn declaration(kind: SymbolKind, file: &str, line: u32) -> Arc<Declaration> {
        Arc::new(Declaration {
            kind,
            identifier: "x".to_string(),
            display_class: None,
            uri: Url::parse(&format!("file:///{}", file)).unwrap(),
            range: Range::new(Position::new(line, 0), Position::new(line, 1)),
            metadata: DeclarationMetadata::Permission {
                title: None,
                description: None,
                restrict_access: false,
            },
        })
    }

    #[test]
    fn test_non_hook_duplicates_collapse_to_first() {
        let set = DeclarationSet::from_sorted(
            SymbolKind::Service,
            vec![declaration(SymbolKind::Service, "a", 1), declaration(SymbolKind::Service, "b", 1)],
        );
        assert!(matches!(set, DeclarationSet::Unique(ref d) if d.uri.path() == "/a"));
    }

    #[test]
    fn test_hooks_keep_every_declaration() {
        let set = DeclarationSet::from_sorted(
            SymbolKind::Hook,
            vec![declaration(SymbolKind::Hook, "a", 1), declaration(SymbolKind::Hook, "b", 1)],
        );
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_merge_sorts_and_dedups() {
        let a = declaration(SymbolKind::Hook, "a", 3);
        let b = declaration(SymbolKind::Hook, "a", 1);
        let merged = DeclarationSet::Unique(a.clone())
            .merge(SymbolKind::Hook, DeclarationSet::Multiple(vec![a.clone(), b.clone()]));
        let lines: Vec<u32> = merged.iter().map(|d| d.range.start.line).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_route_handler_class() {
        let handler = RouteHandler {
            key: "_controller".into(),
            raw: "\\Drupal\\foo\\Controller\\Page::build".into(),
            range: Range::default(),
        };
        assert_eq!(handler.class_name(), Some("Drupal\\foo\\Controller\\Page"));
        let service_handler = RouteHandler {
            key: "_controller".into(),
            raw: "foo.controller:build".into(),
            range: Range::default(),
        };
        assert_eq!(service_handler.class_name(), None);
    }

    #[test]
    fn test_plugin_annotation_names() {
        assert_eq!(PluginType::from_annotation("ContentEntityType"), Some(PluginType::EntityType));
        assert_eq!(PluginType::from_annotation("Block"), None);
    }
}
