//! Context grammar for string-literal references
//!
//! A string literal names a framework symbol only in certain syntactic
//! positions: the first argument of `hasPermission()`, the `_permission`
//! requirement of a route, an `@`-prefixed service argument. This module is
//! the single table of those positions. Extractors use it to emit
//! references and completion uses it to decide what to offer at the cursor.

use crate::extractors::FileKind;
use crate::ir::{PluginType, SymbolKind};

/// What a literal in a classified position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The literal is the identifier of a symbol of this kind.
    Symbol(SymbolKind),
    /// A hook type passed to `alter()`; the hook is `<type>_alter`.
    AlterHook,
    /// A permission list separated by `+` (all) or `,` (any).
    PermissionList,
}

impl Slot {
    /// Kind whose identifiers complete this slot.
    pub fn completion_kind(&self) -> SymbolKind {
        match self {
            Slot::Symbol(kind) => *kind,
            Slot::AlterHook => SymbolKind::Hook,
            Slot::PermissionList => SymbolKind::Permission,
        }
    }
}

/// Syntactic position of a string argument in a PHP call.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    /// Bare function or method name.
    pub callee: &'a str,
    /// Object or class expression for method and static calls.
    pub receiver: Option<&'a str>,
    /// Zero-based argument position.
    pub argument: usize,
}

fn receiver_contains(site: &CallSite, needles: &[&str]) -> bool {
    site.receiver
        .map(|receiver| {
            let lower = receiver.to_ascii_lowercase();
            needles.iter().any(|needle| lower.contains(&needle.to_ascii_lowercase()))
        })
        .unwrap_or(false)
}

fn is_container(site: &CallSite) -> bool {
    site.receiver
        .map(|receiver| {
            let receiver = receiver.trim().to_ascii_lowercase();
            receiver.ends_with("container") || receiver.ends_with("getcontainer()")
        })
        .unwrap_or(false)
}

/// Classifies a string argument of a PHP call.
pub fn classify_call(site: &CallSite) -> Option<Slot> {
    use SymbolKind::*;
    let slot = match (site.callee, site.argument) {
        // Services.
        ("service", 0) => Slot::Symbol(Service),
        ("get" | "has", 0) if is_container(site) => Slot::Symbol(Service),

        // Routes.
        ("fromRoute" | "setRedirect" | "redirect", 0) => Slot::Symbol(Route),
        ("createFromRoute", 1) => Slot::Symbol(Route),
        ("setRouteName", 0) if receiver_contains(site, &["url"]) => Slot::Symbol(Route),

        // Permissions.
        ("hasPermission" | "checkPermission", 0) => Slot::Symbol(Permission),
        ("allowedIfHasPermission", 1) => Slot::Symbol(Permission),
        ("allowedIfHasPermissions", 1) => Slot::Symbol(Permission),

        // Hooks.
        ("invokeAll" | "invokeAllWith" | "hasImplementations" | "invokeAllDeprecated", 0) => Slot::Symbol(Hook),
        ("invoke" | "invokeDeprecated", 1) if receiver_contains(site, &["modulehandler", "module_handler"]) => {
            Slot::Symbol(Hook)
        }
        ("alter" | "alterDeprecated", 0)
            if receiver_contains(site, &["modulehandler", "module_handler", "thememanager", "theme.manager"]) =>
        {
            Slot::AlterHook
        }

        // Plugins.
        (
            "getStorage" | "getDefinition" | "hasDefinition" | "getAccessControlHandler" | "getViewBuilder"
            | "getListBuilder" | "getHandler",
            0,
        ) if receiver_contains(site, &["entityTypeManager", "entity_type.manager"]) => {
            Slot::Symbol(Plugin(PluginType::EntityType))
        }
        ("get", 0) if receiver_contains(site, &["queueFactory", "queue_factory"]) => {
            Slot::Symbol(Plugin(PluginType::QueueWorker))
        }
        ("createInstance", 0) if receiver_contains(site, &["queueWorkerManager", "queue_worker"]) => {
            Slot::Symbol(Plugin(PluginType::QueueWorker))
        }
        ("queue", 0) => Slot::Symbol(Plugin(PluginType::QueueWorker)),
        ("create", 0) if receiver_contains(site, &["BaseFieldDefinition"]) => {
            Slot::Symbol(Plugin(PluginType::FieldType))
        }
        ("create" | "createFromDataType", 0) if receiver_contains(site, &["DataDefinition"]) => {
            Slot::Symbol(Plugin(PluginType::DataType))
        }
        ("getInfo" | "getInfoProperty", 0) if receiver_contains(site, &["elementInfo", "element_info"]) => {
            Slot::Symbol(Plugin(PluginType::RenderElement))
        }
        _ => return None,
    };
    Some(slot)
}

/// Classifies the string key of a render array element, `'#type' => 'x'`.
pub fn classify_array_key(key: &str) -> Option<Slot> {
    match key {
        "#type" => Some(Slot::Symbol(SymbolKind::Plugin(PluginType::RenderElement))),
        _ => None,
    }
}

/// Classifies a YAML scalar by file kind and the key it is the value of.
///
/// Service references in `*.services.yml` are recognized by their sigil, see
/// [`crate::config::ServiceReferenceRule`], not by key.
pub fn classify_yaml_value(kind: FileKind, key: &str) -> Option<Slot> {
    match (kind, key) {
        (FileKind::Routing, "_permission") => Some(Slot::PermissionList),
        (FileKind::Links, "route_name" | "base_route" | "appears_on") => Some(Slot::Symbol(SymbolKind::Route)),
        _ => None,
    }
}

/// Splits a `_permission` requirement into permission names and their byte
/// offsets in the original value.
pub fn split_permission_list(value: &str) -> Vec<(&str, usize)> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (index, c) in value.char_indices().chain(std::iter::once((value.len(), ','))) {
        if c == '+' || c == ',' {
            let part = &value[start..index];
            let trimmed = part.trim_start();
            let offset = start + (part.len() - trimmed.len());
            let trimmed = trimmed.trim_end();
            if !trimmed.is_empty() {
                parts.push((trimmed, offset));
            }
            start = index + c.len_utf8();
        }
    }
    parts
}
