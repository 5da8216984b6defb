//! Intermediate representation of indexed symbols
//!
//! Extractors produce these values, the symbol index stores them and the
//! query handlers render them. Nothing here depends on tree-sitter.

pub mod hooks;
pub mod symbol;

pub use hooks::{HookCatalog, HookMatch, HookSpec, replace_placeholders};
pub use symbol::{
    Declaration, DeclarationMetadata, DeclarationSet, PluginType, Reference, RouteHandler, SymbolKind,
};
