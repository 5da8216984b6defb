//! Workspace-wide symbol index
//!
//! Declarations are keyed by `(kind, identifier)` in a `BTreeMap`, so exact
//! lookups and prefix scans for completion are both ordered range queries.
//! References and hook stubs are partitioned by file; a file
//! is always replaced as a whole, which keeps every file's entries equal to
//! one extraction result.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tower_lsp::lsp_types::{Position, Url};
use tracing::{debug, trace};

use crate::errors::IndexError;
use crate::extractors::Extraction;
use crate::ir::{Declaration, DeclarationSet, HookCatalog, HookSpec, Reference, SymbolKind};
use crate::parsers::position_utils::{position_le, range_contains};

/// Everything the index holds for one file.
#[derive(Debug, Default)]
struct FileEntry {
    revision: u64,
    declarations: Vec<Arc<Declaration>>,
    /// Sorted by start position, non-overlapping.
    references: Vec<Reference>,
    hook_specs: Vec<HookSpec>,
}

/// Result of a successful [`SymbolIndex::replace_file`] or
/// [`SymbolIndex::remove_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaceOutcome {
    /// The set of known hook names changed, so PHP files extracted against
    /// the previous catalog may be out of date.
    pub catalog_changed: bool,
}

/// Counts reported in logs after the workspace scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub files: usize,
    pub declarations: usize,
    pub references: usize,
    pub hooks: usize,
}

#[derive(Debug, Default)]
pub struct SymbolIndex {
    declarations: BTreeMap<(SymbolKind, String), Vec<Arc<Declaration>>>,
    files: FxHashMap<Url, FileEntry>,
    /// Last revision applied per file, kept after removal as a tombstone.
    revisions: FxHashMap<Url, u64>,
    hook_catalog: Arc<HookCatalog>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_revision(&self, uri: &Url, revision: u64) -> Result<(), IndexError> {
        match self.revisions.get(uri) {
            Some(&current) if revision < current => Err(IndexError::StaleVersionDiscarded {
                uri: uri.clone(),
                incoming: revision,
                current,
            }),
            _ => Ok(()),
        }
    }

    /// Replaces every entry attributed to `uri` with `extraction`.
    ///
    /// Results older than the revision already applied for `uri` are
    /// discarded. Re-applying the current revision is allowed, the workspace
    /// uses it to re-extract files against a new hook catalog.
    pub fn replace_file(&mut self, uri: &Url, revision: u64, extraction: Extraction) -> Result<ReplaceOutcome, IndexError> {
        self.check_revision(uri, revision)?;

        let previous = self.files.remove(uri);
        let previous_specs = previous.as_ref().map(|entry| entry.hook_specs.clone()).unwrap_or_default();
        if let Some(entry) = previous {
            self.detach(entry);
        }

        let Extraction {
            declarations,
            references,
            hook_specs,
        } = extraction;

        let declarations: Vec<Arc<Declaration>> = declarations.into_iter().map(Arc::new).collect();
        for declaration in &declarations {
            for key in declaration.index_keys() {
                let slot = self.declarations.entry((declaration.kind, key)).or_default();
                slot.push(declaration.clone());
                slot.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            }
        }

        let specs_changed = previous_specs != hook_specs;
        trace!(
            "Indexed {} at revision {}: {} declarations, {} references",
            uri,
            revision,
            declarations.len(),
            references.len()
        );
        self.files.insert(
            uri.clone(),
            FileEntry {
                revision,
                declarations,
                references,
                hook_specs,
            },
        );
        self.revisions.insert(uri.clone(), revision);

        let catalog_changed = specs_changed && self.rebuild_catalog();
        Ok(ReplaceOutcome { catalog_changed })
    }

    /// Drops every entry of a deleted file and records `revision` so that an
    /// older extraction still in flight cannot bring it back.
    pub fn remove_file(&mut self, uri: &Url, revision: u64) -> Result<ReplaceOutcome, IndexError> {
        self.check_revision(uri, revision)?;
        self.revisions.insert(uri.clone(), revision);
        let Some(entry) = self.files.remove(uri) else {
            return Ok(ReplaceOutcome::default());
        };
        let had_specs = !entry.hook_specs.is_empty();
        self.detach(entry);
        debug!("Removed {} from the index", uri);
        let catalog_changed = had_specs && self.rebuild_catalog();
        Ok(ReplaceOutcome { catalog_changed })
    }

    fn detach(&mut self, entry: FileEntry) {
        for declaration in &entry.declarations {
            for key in declaration.index_keys() {
                let map_key = (declaration.kind, key);
                if let Some(slot) = self.declarations.get_mut(&map_key) {
                    slot.retain(|existing| !Arc::ptr_eq(existing, declaration));
                    if slot.is_empty() {
                        self.declarations.remove(&map_key);
                    }
                }
            }
        }
    }

    /// Rebuilds the hook catalog and reports whether the set of names changed.
    fn rebuild_catalog(&mut self) -> bool {
        let before: BTreeSet<String> = self.hook_catalog.names().cloned().collect();
        let mut specs: Vec<HookSpec> = self.files.values().flat_map(|entry| entry.hook_specs.iter().cloned()).collect();
        // Deterministic winner when two API files document the same hook.
        specs.sort_by(|a, b| (a.uri.as_str(), &a.name).cmp(&(b.uri.as_str(), &b.name)));
        let catalog = HookCatalog::new(specs);
        let changed = catalog.names().ne(before.iter());
        self.hook_catalog = Arc::new(catalog);
        if changed {
            debug!("Hook catalog now has {} hooks", self.hook_catalog.len());
        }
        changed
    }

    /// Exact lookup; an unknown identifier is an empty set.
    pub fn lookup_declarations(&self, kind: SymbolKind, identifier: &str) -> DeclarationSet {
        match self.declarations.get(&(kind, identifier.to_string())) {
            Some(declarations) => DeclarationSet::from_sorted(kind, declarations.clone()),
            None => DeclarationSet::Empty,
        }
    }

    /// The reference of `uri` whose range contains `position`, end inclusive.
    pub fn lookup_reference_at(&self, uri: &Url, position: Position) -> Option<&Reference> {
        let references = &self.files.get(uri)?.references;
        // First reference that ends at or after the cursor.
        let index = references.partition_point(|reference| !position_le(position, reference.range.end));
        references
            .get(index)
            .filter(|reference| range_contains(&reference.range, position))
    }

    /// Known identifiers of `kind` starting with `prefix`, in lexical order.
    ///
    /// Hook completion also offers catalog names that have no implementation
    /// yet.
    pub fn completion_candidates(&self, kind: SymbolKind, prefix: &str) -> Vec<String> {
        let start = (kind, prefix.to_string());
        let mut candidates: BTreeSet<String> = self
            .declarations
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(|((k, identifier), _)| *k == kind && identifier.starts_with(prefix))
            .map(|((_, identifier), _)| identifier.clone())
            .collect();
        if kind == SymbolKind::Hook {
            candidates.extend(
                self.hook_catalog
                    .names()
                    .filter(|name| name.starts_with(prefix))
                    .cloned(),
            );
        }
        candidates.into_iter().collect()
    }

    /// Every declaration of `kind`, ordered by identifier.
    pub fn declarations_of(&self, kind: SymbolKind) -> impl Iterator<Item = &Arc<Declaration>> {
        let start = (kind, String::new());
        self.declarations
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(move |((k, _), _)| *k == kind)
            .filter_map(|(_, declarations)| declarations.first())
    }

    pub fn hook_catalog(&self) -> Arc<HookCatalog> {
        self.hook_catalog.clone()
    }

    /// Whether some indexed file declares the class `name`.
    pub fn has_class(&self, name: &str) -> bool {
        self.declarations
            .contains_key(&(SymbolKind::Class, name.trim_start_matches('\\').to_string()))
    }

    pub fn contains_file(&self, uri: &Url) -> bool {
        self.files.contains_key(uri)
    }

    /// Revision applied for `uri`, including tombstones of removed files.
    pub fn revision(&self, uri: &Url) -> Option<u64> {
        self.revisions.get(uri).copied()
    }

    pub fn file_revision(&self, uri: &Url) -> Option<u64> {
        self.files.get(uri).map(|entry| entry.revision)
    }

    pub fn references_in(&self, uri: &Url) -> &[Reference] {
        self.files.get(uri).map(|entry| entry.references.as_slice()).unwrap_or(&[])
    }

    pub fn declarations_in(&self, uri: &Url) -> &[Arc<Declaration>] {
        self.files.get(uri).map(|entry| entry.declarations.as_slice()).unwrap_or(&[])
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            files: self.files.len(),
            declarations: self.files.values().map(|entry| entry.declarations.len()).sum(),
            references: self.files.values().map(|entry| entry.references.len()).sum(),
            hooks: self.hook_catalog.len(),
        }
    }
}
