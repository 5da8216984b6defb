//! The indexing and query engine
//!
//! [`DrupalEngine`] owns the document store and the symbol index and is the
//! only component that mutates either. The protocol layer forwards document
//! events to it and awaits its query entry points.
//!
//! # Ordering
//!
//! ```text
//! on_file_opened_or_changed(uri, version, text)
//!       ├─→ drop the update if a higher editor version is stored
//!       ├─→ take a fresh revision and store the snapshot (one entry lock)
//!       ├─→ skip if a newer snapshot arrived meanwhile
//!       ├─→ extract outside of any lock
//!       └─→ replace_file under the index write lock (older revisions lose)
//! ```
//!
//! Queries wait on the scan barrier and then read the index under its read
//! lock, so they see either the old or the new entries of a file.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use rayon::prelude::*;
use tokio::sync::watch;
use tower_lsp::lsp_types::{CodeActionOrCommand, CompletionResponse, GotoDefinitionResponse, Hover, Position, Url};
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::errors::ParseFailure;
use crate::extractors::{ExtractContext, FileKind, extract};
use crate::lsp::features::{code_action, completion, goto_definition, hover};
use crate::lsp::resolver::{self, ResolvedSymbol};
use crate::lsp::symbol_index::{IndexStats, SymbolIndex};

/// One version of one tracked file.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub uri: Url,
    pub kind: FileKind,
    /// Client version, 0 for files read from disk.
    pub version: i32,
    /// Engine-wide ordering of document updates.
    pub revision: u64,
    pub text: Arc<str>,
}

/// What happened to a document update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Indexed { catalog_changed: bool },
    /// The text could not be parsed; the previous index entries stay.
    Failed(ParseFailure),
    /// A newer update for the same file won.
    Superseded,
    /// Not a file kind the engine indexes.
    Ignored,
}

pub struct DrupalEngine {
    config: EngineConfig,
    documents: DashMap<Url, Arc<DocumentSnapshot>>,
    index: RwLock<SymbolIndex>,
    revision: AtomicU64,
    ready: watch::Sender<bool>,
}

impl std::fmt::Debug for DrupalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrupalEngine")
            .field("documents", &self.documents.len())
            .field("revision", &self.revision.load(Ordering::Relaxed))
            .field("ready", &*self.ready.borrow())
            .finish()
    }
}

impl Default for DrupalEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl DrupalEngine {
    pub fn new(config: EngineConfig) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            config,
            documents: DashMap::new(),
            index: RwLock::new(SymbolIndex::new()),
            revision: AtomicU64::new(0),
            ready,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Stores `text` as the current version of `uri` unless `keep_current`
    /// says the stored snapshot wins.
    ///
    /// The revision is taken while the entry is locked, so revision order and
    /// store order agree for every file.
    fn store(
        &self,
        uri: &Url,
        kind: FileKind,
        version: i32,
        text: Arc<str>,
        keep_current: impl Fn(&DocumentSnapshot) -> bool,
    ) -> Option<Arc<DocumentSnapshot>> {
        let build = |revision| {
            Arc::new(DocumentSnapshot {
                uri: uri.clone(),
                kind,
                version,
                revision,
                text: text.clone(),
            })
        };
        match self.documents.entry(uri.clone()) {
            Entry::Occupied(occupied) if keep_current(occupied.get()) => None,
            Entry::Occupied(mut occupied) => {
                let snapshot = build(self.next_revision());
                occupied.insert(snapshot.clone());
                Some(snapshot)
            }
            Entry::Vacant(vacant) => {
                let snapshot = build(self.next_revision());
                vacant.insert(snapshot.clone());
                Some(snapshot)
            }
        }
    }

    /// Stores a new editor version of a file and re-indexes it before
    /// returning.
    ///
    /// An update older than the stored editor version is dropped, so versions
    /// that race each other end with the highest one indexed.
    pub fn on_file_opened_or_changed(&self, uri: &Url, version: i32, text: impl Into<Arc<str>>) -> UpdateOutcome {
        let Some(kind) = FileKind::from_uri(uri) else {
            trace!("Ignoring unrecognized file {}", uri);
            return UpdateOutcome::Ignored;
        };
        match self.store(uri, kind, version, text.into(), |current| current.version > version) {
            Some(snapshot) => self.index_snapshot(&snapshot),
            None => {
                trace!("Dropping version {} of {}, a newer version is stored", version, uri);
                UpdateOutcome::Superseded
            }
        }
    }

    /// Hands a document the editor closed back to its saved contents.
    pub fn on_file_closed(&self, uri: &Url, text: String) -> UpdateOutcome {
        let Some(kind) = FileKind::from_uri(uri) else {
            return UpdateOutcome::Ignored;
        };
        match self.store(uri, kind, 0, text.into(), |_| false) {
            Some(snapshot) => self.index_snapshot(&snapshot),
            None => UpdateOutcome::Superseded,
        }
    }

    /// Tracks a file read from disk unless a version of it is already known.
    ///
    /// Used by the workspace scan so that it never overwrites a document the
    /// editor opened in the meantime.
    pub fn load_from_disk(&self, uri: &Url, text: String) -> UpdateOutcome {
        let Some(kind) = FileKind::from_uri(uri) else {
            return UpdateOutcome::Ignored;
        };
        match self.store(uri, kind, 0, text.into(), |_| true) {
            Some(snapshot) => self.index_snapshot(&snapshot),
            None => UpdateOutcome::Superseded,
        }
    }

    /// Replaces a disk-loaded version of a file with newer disk contents.
    ///
    /// Documents that carry an editor version are left alone; the editor's
    /// text stays authoritative until the document is closed.
    pub fn reload_from_disk(&self, uri: &Url, text: String) -> UpdateOutcome {
        let Some(kind) = FileKind::from_uri(uri) else {
            return UpdateOutcome::Ignored;
        };
        match self.store(uri, kind, 0, text.into(), |current| current.version != 0) {
            Some(snapshot) => self.index_snapshot(&snapshot),
            None => UpdateOutcome::Superseded,
        }
    }

    /// Forgets a deleted file and everything it declared or referenced.
    pub fn on_file_deleted(&self, uri: &Url) {
        let revision = match self.documents.entry(uri.clone()) {
            Entry::Occupied(occupied) => {
                let revision = self.next_revision();
                occupied.remove();
                revision
            }
            Entry::Vacant(_) => self.next_revision(),
        };
        let outcome = self.index.write().remove_file(uri, revision);
        match outcome {
            Ok(outcome) if outcome.catalog_changed => self.reextract_php_documents(),
            Ok(_) => {}
            Err(e) => trace!("{}", e),
        }
    }

    fn is_current(&self, snapshot: &DocumentSnapshot) -> bool {
        self.documents
            .get(&snapshot.uri)
            .is_some_and(|current| current.revision == snapshot.revision)
    }

    fn index_snapshot(&self, snapshot: &DocumentSnapshot) -> UpdateOutcome {
        loop {
            if !self.is_current(snapshot) {
                trace!("Skipping superseded revision {} of {}", snapshot.revision, snapshot.uri);
                return UpdateOutcome::Superseded;
            }
            let catalog = self.index.read().hook_catalog();
            let ctx = ExtractContext {
                config: &self.config,
                hooks: &catalog,
            };
            let extraction = match extract(snapshot.kind, &snapshot.uri, &snapshot.text, &ctx) {
                Ok(extraction) => extraction,
                Err(failure) => {
                    warn!("Failed to index {}: {}", snapshot.uri, failure);
                    return UpdateOutcome::Failed(failure);
                }
            };

            let mut index = self.index.write();
            // Hook matching depends on the catalog; extract again if it moved.
            if snapshot.kind == FileKind::Php && !Arc::ptr_eq(&catalog, &index.hook_catalog()) {
                drop(index);
                continue;
            }
            let result = index.replace_file(&snapshot.uri, snapshot.revision, extraction);
            drop(index);
            return match result {
                Ok(outcome) => {
                    if outcome.catalog_changed {
                        self.reextract_php_documents();
                    }
                    UpdateOutcome::Indexed {
                        catalog_changed: outcome.catalog_changed,
                    }
                }
                Err(e) => {
                    trace!("{}", e);
                    UpdateOutcome::Superseded
                }
            };
        }
    }

    /// Re-runs extraction for every PHP document against the current catalog.
    fn reextract_php_documents(&self) {
        let snapshots: Vec<Arc<DocumentSnapshot>> = self
            .documents
            .iter()
            .filter(|entry| entry.kind == FileKind::Php)
            .map(|entry| entry.value().clone())
            .collect();
        if snapshots.is_empty() {
            return;
        }
        debug!("Hook catalog changed, re-indexing {} PHP files", snapshots.len());
        snapshots.par_iter().for_each(|snapshot| {
            self.index_snapshot(snapshot);
        });
    }

    pub fn document(&self, uri: &Url) -> Option<Arc<DocumentSnapshot>> {
        self.documents.get(uri).map(|entry| entry.value().clone())
    }

    pub fn is_tracked(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    /// Read access to the index for callers that need more than the query
    /// entry points. Never hold the guard across an `.await`.
    pub fn index(&self) -> parking_lot::RwLockReadGuard<'_, SymbolIndex> {
        self.index.read()
    }

    pub fn stats(&self) -> IndexStats {
        self.index.read().stats()
    }

    /// Opens the query barrier; called once the workspace scan finishes.
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Waits, without timeout, until the workspace scan has finished.
    pub async fn wait_until_ready(&self) {
        let mut ready = self.ready.subscribe();
        // The sender lives as long as the engine, so this only errs on drop.
        let _ = ready.wait_for(|ready| *ready).await;
    }

    /// Resolves the reference at `position` without waiting for the scan.
    pub fn resolve(&self, uri: &Url, position: Position) -> Option<ResolvedSymbol> {
        if !self.is_tracked(uri) {
            return None;
        }
        resolver::resolve(&self.index.read(), uri, position)
    }

    /// Hover for the reference under the cursor, or for the declaration
    /// there when the cursor is on a defining occurrence.
    pub async fn hover(&self, uri: &Url, position: Position) -> Option<Hover> {
        self.wait_until_ready().await;
        if !self.is_tracked(uri) {
            return None;
        }
        let index = self.index.read();
        match resolver::resolve(&index, uri, position) {
            Some(resolved) => hover::hover(&index, &resolved),
            None => hover::declaration_hover(&index, uri, position),
        }
    }

    pub async fn definition(&self, uri: &Url, position: Position) -> Option<GotoDefinitionResponse> {
        self.wait_until_ready().await;
        let resolved = self.resolve(uri, position)?;
        goto_definition::goto_definition(&resolved)
    }

    pub async fn completion(&self, uri: &Url, position: Position) -> Option<CompletionResponse> {
        self.wait_until_ready().await;
        let document = self.document(uri)?;
        let index = self.index.read();
        completion::complete(&index, &self.config, &document, position)
    }

    pub async fn code_action(&self, uri: &Url, position: Position) -> Vec<CodeActionOrCommand> {
        self.wait_until_ready().await;
        match self.document(uri) {
            Some(document) => code_action::translation_placeholders(&document, position)
                .into_iter()
                .map(CodeActionOrCommand::CodeAction)
                .collect(),
            None => Vec::new(),
        }
    }
}
