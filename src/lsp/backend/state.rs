//! Backend state management
//!
//! This module defines the DrupalBackend struct: the protocol-side state that
//! sits in front of the engine (open documents, workspace root, file watcher
//! and shutdown signal).

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;

use dashmap::DashMap;
use notify::RecommendedWatcher;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tower_lsp::Client;
use tower_lsp::lsp_types::Url;

use crate::lsp::document::LspDocument;
use crate::lsp::engine::DrupalEngine;

pub(super) type FileEvent = notify::Result<notify::Event>;

/// The Drupal language server backend, translating protocol messages into
/// engine calls.
#[derive(Clone)]
pub struct DrupalBackend {
    pub(super) client: Client,
    pub(super) engine: Arc<DrupalEngine>,
    /// Documents currently open in the editor.
    pub(super) documents_by_uri: Arc<DashMap<Url, Arc<LspDocument>>>,
    pub(super) serial_document_id: Arc<AtomicU32>,
    pub(super) file_watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
    /// Taken by the watcher task when it starts.
    pub(super) file_events: Arc<Mutex<Option<UnboundedReceiver<FileEvent>>>>,
    pub(super) file_sender: UnboundedSender<FileEvent>,
    /// Root given on the command line; wins over the client's root.
    pub(super) root_override: Option<PathBuf>,
    pub(super) root_dir: Arc<RwLock<Option<PathBuf>>>,
    pub(super) shutdown_tx: Arc<tokio::sync::broadcast::Sender<()>>,
}

impl std::fmt::Debug for DrupalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrupalBackend")
            .field("engine", &self.engine)
            .field("open_documents", &self.documents_by_uri.len())
            .finish()
    }
}
