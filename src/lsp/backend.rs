//! tower-lsp backend
//!
//! ```text
//! editor ──stdio/tcp──▶ DrupalBackend (handlers.rs)
//!                          ├─→ LspDocument: incremental edits on a Rope
//!                          ├─→ DrupalEngine: indexing and queries
//!                          └─→ diagnostics for parse failures
//! disk ──notify──▶ reactive.rs ──batched paths──▶ indexing.rs
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tower_lsp::Client;
use tracing::info;

use crate::config::EngineConfig;
use crate::lsp::engine::DrupalEngine;

mod handlers;
mod indexing;
mod reactive;
mod state;

pub use state::DrupalBackend;

impl DrupalBackend {
    /// Creates a backend with an empty engine. The workspace scan starts once
    /// the client sends `initialized`.
    pub fn new(client: Client, config: EngineConfig, root_override: Option<PathBuf>) -> Self {
        let (file_sender, file_events) = tokio::sync::mpsc::unbounded_channel();
        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        info!("Creating Drupal backend with {:?}", config);

        Self {
            client,
            engine: Arc::new(DrupalEngine::new(config)),
            documents_by_uri: Arc::new(DashMap::new()),
            serial_document_id: Arc::new(AtomicU32::new(0)),
            file_watcher: Arc::new(Mutex::new(None)),
            file_events: Arc::new(Mutex::new(Some(file_events))),
            file_sender,
            root_override,
            root_dir: Arc::new(RwLock::new(None)),
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    pub fn engine(&self) -> &Arc<DrupalEngine> {
        &self.engine
    }

    fn next_document_id(&self) -> u32 {
        self.serial_document_id.fetch_add(1, Ordering::SeqCst)
    }
}
