//! Document indexing and workspace startup for the backend
//!
//! Engine calls run on the blocking pool: extraction parses whole files and
//! the initial scan fans out over rayon.

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Url};
use tracing::{debug, error, info, warn};

use crate::errors::IndexError;
use crate::lsp::engine::UpdateOutcome;
use crate::lsp::workspace::WorkspaceScanner;

use super::state::DrupalBackend;

const DIAGNOSTIC_SOURCE: &str = "drupal-ls";

impl DrupalBackend {
    /// Indexes the editor's text of a document and publishes its diagnostics.
    pub(super) async fn index_document(&self, uri: Url, version: i32, text: String) {
        let engine = self.engine.clone();
        let task_uri = uri.clone();
        let outcome =
            tokio::task::spawn_blocking(move || engine.on_file_opened_or_changed(&task_uri, version, text)).await;
        match outcome {
            Ok(outcome) => self.publish_outcome(uri, Some(version), outcome).await,
            Err(e) => error!("Indexing task for {} panicked: {}", uri, e),
        }
    }

    /// Publishes a diagnostic for a parse failure, or clears diagnostics after
    /// a successful extraction.
    pub(super) async fn publish_outcome(&self, uri: Url, version: Option<i32>, outcome: UpdateOutcome) {
        let diagnostics = match outcome {
            UpdateOutcome::Indexed { catalog_changed } => {
                if catalog_changed {
                    info!("Hook catalog changed after indexing {}", uri);
                }
                Vec::new()
            }
            UpdateOutcome::Failed(failure) => vec![Diagnostic {
                range: failure.range,
                severity: Some(DiagnosticSeverity::ERROR),
                source: Some(DIAGNOSTIC_SOURCE.to_string()),
                message: failure.to_string(),
                ..Default::default()
            }],
            UpdateOutcome::Superseded | UpdateOutcome::Ignored => return,
        };
        self.client.publish_diagnostics(uri, diagnostics, version).await;
    }

    /// Re-reads a file that changed on disk, or forgets it if it is gone.
    ///
    /// Files open in the editor are skipped: their text comes from the client.
    pub(super) async fn handle_file_change(&self, path: PathBuf) {
        let Ok(uri) = Url::from_file_path(&path) else {
            warn!("Ignoring change to non-file path {:?}", path);
            return;
        };
        if self.documents_by_uri.contains_key(&uri) {
            debug!("Skipping update for opened document: {}", uri);
            return;
        }

        let engine = self.engine.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<UpdateOutcome, IndexError> {
            if path.exists() {
                let text = std::fs::read_to_string(&path).map_err(|source| IndexError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(engine.reload_from_disk(&uri, text))
            } else {
                debug!("File removed: {}", uri);
                engine.on_file_deleted(&uri);
                Ok(UpdateOutcome::Ignored)
            }
        })
        .await;

        match result {
            Ok(Ok(UpdateOutcome::Failed(failure))) => debug!("Changed file failed to parse: {}", failure),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to reload changed file: {}", e),
            Err(e) => error!("File change task panicked: {}", e),
        }
    }

    /// Hands a closed document back to disk: its saved contents replace the
    /// editor's text, or the file is forgotten when it no longer exists.
    pub(super) async fn reload_closed_document(&self, uri: Url) {
        let Ok(path) = uri.to_file_path() else {
            warn!("Closed document {} is not a file, dropping it", uri);
            self.engine.on_file_deleted(&uri);
            return;
        };
        let engine = self.engine.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<(), IndexError> {
            if !path.exists() {
                engine.on_file_deleted(&uri);
                return Ok(());
            }
            let text = std::fs::read_to_string(&path).map_err(|source| IndexError::Io {
                path: path.clone(),
                source,
            })?;
            engine.on_file_closed(&uri, text);
            Ok(())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to reload closed document: {}", e),
            Err(e) => error!("Reload task panicked: {}", e),
        }
    }

    /// Scans the workspace in the background, then starts watching it.
    pub(super) fn start_workspace(&self, root: PathBuf) {
        let backend = self.clone();
        tokio::spawn(async move {
            let engine = backend.engine.clone();
            let scan_root = root.clone();
            let report =
                tokio::task::spawn_blocking(move || WorkspaceScanner::new(&engine).scan(&scan_root)).await;
            match report {
                Ok(report) => {
                    debug!("{:?}", report);
                    info!("Workspace {:?} indexed: {:?}", root, backend.engine.stats());
                }
                Err(e) => {
                    error!("Workspace scan panicked: {}", e);
                    backend.engine.mark_ready();
                }
            }
            if let Err(e) = backend.start_file_watcher(&root) {
                warn!("Failed to watch {:?}, changes on disk will be missed: {}", root, e);
            }
        });
    }

    fn start_file_watcher(&self, root: &Path) -> notify::Result<()> {
        let Some(file_events) = self.file_events.lock().take() else {
            debug!("File watcher already running");
            return Ok(());
        };
        let tx = self.file_sender.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        *self.file_watcher.lock() = Some(watcher);
        info!("Watching {:?} for changes", root);

        Self::spawn_reactive_file_watcher(self.clone(), file_events);
        Ok(())
    }

    pub(super) fn stop_file_watcher(&self) {
        if self.file_watcher.lock().take().is_some() {
            debug!("File watcher stopped");
        }
    }
}
