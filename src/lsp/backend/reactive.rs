//! Reactive file watcher
//!
//! Turns raw `notify` events into batches of changed Drupal files and feeds
//! them to [`DrupalBackend::handle_file_change`].

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashSet;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::extractors::FileKind;

use super::state::{DrupalBackend, FileEvent};

const BATCH_SIZE: usize = 64;
const BATCH_TIMEOUT: Duration = Duration::from_millis(100);

/// Paths of an event that the engine would index, minus excluded directories.
fn relevant_paths(event: notify::Event, config: &EngineConfig) -> Vec<PathBuf> {
    use notify::EventKind;

    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter(|path| FileKind::classify(path).is_some() && !in_excluded_dir(path, config))
        .collect()
}

fn in_excluded_dir(path: &Path, config: &EngineConfig) -> bool {
    let Some(parent) = path.parent() else {
        return false;
    };
    parent.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.') || config.excluded_dirs.iter().any(|dir| *dir == name)
        }
        _ => false,
    })
}

impl DrupalBackend {
    /// Spawns the task that batches file system events.
    ///
    /// Events are grouped for up to 100ms, de-duplicated per path and
    /// processed one path at a time. The task ends on shutdown or when the
    /// watcher is dropped.
    pub(super) fn spawn_reactive_file_watcher(backend: DrupalBackend, file_events: UnboundedReceiver<FileEvent>) {
        let mut shutdown_rx = backend.shutdown_tx.subscribe();
        let config = backend.engine.config().clone();

        tokio::spawn(async move {
            let batches = UnboundedReceiverStream::new(file_events)
                .filter_map(move |result| match result {
                    Ok(event) => Some(relevant_paths(event, &config)),
                    Err(e) => {
                        warn!("File watcher error: {}", e);
                        None
                    }
                })
                .filter(|paths| !paths.is_empty())
                .chunks_timeout(BATCH_SIZE, BATCH_TIMEOUT);
            let mut batches = Box::pin(futures::StreamExt::take_until(batches, async move {
                let _ = shutdown_rx.recv().await;
                info!("Reactive file watcher received shutdown signal");
            }));

            while let Some(batch) = batches.next().await {
                let mut seen = FxHashSet::default();
                let paths: Vec<PathBuf> = batch
                    .into_iter()
                    .flatten()
                    .filter(|path| seen.insert(path.clone()))
                    .collect();
                info!("Processing batch of {} file changes", paths.len());
                for path in paths {
                    backend.handle_file_change(path).await;
                }
            }

            debug!("Reactive file watcher task terminated");
        });
    }
}
