//! Workspace scanner
//!
//! Builds the initial index in two phases:
//!
//! 1. Hook API files (`*.api.php`), so that the hook catalog is complete.
//! 2. Everything else, with PHP files matched against that catalog.
//!
//! Both phases read and extract files on a rayon pool. The scan ends by
//! opening the engine's query barrier, whether or not every file could be
//! read.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tower_lsp::lsp_types::Url;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::errors::IndexError;
use crate::extractors::FileKind;
use crate::lsp::engine::{DrupalEngine, UpdateOutcome};

/// Totals of one workspace scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub discovered: usize,
    pub indexed: usize,
    pub failed: usize,
    /// Files the editor opened before the scan reached them.
    pub skipped: usize,
    pub unreadable: usize,
    pub elapsed: Duration,
}

impl ScanReport {
    fn record(&mut self, result: &Result<UpdateOutcome, IndexError>) {
        match result {
            Ok(UpdateOutcome::Indexed { .. }) => self.indexed += 1,
            Ok(UpdateOutcome::Failed(_)) => self.failed += 1,
            Ok(UpdateOutcome::Superseded) | Ok(UpdateOutcome::Ignored) => self.skipped += 1,
            Err(_) => self.unreadable += 1,
        }
    }
}

/// Reads `path` and hands it to the engine as a disk-loaded document.
pub fn load_path(engine: &DrupalEngine, path: &Path) -> Result<UpdateOutcome, IndexError> {
    let uri = Url::from_file_path(path).map_err(|_| IndexError::InvalidPath(path.to_path_buf()))?;
    let text = std::fs::read_to_string(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(engine.load_from_disk(&uri, text))
}

pub struct WorkspaceScanner<'a> {
    engine: &'a DrupalEngine,
}

impl<'a> WorkspaceScanner<'a> {
    pub fn new(engine: &'a DrupalEngine) -> Self {
        Self { engine }
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.engine.config().excluded_dirs.iter().any(|dir| *dir == name)
    }

    /// Every indexable file under `root` with its kind, in walk order.
    pub fn discover(&self, root: &Path) -> Vec<(PathBuf, FileKind)> {
        WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry))
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Failed to walk workspace entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let kind = FileKind::classify(entry.path())?;
                Some((entry.into_path(), kind))
            })
            .collect()
    }

    fn load_all(&self, paths: &[&PathBuf], report: &mut ScanReport) {
        let results: Vec<Result<UpdateOutcome, IndexError>> =
            paths.par_iter().map(|path| load_path(self.engine, path)).collect();
        for result in &results {
            match result {
                Ok(UpdateOutcome::Failed(failure)) => debug!("Parse failure during scan: {}", failure),
                Err(e) => warn!("Skipping workspace file: {}", e),
                Ok(_) => {}
            }
            report.record(result);
        }
    }

    fn run_phases(&self, files: &[(PathBuf, FileKind)], report: &mut ScanReport) {
        let (api, rest): (Vec<_>, Vec<_>) = files.iter().partition(|(_, kind)| *kind == FileKind::HookApi);
        let api: Vec<&PathBuf> = api.into_iter().map(|(path, _)| path).collect();
        let rest: Vec<&PathBuf> = rest.into_iter().map(|(path, _)| path).collect();

        debug!("Scan phase 1: {} hook API files", api.len());
        self.load_all(&api, report);
        debug!("Scan phase 2: {} files", rest.len());
        self.load_all(&rest, report);
    }

    /// Indexes every file under `root` and opens the query barrier.
    pub fn scan(&self, root: &Path) -> ScanReport {
        let start = Instant::now();
        let files = self.discover(root);
        info!("Found {} Drupal files to index in {:?}", files.len(), root);

        let mut report = ScanReport {
            discovered: files.len(),
            ..ScanReport::default()
        };
        let pool = self.engine.config().scan_threads.and_then(|threads| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("drupal-scan-{}", i))
                .build()
                .map_err(|e| warn!("Failed to build scan thread pool, using the global pool: {}", e))
                .ok()
        });
        match pool {
            Some(pool) => pool.install(|| self.run_phases(&files, &mut report)),
            None => self.run_phases(&files, &mut report),
        }

        report.elapsed = start.elapsed();
        info!(
            "Parallel indexing of {} files completed in {:?} ({:.1} files/sec): {} indexed, {} failed, {} skipped, {} unreadable",
            report.discovered,
            report.elapsed,
            report.discovered as f64 / report.elapsed.as_secs_f64().max(f64::EPSILON),
            report.indexed,
            report.failed,
            report.skipped,
            report.unreadable
        );
        self.engine.mark_ready();
        report
    }
}
