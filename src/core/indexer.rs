use crate::config::AppConfig;
use crate::core::hash::{HashError, HashService};
use crate::core::image::{is_hidden, is_supported_format, ImageProbe};
use crate::database::models::NewImageRecord;
use crate::database::repositories::RecordStore;
use crate::database::DatabaseError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Cannot read folder {path}: {source}")]
    Enumeration {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Storage failed after {committed} records were committed: {source}")]
    Storage {
        committed: usize,
        #[source]
        source: DatabaseError,
    },

    #[error("Indexing cancelled after {committed} records were committed")]
    Cancelled { committed: usize },

    #[error("Could not start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl IndexError {
    fn enumeration(path: &Path, source: io::Error) -> Self {
        IndexError::Enumeration {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub current_file: String,
    pub estimated_time_remaining: Option<Duration>,
}

/// Receives progress snapshots from an indexing run. Calls arrive from worker
/// threads, in order, with a non-decreasing `files_processed`.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &IndexProgress);
}

impl ProgressObserver for mpsc::UnboundedSender<IndexProgress> {
    fn on_progress(&self, progress: &IndexProgress) {
        let _ = self.send(progress.clone());
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Records newly committed to the store.
    pub indexed: usize,
    /// Candidates considered: supported files not already in the store.
    pub total: usize,
    /// Candidates skipped because they could not be read or decoded.
    pub failed: usize,
}

/// Elapsed time per processed item, extrapolated over what is left.
pub fn estimate_remaining(elapsed: Duration, processed: usize, total: usize) -> Option<Duration> {
    if processed == 0 {
        return None;
    }
    let remaining = total.saturating_sub(processed);
    Some(elapsed.mul_f64(remaining as f64 / processed as f64))
}

/// Report every `percent` of `total`, never less often than every item.
pub fn progress_stride(total: usize, percent: usize) -> usize {
    (total * percent / 100).max(1)
}

struct ProgressTracker {
    processed: usize,
    total: usize,
    stride: usize,
    started: Instant,
}

pub struct IndexerService {
    progress_observer: Option<Arc<dyn ProgressObserver>>,
    cancellation_token: Arc<AtomicBool>,
    supported_formats: Vec<String>,
    batch_size: usize,
    progress_percent: usize,
    skip_hidden: bool,
    parallel_workers: usize,
    hash_service: HashService,
}

impl IndexerService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            progress_observer: None,
            cancellation_token: Arc::new(AtomicBool::new(false)),
            supported_formats: config.supported_formats.clone(),
            batch_size: config.batch_size(),
            progress_percent: config.progress_percent,
            skip_hidden: config.skip_hidden,
            parallel_workers: config.parallel_workers.max(1),
            hash_service: HashService::new(),
        }
    }

    pub fn with_progress_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress_observer = Some(observer);
        self
    }

    pub fn with_cancellation_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn cancel(&self) {
        self.cancellation_token.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation_token.load(Ordering::Relaxed)
    }

    /// Fails if `root` is missing, not a directory, or cannot be listed.
    pub fn check_root(root: &Path) -> Result<(), IndexError> {
        let metadata = fs::metadata(root).map_err(|e| IndexError::enumeration(root, e))?;
        if !metadata.is_dir() {
            return Err(IndexError::enumeration(
                root,
                io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }
        fs::read_dir(root).map_err(|e| IndexError::enumeration(root, e))?;
        Ok(())
    }

    /// Every supported, non-hidden regular file under `root`, in a stable order.
    pub fn discover_files(&self, root: &Path) -> Result<Vec<PathBuf>, IndexError> {
        let skip_hidden = self.skip_hidden;
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !(skip_hidden && is_hidden(entry.file_name())));

        let mut discovered_files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file()
                        && is_supported_format(entry.path(), &self.supported_formats)
                    {
                        discovered_files.push(entry.into_path());
                    }
                }
                Err(e) if e.depth() == 0 => {
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop at root"));
                    return Err(IndexError::enumeration(root, source));
                }
                Err(e) => log::warn!("Skipping unreadable entry under {}: {}", root.display(), e),
            }
        }

        Ok(discovered_files)
    }

    /// Index every new image under `root` into `store`.
    ///
    /// Files already in the store are skipped even if they changed on disk.
    /// Per-file failures are logged and counted in `failed`; only an unreadable
    /// root, a batch that fails twice, or cancellation end the run early.
    pub fn index_folder(
        &self,
        root: &Path,
        store: &dyn RecordStore,
    ) -> Result<IndexSummary, IndexError> {
        let root = std::path::absolute(root).map_err(|e| IndexError::enumeration(root, e))?;
        Self::check_root(&root)?;

        if self.is_cancelled() {
            return Err(IndexError::Cancelled { committed: 0 });
        }

        let existing: HashSet<String> = store
            .existing_paths()
            .map_err(|source| IndexError::Storage { committed: 0, source })?;

        // Names that are not valid UTF-8 cannot be stored without loss.
        let mut unrepresentable = 0;
        let mut candidates: Vec<(PathBuf, String)> = Vec::new();
        for path in self.discover_files(&root)? {
            let Some(key) = path.to_str().map(str::to_owned) else {
                log::warn!("Skipping {}: path is not valid UTF-8", path.display());
                unrepresentable += 1;
                continue;
            };
            if !existing.contains(&key) {
                candidates.push((path, key));
            }
        }

        let total = candidates.len() + unrepresentable;
        log::info!(
            "Indexing {}: {} new candidates, {} already indexed",
            root.display(),
            total,
            existing.len()
        );

        let tracker = Mutex::new(ProgressTracker {
            processed: 0,
            total: candidates.len(),
            stride: progress_stride(candidates.len(), self.progress_percent),
            started: Instant::now(),
        });
        let failed = AtomicUsize::new(unrepresentable);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_workers)
            .build()?;

        let mut committed = 0;
        for chunk in candidates.chunks(self.batch_size) {
            if self.is_cancelled() {
                return Err(IndexError::Cancelled { committed });
            }

            let batch: Vec<NewImageRecord> = pool.install(|| {
                chunk
                    .par_iter()
                    .filter_map(|(path, key)| {
                        if self.is_cancelled() {
                            return None;
                        }
                        let result = self.process_file(path, key);
                        self.record_progress(&tracker, path);
                        match result {
                            Ok(record) => Some(record),
                            Err(e) => {
                                log::warn!("Skipping {}: {}", path.display(), e);
                                failed.fetch_add(1, Ordering::Relaxed);
                                None
                            }
                        }
                    })
                    .collect()
            });

            let inserted = self
                .flush(store, &batch)
                .map_err(|source| IndexError::Storage { committed, source })?;
            committed += inserted;

            if self.is_cancelled() {
                return Err(IndexError::Cancelled { committed });
            }
        }

        let summary = IndexSummary {
            indexed: committed,
            total,
            failed: failed.load(Ordering::Relaxed),
        };
        log::info!(
            "Indexed {} of {} candidates under {} ({} failed)",
            summary.indexed,
            summary.total,
            root.display(),
            summary.failed
        );
        Ok(summary)
    }

    fn process_file(&self, path: &Path, key: &str) -> Result<NewImageRecord, HashError> {
        let bytes = fs::read(path)?;
        let img = self.hash_service.decode(&bytes)?;
        let hash = self.hash_service.hash_image(&img);
        let probe = ImageProbe::from_decoded(path, &img, bytes.len());

        if hash.is_sentinel() {
            log::debug!("{} hashed to the sentinel; stored without a hash", path.display());
        }

        Ok(NewImageRecord {
            path: key.to_string(),
            hash: Some(hash).filter(|h| !h.is_sentinel()),
            width: probe.width,
            height: probe.height,
            file_size: probe.file_size,
        })
    }

    /// One retry, then give up so the caller can report partial progress.
    fn flush(
        &self,
        store: &dyn RecordStore,
        batch: &[NewImageRecord],
    ) -> Result<usize, DatabaseError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let inserted = match store.upsert_batch(batch) {
            Ok(inserted) => inserted,
            Err(e) => {
                log::warn!("Batch of {} records failed, retrying once: {}", batch.len(), e);
                store.upsert_batch(batch)?
            }
        };
        log::debug!("Flushed batch: {} of {} inserted", inserted, batch.len());
        Ok(inserted)
    }

    fn record_progress(&self, tracker: &Mutex<ProgressTracker>, path: &Path) {
        // Reporting under the lock keeps observer calls ordered.
        let Ok(mut tracker) = tracker.lock() else {
            return;
        };
        tracker.processed += 1;

        if tracker.processed % tracker.stride != 0 && tracker.processed != tracker.total {
            return;
        }
        if let Some(observer) = &self.progress_observer {
            observer.on_progress(&IndexProgress {
                files_processed: tracker.processed,
                total_files: tracker.total,
                current_file: path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default(),
                estimated_time_remaining: estimate_remaining(
                    tracker.started.elapsed(),
                    tracker.processed,
                    tracker.total,
                ),
            });
        }
    }
}
