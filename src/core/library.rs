use crate::config::AppConfig;
use crate::core::indexer::{IndexError, IndexSummary, IndexerService, ProgressObserver};
use crate::core::search::{Match, SearchEngine, SearchError};
use crate::database::models::{RootSummary, StoreStats};
use crate::database::repositories::image_record::delete_by_prefix;
use crate::database::repositories::root::{normalize_root_path, remove_root, root_prefix};
use crate::database::repositories::{ImageRecordRepository, RecordStore, RootRepository};
use crate::database::{Database, DatabaseError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Entry point for callers: owns the store, the root registry and the
/// configuration, and exposes index / search / delete.
pub struct Library {
    db: Arc<Database>,
    config: AppConfig,
    records: ImageRecordRepository,
    roots: RootRepository,
    cancellation_token: Arc<AtomicBool>,
}

impl Library {
    pub fn new(db: Arc<Database>, config: AppConfig) -> Self {
        Self {
            records: ImageRecordRepository::new(db.clone()),
            roots: RootRepository::new(db.clone()),
            db,
            config,
            cancellation_token: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open (or create) the database named by the configuration.
    pub fn open(config: AppConfig) -> Result<Self, DatabaseError> {
        let db_path = config.database_path()?;
        let db = Arc::new(Database::open(&db_path)?);
        Ok(Self::new(db, config))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn records(&self) -> &ImageRecordRepository {
        &self.records
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancellation_token.clone()
    }

    /// Ask the running `index_folder` call to stop at the next candidate.
    pub fn cancel_indexing(&self) {
        self.cancellation_token.store(true, Ordering::Relaxed);
    }

    /// Register `path` as a root and index the images under it.
    ///
    /// The root stays registered even if no file succeeds, but nothing at all
    /// is written when the folder cannot be listed. Callers must not run two
    /// of these concurrently against the same store.
    pub fn index_folder(
        &self,
        path: &Path,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<IndexSummary, IndexError> {
        self.cancellation_token.store(false, Ordering::Relaxed);

        let root = normalize_root_path(path).map_err(|source| IndexError::Enumeration {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        IndexerService::check_root(Path::new(&root))?;

        self.roots
            .add(Path::new(&root))
            .map_err(|source| IndexError::Storage { committed: 0, source })?;

        let mut indexer = IndexerService::new(&self.config)
            .with_cancellation_token(self.cancellation_token.clone());
        if let Some(observer) = observer {
            indexer = indexer.with_progress_observer(observer);
        }

        indexer.index_folder(Path::new(&root), &self.records)
    }

    pub fn search(&self, query_bytes: &[u8]) -> Result<Vec<Match>, SearchError> {
        SearchEngine::new(&self.records, self.config.ranking_policy()).search(query_bytes)
    }

    pub fn search_file(&self, path: &Path) -> Result<Vec<Match>, SearchError> {
        SearchEngine::new(&self.records, self.config.ranking_policy()).search_file(path)
    }

    /// Delete every record under the root and unregister it, in one
    /// transaction. Returns the number of records deleted.
    pub fn delete_root(&self, path: &Path) -> Result<usize, DatabaseError> {
        let root = normalize_root_path(path)?;
        let prefix = root_prefix(&root);

        let (deleted, was_registered) = self.db.transaction(|tx| {
            let deleted = delete_by_prefix(tx, &prefix)?;
            let was_registered = remove_root(tx, &root)?;
            Ok((deleted, was_registered))
        })?;

        if !was_registered {
            log::warn!("{} was not a registered root", root);
        }
        log::info!("Deleted {} records under {}", deleted, root);
        Ok(deleted)
    }

    /// Records whose path lies under `path`, recomputed on every call.
    pub fn count_under(&self, path: &Path) -> Result<usize, DatabaseError> {
        let root = normalize_root_path(path)?;
        self.records.count_by_path_prefix(&root_prefix(&root))
    }

    pub fn roots(&self) -> Result<Vec<RootSummary>, DatabaseError> {
        self.roots
            .list()?
            .into_iter()
            .map(|root| {
                let image_count = self.records.count_by_path_prefix(&root_prefix(&root))?;
                Ok(RootSummary {
                    path: root,
                    image_count,
                })
            })
            .collect()
    }

    pub fn stats(&self) -> Result<StoreStats, DatabaseError> {
        Ok(StoreStats {
            records: self.records.count()?,
            hashed_records: self.records.count_hashed()?,
            roots: self.roots.list()?.len(),
            size_on_disk: self.records.size_on_disk()?,
        })
    }
}
