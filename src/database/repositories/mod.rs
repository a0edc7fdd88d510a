pub mod image_record;
pub mod root;

pub use image_record::ImageRecordRepository;
pub use root::RootRepository;

use super::models::{ImageRecord, NewImageRecord};
use super::{Database, DatabaseError, DbConnection};
use std::collections::HashSet;

pub trait Repository {
    fn database(&self) -> &Database;

    fn get_connection(&self) -> Result<DbConnection<'_>, DatabaseError> {
        self.database().get_connection()
    }
}

/// Durable table of indexed images. Every read reflects committed state only.
pub trait RecordStore: Send + Sync {
    fn contains(&self, path: &str) -> Result<bool, DatabaseError>;

    fn existing_paths(&self) -> Result<HashSet<String>, DatabaseError>;

    /// Insert the whole batch or nothing. Paths already present are skipped;
    /// returns how many rows were inserted.
    fn upsert_batch(&self, records: &[NewImageRecord]) -> Result<usize, DatabaseError>;

    /// `prefix` should end with a path separator so sibling folders sharing a
    /// name prefix are left alone.
    fn delete_by_path_prefix(&self, prefix: &str) -> Result<usize, DatabaseError>;

    fn count_by_path_prefix(&self, prefix: &str) -> Result<usize, DatabaseError>;

    /// Full scan, ordered by path.
    fn all(&self) -> Result<Vec<ImageRecord>, DatabaseError>;

    fn count(&self) -> Result<usize, DatabaseError>;

    fn size_on_disk(&self) -> Result<u64, DatabaseError>;
}
