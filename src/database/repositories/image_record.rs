use super::{RecordStore, Repository};
use crate::database::models::{ImageRecord, NewImageRecord};
use crate::database::{Database, DatabaseError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub struct ImageRecordRepository {
    db: Arc<Database>,
}

impl Repository for ImageRecordRepository {
    fn database(&self) -> &Database {
        &self.db
    }
}

impl ImageRecordRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn find_by_path(&self, path: &str) -> Result<Option<ImageRecord>, DatabaseError> {
        let conn = self.get_connection()?;
        let sql = format!("SELECT {} FROM images WHERE path = ?1", ImageRecord::COLUMNS);

        conn.query_row(&sql, params![path], ImageRecord::from_row)
            .optional()
            .map_err(DatabaseError::Query)
    }

    pub fn count_hashed(&self) -> Result<usize, DatabaseError> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM images WHERE hash IS NOT NULL AND hash != 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Insert inside an already open transaction.
pub(crate) fn insert_batch(conn: &Connection, records: &[NewImageRecord]) -> Result<usize, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO images (id, path, hash, width, height, file_size, indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    let mut inserted = 0;
    for record in records {
        let id = format!("img_{}", Uuid::new_v4().simple());
        inserted += stmt.execute(params![
            id,
            record.path,
            record.hash.and_then(|h| h.to_stored()),
            i64::from(record.width),
            i64::from(record.height),
            record.file_size as i64,
            now,
        ])?;
    }

    Ok(inserted)
}

pub(crate) fn delete_by_prefix(conn: &Connection, prefix: &str) -> Result<usize, DatabaseError> {
    // substr comparison keeps `%` and `_` in paths literal.
    let deleted = conn.execute(
        "DELETE FROM images WHERE substr(path, 1, length(?1)) = ?1",
        params![prefix],
    )?;
    Ok(deleted)
}

impl RecordStore for ImageRecordRepository {
    fn contains(&self, path: &str) -> Result<bool, DatabaseError> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM images WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn existing_paths(&self) -> Result<HashSet<String>, DatabaseError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT path FROM images")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(paths)
    }

    fn upsert_batch(&self, records: &[NewImageRecord]) -> Result<usize, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.db.transaction(|tx| insert_batch(tx, records))
    }

    fn delete_by_path_prefix(&self, prefix: &str) -> Result<usize, DatabaseError> {
        let conn = self.get_connection()?;
        delete_by_prefix(&conn, prefix)
    }

    fn count_by_path_prefix(&self, prefix: &str) -> Result<usize, DatabaseError> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM images WHERE substr(path, 1, length(?1)) = ?1",
            params![prefix],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn all(&self) -> Result<Vec<ImageRecord>, DatabaseError> {
        let conn = self.get_connection()?;
        let sql = format!("SELECT {} FROM images ORDER BY path", ImageRecord::COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], ImageRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn count(&self) -> Result<usize, DatabaseError> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn size_on_disk(&self) -> Result<u64, DatabaseError> {
        self.db.size_on_disk()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::PerceptualHash;

    fn setup_repo() -> ImageRecordRepository {
        ImageRecordRepository::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn new_record(path: &str, hash: u64) -> NewImageRecord {
        NewImageRecord {
            path: path.to_string(),
            hash: Some(PerceptualHash(hash)),
            width: 1920,
            height: 1080,
            file_size: 1024000,
        }
    }

    #[test]
    fn test_upsert_and_find() {
        let repo = setup_repo();
        let inserted = repo
            .upsert_batch(&[new_record("/test/image.jpg", 0xABCD)])
            .unwrap();
        assert_eq!(inserted, 1);

        let record = repo.find_by_path("/test/image.jpg").unwrap().unwrap();
        assert_eq!(record.hash, Some(PerceptualHash(0xABCD)));
        assert_eq!((record.width, record.height), (1920, 1080));
        assert_eq!(record.file_size, 1024000);
        assert!(record.id.starts_with("img_"));
        assert!(repo.contains("/test/image.jpg").unwrap());
        assert!(!repo.contains("/test/other.jpg").unwrap());
    }

    #[test]
    fn test_existing_paths_are_skipped_not_updated() {
        let repo = setup_repo();
        repo.upsert_batch(&[new_record("/test/a.jpg", 1)]).unwrap();
        let original = repo.find_by_path("/test/a.jpg").unwrap().unwrap();

        let inserted = repo
            .upsert_batch(&[new_record("/test/a.jpg", 2), new_record("/test/b.jpg", 3)])
            .unwrap();
        assert_eq!(inserted, 1);

        let after = repo.find_by_path("/test/a.jpg").unwrap().unwrap();
        assert_eq!(after, original);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_sentinel_hash_is_stored_as_absent() {
        let repo = setup_repo();
        repo.upsert_batch(&[new_record("/test/flat.png", 0), new_record("/test/real.png", 7)])
            .unwrap();

        let flat = repo.find_by_path("/test/flat.png").unwrap().unwrap();
        assert_eq!(flat.hash, None);
        assert_eq!(repo.count().unwrap(), 2);
        assert_eq!(repo.count_hashed().unwrap(), 1);
    }

    #[test]
    fn test_delete_by_prefix_leaves_sibling_folders() {
        let repo = setup_repo();
        repo.upsert_batch(&[
            new_record("/data/a/one.jpg", 1),
            new_record("/data/a/nested/two.jpg", 2),
            new_record("/data/ab/three.jpg", 3),
            new_record("/data/b/four.jpg", 4),
        ])
        .unwrap();

        assert_eq!(repo.count_by_path_prefix("/data/a/").unwrap(), 2);
        let deleted = repo.delete_by_path_prefix("/data/a/").unwrap();
        assert_eq!(deleted, 2);

        let remaining: Vec<String> = repo.all().unwrap().into_iter().map(|r| r.path).collect();
        assert_eq!(remaining, vec!["/data/ab/three.jpg", "/data/b/four.jpg"]);
    }

    #[test]
    fn test_prefix_with_like_wildcards_is_literal() {
        let repo = setup_repo();
        repo.upsert_batch(&[
            new_record("/data/100%_done/x.jpg", 1),
            new_record("/data/100ab_done/y.jpg", 2),
        ])
        .unwrap();

        assert_eq!(repo.delete_by_path_prefix("/data/100%_done/").unwrap(), 1);
        assert!(repo.contains("/data/100ab_done/y.jpg").unwrap());
    }

    #[test]
    fn test_all_is_ordered_and_complete() {
        let repo = setup_repo();
        let batch: Vec<NewImageRecord> = (0..120)
            .rev()
            .map(|i| new_record(&format!("/test/img{:03}.jpg", i), i + 1))
            .collect();
        assert_eq!(repo.upsert_batch(&batch).unwrap(), 120);

        let all = repo.all().unwrap();
        assert_eq!(all.len(), 120);
        assert!(all.windows(2).all(|w| w[0].path < w[1].path));
        assert_eq!(repo.existing_paths().unwrap().len(), 120);
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let repo = setup_repo();
        assert_eq!(repo.upsert_batch(&[]).unwrap(), 0);
        assert!(repo.all().unwrap().is_empty());
        assert!(repo.size_on_disk().unwrap() > 0);
    }
}
