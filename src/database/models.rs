use crate::core::hash::PerceptualHash;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// One row per indexed file. `path` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub path: String,
    /// `None` when hashing produced the sentinel; such records are counted but
    /// never ranked.
    pub hash: Option<PerceptualHash>,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub indexed_at: String,
}

impl ImageRecord {
    pub(crate) const COLUMNS: &'static str =
        "id, path, hash, width, height, file_size, indexed_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            path: row.get(1)?,
            hash: PerceptualHash::from_stored(row.get(2)?),
            width: row.get::<_, i64>(3)?.max(0) as u32,
            height: row.get::<_, i64>(4)?.max(0) as u32,
            file_size: row.get::<_, i64>(5)?.max(0) as u64,
            indexed_at: row.get(6)?,
        })
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A record waiting to be inserted; the id and timestamp are assigned at insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImageRecord {
    pub path: String,
    pub hash: Option<PerceptualHash>,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

/// A registered root together with its derived record count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSummary {
    pub path: String,
    pub image_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub records: usize,
    pub hashed_records: usize,
    pub roots: usize,
    pub size_on_disk: u64,
}
