use super::Repository;
use crate::database::{Database, DatabaseError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::io;
use std::path::{Path, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};
use std::sync::Arc;

const ROOTS_KEY: &str = "indexed_roots";

/// Absolute form of `path` with any trailing separator removed. The directory
/// does not have to exist, so removed folders can still be unregistered.
/// Paths that are not valid UTF-8 are rejected with `InvalidData`.
pub fn normalize_root_path(path: &Path) -> io::Result<String> {
    let absolute = std::path::absolute(path)?;
    let text = absolute.to_str().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8")
    })?;
    let trimmed = text.trim_end_matches(MAIN_SEPARATOR);

    if trimmed.is_empty() {
        Ok(MAIN_SEPARATOR_STR.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Prefix that matches everything under `root` but not its siblings.
pub fn root_prefix(root: &str) -> String {
    if root.ends_with(MAIN_SEPARATOR) {
        root.to_string()
    } else {
        format!("{}{}", root, MAIN_SEPARATOR)
    }
}

/// Folders the user has chosen to index. Only the list lives here; record
/// membership is always recomputed from path prefixes.
pub struct RootRepository {
    db: Arc<Database>,
}

impl Repository for RootRepository {
    fn database(&self) -> &Database {
        &self.db
    }
}

impl RootRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Sorted case-insensitively for display.
    pub fn list(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.get_connection()?;
        let mut roots = load_roots(&conn)?;
        roots.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
        Ok(roots)
    }

    /// Returns the normalized path. Adding an existing root is a no-op.
    pub fn add(&self, path: &Path) -> Result<String, DatabaseError> {
        let normalized = normalize_root_path(path)?;
        self.db.transaction(|tx| {
            let mut roots = load_roots(tx)?;
            if !roots.contains(&normalized) {
                roots.push(normalized.clone());
                store_roots(tx, &roots)?;
            }
            Ok(())
        })?;
        Ok(normalized)
    }

    /// Unregisters the root without touching its records. Returns whether it
    /// was registered.
    pub fn remove(&self, path: &Path) -> Result<bool, DatabaseError> {
        let normalized = normalize_root_path(path)?;
        self.db.transaction(|tx| remove_root(tx, &normalized))
    }
}

pub(crate) fn remove_root(conn: &Connection, normalized: &str) -> Result<bool, DatabaseError> {
    let mut roots = load_roots(conn)?;
    let before = roots.len();
    roots.retain(|root| root != normalized);

    if roots.len() == before {
        return Ok(false);
    }
    store_roots(conn, &roots)?;
    Ok(true)
}

fn load_roots(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![ROOTS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

fn store_roots(conn: &Connection, roots: &[String]) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(roots)?;
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
        params![ROOTS_KEY, json, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}
