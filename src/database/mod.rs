pub mod connection;
pub mod models;
pub mod repositories;
pub mod schema;

use std::path::PathBuf;
use thiserror::Error;

pub use connection::{Database, DbConnection};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,

    #[error("Migration error: {0}")]
    Migration(String),
}

/// `<data dir>/snapfind/snapfind.db`, falling back to the home directory.
pub fn get_database_path() -> Result<PathBuf, DatabaseError> {
    let base_dir = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| DatabaseError::Migration("Could not find a data directory".to_string()))?;

    Ok(base_dir.join("snapfind").join("snapfind.db"))
}
