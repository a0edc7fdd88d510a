use super::DatabaseError;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 1;

const CREATE_IMAGES: &str = "CREATE TABLE IF NOT EXISTS images (
    id          TEXT PRIMARY KEY,
    path        TEXT UNIQUE NOT NULL,
    hash        INTEGER,
    width       INTEGER NOT NULL DEFAULT 0,
    height      INTEGER NOT NULL DEFAULT 0,
    file_size   INTEGER NOT NULL DEFAULT 0,
    indexed_at  TEXT NOT NULL
)";

// Key-value slot; the root registry keeps its list here.
const CREATE_SETTINGS: &str = "CREATE TABLE IF NOT EXISTS settings (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL
)";

pub fn initialize_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(CREATE_IMAGES, [])?;
    conn.execute(CREATE_SETTINGS, [])?;

    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(DatabaseError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(())
}
