//! Local image similarity index: perceptual hashing, a SQLite record store,
//! batched folder indexing and ranked nearest-match search.

pub mod config;
pub mod core;
pub mod database;

pub use crate::config::AppConfig;
pub use crate::core::{
    HashError, IndexError, IndexProgress, IndexSummary, Library, Match, PerceptualHash,
    ProgressObserver, SearchError,
};
pub use crate::database::{Database, DatabaseError};
