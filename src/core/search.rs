use crate::core::hash::{HashError, HashService, PerceptualHash};
use crate::database::models::ImageRecord;
use crate::database::repositories::RecordStore;
use crate::database::DatabaseError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Query image could not be hashed: {0}")]
    HashUnavailable(#[source] HashError),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub distance: f32,
}

impl Match {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Result-set composition. Everything at or under `near_duplicate_distance`
/// is always returned; the rest only fills up to `result_limit`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingPolicy {
    pub near_duplicate_distance: f32,
    pub result_limit: usize,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            near_duplicate_distance: 2.0,
            result_limit: 10,
        }
    }
}

/// Distance ascending, then pixel area descending, then path for a stable order.
fn compare_matches(a: &Match, b: &Match) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| b.area().cmp(&a.area()))
        .then_with(|| a.path.cmp(&b.path))
}

/// Rank records against `query`. Records without a hash never participate.
pub fn rank<I>(query: PerceptualHash, records: I, policy: &RankingPolicy) -> Vec<Match>
where
    I: IntoIterator<Item = ImageRecord>,
{
    let (mut forced, mut remaining): (Vec<Match>, Vec<Match>) = records
        .into_iter()
        .filter_map(|record| {
            let hash = record.hash.filter(|h| !h.is_sentinel())?;
            Some(Match {
                distance: query.distance(hash) as f32,
                path: record.path,
                width: record.width,
                height: record.height,
                file_size: record.file_size,
            })
        })
        .partition(|m| m.distance <= policy.near_duplicate_distance);

    remaining.sort_by(compare_matches);
    remaining.truncate(policy.result_limit.saturating_sub(forced.len()));

    forced.append(&mut remaining);
    forced.sort_by(compare_matches);
    forced
}

pub struct SearchEngine<'a> {
    store: &'a dyn RecordStore,
    hash_service: HashService,
    policy: RankingPolicy,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a dyn RecordStore, policy: RankingPolicy) -> Self {
        Self {
            store,
            hash_service: HashService::new(),
            policy,
        }
    }

    /// Hash the query, then rank every committed record. An empty store gives
    /// an empty list, not an error.
    pub fn search(&self, query_bytes: &[u8]) -> Result<Vec<Match>, SearchError> {
        let query = self
            .hash_service
            .hash_bytes(query_bytes)
            .map_err(SearchError::HashUnavailable)?;
        if query.is_sentinel() {
            return Err(SearchError::HashUnavailable(HashError::Sentinel));
        }

        let records = self.store.all()?;
        let total = records.len();
        let matches = rank(query, records, &self.policy);
        log::info!(
            "Query hash {} ranked against {} records, {} matches",
            query,
            total,
            matches.len()
        );
        Ok(matches)
    }

    pub fn search_file(&self, path: &Path) -> Result<Vec<Match>, SearchError> {
        let bytes = std::fs::read(path)
            .map_err(|e| SearchError::HashUnavailable(HashError::Io(e)))?;
        self.search(&bytes)
    }
}
