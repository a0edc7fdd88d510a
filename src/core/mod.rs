pub mod hash;
pub mod image;
pub mod indexer;
pub mod library;
pub mod search;

#[cfg(test)]
pub(crate) mod test_support;

pub use hash::{HashError, HashService, PerceptualHash};
pub use indexer::{IndexError, IndexProgress, IndexSummary, IndexerService, ProgressObserver};
pub use library::Library;
pub use search::{Match, RankingPolicy, SearchEngine, SearchError};
