//! Document-keyed store of the latest analysis results.
//!
//! The cache is the unit of truth for rendering. Entries are only ever
//! replaced whole: `commit` swaps in a complete snapshot, `invalidate` swaps
//! in the stale sentinel, `evict` drops the entry. Nothing is merged.

use dashmap::DashMap;
use tracing::debug;

use crate::types::{
    DocumentAnalysisState, DocumentKey, MaintainabilityRecord, RatingRecord, SourceStatsRecord,
};

#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: DashMap<DocumentKey, DocumentAnalysisState>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// `None` means the document was never analyzed (or was evicted).
    pub fn get(&self, key: &DocumentKey) -> Option<DocumentAnalysisState> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Marks the document stale. The entry is kept, so readers can tell
    /// "stale, refresh pending" apart from "never analyzed".
    pub fn invalidate(&self, key: &DocumentKey) {
        debug!("Invalidating cached analysis for {}", key);
        self.entries.insert(key.clone(), DocumentAnalysisState::stale());
    }

    /// Replaces the whole entry. The last commit wins, even over a newer
    /// invalidation.
    pub fn commit(
        &self,
        key: &DocumentKey,
        ratings: Vec<RatingRecord>,
        maintainability: Option<MaintainabilityRecord>,
        stats: Option<SourceStatsRecord>,
    ) {
        debug!("Committing {} ratings for {}", ratings.len(), key);
        self.entries.insert(
            key.clone(),
            DocumentAnalysisState {
                ratings,
                maintainability,
                stats,
            },
        );
    }

    pub fn evict(&self, key: &DocumentKey) -> Option<DocumentAnalysisState> {
        self.entries.remove(key).map(|(_, state)| state)
    }

    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
