//! Ranked-result cache keyed by a content hash of the expanded query.

use dashmap::DashMap;
use std::sync::Arc;

use crate::types::GuidelineExcerpt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Hash of the expanded query plus the parameters that shape the result.
    pub fn new(expanded_query: &str, k: usize, threshold: f32) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(expanded_query.as_bytes());
        hasher.update(&(k as u64).to_le_bytes());
        hasher.update(&threshold.to_bits().to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Process-wide cache shared by all retrieval calls. Entries are never evicted.
#[derive(Debug, Default)]
pub struct RetrievalCache {
    entries: DashMap<CacheKey, Arc<Vec<GuidelineExcerpt>>>,
}

impl RetrievalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<GuidelineExcerpt>>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `ranked` unless another writer got there first; returns the stored list.
    pub fn insert(&self, key: CacheKey, ranked: Vec<GuidelineExcerpt>) -> Arc<Vec<GuidelineExcerpt>> {
        let entry = self.entries.entry(key).or_insert_with(|| Arc::new(ranked));
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
