use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::analysis::{analyze_deal, DealAnalysis};
use crate::scenario::Scenario;
use crate::types::ComputationOutput;
use crate::UnderwritingResult;

pub const DEFAULT_CACHE_CAPACITY: usize = 64;

type CachedAnalysis = Arc<ComputationOutput<DealAnalysis>>;

/// Memoizes `analyze_deal` by scenario fingerprint, evicting the oldest
/// entry once full. Purely an optimization: results are identical with or
/// without it.
#[derive(Debug)]
pub struct AnalysisCache {
    capacity: usize,
    entries: HashMap<String, CachedAnalysis>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        AnalysisCache::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        AnalysisCache {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached analysis for `scenario`, computing it on a miss. Errors are
    /// not cached.
    pub fn get_or_analyze(&mut self, scenario: &Scenario) -> UnderwritingResult<CachedAnalysis> {
        let key = scenario.fingerprint();
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            debug!(fingerprint = %key, "analysis cache hit");
            return Ok(Arc::clone(hit));
        }

        self.misses += 1;
        let output = Arc::new(analyze_deal(scenario)?);

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Arc::clone(&output));
        Ok(output)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
