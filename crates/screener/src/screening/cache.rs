use log::debug;
use moka::sync::Cache;

use crate::screening::types::CacheEntry;
use crate::search::SearchOutcome;

const MAX_ENTRIES: u64 = 100_000;

/// How a name was resolved.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Served from the cache, possibly after waiting on another worker's
    /// in-flight lookup of the same name. No provider call, no throttle.
    Cached(CacheEntry),
    /// This worker ran the provider lookup.
    Fresh(SearchOutcome),
}

/// Per-job memo of screening outcomes keyed by normalized name.
///
/// Concurrent lookups of the same name are coalesced: one worker queries
/// the provider while the others wait for its entry. Blocked outcomes are
/// never stored, so a blocked name is queried again on its next occurrence.
pub struct ScreeningCache {
    entries: Cache<String, CacheEntry>,
}

impl ScreeningCache {
    pub fn new() -> Self {
        Self::with_capacity(MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            entries: Cache::new(max_entries),
        }
    }

    pub fn get(&self, name: &str) -> Option<CacheEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the cached entry for `name`, or runs `lookup` and caches its
    /// classification unless the outcome is blocked.
    pub fn get_or_lookup<F>(&self, name: &str, lookup: F) -> Lookup
    where
        F: Fn() -> SearchOutcome,
    {
        let mut fresh: Option<SearchOutcome> = None;

        let entry = self.entries.optionally_get_with(name.to_string(), || {
            let outcome = lookup();
            let entry = CacheEntry::from_outcome(&outcome);
            fresh = Some(outcome);
            entry
        });

        match (fresh, entry) {
            (Some(outcome), _) => Lookup::Fresh(outcome),
            (None, Some(entry)) => Lookup::Cached(entry),
            (None, None) => {
                // The in-flight lookup we waited on was blocked and left
                // nothing behind. Query again rather than share the refusal.
                debug!("Concurrent lookup for '{}' was blocked, re-querying", name);
                let outcome = lookup();
                if let Some(entry) = CacheEntry::from_outcome(&outcome) {
                    self.entries.insert(name.to_string(), entry);
                }
                Lookup::Fresh(outcome)
            }
        }
    }
}

impl Default for ScreeningCache {
    fn default() -> Self {
        Self::new()
    }
}
