//! Time-expiring, size-bounded cache for provider search results.
//!
//! Keyed by normalized search term (plus search kind, see
//! [`crate::spotify`]).  Owned by the provider client and mutated only from
//! the single matching thread — never a process-wide singleton, so tests can
//! run independent instances.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::provider::CandidateArtist;

struct CacheEntry {
    data: Vec<CandidateArtist>,
    inserted_at: Instant,
}

pub struct CandidateCache {
    entries: HashMap<String, CacheEntry>,
    timeout: Duration,
    max_entries: usize,
}

impl CandidateCache {
    pub fn new(timeout: Duration, max_entries: usize) -> Self {
        CandidateCache {
            entries: HashMap::new(),
            timeout,
            max_entries: max_entries.max(1),
        }
    }

    /// Look up a key.  Entries older than the timeout count as misses and
    /// are dropped.
    pub fn get(&mut self, key: &str) -> Option<Vec<CandidateArtist>> {
        match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.timeout => {
                Some(entry.data.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a result list, evicting the oldest entry when full.
    pub fn insert(&mut self, key: String, data: Vec<CandidateArtist>) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                self.entries.remove(&k);
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                data,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> CandidateArtist {
        CandidateArtist {
            id: id.to_string(),
            name: id.to_string(),
            genres: vec![],
            popularity: 0,
            followers: 0,
            images: vec![],
            profile_url: String::new(),
        }
    }

    #[test]
    fn test_hit_within_timeout() {
        let mut cache = CandidateCache::new(Duration::from_secs(60), 10);
        cache.insert("beatles".into(), vec![candidate("1")]);
        let hit = cache.get("beatles").expect("expected a cache hit");
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id, "1");
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_dropped() {
        // Zero timeout: every entry is already older than the window.
        let mut cache = CandidateCache::new(Duration::ZERO, 10);
        cache.insert("beatles".into(), vec![candidate("1")]);
        assert!(cache.get("beatles").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_keeps_size_bounded() {
        let mut cache = CandidateCache::new(Duration::from_secs(60), 2);
        cache.insert("a".into(), vec![candidate("1")]);
        cache.insert("b".into(), vec![candidate("2")]);
        cache.insert("c".into(), vec![candidate("3")]);
        assert_eq!(cache.len(), 2);
        // "a" was oldest and must be gone; "c" must be present.
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_reinsert_same_key_does_not_evict() {
        let mut cache = CandidateCache::new(Duration::from_secs(60), 2);
        cache.insert("a".into(), vec![candidate("1")]);
        cache.insert("b".into(), vec![candidate("2")]);
        cache.insert("a".into(), vec![candidate("3")]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap()[0].id, "3");
        assert!(cache.get("b").is_some());
    }
}
