//! Per-user LRU cache over generated recommendation sets.
//!
//! Entries expire on read after a TTL; capacity eviction is handled by the
//! LRU itself. Any write to a user's set must invalidate their entry first,
//! so the cache can never serve a set older than the stored one plus the TTL.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::trace;

use domain::{Recommendation, UserId};

const DEFAULT_CAPACITY: usize = 1000;
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

struct CachedSet {
    recommendations: Vec<Recommendation>,
    cached_at: Instant,
}

/// TTL + LRU cache keyed by user id.
pub struct RecommendationCache {
    entries: RwLock<LruCache<UserId, CachedSet>>,
    ttl: Duration,
}

impl RecommendationCache {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_settings(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fetch the cached set, evicting it if the TTL has passed.
    pub async fn get(&self, user_id: &str) -> Option<Vec<Recommendation>> {
        let mut entries = self.entries.write().await;
        // Pop and reinsert: a hit refreshes recency, an expired entry stays out.
        let entry = entries.pop(user_id)?;
        if entry.cached_at.elapsed() > self.ttl {
            trace!(user_id, "cache entry expired");
            return None;
        }
        let recommendations = entry.recommendations.clone();
        entries.put(user_id.to_string(), entry);
        Some(recommendations)
    }

    pub async fn insert(&self, user_id: &str, recommendations: Vec<Recommendation>) {
        let mut entries = self.entries.write().await;
        entries.put(
            user_id.to_string(),
            CachedSet {
                recommendations,
                cached_at: Instant::now(),
            },
        );
    }

    pub async fn invalidate(&self, user_id: &str) {
        self.entries.write().await.pop(user_id);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for RecommendationCache {
    fn default() -> Self {
        Self::new()
    }
}
