//! Time-bounded cache for recommendation widgets.
//!
//! Entries are keyed by discipline, profile and the profile's `updated_at`, so
//! completing the intake again produces fresh recommendations. Expiry is lazy:
//! a stale entry is dropped when it is read.

#[cfg(test)]
use std::sync::atomic::{AtomicU64, Ordering};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use db::models::discipline::Discipline;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Monotonic time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: Arc<AtomicU64>,
}

#[cfg(test)]
impl Default for ManualClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[cfg(test)]
impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub discipline: Discipline,
    pub profile_id: Uuid,
    pub profile_updated_at: DateTime<Utc>,
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

pub struct RecommendationCache<V> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> RecommendationCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Fresh value for the key, removing it if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        {
            let entry = self.entries.get(key)?;
            if now.duration_since(entry.stored_at) < self.ttl {
                return Some(entry.value.clone());
            }
        }
        self.entries
            .remove_if(key, |_, entry| now.duration_since(entry.stored_at) >= self.ttl);
        debug!(
            discipline = %key.discipline,
            profile_id = %key.profile_id,
            "Recommendation cache entry expired"
        );
        None
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: self.clock.now(),
            },
        );
    }

    pub fn invalidate_profile(&self, profile_id: Uuid) {
        self.entries.retain(|key, _| key.profile_id != profile_id);
    }
}
