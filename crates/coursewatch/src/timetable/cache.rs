//! TTL-based caching for scraped catalog data.
//!
//! Entries are replaced wholesale on a successful refresh and are never
//! evicted on expiry; a stale payload stays available so callers can be
//! served old data while a refresh runs (or fails) behind them.

use super::types::CourseOffering;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cache key for the full course catalog.
pub const CATALOG_CACHE_KEY: &str = "courses_data";

/// A cached catalog payload with metadata.
#[derive(Clone)]
struct CacheEntry {
    payload: Arc<Vec<CourseOffering>>,
    fetched_at: Instant,
    ttl: Duration,
}

/// A cache lookup result.
pub struct CacheHit {
    /// The last successfully fetched payload
    pub payload: Arc<Vec<CourseOffering>>,
    /// Whether the payload is still within its TTL
    pub fresh: bool,
}

/// Thread-safe TTL cache for catalog payloads.
///
/// Reads are lock-free against the last known value; refresh serialization
/// happens through the per-key locks handed out by [`refresh_lock`].
///
/// [`refresh_lock`]: CatalogCache::refresh_lock
pub struct CatalogCache {
    entries: DashMap<String, CacheEntry>,
    refresh_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    default_ttl: Duration,
}

impl CatalogCache {
    /// Creates a new cache with the specified default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            refresh_locks: DashMap::new(),
            default_ttl,
        }
    }

    /// Creates a cache with a 1-hour default TTL.
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(60 * 60))
    }

    /// Gets the cached payload for a key, stale or not.
    pub fn get(&self, key: &str) -> Option<CacheHit> {
        self.entries.get(key).map(|entry| CacheHit {
            payload: Arc::clone(&entry.payload),
            fresh: entry.fetched_at.elapsed() < entry.ttl,
        })
    }

    /// Replaces a key's payload and resets its TTL clock.
    pub fn insert(&self, key: &str, payload: Vec<CourseOffering>) -> Arc<Vec<CourseOffering>> {
        let payload = Arc::new(payload);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                payload: Arc::clone(&payload),
                fetched_at: Instant::now(),
                ttl: self.default_ttl,
            },
        );
        payload
    }

    /// Gets or creates the refresh lock for the given key.
    ///
    /// Holders of this lock are the only writers for the key; concurrent
    /// refresh attempts must acquire it (or give up on `try_lock`).
    pub fn refresh_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.refresh_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Returns the number of cached keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}
