//! Timetable scrape pipeline: browser automation, HTML extraction, and the
//! stale-tolerant catalog cache in front of them.

mod browser;
mod cache;
mod config;
mod error;
mod extract;
mod types;

pub use browser::TimetableScraper;
pub use cache::{CacheHit, CatalogCache, CATALOG_CACHE_KEY};
pub use config::TimetableConfig;
pub use error::ScrapeError;
pub use extract::extract_offerings;
pub use types::{normalize_course_number, CourseOffering, SeatCount};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Source of full-catalog scrapes.
///
/// Implemented by [`TimetableScraper`]; tests substitute mocks. Every call is
/// one full round trip to the upstream site.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Vec<CourseOffering>, ScrapeError>;
}

/// Cached access to the course catalog.
///
/// Shields synchronous callers from scrape latency: fresh entries are served
/// directly, stale entries are served immediately while at most one
/// background refresh runs, and only a completely cold cache makes the caller
/// wait on a scrape. A failed refresh leaves the previous payload untouched.
pub struct CatalogService {
    source: Arc<dyn CatalogSource>,
    cache: Arc<CatalogCache>,
}

impl CatalogService {
    /// Creates a service with the given scrape source and cache TTL.
    pub fn new(source: Arc<dyn CatalogSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: Arc::new(CatalogCache::new(ttl)),
        }
    }

    /// Returns the course catalog, fresh or stale.
    ///
    /// Only a cold cache propagates scrape errors; once a payload exists,
    /// callers always get data.
    pub async fn catalog(&self) -> Result<Arc<Vec<CourseOffering>>, ScrapeError> {
        if let Some(hit) = self.cache.get(CATALOG_CACHE_KEY) {
            if !hit.fresh {
                self.spawn_refresh();
            }
            return Ok(hit.payload);
        }
        self.refresh_blocking().await
    }

    /// Triggers a background refresh unless one is already in flight.
    fn spawn_refresh(&self) {
        let lock = self.cache.refresh_lock(CATALOG_CACHE_KEY);
        let Ok(guard) = lock.try_lock_owned() else {
            // A refresh already holds the lock; this caller keeps its stale
            // payload and moves on.
            return;
        };

        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            let _guard = guard;
            match source.fetch_catalog().await {
                Ok(offerings) => {
                    info!(courses = offerings.len(), "catalog cache refreshed");
                    cache.insert(CATALOG_CACHE_KEY, offerings);
                }
                Err(e) => {
                    warn!(error = %e, "catalog refresh failed, keeping previous payload");
                }
            }
        });
    }

    /// Performs a synchronous refresh for a cold cache.
    ///
    /// Concurrent cold callers serialize on the refresh lock; whoever loses
    /// the race re-reads the entry the winner inserted.
    async fn refresh_blocking(&self) -> Result<Arc<Vec<CourseOffering>>, ScrapeError> {
        let lock = self.cache.refresh_lock(CATALOG_CACHE_KEY);
        let _guard = lock.lock().await;

        if let Some(hit) = self.cache.get(CATALOG_CACHE_KEY) {
            return Ok(hit.payload);
        }

        let offerings = self.source.fetch_catalog().await?;
        info!(courses = offerings.len(), "catalog cache populated");
        Ok(self.cache.insert(CATALOG_CACHE_KEY, offerings))
    }
}
