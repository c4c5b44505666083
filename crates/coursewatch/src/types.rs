//! Shared application state.

use crate::timetable::CatalogService;
use crate::watcher::SubscriptionStore;
use std::sync::Arc;

/// State shared across all API handlers.
pub struct AppState {
    /// Cached catalog access
    pub catalog: CatalogService,
    /// Subscription registry, shared with the enrollment watcher
    pub registry: Arc<SubscriptionStore>,
}
