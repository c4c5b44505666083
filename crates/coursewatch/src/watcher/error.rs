//! Error types for the subscription watching subsystem.

use crate::timetable::ScrapeError;
use thiserror::Error;

/// Errors that can occur while persisting, checking, or notifying
/// subscriptions.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Subscription store read or write failed
    #[error("subscription store error: {0}")]
    Registry(#[from] rusqlite::Error),

    /// Email delivery failed
    #[error("notification send failed: {message}")]
    Notify { message: String },

    /// The per-course scrape failed
    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),
}
