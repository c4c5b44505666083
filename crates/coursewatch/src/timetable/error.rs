//! Error types for the timetable scrape pipeline.

use thiserror::Error;

/// Errors that can occur while scraping the timetable.
///
/// A scrape either yields the full rendered results page or one of these;
/// callers never receive partial HTML.
#[derive(Debug, Error, Clone)]
pub enum ScrapeError {
    /// Page navigation failed outright
    #[error("navigation failed: {message}")]
    Navigation { message: String },

    /// A required control did not appear within its bounded wait
    #[error("timed out waiting for {step} after {elapsed_secs:.1}s")]
    StepTimeout { step: &'static str, elapsed_secs: f64 },

    /// Launching or driving the browser process failed
    #[error("browser error: {message}")]
    Browser { message: String },

    /// The configured entry URL could not be parsed
    #[error("invalid timetable URL: {message}")]
    InvalidUrl { message: String },
}

impl From<url::ParseError> for ScrapeError {
    fn from(err: url::ParseError) -> Self {
        ScrapeError::InvalidUrl {
            message: err.to_string(),
        }
    }
}
