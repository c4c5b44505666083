//! Configuration for the timetable scrape pipeline.

use std::time::Duration;

/// Entry URL for the timetable search flow.
const TIMETABLE_ENTRY_URL: &str =
    "https://oracle-www.dartmouth.edu/dart/groucho/timetable.main";

/// Configuration for the timetable scraper.
#[derive(Debug, Clone)]
pub struct TimetableConfig {
    /// Entry URL for the timetable main page
    pub entry_url: String,
    /// Term code to select in the search form (e.g. "202409")
    pub term: String,
    /// Path to the Chrome/Chromium executable; the browser's own discovery
    /// is used when unset
    pub chrome_path: Option<String>,
    /// Bounded wait for each form control to appear
    pub step_timeout: Duration,
    /// Bounded wait for full page navigations
    pub navigation_timeout: Duration,
    /// Bounded wait for the results table to render
    pub results_timeout: Duration,
    /// Maximum number of concurrent browser sessions
    pub max_concurrent_sessions: usize,
}

impl Default for TimetableConfig {
    fn default() -> Self {
        Self {
            entry_url: TIMETABLE_ENTRY_URL.to_string(),
            term: "202409".to_string(),
            chrome_path: None,
            step_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(60),
            results_timeout: Duration::from_secs(120),
            max_concurrent_sessions: 2,
        }
    }
}
