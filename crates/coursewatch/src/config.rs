//! Environment-driven application configuration.

use crate::timetable::TimetableConfig;
use crate::watcher::{MailerConfig, UnmatchedPolicy, WatcherConfig};
use std::env;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// How long a scraped catalog stays fresh
    pub cache_ttl: Duration,
    /// Path to the subscriptions database
    pub subscriptions_db: String,
    pub timetable: TimetableConfig,
    pub watcher: WatcherConfig,
    pub mailer: MailerConfig,
}

impl AppConfig {
    /// Builds the configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut timetable = TimetableConfig::default();
        if let Ok(url) = env::var("TIMETABLE_URL") {
            timetable.entry_url = url;
        }
        if let Ok(term) = env::var("TIMETABLE_TERM") {
            timetable.term = term;
        }
        timetable.chrome_path = env::var("CHROME_PATH").ok();

        let unmatched_policy = match env_u32("WATCH_UNMATCHED_TICKS", 0) {
            0 => UnmatchedPolicy::Retain,
            ticks => UnmatchedPolicy::RemoveAfter(ticks),
        };
        let watcher = WatcherConfig {
            tick_interval: Duration::from_secs(env_u64("WATCH_INTERVAL_SECS", 5 * 60)),
            max_concurrent_checks: env_u64("WATCH_MAX_CONCURRENT", 4) as usize,
            unmatched_policy,
        };

        let mailer = MailerConfig {
            endpoint: env::var("MAILER_ENDPOINT").unwrap_or_default(),
            api_key: env::var("MAILER_API_KEY").unwrap_or_default(),
            sender: env::var("MAILER_FROM")
                .unwrap_or_else(|_| "Coursewatch <no-reply@localhost>".to_string()),
        };

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5001".to_string()),
            cache_ttl: Duration::from_secs(env_u64("CACHE_TTL_SECS", 60 * 60)),
            subscriptions_db: env::var("SUBSCRIPTIONS_DB")
                .unwrap_or_else(|_| "subscriptions.db".to_string()),
            timetable,
            watcher,
            mailer,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
