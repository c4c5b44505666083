//! Periodic enrollment watcher.
//!
//! On a fixed interval, re-checks every active subscription's target course
//! with a fresh scrape and dispatches an email when a seat opens. Each
//! subscription is an isolated unit of failure; one bad check never stalls
//! the rest of the tick or the scheduler itself.

mod error;
mod notify;
mod registry;

pub use error::WatchError;
pub use notify::{HttpMailer, MailerConfig, Notifier, SeatNotification};
pub use registry::{Subscription, SubscriptionRequest, SubscriptionStore};

use crate::timetable::{normalize_course_number, CatalogSource, CourseOffering};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What to do with a subscription whose target course never appears in the
/// scraped listing (dropped from the catalog, or a bad course code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedPolicy {
    /// Keep the subscription indefinitely
    Retain,
    /// Expire it after this many consecutive unmatched ticks
    RemoveAfter(u32),
}

/// Configuration for the enrollment watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Interval between enrollment checks
    pub tick_interval: Duration,
    /// Maximum subscriptions checked concurrently within a tick
    pub max_concurrent_checks: usize,
    pub unmatched_policy: UnmatchedPolicy,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5 * 60),
            max_concurrent_checks: 4,
            unmatched_policy: UnmatchedPolicy::Retain,
        }
    }
}

/// Outcome of a single subscription check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckOutcome {
    /// Seat opened; subscription removed and notification dispatched
    Opened,
    /// Course found but no seat available
    Full,
    /// Target course absent from the scraped listing
    Unmatched,
}

/// Handle for a running watcher loop.
pub struct WatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Signals the loop to stop and waits for it to finish.
    ///
    /// An in-flight tick is cancelled; browser sessions it owned are killed
    /// when their scrape futures drop.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Background service that watches subscribed courses for open seats.
pub struct EnrollmentWatcher {
    registry: Arc<SubscriptionStore>,
    source: Arc<dyn CatalogSource>,
    notifier: Arc<dyn Notifier>,
    config: WatcherConfig,
    /// Consecutive unmatched-tick counts, keyed by subscription id
    misses: DashMap<String, u32>,
}

impl EnrollmentWatcher {
    pub fn new(
        registry: Arc<SubscriptionStore>,
        source: Arc<dyn CatalogSource>,
        notifier: Arc<dyn Notifier>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            registry,
            source,
            notifier,
            config,
            misses: DashMap::new(),
        }
    }

    /// Starts the scheduler loop and returns a handle for stopping it.
    pub fn start(self: &Arc<Self>) -> WatcherHandle {
        let (shutdown, mut signal) = watch::channel(false);
        let watcher = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(watcher.config.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                interval_secs = watcher.config.tick_interval.as_secs(),
                "enrollment watcher started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => watcher.run_tick().await,
                    _ = signal.changed() => break,
                }
            }

            info!("enrollment watcher stopped");
        });

        WatcherHandle { shutdown, task }
    }

    /// Runs one full pass over every active subscription.
    pub async fn run_tick(&self) {
        let subscriptions = match self.registry.list_all() {
            Ok(subs) => subs,
            Err(e) => {
                error!(error = %e, "failed to load subscriptions, skipping tick");
                return;
            }
        };
        if subscriptions.is_empty() {
            return;
        }

        info!(count = subscriptions.len(), "checking subscriptions for open seats");

        stream::iter(subscriptions)
            .for_each_concurrent(self.config.max_concurrent_checks, |sub| async move {
                self.check_subscription(&sub).await;
            })
            .await;
    }

    /// Checks one subscription, absorbing its failures.
    ///
    /// A check that would overrun into the next tick is abandoned; the
    /// subscription simply gets re-checked on schedule.
    async fn check_subscription(&self, sub: &Subscription) {
        match tokio::time::timeout(self.config.tick_interval, self.check_for_opening(sub)).await {
            Ok(Ok(outcome)) => {
                debug!(subscription = %sub.id, ?outcome, "seat check finished");
            }
            Ok(Err(e)) => {
                warn!(subscription = %sub.id, error = %e, "seat check failed, will retry next tick");
            }
            Err(_) => {
                warn!(subscription = %sub.id, "seat check overran the tick interval, abandoned");
            }
        }
    }

    async fn check_for_opening(&self, sub: &Subscription) -> Result<CheckOutcome, WatchError> {
        let Some((subject, number)) = subscription_target(sub) else {
            warn!(
                subscription = %sub.id,
                course_num = %sub.course_num,
                "subscription has no parsable subject/number"
            );
            self.handle_unmatched(sub)?;
            return Ok(CheckOutcome::Unmatched);
        };

        // Enrollment counts are the quantity being monitored, so this is a
        // fresh scrape every time; the catalog cache is never consulted.
        let offerings = self.source.fetch_catalog().await?;
        let target = offerings
            .iter()
            .find(|offering| matches_offering(offering, &subject, &number));

        match target {
            None => {
                self.handle_unmatched(sub)?;
                Ok(CheckOutcome::Unmatched)
            }
            Some(offering) if offering.has_open_seat() => {
                // Remove first, then send: delivery is at most once, and a
                // failed send never resurrects the subscription.
                self.registry.remove(&sub.id)?;
                self.misses.remove(&sub.id);
                info!(
                    subscription = %sub.id,
                    course = %format!("{subject} {number}"),
                    "seat opened, dispatching notification"
                );

                let notification = SeatNotification {
                    recipient: sub.email.clone(),
                    course_name: sub.course_name.clone(),
                    subject: offering.subject.clone(),
                    number: offering.number.clone(),
                    title: offering.title.clone(),
                    enrolled: offering.enrolled,
                    limit: offering.limit,
                };
                if let Err(e) = self.notifier.send_seat_opening(&notification).await {
                    warn!(subscription = %sub.id, error = %e, "notification delivery failed");
                }

                Ok(CheckOutcome::Opened)
            }
            Some(_) => {
                self.misses.remove(&sub.id);
                Ok(CheckOutcome::Full)
            }
        }
    }

    fn handle_unmatched(&self, sub: &Subscription) -> Result<(), WatchError> {
        match self.config.unmatched_policy {
            UnmatchedPolicy::Retain => {
                debug!(subscription = %sub.id, "target course not in listing, keeping subscription");
                Ok(())
            }
            UnmatchedPolicy::RemoveAfter(limit) => {
                let mut entry = self.misses.entry(sub.id.clone()).or_insert(0);
                *entry += 1;
                let count = *entry;
                drop(entry);

                if count >= limit {
                    info!(
                        subscription = %sub.id,
                        ticks = count,
                        "target unmatched for too many ticks, expiring subscription"
                    );
                    self.misses.remove(&sub.id);
                    self.registry.remove(&sub.id)?;
                }
                Ok(())
            }
        }
    }
}

/// Splits a subscription's course code into subject and normalized number.
fn subscription_target(sub: &Subscription) -> Option<(String, String)> {
    let mut parts = sub.course_num.split_whitespace();
    let subject = parts.next()?;
    let number = parts.next()?;
    Some((
        subject.to_uppercase(),
        normalize_course_number(number),
    ))
}

fn matches_offering(offering: &CourseOffering, subject: &str, number: &str) -> bool {
    offering.subject.eq_ignore_ascii_case(subject)
        && normalize_course_number(&offering.number) == number
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::{ScrapeError, SeatCount};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FixedSource {
        offerings: StdMutex<Vec<CourseOffering>>,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(offerings: Vec<CourseOffering>) -> Self {
            Self {
                offerings: StdMutex::new(offerings),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CatalogSource for FixedSource {
        async fn fetch_catalog(&self) -> Result<Vec<CourseOffering>, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ScrapeError::Navigation {
                    message: "simulated failure".to_string(),
                });
            }
            Ok(self.offerings.lock().unwrap().clone())
        }
    }

    struct RecordingNotifier {
        sent: StdMutex<Vec<SeatNotification>>,
        fail: AtomicBool,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: StdMutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_seat_opening(
            &self,
            notification: &SeatNotification,
        ) -> Result<(), WatchError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(WatchError::Notify {
                    message: "simulated delivery failure".to_string(),
                });
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn offering(subject: &str, number: &str, enrolled: u32, limit: u32) -> CourseOffering {
        CourseOffering {
            term: "202409".to_string(),
            crn: "90001".to_string(),
            subject: subject.to_string(),
            number: number.to_string(),
            section: "01".to_string(),
            title: "Test Course".to_string(),
            crosslist: String::new(),
            period_code: "2A".to_string(),
            period: String::new(),
            room: String::new(),
            building: String::new(),
            instructor: String::new(),
            world_culture: String::new(),
            distrib: String::new(),
            lang_req: String::new(),
            limit: SeatCount::Known(limit),
            enrolled: SeatCount::Known(enrolled),
            status: String::new(),
        }
    }

    fn subscribe(store: &SubscriptionStore, user: &str, course_num: &str) -> Subscription {
        store
            .upsert(&SubscriptionRequest {
                user_id: user.to_string(),
                course_id: course_num.replace(' ', "_"),
                email: format!("{user}@example.com"),
                course_name: "Test Course".to_string(),
                course_num: course_num.to_string(),
            })
            .unwrap()
    }

    fn watcher(
        store: Arc<SubscriptionStore>,
        source: Arc<FixedSource>,
        notifier: Arc<RecordingNotifier>,
        policy: UnmatchedPolicy,
    ) -> EnrollmentWatcher {
        EnrollmentWatcher::new(
            store,
            source,
            notifier,
            WatcherConfig {
                tick_interval: Duration::from_secs(300),
                max_concurrent_checks: 4,
                unmatched_policy: policy,
            },
        )
    }

    #[tokio::test]
    async fn test_open_seat_notifies_and_removes() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        subscribe(&store, "u1", "COSC 7");
        let source = Arc::new(FixedSource::new(vec![offering("COSC", "007", 8, 10)]));
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(store.clone(), source, notifier.clone(), UnmatchedPolicy::Retain);

        watcher.run_tick().await;

        assert_eq!(notifier.sent_count(), 1);
        assert!(store.list_all().unwrap().is_empty());

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].recipient, "u1@example.com");
        assert_eq!(sent[0].enrolled, SeatCount::Known(8));
        assert_eq!(sent[0].limit, SeatCount::Known(10));
    }

    #[tokio::test]
    async fn test_full_section_leaves_subscription() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        subscribe(&store, "u1", "COSC 7");
        let source = Arc::new(FixedSource::new(vec![offering("COSC", "007", 10, 10)]));
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(store.clone(), source, notifier.clone(), UnmatchedPolicy::Retain);

        watcher.run_tick().await;

        assert_eq!(notifier.sent_count(), 0);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_enrollment_is_not_an_opening() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        subscribe(&store, "u1", "COSC 7");
        let mut listing = offering("COSC", "007", 0, 10);
        listing.enrolled = SeatCount::Unknown;
        let source = Arc::new(FixedSource::new(vec![listing]));
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(store.clone(), source, notifier.clone(), UnmatchedPolicy::Retain);

        watcher.run_tick().await;

        assert_eq!(notifier.sent_count(), 0);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_subscription_is_retained() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        subscribe(&store, "u1", "ENGL 5");
        let source = Arc::new(FixedSource::new(vec![offering("COSC", "007", 8, 10)]));
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(store.clone(), source, notifier.clone(), UnmatchedPolicy::Retain);

        for _ in 0..3 {
            watcher.run_tick().await;
        }

        assert_eq!(notifier.sent_count(), 0);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_subscription_expires_under_policy() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        subscribe(&store, "u1", "ENGL 5");
        let source = Arc::new(FixedSource::new(vec![offering("COSC", "007", 8, 10)]));
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(
            store.clone(),
            source,
            notifier.clone(),
            UnmatchedPolicy::RemoveAfter(2),
        );

        watcher.run_tick().await;
        assert_eq!(store.list_all().unwrap().len(), 1);

        watcher.run_tick().await;
        assert!(store.list_all().unwrap().is_empty());
        assert_eq!(notifier.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_match_resets_unmatched_count() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        subscribe(&store, "u1", "COSC 7");
        let source = Arc::new(FixedSource::new(Vec::new()));
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(
            store.clone(),
            source.clone(),
            notifier.clone(),
            UnmatchedPolicy::RemoveAfter(2),
        );

        watcher.run_tick().await;

        // The course reappears, full; the miss streak resets.
        *source.offerings.lock().unwrap() = vec![offering("COSC", "007", 10, 10)];
        watcher.run_tick().await;

        *source.offerings.lock().unwrap() = Vec::new();
        watcher.run_tick().await;

        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scrape_failure_is_isolated_per_tick() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        subscribe(&store, "u1", "COSC 7");
        let source = Arc::new(FixedSource::new(vec![offering("COSC", "007", 8, 10)]));
        source.fail.store(true, Ordering::SeqCst);
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(store.clone(), source.clone(), notifier.clone(), UnmatchedPolicy::Retain);

        // Failing tick: no notification, no removal, loop survives.
        watcher.run_tick().await;
        assert_eq!(notifier.sent_count(), 0);
        assert_eq!(store.list_all().unwrap().len(), 1);

        source.fail.store(false, Ordering::SeqCst);
        watcher.run_tick().await;
        assert_eq!(notifier.sent_count(), 1);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_restore_subscription() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        subscribe(&store, "u1", "COSC 7");
        let source = Arc::new(FixedSource::new(vec![offering("COSC", "007", 8, 10)]));
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail.store(true, Ordering::SeqCst);
        let watcher = watcher(store.clone(), source, notifier.clone(), UnmatchedPolicy::Retain);

        watcher.run_tick().await;

        assert_eq!(notifier.sent_count(), 0);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_bad_subscription_does_not_block_others() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        subscribe(&store, "u1", "garbage");
        subscribe(&store, "u2", "COSC 7");
        let source = Arc::new(FixedSource::new(vec![offering("COSC", "007", 8, 10)]));
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = watcher(store.clone(), source, notifier.clone(), UnmatchedPolicy::Retain);

        watcher.run_tick().await;

        assert_eq!(notifier.sent_count(), 1);
        let remaining = store.list_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let store = Arc::new(SubscriptionStore::open_in_memory().unwrap());
        let source = Arc::new(FixedSource::new(Vec::new()));
        let notifier = Arc::new(RecordingNotifier::new());
        let watcher = Arc::new(watcher(
            store,
            source,
            notifier,
            UnmatchedPolicy::Retain,
        ));

        let handle = watcher.start();
        handle.stop().await;
    }
}
