//! Best-effort email notifications for seat openings.

use super::error::WatchError;
use crate::timetable::SeatCount;
use async_trait::async_trait;
use std::time::Duration;

/// Configuration for the transactional mail provider.
///
/// `endpoint` is the provider's message-submission URL (a Mailgun-style
/// `/messages` endpoint); credentials come from the environment.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub endpoint: String,
    pub api_key: String,
    pub sender: String,
}

impl MailerConfig {
    /// Returns true if the provider credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty()
    }
}

/// A seat-opening notice at the moment it was detected.
#[derive(Debug, Clone)]
pub struct SeatNotification {
    pub recipient: String,
    pub course_name: String,
    pub subject: String,
    pub number: String,
    pub title: String,
    pub enrolled: SeatCount,
    pub limit: SeatCount,
}

impl SeatNotification {
    pub fn subject_line(&self) -> String {
        format!("Seat available in {} {}", self.subject, self.number)
    }

    pub fn body_text(&self) -> String {
        let enrolled = match self.enrolled.known() {
            Some(n) => n.to_string(),
            None => "?".to_string(),
        };
        let limit = match self.limit.known() {
            Some(n) => n.to_string(),
            None => "?".to_string(),
        };
        format!(
            "A seat just opened in {} {} ({}).\n\n\
             Enrollment is currently {enrolled} of {limit}.\n\n\
             Seats go fast; this notice reflects enrollment at the time it was sent.",
            self.subject, self.number, self.title,
        )
    }
}

/// Dispatcher for seat-opening notifications.
///
/// Delivery is best effort. By the time a send is attempted the subscription
/// has already been removed, so a failure is logged by the caller and the
/// notice is lost.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_seat_opening(&self, notification: &SeatNotification) -> Result<(), WatchError>;
}

/// Notifier backed by an HTTP mail provider.
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailerConfig,
}

impl HttpMailer {
    pub fn new(config: MailerConfig) -> Result<Self, WatchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WatchError::Notify {
                message: format!("failed to build mail client: {e}"),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send_seat_opening(&self, notification: &SeatNotification) -> Result<(), WatchError> {
        let subject = notification.subject_line();
        let body = notification.body_text();
        let params = [
            ("from", self.config.sender.as_str()),
            ("to", notification.recipient.as_str()),
            ("subject", subject.as_str()),
            ("text", body.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.endpoint)
            .basic_auth("api", Some(&self.config.api_key))
            .form(&params)
            .send()
            .await
            .map_err(|e| WatchError::Notify {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(WatchError::Notify {
                message: format!("mail provider returned {}", response.status()),
            });
        }

        Ok(())
    }
}
