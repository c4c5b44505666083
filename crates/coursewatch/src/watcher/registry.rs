//! Durable store for seat-opening notification requests.

use super::error::WatchError;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS subscriptions (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    course_id   TEXT NOT NULL,
    email       TEXT NOT NULL,
    course_name TEXT NOT NULL,
    course_num  TEXT NOT NULL,
    created_at  TEXT NOT NULL
)";

/// A stored request to be notified when a seat opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Document key, `"{user_id}_{course_id}"`
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub email: String,
    pub course_name: String,
    /// Full course code, subject then number (e.g. "COSC 007")
    pub course_num: String,
    pub created_at: DateTime<Utc>,
}

/// Incoming subscribe request, before a key and timestamp are assigned.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub user_id: String,
    pub course_id: String,
    pub email: String,
    pub course_name: String,
    pub course_num: String,
}

impl SubscriptionRequest {
    /// Returns the document key for this request.
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.user_id, self.course_id)
    }
}

/// SQLite-backed subscription registry.
pub struct SubscriptionStore {
    db: Mutex<Connection>,
}

impl SubscriptionStore {
    /// Opens (or creates) the store at the given path and initializes the
    /// schema.
    pub fn open(db_path: &str) -> Result<Self, WatchError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> Result<Self, WatchError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Creates or replaces the subscription for `(user_id, course_id)`.
    ///
    /// Subscribing twice with the same key leaves exactly one record carrying
    /// the latest email and course metadata.
    pub fn upsert(&self, request: &SubscriptionRequest) -> Result<Subscription, WatchError> {
        let subscription = Subscription {
            id: request.document_id(),
            user_id: request.user_id.clone(),
            course_id: request.course_id.clone(),
            email: request.email.clone(),
            course_name: request.course_name.clone(),
            course_num: request.course_num.clone(),
            created_at: Utc::now(),
        };

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO subscriptions (id, user_id, course_id, email, course_name, course_num, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 email = excluded.email,
                 course_name = excluded.course_name,
                 course_num = excluded.course_num,
                 created_at = excluded.created_at",
            (
                &subscription.id,
                &subscription.user_id,
                &subscription.course_id,
                &subscription.email,
                &subscription.course_name,
                &subscription.course_num,
                &subscription.created_at,
            ),
        )?;

        Ok(subscription)
    }

    /// Returns every active subscription, oldest first.
    pub fn list_all(&self) -> Result<Vec<Subscription>, WatchError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, user_id, course_id, email, course_name, course_num, created_at
             FROM subscriptions
             ORDER BY created_at",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Subscription {
                id: row.get(0)?,
                user_id: row.get(1)?,
                course_id: row.get(2)?,
                email: row.get(3)?,
                course_name: row.get(4)?,
                course_num: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let subscriptions = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(subscriptions)
    }

    /// Deletes one subscription. Returns true if a row was removed.
    pub fn remove(&self, id: &str) -> Result<bool, WatchError> {
        let db = self.db.lock().unwrap();
        let changed = db.execute("DELETE FROM subscriptions WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }
}
